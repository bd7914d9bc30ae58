//! Source map assembly.
//!
//! Bundles get an index map (`sections`), one section per module, so each
//! module keeps the map its own codegen produced.

use serde_json::{Map, Value, json};

/// Index source map under construction.
#[derive(Debug, Clone)]
pub struct IndexMap {
    file: String,
    sections: Vec<Value>,
}

impl IndexMap {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sections: Vec::new(),
        }
    }

    /// Add a module map whose generated code starts at 0-based `line`.
    pub fn push(&mut self, line: usize, map: Value) {
        self.sections.push(json!({
            "offset": { "line": line, "column": 0 },
            "map": map,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_json(&self) -> String {
        let mut root = Map::new();
        root.insert("version".into(), Value::from(3));
        root.insert("file".into(), Value::from(self.file.as_str()));
        root.insert("sections".into(), Value::Array(self.sections.clone()));
        Value::Object(root).to_string()
    }
}

/// Trailing comment linking a script to its map.
pub fn js_map_comment(map_name: &str) -> String {
    format!("//# sourceMappingURL={map_name}\n")
}

/// Trailing comment linking a stylesheet to its map.
pub fn css_map_comment(map_name: &str) -> String {
    format!("/*# sourceMappingURL={map_name} */\n")
}
