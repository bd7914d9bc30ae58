//! `[scripts]`, `[styles]` and `[images]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [scripts]
//! entry = "app.js"            # Entry module, relative to the scripts base
//! file = "app.js"             # Bundle file name
//! vendor_file = "vendor.js"   # Vendor bundle file name
//! target = "es2015"           # Transpile target
//!
//! [styles]
//! browsers = ["last 2 versions", "ie 11"]
//! flexbugs = true
//! load_paths = ["node_modules"]
//!
//! [images]
//! svg_keep_viewbox = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Script bundle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub entry: String,
    pub file: String,
    pub vendor_file: String,
    pub target: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "app.js".into(),
            file: "app.js".into(),
            vendor_file: "vendor.js".into(),
            target: "es2015".into(),
        }
    }
}

/// Stylesheet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Browserslist queries used for prefixing and syntax lowering.
    pub browsers: Vec<String>,
    /// Rewrite `flex` shorthands that trip known flexbox bugs.
    pub flexbugs: bool,
    /// Extra `@import` search paths, relative to the project root.
    pub load_paths: Vec<PathBuf>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            browsers: vec!["last 2 versions".into(), "ie 11".into()],
            flexbugs: true,
            load_paths: Vec::new(),
        }
    }
}

/// Image optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub svg_keep_viewbox: bool,
    /// Quality of progressive JPEG output, 1-100.
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            svg_keep_viewbox: true,
            jpeg_quality: 90,
        }
    }
}
