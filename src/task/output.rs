//! Writing artifacts under the output root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::TaskReport;
use crate::utils::hash::fingerprint;

/// What kind of file a task wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Bundle,
    Stylesheet,
    SourceMap,
    Image,
    Asset,
}

/// One written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub bytes: usize,
    /// Content fingerprint, equal across runs for equal output.
    pub hash: String,
}

/// Write `content` to `path`, creating parent directories.
pub fn write_artifact(
    report: &mut TaskReport,
    path: &Path,
    kind: ArtifactKind,
    content: impl AsRef<[u8]>,
) -> Result<()> {
    let content = content.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    report.artifacts.push(Artifact {
        path: path.to_path_buf(),
        kind,
        bytes: content.len(),
        hash: fingerprint(content),
    });
    Ok(())
}

/// Copy `source` to `dest` byte for byte.
pub fn copy_artifact(
    report: &mut TaskReport,
    source: &Path,
    dest: &Path,
    kind: ArtifactKind,
) -> Result<()> {
    let content =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    write_artifact(report, dest, kind, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.css");
        let mut report = TaskReport::new(TaskId::Styles);

        write_artifact(&mut report, &path, ArtifactKind::Stylesheet, "body{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "body{}");
        let artifact = &report.artifacts[0];
        assert_eq!(artifact.bytes, 6);
        assert_eq!(artifact.hash, fingerprint("body{}"));
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let mut report = TaskReport::new(TaskId::Assets);
        let err = copy_artifact(
            &mut report,
            &dir.path().join("missing.txt"),
            &dir.path().join("out.txt"),
            ArtifactKind::Asset,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
        assert!(report.artifacts.is_empty());
    }
}
