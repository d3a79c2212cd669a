use std::fs;
use std::path::{Component, Path, PathBuf};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Render a document the way it is stored everywhere: four-space indent,
/// non-ASCII kept as is.
pub fn to_pretty_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| Error::Storage(e.to_string()))
}

/// Local mirror of the remote documents, rooted at the data directory.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a document path below the root. Absolute paths and `..`
    /// are refused.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::Invalid(format!("Document path '{}' is not a relative path", path)));
        }
        Ok(self.root.join(relative))
    }

    pub fn read(&self, path: &str) -> Result<Value> {
        let file = self.resolve(path)?;
        let content = fs::read_to_string(&file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(file.display().to_string())
            } else {
                Error::Storage(format!("Failed to read '{}': {}", file.display(), e))
            }
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: &str, value: &Value) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Storage(format!(
                "Failed to create directory '{}': {}",
                parent.display(), e
            )))?;
        }

        let content = to_pretty_json(value)?;

        // Write to temporary file first, then rename
        let temp_file = file.with_extension("json.tmp");
        fs::write(&temp_file, content).map_err(|e| Error::Storage(format!(
            "Failed to write '{}': {}",
            temp_file.display(), e
        )))?;
        fs::rename(&temp_file, &file).map_err(|e| Error::Storage(format!(
            "Failed to rename '{}' to '{}': {}",
            temp_file.display(), file.display(), e
        )))?;

        tracing::debug!("Wrote local copy {}", file.display());
        Ok(())
    }
}
