use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Opaque token naming one version of a remote document (a blob SHA on
/// GitHub). Updates must name the revision they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as the remote backend currently holds it.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
    pub revision: Revision,
}

/// Version-controlled file storage used as the primary home of documents.
///
/// There is deliberately no "write whatever is there" operation: a path
/// that already exists can only be replaced through [`update_file`] with
/// the revision the caller last saw, and [`create_file`] on an existing
/// path fails.
///
/// [`update_file`]: RemoteStore::update_file
/// [`create_file`]: RemoteStore::create_file
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a document, `Ok(None)` when nothing exists at `path`.
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>>;

    /// Create a document that must not exist yet.
    async fn create_file(&self, path: &str, content: &str, message: &str) -> Result<Revision>;

    /// Replace a document, provided its current revision is `expected`.
    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: &Revision,
    ) -> Result<Revision>;

    /// Short human-readable name for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    content: String,
    revision: Revision,
}

/// A recorded write, kept so tests can assert on commit messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub path: String,
    pub message: String,
    pub revision: Revision,
}

/// In-process remote used by tests and by `--offline` runs. Enforces the
/// same revision rules as the real backend.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    files: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    commits: Arc<RwLock<Vec<Commit>>>,
    offline: Arc<RwLock<bool>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.commits.read().clone()
    }

    /// Put raw content in place without a commit, e.g. to seed corrupt data.
    pub fn seed(&self, path: &str, content: &str) -> Revision {
        let revision = Self::revision_for(path, content, 0);
        self.files.write().insert(
            path.to_string(),
            MemoryEntry { content: content.to_string(), revision: revision.clone() },
        );
        revision
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.read() {
            return Err(Error::HttpError("memory remote is offline".to_string()));
        }
        Ok(())
    }

    fn revision_for(path: &str, content: &str, sequence: usize) -> Revision {
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.as_bytes());
        hasher.update(&sequence.to_le_bytes());
        hasher.update(content.as_bytes());
        Revision::new(hasher.finalize().to_hex().to_string())
    }

    fn commit(&self, path: &str, content: &str, message: &str) -> Revision {
        let mut commits = self.commits.write();
        let revision = Self::revision_for(path, content, commits.len() + 1);
        commits.push(Commit {
            path: path.to_string(),
            message: message.to_string(),
            revision: revision.clone(),
        });
        self.files.write().insert(
            path.to_string(),
            MemoryEntry { content: content.to_string(), revision: revision.clone() },
        );
        revision
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        self.check_online()?;
        let files = self.files.read();
        Ok(files.get(path).map(|entry| RemoteFile {
            path: path.to_string(),
            content: entry.content.clone(),
            revision: entry.revision.clone(),
        }))
    }

    async fn create_file(&self, path: &str, content: &str, message: &str) -> Result<Revision> {
        self.check_online()?;
        if self.files.read().contains_key(path) {
            return Err(Error::AlreadyExists(format!("{} already exists", path)));
        }
        Ok(self.commit(path, content, message))
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected: &Revision,
    ) -> Result<Revision> {
        self.check_online()?;
        let current = self
            .files
            .read()
            .get(path)
            .map(|entry| entry.revision.clone())
            .ok_or_else(|| Error::NotFound(path.to_string()))?;

        if &current != expected {
            return Err(Error::Conflict(format!(
                "{} is at {}, update was based on {}",
                path, current, expected
            )));
        }
        Ok(self.commit(path, content, message))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update_with_revision() {
        let remote = MemoryRemote::new();

        let first = remote.create_file("data/a.json", "[]", "create").await.unwrap();
        let file = remote.get_file("data/a.json").await.unwrap().unwrap();
        assert_eq!(file.revision, first);

        let second = remote
            .update_file("data/a.json", "[1]", "update", &file.revision)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(remote.get_file("data/a.json").await.unwrap().unwrap().content, "[1]");
        assert_eq!(remote.commits().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_revision_is_a_conflict() {
        let remote = MemoryRemote::new();
        let stale = remote.create_file("data/a.json", "[]", "create").await.unwrap();
        remote.update_file("data/a.json", "[1]", "update", &stale).await.unwrap();

        let result = remote.update_file("data/a.json", "[2]", "late", &stale).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_on_existing_path_fails() {
        let remote = MemoryRemote::new();
        remote.create_file("data/a.json", "[]", "create").await.unwrap();

        let result = remote.create_file("data/a.json", "[9]", "again").await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert_eq!(remote.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);

        assert!(remote.get_file("data/a.json").await.is_err());
        assert!(remote.create_file("data/a.json", "[]", "m").await.is_err());

        remote.set_offline(false);
        assert!(remote.get_file("data/a.json").await.unwrap().is_none());
        assert!(remote.commits().is_empty());
    }
}
