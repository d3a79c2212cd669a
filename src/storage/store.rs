use std::sync::Arc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Credentials, Settings};
use crate::error::{Error, Result};
use crate::storage::documents::Document;
use crate::storage::github::GithubStore;
use crate::storage::local::{to_pretty_json, LocalFiles};
use crate::storage::traits::{MemoryRemote, RemoteStore};

/// Where a loaded document actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Local,
    Default,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub value: Value,
    pub source: LoadSource,
    /// Set whenever the remote copy could not be used.
    pub notice: Option<String>,
}

/// A typed document plus the notice from loading it.
#[derive(Debug, Clone)]
pub struct Loaded<D> {
    pub doc: D,
    pub source: LoadSource,
    pub notice: Option<String>,
}

/// JSON document store backed by a remote versioned repository with the
/// local data directory as fallback.
///
/// Reads prefer the remote copy. Writes always land on local disk first and
/// are then pushed to the remote with one attempt; a failed push leaves the
/// local copy as the only record and is not retried or reconciled later.
/// Neither operation ever returns an error.
///
/// A store built with [`local_only`](Self::local_only) has no remote: loads
/// read the data directory without notices and saves report no sync.
#[derive(Clone)]
pub struct DocumentStore {
    remote: Option<Arc<dyn RemoteStore>>,
    local: LocalFiles,
}

impl DocumentStore {
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalFiles) -> Self {
        Self { remote: Some(remote), local }
    }

    pub fn local_only(local: LocalFiles) -> Self {
        Self { remote: None, local }
    }

    pub fn github(credentials: &Credentials, settings: &Settings) -> Result<Self> {
        let remote = GithubStore::new(credentials, settings)?;
        Ok(Self::new(Arc::new(remote), LocalFiles::new(&settings.data_dir)))
    }

    pub fn in_memory(local: LocalFiles) -> (Self, MemoryRemote) {
        let remote = MemoryRemote::new();
        (Self::new(Arc::new(remote.clone()), local), remote)
    }

    pub fn local(&self) -> &LocalFiles {
        &self.local
    }

    pub fn is_local_only(&self) -> bool {
        self.remote.is_none()
    }

    pub fn describe(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{} (local {})", remote.describe(), self.local.root().display()),
            None => format!("local only ({})", self.local.root().display()),
        }
    }

    async fn load_remote(remote: &dyn RemoteStore, path: &str) -> Result<Value> {
        let file = remote
            .get_file(path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} on {}", path, remote.describe())))?;
        Ok(serde_json::from_str(&file.content)?)
    }

    pub async fn load(&self, path: &str) -> LoadOutcome {
        let remote = match &self.remote {
            Some(remote) => remote,
            None => return self.load_local_only(path),
        };

        let remote_err = match Self::load_remote(remote.as_ref(), path).await {
            Ok(value) => {
                debug!("Loaded {} from {}", path, remote.describe());
                return LoadOutcome { value, source: LoadSource::Remote, notice: None };
            }
            Err(e) => e,
        };

        match self.local.read(path) {
            Ok(value) => {
                let notice = format!("Using local copy of {}: remote load failed ({})", path, remote_err);
                warn!("{}", notice);
                LoadOutcome { value, source: LoadSource::Local, notice: Some(notice) }
            }
            Err(local_err) => {
                let notice = format!(
                    "Error loading {} from remote ({}) and local ({})",
                    path, remote_err, local_err
                );
                warn!("{}", notice);
                LoadOutcome {
                    value: Value::Object(Default::default()),
                    source: LoadSource::Default,
                    notice: Some(notice),
                }
            }
        }
    }

    /// A missing file is the normal first-run state and stays silent.
    fn load_local_only(&self, path: &str) -> LoadOutcome {
        match self.local.read(path) {
            Ok(value) => {
                debug!("Loaded {} from {}", path, self.local.root().display());
                LoadOutcome { value, source: LoadSource::Local, notice: None }
            }
            Err(Error::NotFound(_)) => LoadOutcome {
                value: Value::Object(Default::default()),
                source: LoadSource::Default,
                notice: None,
            },
            Err(e) => {
                let notice = format!("Error loading {} from local ({})", path, e);
                warn!("{}", notice);
                LoadOutcome {
                    value: Value::Object(Default::default()),
                    source: LoadSource::Default,
                    notice: Some(notice),
                }
            }
        }
    }

    /// Returns whether the remote write went through. Always false for a
    /// local-only store.
    pub async fn save(&self, path: &str, value: &Value, message: &str) -> bool {
        if let Err(e) = self.local.write(path, value) {
            error!("Error saving local file {}: {}", path, e);
        }

        let remote = match &self.remote {
            Some(remote) => remote,
            None => {
                debug!("Saved {} locally: {}", path, message);
                return false;
            }
        };

        match Self::push(remote.as_ref(), path, value, message).await {
            Ok(()) => {
                info!("Saved {} to {}: {}", path, remote.describe(), message);
                true
            }
            Err(e) => {
                warn!("Failed to sync {} with {}: {}", path, remote.describe(), e);
                false
            }
        }
    }

    async fn push(remote: &dyn RemoteStore, path: &str, value: &Value, message: &str) -> Result<()> {
        let content = to_pretty_json(value)?;

        // Re-read the current revision right before writing; an update is
        // only ever issued against the revision we just saw.
        match remote.get_file(path).await? {
            Some(current) => {
                remote.update_file(path, &content, message, &current.revision).await?;
            }
            None => {
                remote.create_file(path, &content, message).await?;
            }
        }
        Ok(())
    }

    pub async fn load_doc<D: Document>(&self) -> Loaded<D> {
        let outcome = self.load(D::PATH).await;
        Loaded {
            doc: D::from_value(outcome.value),
            source: outcome.source,
            notice: outcome.notice,
        }
    }

    pub async fn save_doc<D: Document>(&self, doc: &D, message: &str) -> bool {
        match doc.to_value() {
            Ok(value) => self.save(D::PATH, &value, message).await,
            Err(e) => {
                error!("Failed to serialize {}: {}", D::PATH, e);
                false
            }
        }
    }
}
