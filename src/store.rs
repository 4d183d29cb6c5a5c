use crate::model::WalletProfile;
use async_trait::async_trait;
use std::path::PathBuf;

/// Publishes the merged tracked set as the local read model.
///
/// Fire-and-forget from the scheduler's perspective; implementations log
/// their own failures.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    async fn publish(&self, profiles: &[WalletProfile]);
}

#[derive(Debug, Default)]
pub struct NoOpReadModelStore;

#[async_trait]
impl ReadModelStore for NoOpReadModelStore {
    async fn publish(&self, _profiles: &[WalletProfile]) {}
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ReadModelStore for JsonFileStore {
    async fn publish(&self, profiles: &[WalletProfile]) {
        let payload = match serde_json::to_vec_pretty(profiles) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "read model encode failed");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }
        if let Err(err) = tokio::fs::write(&self.path, payload).await {
            tracing::error!(
                error = %err,
                path = %self.path.display(),
                "read model write failed"
            );
        }
    }
}
