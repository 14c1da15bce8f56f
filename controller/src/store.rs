use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::warn;

use zonelight_common::{PersistedState, RuntimeConfig};

/// JSON files under the data directory: `runtime.json` for configuration and
/// `state.json` for timers, adjustments, wake anchor and scene.
#[derive(Clone)]
pub struct AppStore {
    runtime_path: Arc<PathBuf>,
    state_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("ZONELIGHT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.zonelight"));
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            state_path: Arc::new(data_dir.join("state.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("invalid {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let payload = serde_json::to_vec_pretty(runtime)?;
        self.write(&self.runtime_path, payload).await
    }

    /// Missing file yields the empty state. Corrupt entries are dropped
    /// individually and reported.
    pub async fn load_state(&self) -> anyhow::Result<PersistedState> {
        let _guard = self.lock.lock().await;
        let raw = match tokio::fs::read(self.state_path.as_ref()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PersistedState::default()),
            Err(err) => return Err(err.into()),
        };

        let (state, dropped) = PersistedState::from_slice_lenient(&raw)
            .with_context(|| format!("invalid {}", self.state_path.display()))?;
        if dropped > 0 {
            warn!("dropped {dropped} corrupt entries from persisted state");
        }
        Ok(state)
    }

    pub async fn save_state(&self, state: &PersistedState) -> anyhow::Result<()> {
        let payload = serde_json::to_vec_pretty(state)?;
        self.write(&self.state_path, payload).await
    }

    async fn write(&self, path: &Path, payload: Vec<u8>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
