//! Shared state and the on-disk persistence backend

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vitals_core::export;
use vitals_core::{Collector, KeyValueStorage, MonitorConfig, Result, VitalsError};

/// One JSON file per key under a data directory
///
/// Writes go to a temporary file first and are renamed into place, so a crash
/// never leaves a half-written store behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(VitalsError::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Mirrors the metric store to a [`FileStorage`] key
///
/// Snapshots are taken under the collector lock and numbered; the file I/O
/// runs on the blocking pool after the lock is released. A snapshot older than
/// the last one written is discarded, so concurrent requests can't roll the
/// file back.
pub struct Persister {
    storage: FileStorage,
    key: String,
    generation: AtomicU64,
    written: std::sync::Mutex<u64>,
}

/// A snapshot waiting to be written; `None` removes the persisted copy
pub struct PendingWrite {
    persister: Arc<Persister>,
    generation: u64,
    contents: Option<String>,
}

impl Persister {
    pub fn new(storage: FileStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            generation: AtomicU64::new(0),
            written: std::sync::Mutex::new(0),
        }
    }

    /// Read the persisted metrics into `collector`, newest kept within capacity
    pub fn restore(&self, collector: &mut Collector) -> Result<()> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(());
        };

        match export::from_json(&raw) {
            Ok(metrics) => {
                for metric in metrics {
                    collector.store_mut().record(metric);
                }
            }
            Err(e) => warn!("Ignoring malformed persisted metrics '{}': {}", self.key, e),
        }
        Ok(())
    }

    /// Snapshot the store; call with the collector lock held
    pub fn stage(self: &Arc<Self>, collector: &Collector) -> Option<PendingWrite> {
        let contents = match export::to_json(&collector.store().snapshot(), false) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize metrics '{}': {}", self.key, e);
                return None;
            }
        };
        Some(self.pending(Some(contents)))
    }

    /// Stage removal of the persisted copy; call with the collector lock held
    pub fn stage_removal(self: &Arc<Self>) -> PendingWrite {
        self.pending(None)
    }

    fn pending(self: &Arc<Self>, contents: Option<String>) -> PendingWrite {
        PendingWrite {
            persister: Arc::clone(self),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            contents,
        }
    }

    fn write(&self, generation: u64, contents: Option<&str>) -> Result<()> {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if generation <= *written {
            debug!("Skipping stale snapshot {} of '{}'", generation, self.key);
            return Ok(());
        }

        match contents {
            Some(json) => self.storage.set(&self.key, json)?,
            None => self.storage.remove(&self.key)?,
        }
        *written = generation;
        Ok(())
    }
}

impl PendingWrite {
    /// Write on the blocking pool; failures are logged, never returned
    pub async fn commit(self) {
        let PendingWrite {
            persister,
            generation,
            contents,
        } = self;
        let key = persister.key.clone();

        let result = tokio::task::spawn_blocking(move || {
            persister.write(generation, contents.as_deref())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist metrics '{}': {}", key, e),
            Err(e) => warn!("Persistence task for '{}' failed: {}", key, e),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Mutex<Collector>>,
    pub persister: Option<Arc<Persister>>,
}

impl AppState {
    /// Build the collector; metrics are kept in memory only without `data_dir`
    ///
    /// The collector takes payloads from many clients, so their timestamps are
    /// stored as sent.
    pub fn new(config: &MonitorConfig, data_dir: Option<&Path>) -> Result<Self> {
        let mut collector: Collector =
            Collector::from_config(config, None).with_monotonic_timestamps(false);

        let persister = match data_dir {
            Some(dir) if config.persist => {
                let persister = Persister::new(FileStorage::new(dir)?, config.storage_key.clone());
                persister.restore(&mut collector)?;
                info!("Persisting metrics under {}", dir.display());
                Some(Arc::new(persister))
            }
            _ => None,
        };

        info!(
            "Metric store ready: {} of {} slots used",
            collector.store().len(),
            collector.store().capacity()
        );

        Ok(Self {
            collector: Arc::new(Mutex::new(collector)),
            persister,
        })
    }
}
