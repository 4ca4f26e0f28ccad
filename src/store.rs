//! Identity store shared by the CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use barebone_config::TrackerConfig;
use barebone_protocols::KeyValueStore;
use barebone_storage_file::FileStore;

use crate::barebone_dir;

/// Configured storage path, or `~/.barebone/storage.json`.
pub(crate) fn storage_file(config: &TrackerConfig) -> PathBuf {
    config
        .storage_path()
        .unwrap_or_else(|| barebone_dir().join("storage.json"))
}

pub(crate) fn open_store(config: &TrackerConfig) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::new(storage_file(config)))
}
