//! Durable key-value storage trait.

use crate::error::StorageError;

/// Synchronous string key-value store scoped to one user profile.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
