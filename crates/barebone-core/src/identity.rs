//! Per-profile user identifier.
//!
//! The identifier is a version-4-UUID-shaped token, generated on first use
//! and persisted under [`USER_ID_KEY`]. When the store cannot be read or
//! written, an in-memory identifier is used for the rest of the process.

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Builder;

use barebone_protocols::KeyValueStore;

/// Storage key of the persisted identifier.
pub const USER_ID_KEY: &str = "userId";

/// Source of the random bytes behind a generated identifier.
///
/// Need not be cryptographically strong.
pub trait RandomSource: Send {
    fn fill(&mut self, bytes: &mut [u8; 16]);
}

/// Operating-system randomness via `uuid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, bytes: &mut [u8; 16]) {
        *bytes = uuid::Uuid::new_v4().into_bytes();
    }
}

/// Generate a 36-character `8-4-4-4-12` lowercase hex identifier with the
/// version nibble `4` and the variant nibble in `{8, 9, a, b}`.
pub fn generate_id(source: &mut dyn RandomSource) -> String {
    let mut bytes = [0u8; 16];
    source.fill(&mut bytes);
    Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Resolves the user identifier, creating and persisting it when absent.
pub struct IdentityProvider {
    store: Arc<dyn KeyValueStore>,
    random: Mutex<Box<dyn RandomSource>>,
    /// Identifier used while the store is failing.
    ephemeral: Mutex<Option<String>>,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_random(store, Box::new(OsRandom))
    }

    pub fn with_random(store: Arc<dyn KeyValueStore>, random: Box<dyn RandomSource>) -> Self {
        Self {
            store,
            random: Mutex::new(random),
            ephemeral: Mutex::new(None),
        }
    }

    /// Stored identifier, or a freshly generated and persisted one.
    ///
    /// Never fails: storage errors degrade to a process-lifetime identifier.
    pub fn get_user_id(&self) -> String {
        match self.store.get(USER_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => {
                warn!("User id storage unreadable, using in-memory id: {}", e);
                return self.ephemeral_id();
            }
        }

        // Reuse an id already handed out while a write was failing.
        let id = self
            .ephemeral
            .lock()
            .clone()
            .unwrap_or_else(|| self.generate());

        match self.store.set(USER_ID_KEY, &id) {
            Ok(()) => {
                debug!("Persisted new user id");
                *self.ephemeral.lock() = None;
            }
            Err(e) => {
                warn!("User id storage unwritable, using in-memory id: {}", e);
                *self.ephemeral.lock() = Some(id.clone());
            }
        }
        id
    }

    fn ephemeral_id(&self) -> String {
        let mut ephemeral = self.ephemeral.lock();
        if let Some(id) = ephemeral.as_ref() {
            return id.clone();
        }
        let id = self.generate();
        *ephemeral = Some(id.clone());
        id
    }

    fn generate(&self) -> String {
        generate_id(self.random.lock().as_mut())
    }
}
