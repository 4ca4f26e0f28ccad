//! Tracker startup and teardown.

use std::sync::Arc;

use tracing::{info, warn};

use barebone_config::TrackerConfig;
use barebone_protocols::{HostDocument, KeyValueStore, TrackerError};

use crate::context::TrackerContext;
use crate::emitter::EventEmitter;
use crate::identity::IdentityProvider;
use crate::queue::EventQueue;
use crate::watcher::TreeWatcher;

/// Collaborators supplied by the embedding application.
pub struct TrackerServices {
    pub host: Arc<dyn HostDocument>,
    pub store: Arc<dyn KeyValueStore>,
    pub queue: EventQueue,
}

/// A running tracker.
///
/// Dropping it does not detach anything from the host; call
/// [`Tracker::teardown`].
pub struct Tracker {
    context: Arc<TrackerContext>,
    identity: Arc<IdentityProvider>,
    watcher: Arc<TreeWatcher>,
}

impl Tracker {
    /// Start tracking, or return `None` when the configuration disables it.
    ///
    /// Never fails: a missing client id or an invalid configuration is
    /// logged and leaves the host untouched.
    pub fn start(config: &TrackerConfig, services: TrackerServices) -> Option<Self> {
        match Self::try_start(config, services) {
            Ok(tracker) => Some(tracker),
            Err(TrackerError::ConfigurationMissing) => {
                warn!("Tracking disabled: client_id is missing");
                None
            }
            Err(e) => {
                warn!("Tracking disabled: {}", e);
                None
            }
        }
    }

    /// Start tracking, reporting why startup was refused.
    pub fn try_start(
        config: &TrackerConfig,
        services: TrackerServices,
    ) -> Result<Self, TrackerError> {
        let context = Arc::new(TrackerContext::from_config(config)?);
        let identity = Arc::new(IdentityProvider::new(services.store));
        let emitter = Arc::new(EventEmitter::new(
            context.clone(),
            identity.clone(),
            services.queue,
        ));

        let watcher = TreeWatcher::new(services.host, &context, emitter);
        let registered = watcher.start();
        info!(
            client_id = %context.client_id,
            environment = %context.environment,
            "Tracking started with {} element(s)",
            registered
        );

        Ok(Self {
            context,
            identity,
            watcher,
        })
    }

    /// Detach every listener and cancel every subscription. Idempotent.
    pub fn teardown(&self) {
        self.watcher.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.watcher.is_closed()
    }

    pub fn registered_count(&self) -> usize {
        self.watcher.registered_count()
    }

    pub fn context(&self) -> &TrackerContext {
        &self.context
    }

    pub fn user_id(&self) -> String {
        self.identity.get_user_id()
    }

    pub fn watcher(&self) -> &Arc<TreeWatcher> {
        &self.watcher
    }
}
