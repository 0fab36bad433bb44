//! Credential, dispatcher and registry wired together
//!
//! Applications normally use one `Tracker` per process, either built
//! explicitly or through the crate-level [`crate::initialize`] /
//! [`crate::instance_for`] / [`crate::dispose_for`] functions.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::client::TrackingClient;
use crate::config::TrackerConfig;
use crate::credential::Credential;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::Result;
use crate::event::Properties;
use crate::registry::Registry;
use crate::transport::{HttpTransport, Transport};

/// One credential scope with its dispatcher and client registry
pub struct Tracker {
    credential: Credential,
    dispatcher: Arc<Dispatcher>,
    registry: Registry,
}

impl Tracker {
    /// Create a tracker delivering through `transport`, with no credential set yet
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let credential = Credential::new();
        let dispatcher = Arc::new(Dispatcher::new(credential.clone(), transport));
        let registry = Registry::new(credential.clone(), Arc::clone(&dispatcher));

        Self {
            credential,
            dispatcher,
            registry,
        }
    }

    /// Create an HTTP tracker from configuration
    ///
    /// The credential is initialized when the config (or `TALLY_API_KEY`) provides a key.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        let tracker = Self::new(Arc::new(transport));

        if let Some(api_key) = config.resolved_api_key() {
            tracker.initialize(api_key);
        }

        Ok(tracker)
    }

    /// Set the API key used by clients created afterwards and by every later send
    pub fn initialize(&self, api_key: impl Into<String>) {
        self.credential.initialize(api_key);
    }

    /// See [`Registry::instance_for`]
    pub fn instance_for(
        &self,
        user_id: &str,
        persistent_properties: Option<Properties>,
    ) -> Result<Arc<TrackingClient>> {
        self.registry.instance_for(user_id, persistent_properties)
    }

    /// See [`Registry::dispose_for`]
    pub fn dispose_for(&self, user_id: &str) {
        self.registry.dispose_for(user_id);
    }

    /// Clients created so far
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Credential shared by the registry and dispatcher
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Dispatch statistics for this tracker
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Wait for in-flight deliveries and stop the dispatch worker
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }
}

static GLOBAL: OnceLock<Tracker> = OnceLock::new();

/// The process-wide tracker, delivering over HTTP
pub fn global() -> &'static Tracker {
    GLOBAL.get_or_init(|| Tracker::new(Arc::new(HttpTransport::default())))
}

/// Set the process-wide API key. Call once at startup.
pub fn initialize(api_key: impl Into<String>) {
    global().initialize(api_key);
}

/// Get or create the process-wide client for `user_id`
pub fn instance_for(
    user_id: &str,
    persistent_properties: Option<Properties>,
) -> Result<Arc<TrackingClient>> {
    global().instance_for(user_id, persistent_properties)
}

/// Drop the process-wide client for `user_id`, if any
pub fn dispose_for(user_id: &str) {
    global().dispose_for(user_id);
}
