//! Shared API credential
//!
//! A `Credential` is a cheap handle onto one set-once-before-use API key.
//! The registry checks it when building clients; the dispatcher reads the
//! current value for every event it sends.

use std::sync::{Arc, RwLock};

/// Clonable handle to an API key shared by a registry and its dispatcher
#[derive(Debug, Clone, Default)]
pub struct Credential {
    inner: Arc<RwLock<Option<String>>>,
}

impl Credential {
    /// Create an empty credential
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a credential that is already initialized
    pub fn with_key(api_key: impl Into<String>) -> Self {
        let credential = Self::new();
        credential.initialize(api_key);
        credential
    }

    /// Set the API key. Later calls overwrite earlier ones.
    pub fn initialize(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        // A poisoned lock only means a writer panicked mid-assignment of an Option.
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(api_key);
    }

    /// Current API key, if one has been set
    pub fn current(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True when a non-empty API key has been set
    pub fn is_initialized(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}
