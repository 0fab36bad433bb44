//! Per-user client registry
//!
//! Lookups go through a `DashMap` entry, so get-or-create is atomic: the
//! first caller for an unseen user id builds the client while holding the
//! shard lock, and everyone else gets that same `Arc`.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::client::TrackingClient;
use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::event::Properties;

/// Thread-safe map from user id to tracking client
pub struct Registry {
    credential: Credential,
    dispatcher: Arc<Dispatcher>,
    clients: DashMap<String, Arc<TrackingClient>>,
}

impl Registry {
    /// Create an empty registry whose clients send through `dispatcher`
    pub fn new(credential: Credential, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            credential,
            dispatcher,
            clients: DashMap::new(),
        }
    }

    /// Get the client for `user_id`, creating it on first use
    ///
    /// `persistent_properties` only apply when this call creates the client.
    pub fn instance_for(
        &self,
        user_id: &str,
        persistent_properties: Option<Properties>,
    ) -> Result<Arc<TrackingClient>> {
        if let Some(existing) = self.clients.get(user_id) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.clients.entry(user_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let client = TrackingClient::new(
                    user_id,
                    persistent_properties,
                    &self.credential,
                    Arc::clone(&self.dispatcher),
                )?;
                tracing::debug!(user_id = %user_id, "Created tracking client");
                Ok(Arc::clone(entry.insert(Arc::new(client)).value()))
            }
        }
    }

    /// Remove the client for `user_id`; a no-op when absent
    ///
    /// Deliveries already queued by that client still complete.
    pub fn dispose_for(&self, user_id: &str) {
        if self.clients.remove(user_id).is_some() {
            tracing::debug!(user_id = %user_id, "Disposed tracking client");
        }
    }

    /// Check whether a client exists for `user_id`
    pub fn contains(&self, user_id: &str) -> bool {
        self.clients.contains_key(user_id)
    }

    /// Number of live clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no clients are registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
