//! Per-user tracking client

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::event::{merge_properties, now_millis, EventRecord, Properties};

/// Emits events on behalf of one user
///
/// Persistent properties are fixed at construction and attached to every
/// event. The session start is the only mutable state; `0` means no session.
pub struct TrackingClient {
    user_id: String,
    persistent_properties: Option<Properties>,
    session_start: AtomicI64,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for TrackingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingClient")
            .field("user_id", &self.user_id)
            .field("persistent_properties", &self.persistent_properties)
            .field("session_id", &self.session_id())
            .finish()
    }
}

impl TrackingClient {
    /// Create a client for `user_id`
    ///
    /// Fails with [`Error::Config`] when `credential` has no non-empty key.
    pub fn new(
        user_id: impl Into<String>,
        persistent_properties: Option<Properties>,
        credential: &Credential,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        if !credential.is_initialized() {
            return Err(Error::credential_not_initialized());
        }

        Ok(Self {
            user_id: user_id.into(),
            persistent_properties,
            session_start: AtomicI64::new(0),
            dispatcher,
        })
    }

    /// Start (or restart) a session at `start_time` epoch millis, defaulting to now
    pub fn start_session(&self, start_time: Option<i64>) -> &Self {
        let start = start_time.unwrap_or_else(now_millis);
        self.session_start.store(start, Ordering::Relaxed);
        self
    }

    /// Track an event without waiting for delivery
    ///
    /// Explicit `properties` override persistent properties with the same key.
    pub fn track(&self, event_type: &str, properties: Option<Properties>) {
        let merged = merge_properties(properties.as_ref(), self.persistent_properties.as_ref());
        let record = EventRecord::new(
            self.user_id.clone(),
            event_type,
            merged,
            self.session_start.load(Ordering::Relaxed),
        );

        self.dispatcher.send_event(record);
    }

    /// User this client tracks
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Properties attached to every event
    pub fn persistent_properties(&self) -> Option<&Properties> {
        self.persistent_properties.as_ref()
    }

    /// Active session start, if a session was started with a positive time
    pub fn session_id(&self) -> Option<i64> {
        let start = self.session_start.load(Ordering::Relaxed);
        (start > 0).then_some(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&self, _url: &str, _form_body: String) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher(credential: &Credential) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(credential.clone(), Arc::new(NullTransport)))
    }

    #[test]
    fn test_new_requires_credential() {
        let credential = Credential::new();
        let err = TrackingClient::new("alice", None, &credential, dispatcher(&credential))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "credential not initialized"));
    }

    #[test]
    fn test_new_rejects_empty_credential() {
        let credential = Credential::with_key("");
        assert!(TrackingClient::new("alice", None, &credential, dispatcher(&credential)).is_err());
    }

    #[test]
    fn test_session_defaults_to_none() {
        let credential = Credential::with_key("K");
        let client =
            TrackingClient::new("alice", None, &credential, dispatcher(&credential)).unwrap();
        assert_eq!(client.session_id(), None);
    }

    #[test]
    fn test_start_session_chains_and_overwrites() {
        let credential = Credential::with_key("K");
        let client =
            TrackingClient::new("alice", None, &credential, dispatcher(&credential)).unwrap();

        let same = client.start_session(Some(1000));
        assert!(std::ptr::eq(same, &client));
        assert_eq!(client.session_id(), Some(1000));

        client.start_session(Some(2000));
        assert_eq!(client.session_id(), Some(2000));
    }

    #[test]
    fn test_start_session_defaults_to_now() {
        let credential = Credential::with_key("K");
        let client =
            TrackingClient::new("alice", None, &credential, dispatcher(&credential)).unwrap();

        let before = now_millis();
        client.start_session(None);
        assert!(client.session_id().unwrap() >= before);
    }

    #[test]
    fn test_zero_session_start_means_no_session() {
        let credential = Credential::with_key("K");
        let client =
            TrackingClient::new("alice", None, &credential, dispatcher(&credential)).unwrap();

        client.start_session(Some(0));
        assert_eq!(client.session_id(), None);
    }
}
