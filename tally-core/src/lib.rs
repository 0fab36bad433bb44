//! # tally-core
//!
//! Lightweight client for emitting behavioral analytics events
//! ("user X did event Y with properties Z") to a remote collection endpoint.
//!
//! This library provides:
//! - A registry of per-user tracking clients with atomic get-or-create
//! - Deterministic merging of per-event and persistent properties
//! - Session association via a session start timestamp
//! - Fire-and-forget delivery on a background worker that never fails the caller
//! - Configuration and logging infrastructure
//!
//! ## Error policy
//!
//! Building a client without a credential is the only error returned to
//! application code. Everything that goes wrong while sending an event is
//! logged through `tracing` and the event is dropped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//!
//! tally_core::initialize("api-key");
//!
//! let client = tally_core::instance_for("alice", json!({"plan": "pro"}).as_object().cloned())
//!     .expect("credential is set");
//! client.start_session(None);
//! client.track("login", json!({"method": "sso"}).as_object().cloned());
//! ```

// Re-export commonly used items at the crate root
pub use client::TrackingClient;
pub use config::{Config, TrackerConfig, EVENTS_ENDPOINT};
pub use credential::Credential;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{Error, Result};
pub use event::{EventRecord, Properties};
pub use registry::Registry;
pub use tracker::{dispose_for, global, initialize, instance_for, Tracker};
pub use transport::{HttpTransport, Transport};

// Public modules
pub mod client;
pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod logging;
pub mod registry;
pub mod tracker;
pub mod transport;
