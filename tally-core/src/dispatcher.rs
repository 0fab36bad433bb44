//! Fire-and-forget event dispatch
//!
//! `Dispatcher::send_event` serializes a record, form-encodes it with the
//! current API key and queues it for a dedicated worker thread. The worker
//! runs a current-thread tokio runtime and spawns every delivery as its own
//! task, so deliveries are independent and unordered.
//!
//! Nothing here reports back to the caller. Failures are logged with
//! `tracing` and counted in [`DispatchStats`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::EVENTS_ENDPOINT;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::event::EventRecord;
use crate::transport::{encode_form, Transport};

/// Dispatch statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events handed to `send_event`
    pub submitted: usize,
    /// Events the transport accepted
    pub delivered: usize,
    /// Events the transport rejected or errored on
    pub failed: usize,
    /// Events that never reached the transport
    pub dropped: usize,
}

impl DispatchStats {
    /// Events submitted but not yet resolved either way
    pub fn in_flight(&self) -> usize {
        self.submitted.saturating_sub(self.delivered + self.failed + self.dropped)
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    delivered: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

/// A serialized event waiting for the worker
struct Delivery {
    user_id: String,
    event_type: String,
    insert_id: String,
    form_body: String,
}

enum Command {
    Deliver(Delivery),
    Shutdown,
}

/// Background sender shared by every tracking client of a registry
pub struct Dispatcher {
    credential: Credential,
    sender: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Start a dispatcher that delivers through `transport`
    ///
    /// The API key is read from `credential` each time an event is sent.
    pub fn new(credential: Credential, transport: Arc<dyn Transport>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let worker = std::thread::Builder::new()
            .name("tally-dispatch".to_string())
            .spawn(move || run_worker(receiver, transport, worker_counters));

        // Without a worker the receiver is gone and every send is dropped and logged.
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start dispatch worker");
                None
            }
        };

        Self {
            credential,
            sender,
            worker: Mutex::new(worker),
            counters,
        }
    }

    /// Queue one event for delivery
    ///
    /// Never blocks on the network and never fails; problems end up in the log.
    pub fn send_event(&self, record: EventRecord) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.submit(&record) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                user_id = %record.user_id,
                event_type = %record.event_type,
                insert_id = %record.insert_id,
                error = %e,
                "Dropped analytics event"
            );
        }
    }

    fn submit(&self, record: &EventRecord) -> Result<()> {
        let event = serde_json::to_string(record)?;
        let api_key = self.credential.current().unwrap_or_default();
        let form_body = encode_form(&[("api_key", &api_key), ("event", &event)]);

        let delivery = Delivery {
            user_id: record.user_id.clone(),
            event_type: record.event_type.clone(),
            insert_id: record.insert_id.clone(),
            form_body,
        };

        self.sender
            .send(Command::Deliver(delivery))
            .map_err(|_| Error::Dispatch("dispatcher is shut down".to_string()))
    }

    /// Snapshot of dispatch statistics
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting events and wait for in-flight deliveries to finish
    ///
    /// Safe to call more than once. Events sent afterwards are dropped.
    pub fn shutdown(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(handle) = handle {
            let _ = self.sender.send(Command::Shutdown);
            if handle.join().is_err() {
                tracing::error!("Dispatch worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    /// Asks the worker to stop without waiting for it
    ///
    /// In-flight deliveries finish on the detached worker thread; only
    /// [`Dispatcher::shutdown`] blocks until they are done.
    fn drop(&mut self) {
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if handle.is_some() {
            let _ = self.sender.send(Command::Shutdown);
        }
    }
}

fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    transport: Arc<dyn Transport>,
    counters: Arc<Counters>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create dispatch runtime");
            return;
        }
    };

    runtime.block_on(async move {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                command = receiver.recv() => match command {
                    Some(Command::Deliver(delivery)) => {
                        in_flight.spawn(deliver(
                            Arc::clone(&transport),
                            delivery,
                            Arc::clone(&counters),
                        ));
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    record_join(joined, &counters);
                }
            }
        }

        // Anything queued behind the shutdown request is dropped.
        receiver.close();
        while let Ok(command) = receiver.try_recv() {
            if let Command::Deliver(delivery) = command {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    user_id = %delivery.user_id,
                    event_type = %delivery.event_type,
                    insert_id = %delivery.insert_id,
                    "Dropped analytics event queued after shutdown"
                );
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            record_join(joined, &counters);
        }
    });
}

async fn deliver(transport: Arc<dyn Transport>, delivery: Delivery, counters: Arc<Counters>) {
    match transport.send(EVENTS_ENDPOINT, delivery.form_body).await {
        Ok(()) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                user_id = %delivery.user_id,
                event_type = %delivery.event_type,
                insert_id = %delivery.insert_id,
                "Delivered analytics event"
            );
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                user_id = %delivery.user_id,
                event_type = %delivery.event_type,
                insert_id = %delivery.insert_id,
                error = %e,
                "Failed to deliver analytics event"
            );
        }
    }
}

fn record_join(joined: std::result::Result<(), tokio::task::JoinError>, counters: &Counters) {
    if let Err(e) = joined {
        counters.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(error = %e, "Delivery task did not complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Properties;
    use async_trait::async_trait;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    struct ChannelTransport {
        seen: Mutex<std_mpsc::Sender<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send(&self, url: &str, form_body: String) -> Result<()> {
            let _ = self
                .seen
                .lock()
                .unwrap()
                .send((url.to_string(), form_body));
            if self.fail {
                Err(Error::Dispatch("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn dispatcher(fail: bool) -> (Dispatcher, std_mpsc::Receiver<(String, String)>) {
        let (tx, rx) = std_mpsc::channel();
        let transport = ChannelTransport {
            seen: Mutex::new(tx),
            fail,
        };
        let dispatcher = Dispatcher::new(Credential::with_key("K"), Arc::new(transport));
        (dispatcher, rx)
    }

    fn record() -> EventRecord {
        EventRecord::new("alice", "login", Properties::new(), 0)
    }

    #[test]
    fn test_send_event_posts_form_to_endpoint() {
        let (dispatcher, rx) = dispatcher(false);
        dispatcher.send_event(record());

        let (url, body) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(url, EVENTS_ENDPOINT);
        assert!(body.starts_with("api_key=K&event="));

        dispatcher.shutdown();
        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.in_flight(), 0);
    }

    #[test]
    fn test_transport_failure_is_counted_not_raised() {
        let (dispatcher, rx) = dispatcher(true);
        dispatcher.send_event(record());

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        dispatcher.shutdown();

        let stats = dispatcher.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_send_after_shutdown_is_dropped() {
        let (dispatcher, rx) = dispatcher(false);
        dispatcher.shutdown();
        dispatcher.send_event(record());

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(dispatcher.stats().dropped, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (dispatcher, _rx) = dispatcher(false);
        dispatcher.shutdown();
        dispatcher.shutdown();
    }

    struct SlowTransport {
        delay: Duration,
        done: Mutex<std_mpsc::Sender<()>>,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(&self, _url: &str, _form_body: String) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            let _ = self.done.lock().unwrap().send(());
            Ok(())
        }
    }

    #[test]
    fn test_drop_does_not_wait_for_in_flight_delivery() {
        let (tx, rx) = std_mpsc::channel();
        let transport = SlowTransport {
            delay: Duration::from_millis(800),
            done: Mutex::new(tx),
        };
        let dispatcher = Dispatcher::new(Credential::with_key("K"), Arc::new(transport));
        dispatcher.send_event(record());

        let started = std::time::Instant::now();
        drop(dispatcher);
        assert!(started.elapsed() < Duration::from_millis(400));

        // The detached worker still completes the delivery.
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_uses_current_credential() {
        let (tx, rx) = std_mpsc::channel();
        let credential = Credential::with_key("old");
        let transport = ChannelTransport {
            seen: Mutex::new(tx),
            fail: false,
        };
        let dispatcher = Dispatcher::new(credential.clone(), Arc::new(transport));

        credential.initialize("new");
        dispatcher.send_event(record());

        let (_, body) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(body.starts_with("api_key=new&"));
    }
}
