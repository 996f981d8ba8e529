//! Event hub
//!
//! Fans every published [`Event`] out to all live [`Subscriber`]s. A single
//! control task owns the subscriber set; callers talk to it through bounded
//! queues held by the cloneable [`EventHub`] handle.
//!
//! A subscriber that cannot keep up is disconnected rather than allowed to
//! slow down delivery to the others.

mod config;
mod control;
mod event;
pub mod stream;
mod subscriber;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use metrics::counter;
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub use config::HubConfig;
pub use event::{CONNECTED_TOPIC, DEFAULT_TOPIC, Event, PING_TOPIC};
pub use subscriber::{CloseReason, Delivery, Subscriber, SubscriberId};

use control::ControlLoop;
use subscriber::Slot;

const SOURCE: &str = "hub";

const METRIC_PUBLISH_DROPPED: &str = "rfid_hub_publish_dropped_total";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    #[error("event hub is shut down")]
    Closed,
}

/// Handle to a running hub. Clones share the same control task.
///
/// Dropping the last handle stops the hub the same way [`shutdown`](Self::shutdown) does.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Inner>,
}

struct Inner {
    config: HubConfig,
    register_tx: mpsc::Sender<Slot>,
    unregister_tx: mpsc::Sender<SubscriberId>,
    publish_tx: mpsc::Sender<Event>,
    shutdown_tx: watch::Sender<bool>,
    live_count: Arc<AtomicUsize>,
}

impl EventHub {
    /// Start the control task on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (register_tx, register_rx) = mpsc::channel(config.register_capacity.max(1));
        let (unregister_tx, unregister_rx) = mpsc::channel(config.unregister_capacity.max(1));
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let live_count = Arc::new(AtomicUsize::new(0));

        let control = ControlLoop {
            live: HashMap::new(),
            register_rx,
            unregister_rx,
            publish_rx,
            shutdown_rx,
            housekeeping_interval: config.housekeeping_interval,
            live_count: Arc::clone(&live_count),
        };
        let handle = tokio::spawn(control.run());

        let hub = Self {
            inner: Arc::new(Inner {
                config,
                register_tx,
                unregister_tx,
                publish_tx,
                shutdown_tx,
                live_count,
            }),
        };
        (hub, handle)
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Open a new subscriber connection.
    ///
    /// Waits while the registration queue is full. The subscriber sees every
    /// event published after this call returns.
    pub async fn subscribe(&self) -> Result<Subscriber, HubError> {
        if self.is_shut_down() {
            return Err(HubError::Closed);
        }

        let (slot, subscriber) = subscriber::channel(
            self.inner.config.subscriber_capacity,
            self.inner.unregister_tx.clone(),
        );
        let id = subscriber.id();

        self.inner
            .register_tx
            .send(slot)
            .await
            .map_err(|_| HubError::Closed)?;

        debug!(target_module = SOURCE, subscriber = %id, "registration queued");
        Ok(subscriber)
    }

    /// Stop delivering to `id`. Unknown or already removed ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.inner.unregister_tx.send(id).await.is_err() {
            debug!(
                target_module = SOURCE,
                subscriber = %id,
                "unsubscribe after hub shutdown ignored"
            );
        }
    }

    /// Queue `payload` under `topic` for every live subscriber.
    ///
    /// Never waits: when the publish queue is full the event is dropped and
    /// logged.
    pub fn publish(&self, topic: impl AsRef<str>, payload: impl Into<Arc<str>>) {
        self.publish_event(Event::new(topic, payload));
    }

    pub fn publish_event(&self, event: Event) {
        match self.inner.publish_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                counter!(METRIC_PUBLISH_DROPPED).increment(1);
                warn!(
                    target_module = SOURCE,
                    topic = event.topic(),
                    capacity = self.inner.config.publish_capacity,
                    "publish queue full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    target_module = SOURCE,
                    topic = event.topic(),
                    "publish after hub shutdown ignored"
                );
            }
        }
    }

    /// Close every subscriber and stop the control task.
    pub fn shutdown(&self) {
        let already = self.inner.shutdown_tx.send_replace(true);
        if !already {
            info!(target_module = SOURCE, "event hub shutdown requested");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Live subscriber count as of the last control-loop step.
    ///
    /// A subscriber dropped while the unregister queue is full stays counted
    /// until the next publish finds its queue closed and removes it.
    pub fn subscriber_count(&self) -> usize {
        self.inner.live_count.load(Ordering::Acquire)
    }
}
