//! Subscriber connections and the hub-side slot that feeds them.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::event::Event;

const SOURCE: &str = "hub::subscriber";

/// Identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why the hub stopped delivering to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// An unregistration was processed.
    Unsubscribed,
    /// The subscriber queue was full when an event arrived.
    Overflow,
    /// The receiving side was already gone.
    Disconnected,
    /// The hub shut down.
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Unsubscribed => "unsubscribed",
            CloseReason::Overflow => "overflow",
            CloseReason::Disconnected => "disconnected",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// What a subscriber observed next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(Event),
    Closed(CloseReason),
}

/// Hub-owned sending half of a subscriber.
///
/// Dropping a slot closes the subscriber queue; [`Slot::close`] additionally
/// tells the subscriber why.
pub(crate) struct Slot {
    id: SubscriberId,
    events: mpsc::Sender<Event>,
    closer: Option<oneshot::Sender<CloseReason>>,
}

impl Slot {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue `event` without waiting.
    pub(crate) fn offer(&self, event: Event) -> Result<(), CloseReason> {
        self.events.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => CloseReason::Overflow,
            mpsc::error::TrySendError::Closed(_) => CloseReason::Disconnected,
        })
    }

    pub(crate) fn close(mut self, reason: CloseReason) {
        if let Some(closer) = self.closer.take() {
            let _ = closer.send(reason);
        }
    }
}

/// A live connection handed out by [`EventHub::subscribe`](super::EventHub::subscribe).
///
/// Events arrive in publish order. Dropping the handle asks the hub to
/// unregister it; if that request cannot be queued the next fan-out notices
/// the closed queue and removes it instead.
pub struct Subscriber {
    id: SubscriberId,
    events: mpsc::Receiver<Event>,
    closed: oneshot::Receiver<CloseReason>,
    close_reason: Option<CloseReason>,
    unregister: mpsc::Sender<SubscriberId>,
}

pub(crate) fn channel(
    capacity: usize,
    unregister: mpsc::Sender<SubscriberId>,
) -> (Slot, Subscriber) {
    let id = SubscriberId::new();
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (closed_tx, closed_rx) = oneshot::channel();

    let slot = Slot {
        id,
        events: events_tx,
        closer: Some(closed_tx),
    };
    let subscriber = Subscriber {
        id,
        events: events_rx,
        closed: closed_rx,
        close_reason: None,
        unregister,
    };
    (slot, subscriber)
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued event, or `None` once the hub has closed the queue and
    /// everything buffered before that has been read.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Next queued event if one is ready.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Resolves once the hub has stopped delivering to this subscriber.
    pub async fn closed(&mut self) -> CloseReason {
        if let Some(reason) = self.close_reason {
            return reason;
        }
        let reason = (&mut self.closed).await.unwrap_or(CloseReason::Shutdown);
        self.close_reason = Some(reason);
        reason
    }

    /// Wait for whichever comes first: the next event or the close signal.
    ///
    /// A close signal wins over events still buffered in the queue.
    pub async fn next(&mut self) -> Delivery {
        if let Some(reason) = self.close_reason {
            return Delivery::Closed(reason);
        }

        tokio::select! {
            biased;
            reason = &mut self.closed => {
                let reason = reason.unwrap_or(CloseReason::Shutdown);
                self.close_reason = Some(reason);
                Delivery::Closed(reason)
            }
            event = self.events.recv() => match event {
                Some(event) => Delivery::Event(event),
                None => {
                    let reason = self.closed.try_recv().unwrap_or(CloseReason::Shutdown);
                    self.close_reason = Some(reason);
                    Delivery::Closed(reason)
                }
            },
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if self.close_reason.is_some() || self.closed.try_recv().is_ok() {
            return;
        }

        match self.unregister.try_send(self.id) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    target_module = SOURCE,
                    subscriber = %self.id,
                    "unregister queue full, removal deferred to fan-out"
                );
            }
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("close_reason", &self.close_reason)
            .finish()
    }
}
