//! The single task that owns the live subscriber set.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use metrics::{counter, gauge};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::event::Event;
use super::subscriber::{CloseReason, Slot, SubscriberId};

const SOURCE: &str = "hub::control";

const METRIC_SUBSCRIBERS: &str = "rfid_hub_subscribers";
const METRIC_REMOVED: &str = "rfid_hub_subscriber_removed_total";
const METRIC_DELIVERED: &str = "rfid_hub_event_fanout_total";

pub(crate) struct ControlLoop {
    pub(crate) live: HashMap<SubscriberId, Slot>,
    pub(crate) register_rx: mpsc::Receiver<Slot>,
    pub(crate) unregister_rx: mpsc::Receiver<SubscriberId>,
    pub(crate) publish_rx: mpsc::Receiver<Event>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
    pub(crate) housekeeping_interval: Duration,
    pub(crate) live_count: Arc<AtomicUsize>,
}

impl ControlLoop {
    /// Process requests until shutdown.
    ///
    /// Branches are polled in declaration order, so anything already queued
    /// for registration or unregistration is applied before the next publish
    /// is fanned out.
    pub(crate) async fn run(mut self) {
        let period = self.housekeeping_interval.max(Duration::from_millis(1));
        let mut housekeeping = time::interval_at(Instant::now() + period, period);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(target_module = SOURCE, "event hub started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                Some(slot) = self.register_rx.recv() => self.on_register(slot),
                Some(id) = self.unregister_rx.recv() => self.on_unregister(id, CloseReason::Unsubscribed),
                Some(event) = self.publish_rx.recv() => self.on_publish(event),
                _ = housekeeping.tick() => self.on_housekeeping(),
            }
        }

        self.close_all();
    }

    fn on_register(&mut self, slot: Slot) {
        let id = slot.id();
        self.live.insert(id, slot);
        self.record_live_count();
        debug!(
            target_module = SOURCE,
            subscriber = %id,
            live = self.live.len(),
            "subscriber registered"
        );
    }

    fn on_unregister(&mut self, id: SubscriberId, reason: CloseReason) {
        let Some(slot) = self.live.remove(&id) else {
            debug!(
                target_module = SOURCE,
                subscriber = %id,
                "ignoring unregister for unknown subscriber"
            );
            return;
        };

        slot.close(reason);
        self.record_live_count();
        counter!(METRIC_REMOVED, "reason" => reason.as_str()).increment(1);

        if reason == CloseReason::Overflow {
            warn!(
                target_module = SOURCE,
                subscriber = %id,
                live = self.live.len(),
                "subscriber queue full, disconnecting slow subscriber"
            );
        } else {
            debug!(
                target_module = SOURCE,
                subscriber = %id,
                reason = reason.as_str(),
                live = self.live.len(),
                "subscriber removed"
            );
        }
    }

    fn on_publish(&mut self, event: Event) {
        let mut dropped = Vec::new();
        let mut delivered = 0_u64;

        for (id, slot) in &self.live {
            match slot.offer(event.clone()) {
                Ok(()) => delivered += 1,
                Err(reason) => dropped.push((*id, reason)),
            }
        }

        counter!(METRIC_DELIVERED).increment(delivered);

        for (id, reason) in dropped {
            self.on_unregister(id, reason);
        }
    }

    fn on_housekeeping(&self) {
        info!(
            target_module = SOURCE,
            live = self.live.len(),
            "event hub status"
        );
        self.record_live_count();
    }

    fn close_all(&mut self) {
        let live = self.live.len();
        for (_, slot) in self.live.drain() {
            slot.close(CloseReason::Shutdown);
        }

        self.register_rx.close();
        while let Ok(slot) = self.register_rx.try_recv() {
            slot.close(CloseReason::Shutdown);
        }
        self.publish_rx.close();
        self.unregister_rx.close();

        self.record_live_count();
        info!(
            target_module = SOURCE,
            closed = live,
            "event hub stopped"
        );
    }

    fn record_live_count(&self) {
        let live = self.live.len();
        self.live_count.store(live, Ordering::Release);
        gauge!(METRIC_SUBSCRIBERS).set(live as f64);
    }
}
