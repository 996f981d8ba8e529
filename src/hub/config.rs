//! Queue sizes and timers for the event hub.

use std::time::Duration;

const DEFAULT_REGISTER_CAPACITY: usize = 10;
const DEFAULT_UNREGISTER_CAPACITY: usize = 10;
const DEFAULT_PUBLISH_CAPACITY: usize = 100;
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 20;
const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending registrations before `subscribe` waits.
    pub register_capacity: usize,
    /// Pending unregistrations before `unsubscribe` waits.
    pub unregister_capacity: usize,
    /// Pending publishes before new events are dropped.
    pub publish_capacity: usize,
    /// Undelivered events a subscriber may hold before it is disconnected.
    pub subscriber_capacity: usize,
    /// How often the control loop reports the live subscriber count.
    pub housekeeping_interval: Duration,
    /// How often an idle stream emits a keep-alive frame.
    pub heartbeat_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            register_capacity: DEFAULT_REGISTER_CAPACITY,
            unregister_capacity: DEFAULT_UNREGISTER_CAPACITY,
            publish_capacity: DEFAULT_PUBLISH_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl From<&crate::config::HubSettings> for HubConfig {
    fn from(settings: &crate::config::HubSettings) -> Self {
        Self {
            register_capacity: settings.register_capacity.get(),
            unregister_capacity: settings.unregister_capacity.get(),
            publish_capacity: settings.publish_capacity.get(),
            subscriber_capacity: settings.subscriber_capacity.get(),
            housekeeping_interval: settings.housekeeping_interval,
            heartbeat_interval: settings.heartbeat_interval,
        }
    }
}
