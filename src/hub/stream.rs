//! Draining a subscriber into an event-stream body.

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::event::Event;
use super::subscriber::{Delivery, Subscriber};

const SOURCE: &str = "hub::stream";

/// Turn `subscriber` into a stream of wire frames.
///
/// The stream opens with a `connected` frame, then forwards every delivered
/// event and emits a `ping` frame after each `heartbeat` of the interval. It
/// ends when the hub closes the subscriber. Dropping the stream drops the
/// subscriber, which unregisters it.
pub fn live_frames(
    mut subscriber: Subscriber,
    heartbeat: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let period = heartbeat.max(Duration::from_millis(1));

    stream! {
        yield Ok(Event::connected(OffsetDateTime::now_utc()).to_frame_bytes());

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                delivery = subscriber.next() => match delivery {
                    Delivery::Event(event) => event.to_frame_bytes(),
                    Delivery::Closed(reason) => {
                        debug!(
                            target_module = SOURCE,
                            subscriber = %subscriber.id(),
                            reason = reason.as_str(),
                            "stream closed by hub"
                        );
                        break;
                    }
                },
                _ = ticker.tick() => Event::ping(OffsetDateTime::now_utc()).to_frame_bytes(),
            };
            yield Ok(frame);
        }
    }
}
