//! Published events and their event-stream wire framing.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Topic used when a publisher supplies an empty one.
pub const DEFAULT_TOPIC: &str = "message";
/// Topic of the greeting frame sent when a stream opens.
pub const CONNECTED_TOPIC: &str = "connected";
/// Topic of the keep-alive frame.
pub const PING_TOPIC: &str = "ping";

/// An immutable `(topic, payload)` pair.
///
/// Both halves are reference counted so fan-out clones stay cheap no matter
/// how many subscribers are connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    topic: Arc<str>,
    payload: Arc<str>,
}

impl Event {
    /// Build an event, normalising the topic.
    ///
    /// Line breaks are stripped from the topic and an empty result falls back
    /// to [`DEFAULT_TOPIC`]. The payload is kept verbatim.
    pub fn new(topic: impl AsRef<str>, payload: impl Into<Arc<str>>) -> Self {
        Self {
            topic: normalize_topic(topic.as_ref()),
            payload: payload.into(),
        }
    }

    /// Greeting sent once at the start of every stream.
    pub fn connected(at: OffsetDateTime) -> Self {
        let payload = json!({ "time": rfc3339(at), "status": "connected" });
        Self::new(CONNECTED_TOPIC, payload.to_string())
    }

    /// Keep-alive sent on every heartbeat tick.
    pub fn ping(at: OffsetDateTime) -> Self {
        let payload = json!({ "time": rfc3339(at) });
        Self::new(PING_TOPIC, payload.to_string())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Render the event as one event-stream frame.
    ///
    /// ```text
    /// event: <topic>
    /// data: <payload>
    ///
    /// ```
    ///
    /// A payload spanning several lines is written as one `data:` line per
    /// payload line so the client reassembles it unchanged.
    pub fn to_frame(&self) -> String {
        let mut frame = String::with_capacity(self.topic.len() + self.payload.len() + 16);
        frame.push_str("event: ");
        frame.push_str(&self.topic);
        frame.push('\n');

        let payload = self.payload.replace("\r\n", "\n");
        for line in payload.split(['\n', '\r']) {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }

        frame.push('\n');
        frame
    }

    pub fn to_frame_bytes(&self) -> Bytes {
        Bytes::from(self.to_frame())
    }
}

fn normalize_topic(raw: &str) -> Arc<str> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    if cleaned.is_empty() {
        Arc::from(DEFAULT_TOPIC)
    } else {
        Arc::from(cleaned)
    }
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn frames_single_line_payload() {
        let event = Event::new("studentcallback", "<div>…rfid=123…</div>");
        assert_eq!(
            event.to_frame(),
            "event: studentcallback\ndata: <div>…rfid=123…</div>\n\n"
        );
    }

    #[test]
    fn empty_topic_becomes_message() {
        let event = Event::new("", "hello");
        assert_eq!(event.topic(), DEFAULT_TOPIC);
        assert_eq!(event.to_frame(), "event: message\ndata: hello\n\n");
    }

    #[test]
    fn line_breaks_are_stripped_from_topic() {
        let event = Event::new("bad\r\ntopic", "x");
        assert_eq!(event.topic(), "badtopic");

        let only_breaks = Event::new("\n\r", "x");
        assert_eq!(only_breaks.topic(), DEFAULT_TOPIC);
    }

    #[test]
    fn multi_line_payload_gets_one_data_line_each() {
        let event = Event::new("log", "first\nsecond\r\nthird");
        assert_eq!(
            event.to_frame(),
            "event: log\ndata: first\ndata: second\ndata: third\n\n"
        );
    }

    #[test]
    fn empty_payload_still_writes_data_line() {
        let event = Event::new("tick", "");
        assert_eq!(event.to_frame(), "event: tick\ndata: \n\n");
    }

    #[test]
    fn connected_and_ping_payloads_carry_time() {
        let at = datetime!(2024-03-01 08:30:00 UTC);

        let connected = Event::connected(at);
        assert_eq!(connected.topic(), CONNECTED_TOPIC);
        let body: serde_json::Value =
            serde_json::from_str(connected.payload()).expect("json payload");
        assert_eq!(body["status"], "connected");
        assert_eq!(body["time"], "2024-03-01T08:30:00Z");

        let ping = Event::ping(at);
        assert_eq!(ping.to_frame(), "event: ping\ndata: {\"time\":\"2024-03-01T08:30:00Z\"}\n\n");
    }
}
