//! Event payloads and request messages exchanged with the event service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single event: an identifier and an opaque string payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    id: i32,
    value: String,
}

impl Event {
    pub fn new(id: i32, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// Build the event the service generates for `id`
    pub fn from_id(id: i32) -> Self {
        Self::new(id, format!("value {}", id))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event {{ id: {}, value: {:?} }}", self.id, self.value)
    }
}

/// Unary read request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventRequest {
    pub id: i32,
}

/// Server-streaming read request. Zero means "not set" for both fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventsRequest {
    pub max_nb_events: u32,
    pub delay_ms: u32,
}

impl GetEventsRequest {
    pub fn new(max_count: Option<u32>, delay_hint: Option<Duration>) -> Self {
        Self {
            max_nb_events: max_count.unwrap_or(0),
            delay_ms: delay_hint
                .map(|d| u32::try_from(d.as_millis()).unwrap_or(u32::MAX))
                .unwrap_or(0),
        }
    }

    /// `None` when the stream is unbounded
    pub fn max_count(&self) -> Option<u32> {
        (self.max_nb_events > 0).then_some(self.max_nb_events)
    }

    pub fn delay_hint(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(u64::from(self.delay_ms)))
    }
}
