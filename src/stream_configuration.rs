//! Configuration types for the stream adapter and the in-memory event service

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`EventClient`](crate::connectors::EventClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Capacity of the channel between the server-stream pump and its consumer
    pub buffer_size: usize,
    /// Deadline for unary calls in milliseconds
    pub request_timeout_ms: Option<u64>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            buffer_size: 16,
            request_timeout_ms: None,
        }
    }
}

impl AdapterConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Channel capacity, never zero
    pub fn channel_capacity(&self) -> usize {
        self.buffer_size.max(1)
    }
}

/// Configuration for [`InMemoryEventService`](crate::connectors::InMemoryEventService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interval between streamed events when the request carries no delay
    pub default_stream_delay_ms: u64,
    /// Lower bound of the simulated unary latency
    pub unary_delay_min_ms: u64,
    /// Upper bound of the simulated unary latency
    pub unary_delay_max_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_stream_delay_ms: 500,
            unary_delay_min_ms: 1,
            unary_delay_max_ms: 200,
        }
    }
}

impl ServiceConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Fixed unary latency, handy for deterministic tests
    pub fn with_unary_delay(mut self, delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.unary_delay_min_ms = ms;
        self.unary_delay_max_ms = ms;
        self
    }

    pub fn with_default_stream_delay(mut self, delay: Duration) -> Self {
        self.default_stream_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn default_stream_delay(&self) -> Duration {
        Duration::from_millis(self.default_stream_delay_ms)
    }
}
