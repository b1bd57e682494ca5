//! Counters collected by the stream adapter

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared between an `EventClient` and its pump tasks
#[derive(Debug)]
pub struct AdapterStats {
    unary_calls: AtomicU64,
    streams_opened: AtomicU64,
    events_received: AtomicU64,
    events_sent: AtomicU64,
    errors: AtomicU64,
    start_time: Instant,
}

impl Default for AdapterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStats {
    pub fn new() -> Self {
        Self {
            unary_calls: AtomicU64::new(0),
            streams_opened: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_unary_call(&self) {
        self.unary_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            unary_calls: self.unary_calls.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed(),
        }
    }
}

/// Point-in-time copy of [`AdapterStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub unary_calls: u64,
    pub streams_opened: u64,
    pub events_received: u64,
    pub events_sent: u64,
    pub errors: u64,
    pub uptime: Duration,
}

impl StatsSnapshot {
    pub fn received_per_sec(&self) -> f64 {
        if self.uptime.as_secs_f64() > 0.0 {
            self.events_received as f64 / self.uptime.as_secs_f64()
        } else {
            0.0
        }
    }
}
