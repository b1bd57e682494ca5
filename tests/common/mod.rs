#![allow(dead_code)]

use async_trait::async_trait;
use rx_rpc_stream::connectors::{EventReader, EventWriter, RpcClient, TransportResult};
use rx_rpc_stream::{Event, GetEventRequest, GetEventsRequest, Observer, StreamError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification<T> {
    Next(T),
    Error(StreamError),
    Completed,
}

/// Observer that records every notification it receives
#[derive(Clone)]
pub struct RecordingObserver<T> {
    log: Arc<Mutex<Vec<Notification<T>>>>,
}

impl<T: Clone> RecordingObserver<T> {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn notifications(&self) -> Vec<Notification<T>> {
        self.log.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Next(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| !matches!(n, Notification::Next(_)))
            .count()
    }

    /// Poll until at least `count` values arrived or `limit` elapsed
    pub async fn wait_for_values(&self, count: usize, limit: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < limit {
            if self.values().len() >= count {
                return true;
            }
            sleep(Duration::from_millis(2)).await;
        }
        false
    }
}

#[async_trait]
impl<T> Observer<T> for RecordingObserver<T>
where
    T: Clone + Send + 'static,
{
    async fn on_next(&mut self, item: T) {
        self.log.lock().unwrap().push(Notification::Next(item));
    }

    async fn on_error(&mut self, error: StreamError) {
        self.log.lock().unwrap().push(Notification::Error(error));
    }

    async fn on_completed(&mut self) {
        self.log.lock().unwrap().push(Notification::Completed);
    }
}

/// Client whose server streams never end (ignoring the requested limit and
/// the call token) and whose writes are slow and checked for overlap.
#[derive(Clone, Default)]
pub struct EndlessClient {
    pub pull_delay: Duration,
    pub pulls: Arc<AtomicUsize>,
    pub write_delay: Duration,
    pub writing: Arc<AtomicBool>,
    pub overlapping_writes: Arc<AtomicUsize>,
    pub written: Arc<Mutex<Vec<i32>>>,
    pub completed: Arc<AtomicBool>,
}

#[async_trait]
impl RpcClient for EndlessClient {
    async fn read_event(&self, request: GetEventRequest) -> TransportResult<Event> {
        Ok(Event::from_id(request.id))
    }

    async fn push_event(&self, _event: Event) -> TransportResult<()> {
        Ok(())
    }

    async fn read_events(
        &self,
        _request: GetEventsRequest,
        _cancel: CancellationToken,
    ) -> TransportResult<Box<dyn EventReader>> {
        Ok(Box::new(EndlessReader {
            next: 0,
            delay: self.pull_delay,
            pulls: Arc::clone(&self.pulls),
        }))
    }

    async fn push_events(&self) -> TransportResult<Box<dyn EventWriter>> {
        Ok(Box::new(SlowWriter {
            client: self.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "endless"
    }
}

struct EndlessReader {
    next: i32,
    delay: Duration,
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl EventReader for EndlessReader {
    async fn message(&mut self) -> TransportResult<Option<Event>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(self.delay).await;
        }
        self.next += 1;
        Ok(Some(Event::from_id(self.next)))
    }
}

struct SlowWriter {
    client: EndlessClient,
}

#[async_trait]
impl EventWriter for SlowWriter {
    async fn write(&mut self, event: Event) -> TransportResult<()> {
        if self.client.writing.swap(true, Ordering::SeqCst) {
            self.client.overlapping_writes.fetch_add(1, Ordering::SeqCst);
        }
        sleep(self.client.write_delay).await;
        self.client.written.lock().unwrap().push(event.id());
        self.client.writing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn complete(&mut self) -> TransportResult<()> {
        self.client.completed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
