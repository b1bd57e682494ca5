//! In-process event service implementing [`RpcClient`].
//!
//! Stands in for the remote event service: unary reads answer after a
//! simulated latency, server streams are fed by a generator task, and client
//! streams record what they receive. Failures can be injected per operation.

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::connectors::connection_errors::{TransportError, TransportResult};
use crate::connectors::rpc_client::{EventReader, EventWriter, RpcClient};
use crate::event::{Event, GetEventRequest, GetEventsRequest};
use crate::stream_configuration::ServiceConfig;

#[derive(Debug, Default)]
struct ServiceState {
    received: Mutex<Vec<Event>>,
    completed_pushes: AtomicUsize,
    streams_opened: AtomicUsize,
    active_streams: AtomicUsize,
    pulls: AtomicUsize,
    unavailable: AtomicBool,
}

/// In-memory event service. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryEventService {
    config: ServiceConfig,
    fail_reads_after: Option<u32>,
    fail_write_at: Option<usize>,
    state: Arc<ServiceState>,
}

impl Default for InMemoryEventService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl InMemoryEventService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            fail_reads_after: None,
            fail_write_at: None,
            state: Arc::new(ServiceState::default()),
        }
    }

    /// Server streams fail with a read error after `count` events
    pub fn failing_reads_after(mut self, count: u32) -> Self {
        self.fail_reads_after = Some(count);
        self
    }

    /// Client streams fail on the `nth` write (1-based)
    pub fn failing_write_at(mut self, nth: usize) -> Self {
        self.fail_write_at = Some(nth);
        self
    }

    /// Every call fails with `TransportError::Unavailable` while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::Release);
    }

    /// Events received through unary and client-streaming pushes, in order
    pub async fn received_events(&self) -> Vec<Event> {
        self.state.received.lock().await.clone()
    }

    /// Client streams that were completed by the caller
    pub fn completed_pushes(&self) -> usize {
        self.state.completed_pushes.load(Ordering::Acquire)
    }

    pub fn streams_opened(&self) -> usize {
        self.state.streams_opened.load(Ordering::Acquire)
    }

    /// Server-stream generators still running
    pub fn active_streams(&self) -> usize {
        self.state.active_streams.load(Ordering::Acquire)
    }

    /// Total `message()` calls made on server-stream readers
    pub fn pulls(&self) -> usize {
        self.state.pulls.load(Ordering::Acquire)
    }

    fn check_available(&self) -> TransportResult<()> {
        if self.state.unavailable.load(Ordering::Acquire) {
            Err(TransportError::Unavailable("in-memory event service is down".into()))
        } else {
            Ok(())
        }
    }

    fn unary_delay(&self) -> Duration {
        let (lo, hi) = (self.config.unary_delay_min_ms, self.config.unary_delay_max_ms);
        let ms = if lo >= hi {
            lo
        } else {
            rand::thread_rng().gen_range(lo..=hi)
        };
        Duration::from_millis(ms)
    }
}

#[async_trait]
impl RpcClient for InMemoryEventService {
    async fn read_event(&self, request: GetEventRequest) -> TransportResult<Event> {
        self.check_available()?;
        let delay = self.unary_delay();
        sleep(delay).await;
        let event = Event::from_id(request.id);
        log::info!("sent event {} on unary call", event.id());
        Ok(event)
    }

    async fn push_event(&self, event: Event) -> TransportResult<()> {
        self.check_available()?;
        log::info!("received event {} on unary call", event.id());
        self.state.received.lock().await.push(event);
        Ok(())
    }

    async fn read_events(
        &self,
        request: GetEventsRequest,
        cancel: CancellationToken,
    ) -> TransportResult<Box<dyn EventReader>> {
        self.check_available()?;

        let (tx, rx) = mpsc::channel(1);
        let delay = request
            .delay_hint()
            .unwrap_or_else(|| self.config.default_stream_delay());
        let max_count = request.max_count();
        let fail_after = self.fail_reads_after;
        let state = Arc::clone(&self.state);

        state.streams_opened.fetch_add(1, Ordering::AcqRel);
        state.active_streams.fetch_add(1, Ordering::AcqRel);

        tokio::spawn(async move {
            let mut nb: u32 = 0;
            loop {
                if max_count.map_or(false, |max| nb >= max) {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
                if fail_after.map_or(false, |limit| nb >= limit) {
                    let _ = tx
                        .send(Err(TransportError::ReadFailed(format!(
                            "stream broken after {} events",
                            nb
                        ))))
                        .await;
                    break;
                }

                nb += 1;
                let event = Event::from_id(i32::try_from(nb).unwrap_or(i32::MAX));
                log::info!("sent event {} on streaming call", event.id());
                let delivered = tokio::select! {
                    _ = cancel.cancelled() => false,
                    sent = tx.send(Ok(event)) => sent.is_ok(),
                };
                if !delivered {
                    break;
                }
            }
            state.active_streams.fetch_sub(1, Ordering::AcqRel);
        });

        Ok(Box::new(ChannelReader {
            rx,
            state: Arc::clone(&self.state),
        }))
    }

    async fn push_events(&self) -> TransportResult<Box<dyn EventWriter>> {
        self.check_available()?;
        Ok(Box::new(RecordingWriter {
            written: 0,
            fail_at: self.fail_write_at,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "in-memory-event-service"
    }
}

struct ChannelReader {
    rx: mpsc::Receiver<TransportResult<Event>>,
    state: Arc<ServiceState>,
}

#[async_trait]
impl EventReader for ChannelReader {
    async fn message(&mut self) -> TransportResult<Option<Event>> {
        self.state.pulls.fetch_add(1, Ordering::AcqRel);
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

struct RecordingWriter {
    written: usize,
    fail_at: Option<usize>,
    state: Arc<ServiceState>,
}

#[async_trait]
impl EventWriter for RecordingWriter {
    async fn write(&mut self, event: Event) -> TransportResult<()> {
        if self.fail_at == Some(self.written + 1) {
            return Err(TransportError::WriteFailed(format!(
                "rejected event {}",
                event.id()
            )));
        }
        self.written += 1;
        log::info!("received event {} on streaming call", event.id());
        self.state.received.lock().await.push(event);
        Ok(())
    }

    async fn complete(&mut self) -> TransportResult<()> {
        self.state.completed_pushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
