//! Stream adapter: unary, server-streaming and client-streaming RPC calls
//! exposed as cancellable event streams.
//!
//! Server streams are converted from pull to push by a pump task. The pump
//! checks the call's cancellation token before the first pull and between
//! every two pulls. A pull already in flight is never interrupted: its event
//! is delivered, then the pump stops. Cancellation never produces a terminal
//! notification.

use async_stream::stream;
use futures_core::Stream;
use futures_util::pin_mut;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::connectors::connection_errors::{TransportError, TransportResult};
use crate::connectors::rpc_client::RpcClient;
use crate::error::{StreamError, StreamResult};
use crate::event::{Event, GetEventRequest, GetEventsRequest};
use crate::observer::{ChannelObserver, Observer, Subscription};
use crate::rx::EventStream;
use crate::stream_configuration::AdapterConfig;
use crate::stream_performance_metrics::{AdapterStats, StatsSnapshot};

/// Event-stream facade over an [`RpcClient`]
pub struct EventClient<C> {
    client: Arc<C>,
    config: AdapterConfig,
    stats: Arc<AdapterStats>,
}

impl<C> Clone for EventClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<C> EventClient<C>
where
    C: RpcClient,
{
    pub fn new(client: C) -> Self {
        Self::with_config(client, AdapterConfig::default())
    }

    pub fn with_config(client: C, config: AdapterConfig) -> Self {
        Self::from_arc(Arc::new(client), config)
    }

    pub fn from_arc(client: Arc<C>, config: AdapterConfig) -> Self {
        Self {
            client,
            config,
            stats: Arc::new(AdapterStats::new()),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// One unary read. Transport failures propagate immediately.
    pub async fn call_once(&self, id: i32) -> StreamResult<Event> {
        log::trace!("start reading event {}", id);
        self.stats.record_unary_call();

        let event = self
            .with_deadline(self.client.read_event(GetEventRequest { id }))
            .await
            .map_err(|err| self.transport_failure("read_event", err))?;

        log::trace!("return event {}", event.id());
        Ok(event)
    }

    /// One unary push
    pub async fn push_event(&self, event: Event) -> StreamResult<()> {
        let id = event.id();
        self.stats.record_unary_call();

        self.with_deadline(self.client.push_event(event))
            .await
            .map_err(|err| self.transport_failure("push_event", err))?;

        self.stats.record_sent();
        log::trace!("pushed event {} on unary call", id);
        Ok(())
    }

    /// Open a server-streaming call as a cold event stream.
    ///
    /// Nothing happens until the stream is first polled. Dropping the stream
    /// cancels the call; the pump finishes any pull in flight and stops.
    /// `max_count` of `None` or zero means unbounded.
    pub fn open_server_stream(
        &self,
        max_count: Option<u32>,
        delay_hint: Option<Duration>,
    ) -> EventStream<Event> {
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        let capacity = self.config.channel_capacity();
        let request = GetEventsRequest::new(max_count, delay_hint);

        stream! {
            let token = CancellationToken::new();
            let _release = token.clone().drop_guard();
            let (tx, rx) = mpsc::channel(capacity);

            tokio::spawn(pump_server_stream(
                client,
                request,
                ChannelObserver::new(tx),
                token,
                stats,
            ));

            let mut events = ReceiverStream::new(rx);
            while let Some(item) = events.next().await {
                yield item;
            }
        }
        .boxed()
    }

    /// Open a server-streaming call and push its events into `observer`.
    ///
    /// The returned subscription's token is the call's cancellation token.
    pub fn subscribe_server_stream<O>(
        &self,
        max_count: Option<u32>,
        delay_hint: Option<Duration>,
        observer: O,
    ) -> Subscription
    where
        O: Observer<Event>,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(pump_server_stream(
            Arc::clone(&self.client),
            GetEventsRequest::new(max_count, delay_hint),
            observer,
            token.clone(),
            Arc::clone(&self.stats),
        ));
        Subscription::new(token, handle)
    }

    /// Read a server-streaming call by plain async iteration, without a
    /// pump task. Dropping the stream cancels the call.
    pub fn pull_server_stream(
        &self,
        max_count: Option<u32>,
        delay_hint: Option<Duration>,
    ) -> EventStream<Event> {
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        let request = GetEventsRequest::new(max_count, delay_hint);

        stream! {
            let token = CancellationToken::new();
            let _release = token.clone().drop_guard();
            stats.record_stream_opened();
            log::trace!("start reading async events from {}", client.name());

            match client.read_events(request, token).await {
                Err(err) => {
                    stats.record_error();
                    yield Err(StreamError::from(err));
                }
                Ok(mut reader) => {
                    let max_count = request.max_count();
                    let mut emitted: u32 = 0;
                    while max_count.map_or(true, |max| emitted < max) {
                        match reader.message().await {
                            Ok(Some(event)) => {
                                stats.record_received();
                                emitted += 1;
                                yield Ok(event);
                            }
                            Ok(None) => break,
                            Err(err) => {
                                stats.record_error();
                                yield Err(StreamError::from(err));
                                break;
                            }
                        }
                    }
                }
            }
        }
        .boxed()
    }

    /// Forward every event of `source` over one client-streaming call, then
    /// complete the call.
    ///
    /// Writes are issued one at a time in source order. A failed write or a
    /// failed source ends the call without completing it and no further
    /// writes are attempted.
    pub async fn push_events<S>(&self, source: S) -> StreamResult<()>
    where
        S: Stream<Item = StreamResult<Event>> + Send,
    {
        pin_mut!(source);
        self.stats.record_stream_opened();

        let mut writer = self
            .client
            .push_events()
            .await
            .map_err(|err| self.transport_failure("push_events", err))?;

        let mut written: usize = 0;
        while let Some(item) = source.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    log::warn!("source failed after {} writes: {}", written, err);
                    return Err(err);
                }
            };
            let id = event.id();
            writer
                .write(event)
                .await
                .map_err(|err| self.transport_failure("write", err))?;
            self.stats.record_sent();
            written += 1;
            log::trace!("wrote event {} on client stream", id);
        }

        writer
            .complete()
            .await
            .map_err(|err| self.transport_failure("complete", err))?;
        log::debug!("client stream completed after {} events", written);
        Ok(())
    }

    async fn with_deadline<F, O>(&self, call: F) -> TransportResult<O>
    where
        F: Future<Output = TransportResult<O>>,
    {
        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, call).await?,
            None => call.await,
        }
    }

    fn transport_failure(&self, operation: &str, err: TransportError) -> StreamError {
        self.stats.record_error();
        log::error!("{} on {} failed: {}", operation, self.client.name(), err);
        StreamError::from(err)
    }
}

/// Pull from a server-streaming call and push into `observer` until the
/// transport ends, `max_count` is reached, a read fails or `token` is
/// cancelled.
async fn pump_server_stream<C, O>(
    client: Arc<C>,
    request: GetEventsRequest,
    mut observer: O,
    token: CancellationToken,
    stats: Arc<AdapterStats>,
) where
    C: RpcClient,
    O: Observer<Event>,
{
    if token.is_cancelled() {
        return;
    }
    log::trace!("start reading event stream from {}", client.name());
    stats.record_stream_opened();

    let mut reader = match client.read_events(request, token.clone()).await {
        Ok(reader) => reader,
        Err(err) => {
            stats.record_error();
            log::error!("opening event stream on {} failed: {}", client.name(), err);
            if !token.is_cancelled() {
                observer.on_error(err.into()).await;
            }
            return;
        }
    };

    let max_count = request.max_count();
    let mut emitted: u32 = 0;

    loop {
        // Checkpoint between pulls
        if token.is_cancelled() {
            log::debug!("event stream cancelled after {} events", emitted);
            return;
        }

        match reader.message().await {
            Ok(Some(event)) => {
                stats.record_received();
                let id = event.id();
                observer.on_next(event).await;
                emitted += 1;
                log::trace!("pushed event {} in stream", id);

                if max_count.map_or(false, |max| emitted >= max) {
                    log::debug!("event stream reached its limit of {} events", emitted);
                    observer.on_completed().await;
                    return;
                }
            }
            // A cancelled call may end or fail its last pull; neither is reported
            Ok(None) if token.is_cancelled() => return,
            Err(_) if token.is_cancelled() => return,
            Ok(None) => {
                log::debug!("event stream ended after {} events", emitted);
                observer.on_completed().await;
                return;
            }
            Err(err) => {
                stats.record_error();
                log::error!("reading event stream failed after {} events: {}", emitted, err);
                observer.on_error(err.into()).await;
                return;
            }
        }
    }
}
