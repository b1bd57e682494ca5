//! Capability set of the streaming RPC client the adapter is built on

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::connectors::connection_errors::TransportResult;
use crate::event::{Event, GetEventRequest, GetEventsRequest};

/// Client side of the event service.
///
/// Implementations own transport and serialization. A generated gRPC client
/// wraps its response streams in an [`EventReader`] and its request streams
/// in an [`EventWriter`].
#[async_trait]
pub trait RpcClient: Send + Sync + 'static {
    /// Unary read of a single event
    async fn read_event(&self, request: GetEventRequest) -> TransportResult<Event>;

    /// Unary push of a single event
    async fn push_event(&self, event: Event) -> TransportResult<()>;

    /// Open a server-streaming call. Cancelling `cancel` cancels the call.
    async fn read_events(
        &self,
        request: GetEventsRequest,
        cancel: CancellationToken,
    ) -> TransportResult<Box<dyn EventReader>>;

    /// Open a client-streaming call
    async fn push_events(&self) -> TransportResult<Box<dyn EventWriter>>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Pull side of a server-streaming call
#[async_trait]
pub trait EventReader: Send {
    /// Next message, or `None` once the server has finished
    async fn message(&mut self) -> TransportResult<Option<Event>>;
}

/// Push side of a client-streaming call. Writes must not overlap.
#[async_trait]
pub trait EventWriter: Send {
    async fn write(&mut self, event: Event) -> TransportResult<()>;

    /// Half-close the request stream and wait for the call result
    async fn complete(&mut self) -> TransportResult<()>;
}
