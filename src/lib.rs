pub mod error;
pub mod event;
pub mod observer;
pub mod reorder_buffer;
pub mod rx;
pub mod rx_stream_ext;

pub mod stream_configuration;
pub mod stream_performance_metrics;
pub mod connectors;

// Re-export all items from rx module at the crate root
pub use rx::*;
pub use error::{StreamError, StreamResult};
pub use event::{Event, GetEventRequest, GetEventsRequest};
pub use observer::{subscribe, ChannelObserver, Observer, Subscription};
pub use connectors::{EventClient, InMemoryEventService, RpcClient, TransportError};
