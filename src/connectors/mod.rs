//! RPC connectors: the client capability set, the stream adapter built on
//! it, and an in-memory service implementing it

pub mod connection_errors;
pub mod rpc_client;
pub mod stream_adapter;

pub mod in_memory_service;

// Re-export main types
pub use connection_errors::{TransportError, TransportResult};
pub use rpc_client::{EventReader, EventWriter, RpcClient};
pub use stream_adapter::EventClient;

pub use in_memory_service::InMemoryEventService;
