//! Ambient light client
//!
//! Talks to the ambient light backend over HTTP (request/response) and a
//! WebSocket event stream, and turns the stream into view state: LED status
//! and a live, reassembled color preview.

pub mod api_client;
pub mod config;
pub mod context;
pub mod led;
pub mod logging;
pub mod stores;
pub mod transport;
pub mod ws;

pub use api_client::{AbortSignal, ApiClient, RequestOptions};
pub use config::ClientConfig;
pub use context::AppContext;
pub use stores::{LedPreviewFrame, LedPreviewStore, LedStatusStore};
pub use transport::{HostTransport, HttpTransport, Transport};
pub use ws::{ConnectionState, EventClient, ListenerHandle};
