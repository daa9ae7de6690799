//! Real-time event stream from the backend.
//!
//! ```text
//!   EventClient ──owns──▶ connection loop (tokio task, one socket)
//!        │                      │ decoded ServerEvent
//!        │                      ▼
//!        ├── SubscriptionTracker   Dispatcher ──▶ listeners ("type" then "*")
//!        │   (pending/confirmed)       ▲
//!        └──────── on(type, f) ────────┘  returns ListenerHandle
//! ```
//!
//! Consumers register listeners with [`EventClient::on`]; the first listener
//! for a type subscribes to it on the server and the last handle dropped
//! unsubscribes. Subscriptions are replayed whenever the socket reopens.

mod connection;
mod dispatcher;
mod subscriptions;

pub use connection::{ConnectionState, EventClient};
pub use dispatcher::{Dispatcher, Listener, ListenerHandle};
pub use subscriptions::SubscriptionTracker;
