//! View state derived from backend events.
//!
//! Each store registers its own listeners on the [`crate::EventClient`] and
//! publishes through `tokio::sync::watch`, which is what a UI re-renders
//! from. Dropping a store releases its listeners (and, if it was the last
//! consumer, the server-side subscription).

mod led_preview;
mod led_status;

pub use led_preview::{LedPreviewFrame, LedPreviewStore};
pub use led_status::LedStatusStore;
