//! Everything a consumer needs to talk to the backend, built once at startup.

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::stores::{LedPreviewStore, LedStatusStore};
use crate::transport::{select_transport, HostTransport};
use crate::ws::{ConnectionState, EventClient};

/// Shared handles to the backend: one event connection and one request
/// client, both configured from the same [`ClientConfig`].
///
/// Pass `&AppContext` to whatever needs backend access.
#[derive(Clone)]
pub struct AppContext {
    config: ClientConfig,
    events: EventClient,
    api: ApiClient,
}

impl AppContext {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_host(config, None)
    }

    /// Like [`new`](Self::new), routing requests through `host` when given.
    pub fn with_host(config: ClientConfig, host: Option<HostTransport>) -> Self {
        let events = EventClient::new(&config);
        let api = ApiClient::with_transport(select_transport(&config, host), config.request_timeout);
        Self {
            config,
            events,
            api,
        }
    }

    /// Open the event connection. Safe to call repeatedly.
    pub fn initialize(&self) -> ConnectionState {
        self.events.initialize()
    }

    pub fn shutdown(&self) {
        self.events.close();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &EventClient {
        &self.events
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn led_status_store(&self) -> LedStatusStore {
        LedStatusStore::new(&self.events, &self.config.frequency)
    }

    pub fn led_preview_store(&self) -> LedPreviewStore {
        LedPreviewStore::new(&self.events, &self.config.preview, &self.config.frequency)
    }
}
