//! Latest LED pipeline status, plus how often the backend reports it.

use std::sync::Arc;

use ambient_shared::{event_types, ApiError, LedStatus, ServerEvent};
use tokio::sync::watch;

use crate::api_client::ApiClient;
use crate::config::FrequencyConfig;
use crate::led::FrequencyMonitor;
use crate::ws::{EventClient, ListenerHandle};

pub struct LedStatusStore {
    status: Arc<watch::Sender<Option<LedStatus>>>,
    frequency: FrequencyMonitor,
    _listener: ListenerHandle,
}

impl LedStatusStore {
    pub fn new(events: &EventClient, frequency: &FrequencyConfig) -> Self {
        let (status, _) = watch::channel(None);
        let status = Arc::new(status);
        let frequency = FrequencyMonitor::new(frequency);

        let sink = status.clone();
        let monitor = frequency.clone();
        let listener = events.on(event_types::LED_STATUS_CHANGED, move |event| {
            if let ServerEvent::LedStatusChanged(update) = event {
                monitor.record();
                sink.send_replace(Some(update.clone()));
            }
        });

        Self {
            status,
            frequency,
            _listener: listener,
        }
    }

    /// Fill the store from `GET /led/status` so it has a value before the
    /// first event arrives.
    pub async fn seed(&self, api: &ApiClient) -> Result<(), ApiError> {
        let status = api.led_status().await?;
        tracing::debug!(mode = %status.data_send_mode, "seeded LED status");
        self.status.send_replace(Some(status));
        Ok(())
    }

    pub fn current(&self) -> Option<LedStatus> {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<LedStatus>> {
        self.status.subscribe()
    }

    /// Rate of `LedStatusChanged` events in Hz.
    pub fn update_frequency(&self) -> f64 {
        self.frequency.frequency()
    }

    pub fn watch_update_frequency(&self) -> watch::Receiver<f64> {
        self.frequency.watch()
    }
}
