//! Request/response client for the backend's HTTP API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ambient_shared::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::ClientConfig;
use crate::transport::{select_transport, Method, Transport, TransportRequest};

const API_PREFIX: &str = "/api/v1";

/// Cancels every request it was passed to.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
    pub abort: Option<AbortSignal>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn with_abort(abort: AbortSignal) -> Self {
        Self {
            abort: Some(abort),
            ..Self::default()
        }
    }
}

/// HTTP client for the backend API.
///
/// Every response is an [`ApiResponse`] envelope. Calls return its `data`,
/// or an [`ApiError`] separating transport failures, non-2xx statuses and
/// envelopes flagged `success: false`.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(select_transport(config, None), config.request_timeout)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let abort = options.abort;
        if abort.as_ref().is_some_and(AbortSignal::is_aborted) {
            return Err(ApiError::Aborted);
        }

        let request = TransportRequest {
            method,
            path: path.to_string(),
            body,
        };
        tracing::debug!(%method, path, transport = self.transport.name(), "request");

        let aborted = async {
            match &abort {
                Some(signal) => signal.aborted().await,
                None => std::future::pending().await,
            }
        };

        let response = tokio::select! {
            result = tokio::time::timeout(timeout, self.transport.execute(request)) => match result {
                Ok(response) => response?,
                Err(_) => {
                    tracing::debug!(%method, path, timeout_ms = timeout.as_millis() as u64, "request timed out");
                    return Err(ApiError::Timeout(timeout));
                }
            },
            _ = aborted => {
                tracing::debug!(%method, path, "request aborted");
                return Err(ApiError::Aborted);
            }
        };

        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialize(e.to_string()))?;
        envelope.into_result()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::Get, path, None, options).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::Post, path, Some(to_body(body)?), options)
            .await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::Put, path, Some(to_body(body)?), options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::Delete, path, None, options).await
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path, RequestOptions::default())
            .await?
            .ok_or_else(|| ApiError::Deserialize(format!("{path}: response has no data")))
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.post::<B, Value>(path, body, RequestOptions::default())
            .await
            .map(drop)
    }

    async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.put::<B, Value>(path, body, RequestOptions::default())
            .await
            .map(drop)
    }

    // --- LED ---

    pub async fn data_send_mode(&self) -> Result<DataSendMode, ApiError> {
        self.fetch(&api("/led/mode")).await
    }

    pub async fn set_data_send_mode(&self, mode: DataSendMode) -> Result<(), ApiError> {
        self.put_unit(&api("/led/mode"), &SetDataSendModeRequest { mode })
            .await
    }

    pub async fn led_status(&self) -> Result<LedStatus, ApiError> {
        self.fetch(&api("/led/status")).await
    }

    pub async fn send_colors(&self, offset: u16, buffer: Vec<u8>) -> Result<(), ApiError> {
        self.post_unit(&api("/led/colors"), &SendColorsRequest { offset, buffer })
            .await
    }

    pub async fn send_test_colors(
        &self,
        board_address: impl Into<String>,
        offset: u16,
        buffer: Vec<u8>,
    ) -> Result<(), ApiError> {
        let body = SendTestColorsRequest {
            board_address: board_address.into(),
            offset,
            buffer,
        };
        self.post_unit(&api("/led/test-colors"), &body).await
    }

    // --- LED strip configuration ---

    pub async fn led_strip_configs(&self) -> Result<LedStripConfigGroup, ApiError> {
        self.fetch(&api("/config/led-strips")).await
    }

    pub async fn update_led_strip_configs(
        &self,
        configs: &LedStripConfigGroup,
    ) -> Result<(), ApiError> {
        self.post_unit(&api("/config/led-strips"), configs).await
    }

    pub async fn update_led_strip_length(
        &self,
        display_id: u32,
        border: Border,
        delta_len: i8,
    ) -> Result<(), ApiError> {
        let body = UpdateLedStripLenRequest {
            display_id,
            border,
            delta_len,
        };
        self.put_unit(&api("/config/led-strips/length"), &body).await
    }

    pub async fn move_led_strip(
        &self,
        display_id: u32,
        border: Border,
        target_start: usize,
    ) -> Result<(), ApiError> {
        let body = MoveLedStripRequest {
            display_id,
            border,
            target_start,
        };
        self.put_unit(&api("/config/led-strips/move"), &body).await
    }

    pub async fn reverse_led_strip(&self, display_id: u32, border: Border) -> Result<(), ApiError> {
        let body = ReverseLedStripRequest { display_id, border };
        self.put_unit(&api("/config/led-strips/reverse"), &body).await
    }

    pub async fn update_led_strip_type(
        &self,
        display_id: u32,
        border: Border,
        led_type: LedType,
    ) -> Result<(), ApiError> {
        let body = UpdateLedStripTypeRequest {
            display_id,
            border,
            led_type,
        };
        self.put_unit(&api("/config/led-strips/type"), &body).await
    }

    pub async fn set_color_calibration(
        &self,
        calibration: &ColorCalibration,
    ) -> Result<(), ApiError> {
        self.put_unit(&api("/config/color-calibration"), calibration)
            .await
    }

    // --- Preferences ---

    pub async fn user_preferences(&self) -> Result<UserPreferences, ApiError> {
        self.fetch(&api("/config/user-preferences")).await
    }

    pub async fn update_user_preferences(
        &self,
        preferences: &UserPreferences,
    ) -> Result<(), ApiError> {
        self.put_unit(&api("/config/user-preferences"), preferences)
            .await
    }

    pub async fn update_theme(&self, theme: impl Into<String>) -> Result<(), ApiError> {
        let body = UpdateThemeRequest {
            theme: theme.into(),
        };
        self.put_unit(&api("/config/theme"), &body).await
    }

    // --- Displays and devices ---

    pub async fn displays(&self) -> Result<Vec<DisplayState>, ApiError> {
        self.fetch(&api("/display")).await
    }

    pub async fn boards(&self) -> Result<Vec<BoardInfo>, ApiError> {
        self.fetch(&api("/device/boards")).await
    }

    // --- App info ---

    pub async fn app_version(&self) -> Result<AppVersionInfo, ApiError> {
        self.fetch(&api("/info/version")).await
    }

    pub async fn report_current_page(&self, page_info: impl Into<String>) -> Result<(), ApiError> {
        let body = ReportPageRequest {
            page_info: page_info.into(),
        };
        self.post_unit(&api("/info/current-page"), &body).await
    }

    pub async fn navigate(&self, page: impl Into<String>) -> Result<(), ApiError> {
        let body = NavigateRequest { page: page.into() };
        self.post_unit(&api("/info/navigate"), &body).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.fetch("/health").await
    }
}

fn api(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Deserialize(e.to_string()))
}
