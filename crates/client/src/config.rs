//! Client configuration, read from environment variables.

use std::time::Duration;

use url::Url;

pub const DEFAULT_HTTP_BASE_URL: &str = "http://127.0.0.1:3030";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3030/ws";

/// Reconnect policy for the event connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Attempts made before the connection is declared dead.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

/// LED preview sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Upper bound on LEDs shown; the preview buffer is cut to `3 * max_leds` bytes.
    pub max_leds: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { max_leds: 1000 }
    }
}

/// Tuning for update-rate estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyConfig {
    /// Arrival timestamps kept in the sliding window.
    pub window_size: usize,
    /// Windows shorter than this report 0 Hz.
    pub min_window_ms: f64,
    /// EMA weight of each new window sample.
    pub smoothing: f64,
    /// Quiet period after which the estimate drops to 0 Hz.
    pub idle_timeout_ms: u64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            min_window_ms: 200.0,
            smoothing: 0.3,
            idle_timeout_ms: 2000,
        }
    }
}

impl FrequencyConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub http_base_url: String,
    pub ws_url: String,
    /// Applied to requests that do not pass their own timeout.
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub preview: PreviewConfig,
    pub frequency: FrequencyConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_base_url: DEFAULT_HTTP_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            preview: PreviewConfig::default(),
            frequency: FrequencyConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build a config pointing at one backend host, e.g. `127.0.0.1:3030`.
    pub fn for_host(host: &str) -> Self {
        Self {
            http_base_url: format!("http://{host}"),
            ws_url: format!("ws://{host}/ws"),
            ..Self::default()
        }
    }

    /// Read configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AMBIENT_HTTP_URL`: backend HTTP base URL (default: `http://127.0.0.1:3030`)
    /// - `AMBIENT_WS_URL`: backend WebSocket URL (default: `ws://127.0.0.1:3030/ws`)
    /// - `AMBIENT_REQUEST_TIMEOUT_MS`: default request timeout (default: 10000)
    /// - `AMBIENT_RECONNECT_BASE_MS`: first reconnect delay (default: 1000)
    /// - `AMBIENT_RECONNECT_MAX_ATTEMPTS`: reconnect attempts before giving up (default: 5)
    /// - `AMBIENT_MAX_LEDS`: LED preview cap (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let http_base_url = url_var(&lookup, "AMBIENT_HTTP_URL", &["http", "https"])
            .unwrap_or(defaults.http_base_url);
        let ws_url = url_var(&lookup, "AMBIENT_WS_URL", &["ws", "wss"]).unwrap_or(defaults.ws_url);

        let request_timeout = parse_var::<u64>(&lookup, "AMBIENT_REQUEST_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        let reconnect = ReconnectConfig {
            base_delay_ms: parse_var(&lookup, "AMBIENT_RECONNECT_BASE_MS")
                .unwrap_or(defaults.reconnect.base_delay_ms),
            max_attempts: parse_var(&lookup, "AMBIENT_RECONNECT_MAX_ATTEMPTS")
                .unwrap_or(defaults.reconnect.max_attempts),
        };

        let preview = PreviewConfig {
            max_leds: parse_var(&lookup, "AMBIENT_MAX_LEDS").unwrap_or(defaults.preview.max_leds),
        };

        Self {
            http_base_url,
            ws_url,
            request_timeout,
            reconnect,
            preview,
            frequency: defaults.frequency,
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting, using default");
            None
        }
    }
}

fn url_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    schemes: &[&str],
) -> Option<String> {
    let raw = lookup(key)?;
    match Url::parse(raw.trim()) {
        Ok(url) if schemes.contains(&url.scheme()) => Some(raw.trim().trim_end_matches('/').to_string()),
        Ok(url) => {
            tracing::warn!(key, scheme = url.scheme(), "unsupported URL scheme, using default");
            None
        }
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid URL, using default");
            None
        }
    }
}
