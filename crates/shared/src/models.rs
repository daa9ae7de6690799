//! Data models exchanged with the ambient light backend.

use std::net::Ipv4Addr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes used by one RGB LED in color buffers.
pub const BYTES_PER_LED: usize = 3;

/// What the backend is currently streaming to the LED boards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSendMode {
    #[default]
    None,
    AmbientLight,
    StripConfig,
    TestEffect,
}

impl std::fmt::Display for DataSendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataSendMode::None => "None",
            DataSendMode::AmbientLight => "AmbientLight",
            DataSendMode::StripConfig => "StripConfig",
            DataSendMode::TestEffect => "TestEffect",
        };
        f.write_str(name)
    }
}

/// Packet counters reported alongside [`LedStatus`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedSendStats {
    pub total_packets_sent: u64,
    pub total_bytes_sent: u64,
    pub last_send_time: Option<DateTime<Utc>>,
    pub send_errors: u64,
}

/// Snapshot of the backend's LED pipeline, published as `LedStatusChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedStatus {
    pub data_send_mode: DataSendMode,
    #[serde(default)]
    pub single_display_config_mode: bool,
    /// `(display_id, border)` of the strip currently breathing, if any.
    #[serde(default)]
    pub active_breathing_strip: Option<(u32, String)>,
    #[serde(default)]
    pub current_colors_bytes: usize,
    #[serde(default)]
    pub sorted_colors_bytes: usize,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub send_stats: LedSendStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Border {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedType {
    #[default]
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBW")]
    Rgbw,
}

impl LedType {
    pub fn bytes_per_led(self) -> usize {
        match self {
            LedType::Rgb => 3,
            LedType::Rgbw => 4,
        }
    }
}

/// One LED strip mounted along a display border.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedStripConfig {
    pub index: usize,
    pub border: Border,
    pub display_id: u32,
    pub start_pos: usize,
    pub len: usize,
    #[serde(default)]
    pub led_type: LedType,
}

/// Per-channel gain applied by the backend before colors reach the strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorCalibration {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "default_white_gain")]
    pub w: f32,
}

fn default_white_gain() -> f32 {
    1.0
}

impl Default for ColorCalibration {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePointMapper {
    pub start: usize,
    pub end: usize,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedStripConfigGroup {
    pub strips: Vec<LedStripConfig>,
    #[serde(default)]
    pub mappers: Vec<SamplePointMapper>,
    #[serde(default)]
    pub color_calibration: ColorCalibration,
}

impl LedStripConfigGroup {
    /// Total number of LEDs across all strips.
    pub fn total_leds(&self) -> usize {
        self.strips.iter().map(|s| s.len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPreferences {
    pub width: f64,
    pub height: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub maximized: bool,
    pub minimized_to_tray: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPreferences {
    pub view_scale: f64,
    pub theme: String,
    pub night_mode_theme_enabled: bool,
    pub night_mode_theme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub window: WindowPreferences,
    pub ui: UiPreferences,
}

/// Brightness/contrast state of one physical display (DDC/CI).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub brightness: u16,
    pub max_brightness: u16,
    pub min_brightness: u16,
    pub contrast: u16,
    pub max_contrast: u16,
    pub min_contrast: u16,
    pub mode: u16,
    pub max_mode: u16,
    pub min_mode: u16,
    pub last_modified_at: SystemTime,
    pub last_fetched_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardConnectStatus {
    Connected,
    Connecting(u8),
    Disconnected,
    Unknown,
}

/// An LED controller board discovered on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub fullname: String,
    pub host: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub connect_status: BoardConnectStatus,
    pub checked_at: Option<SystemTime>,
    pub ttl: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersionInfo {
    pub version: String,
    pub is_dev: bool,
    pub build_time: Option<String>,
    pub git_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: u64,
}

// --- Request bodies ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDataSendModeRequest {
    pub mode: DataSendMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendColorsRequest {
    pub offset: u16,
    pub buffer: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTestColorsRequest {
    pub board_address: String,
    pub offset: u16,
    pub buffer: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLedStripLenRequest {
    pub display_id: u32,
    pub border: Border,
    pub delta_len: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLedStripRequest {
    pub display_id: u32,
    pub border: Border,
    pub target_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseLedStripRequest {
    pub display_id: u32,
    pub border: Border,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLedStripTypeRequest {
    pub display_id: u32,
    pub border: Border,
    pub led_type: LedType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateThemeRequest {
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPageRequest {
    pub page_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub page: String,
}
