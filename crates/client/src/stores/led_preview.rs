//! Live preview of the colors the backend is sending to the strips.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ambient_shared::{event_types, ServerEvent, SortedColorsFragment, BYTES_PER_LED};
use tokio::sync::watch;

use crate::config::{FrequencyConfig, PreviewConfig};
use crate::led::{ColorReassembler, FrequencyMonitor};
use crate::ws::{EventClient, ListenerHandle};

/// One rendered preview: RGB bytes in strip order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedPreviewFrame {
    pub colors: Vec<u8>,
    pub led_count: usize,
    /// Smoothed rate of incoming fragments when this frame was built.
    pub frequency_hz: f64,
}

struct PreviewInner {
    max_leds: usize,
    reassembler: Mutex<ColorReassembler>,
    monitor: FrequencyMonitor,
    frame: watch::Sender<LedPreviewFrame>,
    enabled: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PreviewInner {
    fn on_fragment(&self, fragment: &SortedColorsFragment) {
        if !*self.enabled.borrow() {
            return;
        }

        let colors = {
            let mut reassembler = lock(&self.reassembler);
            reassembler.ingest(fragment.offset, fragment.sorted_colors.clone());
            reassembler.truncated(self.max_leds).to_vec()
        };
        let frequency_hz = self.monitor.record();

        self.frame.send_replace(LedPreviewFrame {
            led_count: colors.len() / BYTES_PER_LED,
            colors,
            frequency_hz,
        });
    }

    fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.send_replace(enabled);
        if was == enabled {
            return;
        }
        tracing::debug!(enabled, "LED preview toggled");
        if !enabled {
            lock(&self.reassembler).clear();
            self.monitor.reset();
            self.frame.send_replace(LedPreviewFrame::default());
        }
    }
}

/// Reassembles `LedSortedColorsChanged` fragments into preview frames.
///
/// Frames are published while preview is enabled (the default); a
/// `LedPreviewStateChanged` with `enabled: false` stops them and clears the
/// buffer.
pub struct LedPreviewStore {
    inner: Arc<PreviewInner>,
    _listeners: [ListenerHandle; 2],
}

impl LedPreviewStore {
    pub fn new(events: &EventClient, preview: &PreviewConfig, frequency: &FrequencyConfig) -> Self {
        let (frame, _) = watch::channel(LedPreviewFrame::default());
        let (enabled, _) = watch::channel(true);
        let inner = Arc::new(PreviewInner {
            max_leds: preview.max_leds,
            reassembler: Mutex::new(ColorReassembler::new()),
            monitor: FrequencyMonitor::new(frequency),
            frame,
            enabled,
        });

        let on_colors = inner.clone();
        let colors = events.on(event_types::LED_SORTED_COLORS_CHANGED, move |event| {
            if let ServerEvent::LedSortedColorsChanged(fragment) = event {
                on_colors.on_fragment(fragment);
            }
        });

        let on_state = inner.clone();
        let state = events.on(event_types::LED_PREVIEW_STATE_CHANGED, move |event| {
            if let ServerEvent::LedPreviewStateChanged(state) = event {
                on_state.set_enabled(state.enabled);
            }
        });

        Self {
            inner,
            _listeners: [colors, state],
        }
    }

    pub fn frame(&self) -> LedPreviewFrame {
        self.inner.frame.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<LedPreviewFrame> {
        self.inner.frame.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        *self.inner.enabled.borrow()
    }

    /// Fragment rate in Hz; drops to 0 once fragments stop arriving.
    pub fn frequency(&self) -> f64 {
        self.inner.monitor.frequency()
    }

    pub fn watch_frequency(&self) -> watch::Receiver<f64> {
        self.inner.monitor.watch()
    }
}
