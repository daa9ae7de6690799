//! Update-rate estimation for event streams.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::config::FrequencyConfig;

/// Sliding window of arrival timestamps with an exponential moving average
/// carried across windows.
#[derive(Debug, Clone)]
pub struct FrequencyEstimator {
    window: VecDeque<f64>,
    window_size: usize,
    min_window_ms: f64,
    alpha: f64,
    /// `None` until the first valid window.
    ema: Option<f64>,
}

impl FrequencyEstimator {
    pub fn new(config: &FrequencyConfig) -> Self {
        let window_size = config.window_size.max(2);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            min_window_ms: config.min_window_ms,
            alpha: config.smoothing,
            ema: None,
        }
    }

    /// Record an arrival at `timestamp_ms` and return the smoothed rate in Hz.
    pub fn record_arrival(&mut self, timestamp_ms: f64) -> f64 {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(timestamp_ms);

        let sample = self.window_frequency();
        if sample > 0.0 {
            self.ema = Some(match self.ema {
                None => sample,
                Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
            });
        }
        self.frequency()
    }

    /// Raw `(n - 1) / duration` over the current window, or 0 when the
    /// window is too small or too short to be meaningful.
    pub fn window_frequency(&self) -> f64 {
        let (Some(first), Some(last)) = (self.window.front(), self.window.back()) else {
            return 0.0;
        };
        let duration_ms = last - first;
        if self.window.len() < 2 || duration_ms < self.min_window_ms || duration_ms <= 0.0 {
            return 0.0;
        }
        (self.window.len() - 1) as f64 / (duration_ms / 1000.0)
    }

    /// Smoothed rate in Hz (0 while idle).
    pub fn frequency(&self) -> f64 {
        self.ema.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.ema = None;
    }
}

struct MonitorInner {
    epoch: Instant,
    idle_timeout: Duration,
    estimator: Mutex<FrequencyEstimator>,
    /// When the monitor falls idle; `None` while already idle.
    deadline: watch::Sender<Option<Instant>>,
    idle_timer: Mutex<Option<JoinHandle<()>>>,
    hz: watch::Sender<f64>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.idle_timer).take() {
            timer.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`FrequencyEstimator`] driven by wall-clock arrivals, publishing its
/// estimate on a watch channel and falling back to 0 Hz after a quiet
/// period.
#[derive(Clone)]
pub struct FrequencyMonitor {
    inner: Arc<MonitorInner>,
}

impl FrequencyMonitor {
    pub fn new(config: &FrequencyConfig) -> Self {
        let (hz, _) = watch::channel(0.0);
        let (deadline, _) = watch::channel(None);
        Self {
            inner: Arc::new(MonitorInner {
                epoch: Instant::now(),
                idle_timeout: config.idle_timeout(),
                estimator: Mutex::new(FrequencyEstimator::new(config)),
                deadline,
                idle_timer: Mutex::new(None),
                hz,
            }),
        }
    }

    /// Record an arrival now. Pushes the idle deadline back.
    pub fn record(&self) -> f64 {
        let now = Instant::now();
        let timestamp_ms = now.duration_since(self.inner.epoch).as_secs_f64() * 1000.0;
        let hz = lock(&self.inner.estimator).record_arrival(timestamp_ms);
        self.inner.hz.send_replace(hz);
        self.inner
            .deadline
            .send_replace(Some(now + self.inner.idle_timeout));
        self.ensure_idle_timer();
        hz
    }

    pub fn frequency(&self) -> f64 {
        *self.inner.hz.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<f64> {
        self.inner.hz.subscribe()
    }

    /// Drop all samples and publish 0 Hz.
    pub fn reset(&self) {
        self.inner.deadline.send_replace(None);
        self.inner.go_idle();
    }

    /// Start the idle timer task unless it is already running.
    fn ensure_idle_timer(&self) {
        let mut timer = lock(&self.inner.idle_timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no tokio runtime, idle reset disabled");
            return;
        };
        *timer = Some(runtime.spawn(idle_timer(
            Arc::downgrade(&self.inner),
            self.inner.deadline.subscribe(),
        )));
    }
}

/// Sleeps until the current deadline, following it as arrivals move it.
async fn idle_timer(inner: Weak<MonitorInner>, mut deadline: watch::Receiver<Option<Instant>>) {
    let sleep = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(sleep);

    loop {
        let armed = match *deadline.borrow_and_update() {
            Some(at) => {
                sleep.as_mut().reset(at);
                true
            }
            None => false,
        };

        tokio::select! {
            () = &mut sleep, if armed => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                // An arrival may have moved the deadline since the sleep fired.
                let expired = inner.deadline.send_if_modified(|at| {
                    let expired = at.is_some_and(|when| when <= Instant::now());
                    if expired {
                        *at = None;
                    }
                    expired
                });
                if expired {
                    inner.go_idle();
                }
            }
            changed = deadline.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

impl MonitorInner {
    fn go_idle(&self) {
        lock(&self.estimator).reset();
        self.hz.send_replace(0.0);
    }
}
