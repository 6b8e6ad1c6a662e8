use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Monotonic time source, in seconds since an arbitrary origin
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += seconds.max(0.0);
        }
    }

    /// Jump to `seconds`; never moves backwards
    pub fn set(&self, seconds: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = now.max(seconds);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or(0.0)
    }
}
