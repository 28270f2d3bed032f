use std::time::Instant;

use parking_lot::Mutex;

/// Externally owned time source, read once per captured event.
pub trait Clock: Send + Sync {
    /// Current reading in seconds.
    fn get_time(&self) -> f64;
}

impl<F> Clock for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn get_time(&self) -> f64 {
        self()
    }
}

/// Monotonic stopwatch for experiments that don't bring their own timer.
pub struct ExperimentClock {
    origin: Mutex<Instant>,
}

impl ExperimentClock {
    pub fn new() -> Self {
        Self {
            origin: Mutex::new(Instant::now()),
        }
    }

    /// Restart the clock from zero.
    pub fn reset(&self) {
        *self.origin.lock() = Instant::now();
    }
}

impl Default for ExperimentClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ExperimentClock {
    fn get_time(&self) -> f64 {
        self.origin.lock().elapsed().as_secs_f64()
    }
}
