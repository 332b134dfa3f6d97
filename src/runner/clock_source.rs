// Copyright (c) 2024 Mike Tsao

use core::time::Duration;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

/// The external time the driver follows. It asks how much time has passed
/// since [ClockSource::restart()] and processes however many ticks that
/// covers.
pub trait ClockSource: core::fmt::Debug + Send + Sync {
    /// Makes now the origin.
    fn restart(&self);

    /// Time since the origin.
    fn elapsed(&self) -> Duration;
}

/// Follows the system's monotonic clock.
#[derive(Debug)]
pub struct WallClock {
    origin: Mutex<Instant>,
}
impl Default for WallClock {
    fn default() -> Self {
        Self {
            origin: Mutex::new(Instant::now()),
        }
    }
}
impl ClockSource for WallClock {
    fn restart(&self) {
        *self.origin.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.origin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// Time that moves only when told to. Clones share the same time, so a test
/// can keep one and hand the other to the driver.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}
impl ManualClock {
    #[allow(missing_docs)]
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    #[allow(missing_docs)]
    pub fn set(&self, to: Duration) {
        self.micros.store(to.as_micros() as u64, Ordering::SeqCst);
    }
}
impl ClockSource for ManualClock {
    fn restart(&self) {
        self.micros.store(0, Ordering::SeqCst);
    }

    fn elapsed(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}
