//! Background epoch ticker.
//!
//! Guests are given an epoch deadline derived from their timeout; something
//! has to advance the epoch for that deadline to ever arrive. The ticker is a
//! single thread that does exactly that, and is stopped and joined when it
//! is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::SharedEngine;
use crate::error::{EngineError, EngineResult};

/// Default interval between epoch ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Advances an engine's epoch on a fixed interval.
pub struct EpochTicker {
    engine: SharedEngine,
    tick_interval: Duration,
    shutdown: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EpochTicker {
    /// Create a stopped ticker for the given engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EpochsDisabled`] if the engine was built
    /// without epoch interruption.
    pub fn new(engine: SharedEngine, tick_interval: Duration) -> EngineResult<Self> {
        if !engine.epoch_enabled() {
            return Err(EngineError::EpochsDisabled);
        }
        if tick_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "tick interval must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            engine,
            tick_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
            handle: Mutex::new(None),
        })
    }

    /// Create and immediately start a ticker.
    pub fn spawn(engine: SharedEngine, tick_interval: Duration) -> EngineResult<Self> {
        let ticker = Self::new(engine, tick_interval)?;
        ticker.start()?;
        Ok(ticker)
    }

    /// Start the ticker thread. Starting a running ticker does nothing.
    pub fn start(&self) -> EngineResult<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }

        self.shutdown.store(false, Ordering::SeqCst);

        let engine = Arc::clone(&self.engine);
        let shutdown = Arc::clone(&self.shutdown);
        let ticks = Arc::clone(&self.ticks);
        let tick_interval = self.tick_interval;

        let spawned = thread::Builder::new()
            .name("boundary-epoch-ticker".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(tick_interval);
                    engine.increment_epoch();
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
                debug!("Epoch ticker thread exiting");
            })?;

        *handle = Some(spawned);

        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Started epoch ticker"
        );
        Ok(())
    }

    /// Stop the ticker thread and wait for it to exit.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        self.shutdown.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            warn!("Epoch ticker thread panicked");
        }

        info!(ticks = self.ticks(), "Stopped epoch ticker");
    }

    /// Whether the ticker thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Total ticks since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// The configured tick interval.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Epoch deadline for a call limited to `duration`. See [`epochs_for`].
    pub fn epochs_for(&self, duration: Duration) -> u64 {
        epochs_for(duration, self.tick_interval)
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EpochTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochTicker")
            .field("tick_interval", &self.tick_interval)
            .field("running", &self.is_running())
            .field("ticks", &self.ticks())
            .finish()
    }
}

/// Epoch deadline, in ticks, for a call limited to `duration`.
///
/// A call starts somewhere inside the current tick, so the first tick it
/// sees may be almost immediate. The deadline is one tick more than the
/// ticks needed to cover `duration`, which keeps a call from being
/// interrupted before `duration` has passed.
pub fn epochs_for(duration: Duration, tick_interval: Duration) -> u64 {
    let ticks = duration.as_nanos().div_ceil(tick_interval.as_nanos().max(1));
    u64::try_from(ticks).unwrap_or(u64::MAX).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{BoundaryEngine, IntoShared};

    fn create_engine(epochs: bool) -> SharedEngine {
        BoundaryEngine::new(EngineConfig::default().with_epochs(epochs))
            .unwrap()
            .into_shared()
    }

    #[test]
    fn test_epochs_for() {
        let tick = Duration::from_millis(10);
        assert_eq!(epochs_for(Duration::from_secs(1), tick), 101);
        assert_eq!(epochs_for(Duration::from_millis(10), tick), 2);
        assert_eq!(epochs_for(Duration::from_millis(15), tick), 3);
        assert_eq!(epochs_for(Duration::from_millis(1), tick), 2);
        assert_eq!(epochs_for(Duration::ZERO, tick), 1);
        assert_eq!(epochs_for(Duration::MAX, Duration::from_nanos(1)), u64::MAX);
    }

    #[test]
    fn test_requires_epochs() {
        let result = EpochTicker::new(create_engine(false), DEFAULT_TICK_INTERVAL);
        assert!(matches!(result, Err(EngineError::EpochsDisabled)));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = EpochTicker::new(create_engine(true), Duration::ZERO);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_ticker_advances_epoch() {
        let engine = create_engine(true);
        let ticker = EpochTicker::spawn(Arc::clone(&engine), Duration::from_millis(1)).unwrap();
        assert!(ticker.is_running());

        thread::sleep(Duration::from_millis(50));
        ticker.stop();

        assert!(!ticker.is_running());
        assert!(ticker.ticks() > 0);
        assert_eq!(engine.current_epoch(), ticker.ticks());
    }

    #[test]
    fn test_start_is_idempotent() {
        let ticker = EpochTicker::new(create_engine(true), Duration::from_millis(5)).unwrap();
        ticker.start().unwrap();
        ticker.start().unwrap();
        assert!(ticker.is_running());
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());
    }
}
