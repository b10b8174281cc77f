//! Hot-plug tracking of a board across a USB re-enumeration.
//!
//! When a board reboots into its bootloader (or back into the application)
//! the OS usually tears down its serial device and creates a new one, often
//! under a different name. [`PortWatcher::await_new_port`] polls the
//! enumerator until an identifier that was not in the caller's baseline shows
//! up and stays up for a debounce period.
//!
//! Some bootloaders make the port appear and vanish a few times before it
//! settles, and macOS reports "Resource busy" when a port is opened right
//! after it is created; the debounce absorbs both.
//!
//! Time is read and spent through the [`Clock`] trait so the whole window can
//! be simulated in tests.

use {
    crate::{
        error::Result,
        port::{PortEnumerator, PortSet},
    },
    log::{debug, info, trace},
    std::time::{Duration, Instant},
};

/// Source of time for the watcher loop.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Watcher timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Total time to wait for a new port, measured from the call.
    pub window: Duration,
    /// Pause between unsuccessful polls.
    pub poll_interval: Duration,
    /// Delay before re-checking a freshly seen port.
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            debounce: Duration::from_secs(1),
        }
    }
}

impl WatchConfig {
    /// Set the total wait window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the debounce delay.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Polls a [`PortEnumerator`] for a newly appeared port.
pub struct PortWatcher<E, C = SystemClock> {
    enumerator: E,
    clock: C,
    config: WatchConfig,
}

impl<E: PortEnumerator> PortWatcher<E> {
    /// Watcher on the wall clock with default timing.
    pub fn new(enumerator: E) -> Self {
        Self::with_clock(enumerator, SystemClock, WatchConfig::default())
    }
}

impl<E: PortEnumerator, C: Clock> PortWatcher<E, C> {
    /// Watcher with an explicit clock and timing.
    pub fn with_clock(enumerator: E, clock: C, config: WatchConfig) -> Self {
        Self {
            enumerator,
            clock,
            config,
        }
    }

    /// Replace the timing.
    #[must_use]
    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Timing in use.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Take a baseline snapshot to pass to [`Self::await_new_port`] later.
    pub fn snapshot(&self) -> Result<PortSet> {
        self.enumerator.port_set()
    }

    /// Wait for a port that is not in `baseline`.
    ///
    /// Returns `Ok(None)` when the window elapses without a confirmed port.
    /// If several ports appear at once, which one is returned is unspecified.
    /// Enumeration failures abort the wait immediately.
    pub fn await_new_port(&self, baseline: &PortSet) -> Result<Option<String>> {
        let started = self.clock.now();
        let deadline = started + self.config.window;
        let mut last = baseline.clone();

        debug!(
            "Watching for a new serial port ({} known, window {:?})",
            baseline.len(),
            self.config.window
        );

        while self.clock.now() < deadline {
            let now = self.enumerator.port_set()?;

            let candidates: Vec<String> = now.added_since(&last).map(str::to_string).collect();
            if candidates.is_empty() {
                last = now;
            } else {
                trace!("Candidate ports {candidates:?}, waiting {:?}", self.config.debounce);
                self.clock.sleep(self.config.debounce);

                let check = self.enumerator.port_set()?;
                let confirmed = candidates
                    .into_iter()
                    .find(|p| check.contains(p) && !baseline.contains(p));
                if let Some(port) = confirmed {
                    info!(
                        "New serial port {port} after {:?}",
                        self.clock.now().saturating_duration_since(started)
                    );
                    return Ok(Some(port));
                }

                debug!("Candidate ports did not settle");
                last = check;
            }

            self.clock.sleep(self.config.poll_interval);
        }

        debug!("No new serial port within {:?}", self.config.window);
        Ok(None)
    }
}
