//! Time adapters.
//!
//! - [`SystemClock`] reads local wall-clock time (the log stamps and the
//!   watering schedule are local, as on the Pi in the greenhouse).
//! - [`ThreadDelay`] blocks the calling thread, waking every
//!   [`POLL_INTERVAL`] to check for SIGINT/SIGTERM.
//! - [`ManualClock`] and [`InstantDelay`] are the simulation counterparts:
//!   time only moves when told to, and delays return immediately while
//!   remembering what was asked for.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

use super::signals;
use crate::app::ports::{Clock, DelayOutcome, DelayPort};

/// Granularity at which a blocking delay notices an interrupt.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Real blocking delay.
#[derive(Debug, Default)]
pub struct ThreadDelay;

impl DelayPort for ThreadDelay {
    fn delay(&mut self, duration: Duration) -> DelayOutcome {
        let deadline = Instant::now() + duration;
        loop {
            if signals::interrupted() {
                return DelayOutcome::Interrupted;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return DelayOutcome::Elapsed;
            }
            std::thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }
}

/// Clock whose time is set explicitly.  Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        self.now.set(self.now.get() + step);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// Delay that returns at once and records each requested duration.
///
/// If a [`ManualClock`] is attached, it is advanced by the requested
/// duration so records written after a hold carry the later time.
/// `interrupt_after` makes the n-th call (1-based) report an interrupt.
#[derive(Debug, Clone, Default)]
pub struct InstantDelay {
    requested: Rc<RefCell<Vec<Duration>>>,
    clock: Option<ManualClock>,
    interrupt_after: Option<usize>,
}

impl InstantDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    pub fn interrupt_on_call(mut self, n: usize) -> Self {
        self.interrupt_after = Some(n);
        self
    }

    /// Every duration requested so far, in order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.borrow().clone()
    }
}

impl DelayPort for InstantDelay {
    fn delay(&mut self, duration: Duration) -> DelayOutcome {
        let call = {
            let mut requested = self.requested.borrow_mut();
            requested.push(duration);
            requested.len()
        };
        if self.interrupt_after == Some(call) {
            return DelayOutcome::Interrupted;
        }
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
        DelayOutcome::Elapsed
    }
}
