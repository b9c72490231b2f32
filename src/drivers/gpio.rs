//! Digital output lines for the valve relays.
//!
//! ## Dual-target design
//!
//! On the Pi: [`SysfsBackend`] drives `/sys/class/gpio` (export, direction,
//! value, unexport).  On host/test: [`SimBackend`] tracks levels in memory
//! and can be inspected through a cloned handle after the actuator adapter
//! has taken ownership of it.
//!
//! Pins from either backend implement [`embedded_hal::digital::OutputPin`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::rc::Rc;

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::{debug, warn};

use crate::error::HardwareError;

/// I/O failure on an output line.
#[derive(Debug)]
pub struct PinError(pub io::Error);

impl PinError {
    pub fn into_inner(self) -> io::Error {
        self.0
    }
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl digital::Error for PinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Source of output pins.
pub trait PinBackend {
    type Pin: OutputPin<Error = PinError>;

    /// Claim `gpio` as an output, initially low.
    fn claim(&mut self, gpio: u8) -> Result<Self::Pin, HardwareError>;

    /// Give a pin back.  Best effort.
    fn free(&mut self, pin: Self::Pin);
}

// ───────────────────────────────────────────────────────────────
// sysfs
// ───────────────────────────────────────────────────────────────

/// Linux sysfs GPIO class.
#[derive(Debug, Clone)]
pub struct SysfsBackend {
    root: PathBuf,
}

impl SysfsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn line_dir(&self, gpio: u8) -> PathBuf {
        self.root.join(format!("gpio{gpio}"))
    }
}

pub struct SysfsPin {
    gpio: u8,
    value: File,
}

impl SysfsPin {
    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    fn write_level(&mut self, high: bool) -> Result<(), PinError> {
        let level: &[u8] = if high { b"1" } else { b"0" };
        self.value.write_at(level, 0).map(drop).map_err(PinError)
    }
}

impl ErrorType for SysfsPin {
    type Error = PinError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), PinError> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), PinError> {
        self.write_level(true)
    }
}

impl PinBackend for SysfsBackend {
    type Pin = SysfsPin;

    fn claim(&mut self, gpio: u8) -> Result<SysfsPin, HardwareError> {
        let gpio_err = |source| HardwareError::Gpio { pin: gpio, source };
        let dir = self.line_dir(gpio);
        if !dir.exists() {
            fs::write(self.root.join("export"), gpio.to_string()).map_err(gpio_err)?;
        }
        // "low" configures an output whose initial level is 0.
        fs::write(dir.join("direction"), "low").map_err(gpio_err)?;
        let value = OpenOptions::new()
            .write(true)
            .open(dir.join("value"))
            .map_err(gpio_err)?;
        debug!("gpio{gpio} exported as output");
        Ok(SysfsPin { gpio, value })
    }

    fn free(&mut self, pin: SysfsPin) {
        let gpio = pin.gpio;
        drop(pin);
        if let Err(e) = fs::write(self.root.join("unexport"), gpio.to_string()) {
            warn!("gpio{gpio} unexport failed: {e}");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimLines {
    levels: BTreeMap<u8, bool>,
    claimed: BTreeSet<u8>,
    failing: BTreeSet<u8>,
    max_high: usize,
}

impl SimLines {
    fn set(&mut self, gpio: u8, high: bool) -> Result<(), PinError> {
        if self.failing.contains(&gpio) {
            return Err(PinError(io::Error::other(format!("gpio{gpio} stuck"))));
        }
        self.levels.insert(gpio, high);
        let high_now = self.levels.values().filter(|l| **l).count();
        self.max_high = self.max_high.max(high_now);
        Ok(())
    }
}

/// In-memory lines.  Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    lines: Rc<RefCell<SimLines>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `gpio` fail.
    pub fn fail_gpio(&self, gpio: u8) {
        self.lines.borrow_mut().failing.insert(gpio);
    }

    pub fn level(&self, gpio: u8) -> Option<bool> {
        self.lines.borrow().levels.get(&gpio).copied()
    }

    /// Lines currently high.
    pub fn high_lines(&self) -> Vec<u8> {
        let lines = self.lines.borrow();
        lines
            .levels
            .iter()
            .filter_map(|(gpio, high)| high.then_some(*gpio))
            .collect()
    }

    /// Most lines ever high at the same instant.
    pub fn max_simultaneous_high(&self) -> usize {
        self.lines.borrow().max_high
    }

    pub fn is_claimed(&self, gpio: u8) -> bool {
        self.lines.borrow().claimed.contains(&gpio)
    }
}

pub struct SimPin {
    gpio: u8,
    lines: Rc<RefCell<SimLines>>,
}

impl ErrorType for SimPin {
    type Error = PinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), PinError> {
        self.lines.borrow_mut().set(self.gpio, false)
    }

    fn set_high(&mut self) -> Result<(), PinError> {
        self.lines.borrow_mut().set(self.gpio, true)
    }
}

impl PinBackend for SimBackend {
    type Pin = SimPin;

    fn claim(&mut self, gpio: u8) -> Result<SimPin, HardwareError> {
        let mut lines = self.lines.borrow_mut();
        lines.claimed.insert(gpio);
        lines.levels.insert(gpio, false);
        Ok(SimPin {
            gpio,
            lines: Rc::clone(&self.lines),
        })
    }

    fn free(&mut self, pin: SimPin) {
        self.lines.borrow_mut().claimed.remove(&pin.gpio);
    }
}
