//! System configuration parameters
//!
//! All tunable parameters for the greenhouse controller, loaded from a JSON
//! file.  Every section has defaults that mirror the field install
//! (three valves on BCM pins 22/27/17, logs under `~pi/ghlogs`), so a
//! config file only needs to name what differs.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on configured valves (one relay board).
pub const MAX_VALVES: usize = 8;

/// Log directory of the field install.
pub const PRODUCTION_LOG_DIR: &str = "/home/pi/ghlogs";

// ---------------------------------------------------------------------------
// Valves
// ---------------------------------------------------------------------------

/// Identifier of one valve actuator.  The value is the BCM GPIO number
/// driving the valve's relay; `0` is reserved for "all closed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValveId(pub u8);

impl ValveId {
    pub const ALL_CLOSED: Self = Self(0);

    pub const fn is_all_closed(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ValveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValveConfig {
    pub id: ValveId,
    /// Human alias, e.g. `raised-beds`.
    pub name: String,
}

/// The fixed set of valves known at configuration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValveBank {
    valves: heapless::Vec<ValveConfig, MAX_VALVES>,
}

impl ValveBank {
    /// Build a bank from a list of valves.  Fails if the list exceeds
    /// [`MAX_VALVES`]; content checks live in [`SystemConfig::validate`].
    pub fn new(valves: impl IntoIterator<Item = ValveConfig>) -> Result<Self> {
        let mut bank = heapless::Vec::new();
        for valve in valves {
            bank.push(valve).map_err(|v| {
                Error::Config(format!(
                    "too many valves (max {MAX_VALVES}), cannot add {}",
                    v.name
                ))
            })?;
        }
        Ok(Self { valves: bank })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValveConfig> {
        self.valves.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ValveId> + '_ {
        self.valves.iter().map(|v| v.id)
    }

    pub fn contains(&self, id: ValveId) -> bool {
        self.valves.iter().any(|v| v.id == id)
    }

    pub fn name_of(&self, id: ValveId) -> Option<&str> {
        self.valves
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.name.as_str())
    }

    /// Resolve a CLI argument: a configured name (case-insensitive), a
    /// configured numeric id, or `0` for "all closed".
    pub fn resolve(&self, arg: &str) -> Option<ValveId> {
        if let Some(v) = self
            .valves
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(arg))
        {
            return Some(v.id);
        }
        let id = ValveId(arg.parse().ok()?);
        (id.is_all_closed() || self.contains(id)).then_some(id)
    }

    pub fn len(&self) -> usize {
        self.valves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valves.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Telemetry log location and rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding rotated log files and the pointer file.
    pub dir: PathBuf,
    /// Name of the pointer file inside `dir`.
    pub pointer_name: String,
    /// A log file is rotated once it is more than this many whole days old.
    pub max_age_days: u32,
    /// User that owns new log files (group of the same name).  `None`
    /// leaves ownership to the process.
    pub owner: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(PRODUCTION_LOG_DIR),
            pointer_name: "current".into(),
            max_age_days: 7,
            owner: Some("pi".into()),
        }
    }
}

/// Sensor retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Reads attempted per quantity before giving up.
    pub attempts: u32,
    /// Wait between consecutive attempts.
    pub retry_delay_ms: u64,
}

impl SamplerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// One watering run performed by the hourly job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringSlot {
    /// Local hour (0-23) in which the job waters.
    pub hour: u8,
    pub valve: ValveId,
    pub seconds: u64,
}

impl WateringSlot {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// In-memory pins and a fixed-value sensor.  Never logs into
    /// [`PRODUCTION_LOG_DIR`].
    Simulated,
    /// sysfs GPIO and an HTU21D on i2c-dev.
    Linux,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: HardwareBackend,
    /// Root of the sysfs GPIO class directory.
    pub gpio_root: PathBuf,
    /// i2c-dev character device the sensor sits on.
    pub i2c_bus: PathBuf,
    /// 7-bit sensor address.
    pub sensor_address: u8,
    /// Values reported by the simulated sensor.
    pub simulated_temperature_c: f32,
    pub simulated_humidity_pct: f32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: HardwareBackend::Linux,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            sensor_address: 0x40,
            simulated_temperature_c: 21.5,
            simulated_humidity_pct: 55.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log: LogConfig,
    pub valves: ValveBank,
    pub sampler: SamplerConfig,
    pub schedule: Vec<WateringSlot>,
    pub hardware: HardwareConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let valves = [(22, "raised-beds"), (27, "greenhouse"), (17, "orchard")]
            .into_iter()
            .map(|(id, name)| ValveConfig {
                id: ValveId(id),
                name: name.into(),
            })
            .collect();

        Self {
            log: LogConfig::default(),
            valves: ValveBank { valves },
            sampler: SamplerConfig::default(),
            // Raised beds for two minutes at 06:00.
            schedule: vec![WateringSlot {
                hour: 6,
                valve: ValveId(22),
                seconds: 120,
            }],
            hardware: HardwareConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the controller misbehave instead of
    /// clamping them.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for valve in self.valves.iter() {
            if valve.id.is_all_closed() {
                return Err(Error::Config(format!(
                    "valve '{}' uses reserved id 0",
                    valve.name
                )));
            }
            if !seen.insert(valve.id) {
                return Err(Error::Config(format!("duplicate valve id {}", valve.id)));
            }
        }

        for slot in &self.schedule {
            if slot.hour > 23 {
                return Err(Error::Config(format!("schedule hour {} > 23", slot.hour)));
            }
            if !self.valves.contains(slot.valve) {
                return Err(Error::Config(format!(
                    "schedule names unconfigured valve {}",
                    slot.valve
                )));
            }
        }

        if self.sampler.attempts == 0 {
            return Err(Error::Config("sampler.attempts must be at least 1".into()));
        }
        if self.log.max_age_days == 0 {
            return Err(Error::Config("log.max_age_days must be at least 1".into()));
        }
        if self.log.pointer_name.is_empty() {
            return Err(Error::Config("log.pointer_name is empty".into()));
        }
        // Simulated valve commands and readings must not land in the real
        // audit trail.
        if self.hardware.backend == HardwareBackend::Simulated
            && self.log.dir == Path::new(PRODUCTION_LOG_DIR)
        {
            return Err(Error::Config(format!(
                "simulated hardware cannot log to {PRODUCTION_LOG_DIR}; choose another log.dir"
            )));
        }
        Ok(())
    }
}
