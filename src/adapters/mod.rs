//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                   |
//! |-------------|---------------------|-------------------------------|
//! | `hardware`  | ActuatorPort        | sysfs GPIO / simulated lines  |
//! | `log_sink`  | EventSink           | `log` facade                  |
//! | `clock`     | Clock               | local wall clock / manual     |
//! |             | DelayPort           | thread sleep / instant        |
//! | `signals`   | (none)              | SIGINT/SIGTERM flag           |
//! | `ownership` | (none)              | chown of rotated log files    |
//!
//! The sensor side lives in [`crate::sensors`] and the record sink is
//! [`crate::telemetry::LogStore`].

pub mod clock;
pub mod hardware;
pub mod log_sink;
pub mod ownership;
pub mod signals;
