//! Application core: domain logic behind port traits.
//!
//! This module holds the business rules of the greenhouse controller:
//! valve mutual exclusion and timed holds, bounded-retry sensor sampling,
//! and the hourly watering schedule.  All interaction with hardware, time
//! and storage happens through the traits in [`ports`], so this layer is
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod sampler;
pub mod service;
pub mod valves;
