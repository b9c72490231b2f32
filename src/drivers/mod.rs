//! Linux peripheral drivers: GPIO output lines and the i2c-dev bus.

pub mod gpio;
pub mod i2c_dev;
