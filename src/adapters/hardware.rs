//! Hardware adapter: bridges GPIO relay lines to [`ActuatorPort`].
//!
//! Owns one output pin per configured valve while acquired.  This is the
//! only module that drives the relays; the backend decides whether that
//! means sysfs writes or in-memory simulation.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::ActuatorPort;
use crate::config::{MAX_VALVES, ValveBank, ValveId};
use crate::drivers::gpio::PinBackend;
use crate::error::HardwareError;

/// Valve relays on GPIO lines; the valve id is the line number.
pub struct GpioActuators<B: PinBackend> {
    backend: B,
    valves: heapless::Vec<ValveId, MAX_VALVES>,
    pins: heapless::Vec<(ValveId, B::Pin), MAX_VALVES>,
    acquired: bool,
}

impl<B: PinBackend> GpioActuators<B> {
    pub fn new(backend: B, bank: &ValveBank) -> Self {
        Self {
            backend,
            valves: bank.ids().collect(),
            pins: heapless::Vec::new(),
            acquired: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn pin_mut(&mut self, id: ValveId) -> Result<&mut B::Pin, HardwareError> {
        self.pins
            .iter_mut()
            .find(|(valve, _)| *valve == id)
            .map(|(_, pin)| pin)
            .ok_or(HardwareError::UnknownActuator(id))
    }
}

impl<B: PinBackend> ActuatorPort for GpioActuators<B> {
    fn acquire(&mut self) -> Result<(), HardwareError> {
        if self.acquired {
            return Ok(());
        }
        for id in self.valves.clone() {
            let claimed = self.backend.claim(id.0).and_then(|mut pin| {
                match pin.set_low() {
                    Ok(()) => Ok(pin),
                    Err(e) => {
                        self.backend.free(pin);
                        Err(HardwareError::Gpio {
                            pin: id.0,
                            source: e.into_inner(),
                        })
                    }
                }
            });
            let pin = match claimed {
                Ok(pin) => pin,
                Err(e) => {
                    self.release();
                    return Err(e);
                }
            };
            if let Err((_, pin)) = self.pins.push((id, pin)) {
                self.backend.free(pin);
                self.release();
                return Err(HardwareError::UnknownActuator(id));
            }
        }
        self.acquired = true;
        debug!("claimed {} valve lines", self.pins.len());
        Ok(())
    }

    fn set_signal(&mut self, actuator: ValveId, on: bool) -> Result<(), HardwareError> {
        if !self.acquired {
            return Err(HardwareError::NotAcquired);
        }
        let pin = self.pin_mut(actuator)?;
        let result = if on { pin.set_high() } else { pin.set_low() };
        result.map_err(|e| HardwareError::Gpio {
            pin: actuator.0,
            source: e.into_inner(),
        })
    }

    fn release(&mut self) {
        while let Some((id, mut pin)) = self.pins.pop() {
            if let Err(e) = pin.set_low() {
                warn!("valve {id}: could not drive line low on release: {e:?}");
            }
            self.backend.free(pin);
        }
        self.acquired = false;
    }
}

impl<B: PinBackend> Drop for GpioActuators<B> {
    fn drop(&mut self) {
        self.release();
    }
}
