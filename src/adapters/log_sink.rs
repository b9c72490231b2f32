//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events through
//! the `log` facade (stderr via env_logger in the binary, or the journal
//! when run from cron under systemd).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::WateringStarted { valve, duration } => {
                info!("WATER | valve={} | open for {}s", valve, duration.as_secs());
            }
            AppEvent::WateringFinished { valve } => {
                info!("WATER | valve={} | closed", valve);
            }
            AppEvent::WateringInterrupted { valve } => {
                warn!("WATER | valve={} | interrupted, all valves closed", valve);
            }
            AppEvent::ReadingLogged {
                temperature_c,
                humidity_pct,
            } => {
                info!(
                    "SENSE | T={:.2}\u{00b0}C | RH={:.2}%",
                    temperature_c, humidity_pct
                );
            }
            AppEvent::ReadingDropped => {
                warn!("SENSE | sensor unavailable, reading dropped");
            }
            AppEvent::StorageFailed { reason } => {
                warn!("STORE | {}", reason);
            }
            AppEvent::CycleCompleted { hour, watered } => {
                info!("CYCLE | hour={:02} | watered={}", hour, watered);
            }
        }
    }
}
