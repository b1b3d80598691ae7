//! Analog temperature input: the [`TempProbe`] driver trait and the
//! threshold-deriving [`Thermometer`] wrapper.

use std::sync::Arc;

use aquactl_types::{TelemetryValue, TempState};
use tracing::warn;

use crate::bus::Telemetry;

/// A physical temperature probe (1-wire sensor file, I2C device, ...).
///
/// An unreachable or unreadable sensor returns NaN; there is no error
/// channel.
pub trait TempProbe: Send {
    fn measure(&mut self) -> f32;
}

/// Logical thermometer deriving a tri-state from the raw reading:
/// NaN → `Fault`, reading ≥ threshold → `Normal`, else `Cold`.
pub struct Thermometer {
    id: String,
    description: String,
    threshold: f32,
    state: TempState,
    probe: Box<dyn TempProbe>,
    telemetry: Arc<dyn Telemetry>,
}

impl Thermometer {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        threshold: f32,
        probe: Box<dyn TempProbe>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            threshold,
            state: TempState::Normal,
            probe,
            telemetry,
        }
    }

    /// Take a fresh reading, update the derived state, publish both.
    pub fn read(&mut self) -> f32 {
        let value = self.probe.measure();
        let next = if value.is_nan() {
            TempState::Fault
        } else if value >= self.threshold {
            TempState::Normal
        } else {
            TempState::Cold
        };

        if next != self.state {
            if next == TempState::Fault {
                warn!("Thermometer {} unreadable", self.description);
            }
            self.state = next;
            self.telemetry
                .emit(&format!("{}/state", self.id), TelemetryValue::Int(next as i32));
        }
        self.telemetry
            .emit(&format!("{}/value", self.id), TelemetryValue::Float(value));

        value
    }

    /// State derived from the most recent [`Thermometer::read`].
    pub fn state(&self) -> TempState {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
