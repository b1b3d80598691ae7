//! Binary output actuator: the [`RelayLine`] driver trait and the logical
//! [`Relay`] wrapper.

use std::sync::Arc;

use aquactl_types::TelemetryValue;

use crate::bus::Telemetry;

/// A physical binary output line (GPIO pin, I2C-expander bit, ...).
///
/// Drivers are infallible by contract: a line that cannot be driven is a
/// wiring-level defect that manifests through the feedback sensors, never as
/// an error return to the control logic.
pub trait RelayLine: Send {
    /// Drive the physical line (`true` = energised).
    fn apply(&mut self, energized: bool);
}

/// Logical relay with a configurable de-energized polarity.
///
/// Some relays are wired active-low; `reset_state` is the physical line level
/// that corresponds to the logical "off" state.  The logical state is
/// recorded and reported *before* the line is driven; reporting is
/// observational only and never gates an actuation.
pub struct Relay {
    id: String,
    description: String,
    reset_state: bool,
    state: bool,
    line: Box<dyn RelayLine>,
    telemetry: Arc<dyn Telemetry>,
}

impl Relay {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        reset_state: bool,
        line: Box<dyn RelayLine>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            reset_state,
            state: false,
            line,
            telemetry,
        }
    }

    /// Drive the relay to the logical state `on`, translating through the
    /// polarity offset.
    pub fn set_state(&mut self, on: bool) {
        self.state = on;
        self.telemetry
            .emit(&format!("{}/state", self.id), TelemetryValue::Int(on as i32));
        self.line.apply(if on { !self.reset_state } else { self.reset_state });
    }

    /// Current logical state (`true` = on).
    pub fn state(&self) -> bool {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{NullTelemetry, ValueBus};
    use crate::sim::SimRelayLine;

    #[test]
    fn logical_state_follows_commands() {
        let (line, level) = SimRelayLine::new();
        let mut relay = Relay::new("HR", "Heater relay", false, line, Arc::new(NullTelemetry));

        assert!(!relay.state());
        relay.set_state(true);
        assert!(relay.state());
        assert!(level.get());
        relay.set_state(false);
        assert!(!relay.state());
        assert!(!level.get());
    }

    #[test]
    fn active_low_relay_inverts_the_line() {
        let (line, level) = SimRelayLine::new();
        let mut relay = Relay::new("HD", "Heater drain", true, line, Arc::new(NullTelemetry));

        // Logical off drives the line high on an active-low relay.
        relay.set_state(false);
        assert!(!relay.state());
        assert!(level.get());

        relay.set_state(true);
        assert!(relay.state());
        assert!(!level.get());
    }

    #[test]
    fn state_changes_are_published() {
        let bus = Arc::new(ValueBus::new());
        let (line, _level) = SimRelayLine::new();
        let mut relay = Relay::new("HR", "Heater relay", false, line, bus.clone());

        relay.set_state(true);
        assert_eq!(bus.get("HR/state"), Some(TelemetryValue::Int(1)));
        relay.set_state(false);
        assert_eq!(bus.get("HR/state"), Some(TelemetryValue::Int(0)));
    }
}
