//! Discrete input sensor: the [`SwitchLine`] driver trait and the
//! edge-reporting [`Switch`] wrapper.

use std::sync::Arc;

use aquactl_types::{SwitchState, TelemetryValue};

use crate::bus::Telemetry;

/// A physical discrete input line.
///
/// Faults are reported in-band as [`SwitchState::Fault`] rather than as
/// error returns; the control logic treats them as sensor states, not as
/// exceptional conditions.
pub trait SwitchLine: Send {
    /// Read the raw (pre-inversion) line state.
    fn read(&mut self) -> SwitchState;
}

/// Logical switch with optional active-low inversion.
///
/// [`Switch::poll`] re-reads the line every call but publishes only on
/// transitions; without this dedup a stuck sensor would flood observers once
/// per tick.
pub struct Switch {
    id: String,
    description: String,
    active_low: bool,
    reported: Option<SwitchState>,
    line: Box<dyn SwitchLine>,
    telemetry: Arc<dyn Telemetry>,
}

impl Switch {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        active_low: bool,
        line: Box<dyn SwitchLine>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            active_low,
            reported: None,
            line,
            telemetry,
        }
    }

    /// Re-read the physical line, resolve the inversion flag, and publish a
    /// change notification if the state differs from the last reported one.
    pub fn poll(&mut self) -> SwitchState {
        let raw = self.line.read();
        let resolved = match raw {
            SwitchState::Fault => SwitchState::Fault,
            SwitchState::On if self.active_low => SwitchState::Off,
            SwitchState::Off if self.active_low => SwitchState::On,
            other => other,
        };

        if self.reported != Some(resolved) {
            self.reported = Some(resolved);
            self.telemetry.emit(
                &format!("{}/state", self.id),
                TelemetryValue::Int(resolved as i32),
            );
        }

        resolved
    }

    /// Last reported state; [`SwitchState::Off`] before the first poll.
    pub fn state(&self) -> SwitchState {
        self.reported.unwrap_or(SwitchState::Off)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
