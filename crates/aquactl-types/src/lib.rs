//! Shared state vocabulary of the aquactl water-supply controller.
//!
//! Every component of the system (HAL devices, valve/heater/leak state
//! machines, the supply orchestrator, the status surface) speaks in terms of
//! the enums defined here.  All of them carry explicit `i32` discriminants
//! because the same values travel over the telemetry bus and into the
//! persisted state record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tri-state reading of a discrete input (position switch, pressure switch,
/// leak detector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum SwitchState {
    Off = 0,
    On = 1,
    /// The input could not be read (wiring defect, dead expander, ...).
    Fault = 2,
}

/// Threshold-derived state of an analog temperature input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TempState {
    /// The sensor is unreachable or returned a non-number.
    Fault = 0,
    /// Reading below the configured threshold.
    Cold = 1,
    /// Reading at or above the configured threshold.
    Normal = 2,
}

/// Motion state of a motorized valve.
///
/// `Opening`/`Closing` are transient; `Fault` is sticky and can only be left
/// through a `Reset` or a forced command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ValveState {
    Reset = 0,
    Closed = 1,
    Closing = 2,
    Opening = 3,
    Open = 4,
    Fault = 5,
}

impl std::fmt::Display for ValveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValveState::Reset => "reset",
            ValveState::Closed => "close",
            ValveState::Closing => "closing",
            ValveState::Opening => "opening",
            ValveState::Open => "open",
            ValveState::Fault => "fault",
        };
        write!(f, "{s}")
    }
}

/// Latch state of the leak-detection subsystem.
///
/// `Alarm` is monotonic: once latched it survives any sensor reading and is
/// cleared only by an operator toggling the latch to `Enabled`/`Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum LeakState {
    Fault = 0,
    Enabled = 1,
    Disabled = 2,
    Alarm = 3,
}

/// State of the heater-loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum HeaterState {
    Fault = 0,
    Ok = 1,
    /// Drain/refill maintenance cycle in progress.
    Wash = 2,
    /// Pressure lost; heater power is locked out.
    Protection = 3,
    /// Pressure restored after `Protection`; the heater stays off until a
    /// wash has flushed the loop.
    Pressurize = 4,
}

/// Top-level state of the supply orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum SupplyState {
    Fault = 0,
    Closing = 1,
    Closed = 2,
    SwitchToCentral = 3,
    Central = 4,
    SwitchToHeater = 5,
    Heater = 6,
    Maintenance = 7,
}

impl SupplyState {
    /// Non-transient states, i.e. the ones a transition sequence ends in.
    /// Only these are ever written to the persisted state record.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            SupplyState::Closed
                | SupplyState::Central
                | SupplyState::Heater
                | SupplyState::Maintenance
        )
    }
}

impl std::fmt::Display for SupplyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SupplyState::Fault => "Fault",
            SupplyState::Closing => "Closing",
            SupplyState::Closed => "Closed",
            SupplyState::SwitchToCentral => "Switch to central",
            SupplyState::Central => "Central",
            SupplyState::SwitchToHeater => "Switch to heater",
            SupplyState::Heater => "Heater",
            SupplyState::Maintenance => "Maintenance",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<i32> for SupplyState {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(SupplyState::Fault),
            1 => Ok(SupplyState::Closing),
            2 => Ok(SupplyState::Closed),
            3 => Ok(SupplyState::SwitchToCentral),
            4 => Ok(SupplyState::Central),
            5 => Ok(SupplyState::SwitchToHeater),
            6 => Ok(SupplyState::Heater),
            7 => Ok(SupplyState::Maintenance),
            _ => Err(()),
        }
    }
}

/// Control mode of the supply orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ControlMode {
    /// The hot-supply thermometer drives supply selection.
    Auto = 0,
    /// Supply selection follows operator commands.
    Manual = 1,
    /// Individual valves and relays may be driven directly, bypassing the
    /// supply-topology state machine.
    Maintenance = 2,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ControlMode::Auto => "Auto",
            ControlMode::Manual => "Manual",
            ControlMode::Maintenance => "Maintenance",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<i32> for ControlMode {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(ControlMode::Auto),
            1 => Ok(ControlMode::Manual),
            2 => Ok(ControlMode::Maintenance),
            _ => Err(()),
        }
    }
}

/// A value published on the telemetry bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Int(i32),
    Float(f32),
}

/// Outcome of a rejected command on the orchestrator's command surface.
///
/// Hardware trouble never surfaces here: actuator and sensor failures degrade
/// into the relevant component's `Fault` state instead of failing the
/// command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed argument: unknown target state, out-of-range mode, ...
    #[error("invalid input")]
    InvalidInput,

    /// The command is well-formed but disallowed by the current mode or the
    /// leak latch.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// The named device does not exist in the topology.
    #[error("device '{0}' not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_states_are_exactly_the_four_resting_states() {
        assert!(SupplyState::Closed.is_final());
        assert!(SupplyState::Central.is_final());
        assert!(SupplyState::Heater.is_final());
        assert!(SupplyState::Maintenance.is_final());

        assert!(!SupplyState::Fault.is_final());
        assert!(!SupplyState::Closing.is_final());
        assert!(!SupplyState::SwitchToCentral.is_final());
        assert!(!SupplyState::SwitchToHeater.is_final());
    }

    #[test]
    fn supply_state_roundtrips_through_i32() {
        for s in [
            SupplyState::Fault,
            SupplyState::Closing,
            SupplyState::Closed,
            SupplyState::SwitchToCentral,
            SupplyState::Central,
            SupplyState::SwitchToHeater,
            SupplyState::Heater,
            SupplyState::Maintenance,
        ] {
            assert_eq!(SupplyState::try_from(s as i32), Ok(s));
        }
        assert!(SupplyState::try_from(8).is_err());
        assert!(SupplyState::try_from(-1).is_err());
    }

    #[test]
    fn control_mode_roundtrips_through_i32() {
        for m in [ControlMode::Auto, ControlMode::Manual, ControlMode::Maintenance] {
            assert_eq!(ControlMode::try_from(m as i32), Ok(m));
        }
        assert!(ControlMode::try_from(3).is_err());
    }

    #[test]
    fn valve_state_display_matches_wire_names() {
        assert_eq!(ValveState::Open.to_string(), "open");
        assert_eq!(ValveState::Closed.to_string(), "close");
        assert_eq!(ValveState::Fault.to_string(), "fault");
    }

    #[test]
    fn telemetry_value_serializes_untagged() {
        let json = serde_json::to_string(&TelemetryValue::Int(4)).unwrap();
        assert_eq!(json, "4");
        let json = serde_json::to_string(&TelemetryValue::Float(21.5)).unwrap();
        assert_eq!(json, "21.5");
    }

    #[test]
    fn command_error_display() {
        let err = CommandError::PermissionDenied("leak detected");
        assert!(err.to_string().contains("leak detected"));

        let err = CommandError::NotFound("XX".to_string());
        assert!(err.to_string().contains("XX"));
    }
}
