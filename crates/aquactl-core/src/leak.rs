//! [`LeakSensor`] – leak-detection latch over an array of switches.

use std::sync::Arc;

use aquactl_hal::{Switch, Telemetry};
use aquactl_types::{LeakState, SwitchState, TelemetryValue};
use tracing::{error, warn};

/// Aggregates the leak-detector switches and latches a system-wide alarm.
///
/// Per-switch edge memory keeps a stuck sensor from re-reporting every tick.
/// Once latched `Alarm`, the latch survives any sensor reading; only an
/// operator toggle through [`LeakSensor::set_state`] clears it.
pub struct LeakSensor {
    sensors: Vec<Switch>,
    reported: Vec<SwitchState>,
    state: LeakState,
    telemetry: Arc<dyn Telemetry>,
}

impl LeakSensor {
    pub fn new(sensors: Vec<Switch>, telemetry: Arc<dyn Telemetry>) -> Self {
        let reported = vec![SwitchState::Off; sensors.len()];
        Self { sensors, reported, state: LeakState::Enabled, telemetry }
    }

    /// Poll every detector.  Returns `true` when the alarm latched *this*
    /// tick; the caller must react by forcing an emergency close.
    pub fn poll(&mut self) -> bool {
        let mut alarm = false;

        for (i, sensor) in self.sensors.iter_mut().enumerate() {
            let state = sensor.poll();
            if self.reported[i] == state {
                continue;
            }
            self.reported[i] = state;

            match state {
                SwitchState::On => {
                    warn!("Leak detected in {}", sensor.description());
                    if self.state == LeakState::Enabled {
                        alarm = true;
                    }
                }
                SwitchState::Fault => {
                    error!("Leak sensor fault in {}", sensor.description());
                }
                SwitchState::Off => {}
            }
        }

        if alarm {
            self.report(LeakState::Alarm);
        }
        alarm
    }

    /// Operator toggle.  The orchestrator only ever passes `Enabled` or
    /// `Disabled`; validation happens at the command boundary.
    pub fn set_state(&mut self, state: LeakState) {
        self.report(state);
    }

    pub fn state(&self) -> LeakState {
        self.state
    }

    fn report(&mut self, state: LeakState) {
        self.state = state;
        self.telemetry
            .emit("LeakSensor/state", TelemetryValue::Int(state as i32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquactl_hal::sim::{SimContact, SimSwitchLine};
    use aquactl_hal::NullTelemetry;

    fn build(n: usize) -> (LeakSensor, Vec<SimContact>) {
        let telemetry: Arc<dyn Telemetry> = Arc::new(NullTelemetry);
        let mut sensors = Vec::new();
        let mut contacts = Vec::new();
        for i in 0..n {
            let (line, contact) = SimSwitchLine::new(SwitchState::Off);
            sensors.push(Switch::new(
                format!("LD{i}"),
                format!("Leak detector {i}"),
                false,
                line,
                telemetry.clone(),
            ));
            contacts.push(contact);
        }
        (LeakSensor::new(sensors, telemetry), contacts)
    }

    #[test]
    fn wet_sensor_latches_the_alarm() {
        let (mut leak, contacts) = build(2);
        assert_eq!(leak.state(), LeakState::Enabled);

        contacts[1].set(SwitchState::On);
        assert!(leak.poll());
        assert_eq!(leak.state(), LeakState::Alarm);
    }

    #[test]
    fn alarm_is_raised_only_on_the_transition_tick() {
        let (mut leak, contacts) = build(1);
        contacts[0].set(SwitchState::On);
        assert!(leak.poll());
        // Sensor still wet: edge memory suppresses a second notification.
        assert!(!leak.poll());
        assert_eq!(leak.state(), LeakState::Alarm);
    }

    #[test]
    fn alarm_survives_sensors_drying_out() {
        let (mut leak, contacts) = build(1);
        contacts[0].set(SwitchState::On);
        leak.poll();
        contacts[0].set(SwitchState::Off);
        for _ in 0..5 {
            assert!(!leak.poll());
            assert_eq!(leak.state(), LeakState::Alarm);
        }
    }

    #[test]
    fn disabled_latch_never_alarms() {
        let (mut leak, contacts) = build(1);
        leak.set_state(LeakState::Disabled);

        contacts[0].set(SwitchState::On);
        assert!(!leak.poll());
        assert_eq!(leak.state(), LeakState::Disabled);
    }

    #[test]
    fn sensor_fault_is_log_only() {
        let (mut leak, contacts) = build(1);
        contacts[0].set(SwitchState::Fault);
        assert!(!leak.poll());
        assert_eq!(leak.state(), LeakState::Enabled);
    }

    #[test]
    fn operator_reset_clears_the_alarm() {
        let (mut leak, contacts) = build(1);
        contacts[0].set(SwitchState::On);
        leak.poll();
        assert_eq!(leak.state(), LeakState::Alarm);

        leak.set_state(LeakState::Enabled);
        assert_eq!(leak.state(), LeakState::Enabled);
    }
}
