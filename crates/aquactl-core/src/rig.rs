//! [`SimRig`] – assembles a fully simulated rig.
//!
//! Produces the [`SupplyParts`] the orchestrator takes ownership of, plus
//! [`RigHandles`] through which a test (or the daemon's demo deployment)
//! injects sensor readings and observes actuator line levels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aquactl_hal::sim::{SimContact, SimLevel, SimRelayLine, SimSwitchLine, SimTemp, SimTempProbe};
use aquactl_hal::{Clock, Relay, Switch, Telemetry, Thermometer};
use aquactl_types::SwitchState;

use crate::heater::HeaterController;
use crate::leak::LeakSensor;
use crate::supply::SupplyParts;
use crate::valve::Valve;

const HOT_SUPPLY_THRESHOLD: f32 = 40.0;

/// Simulated-rig builder.
pub struct SimRig {
    valve_timeout: Duration,
    valve_feedback: bool,
    leak_sensors: usize,
    aux_relays: Vec<(String, String)>,
}

impl SimRig {
    pub fn new() -> Self {
        Self {
            valve_timeout: Duration::from_secs(30),
            valve_feedback: false,
            leak_sensors: 1,
            aux_relays: Vec::new(),
        }
    }

    pub fn valve_timeout(mut self, timeout: Duration) -> Self {
        self.valve_timeout = timeout;
        self
    }

    /// Fit every valve with simulated end-stop switches.
    pub fn with_valve_feedback(mut self, feedback: bool) -> Self {
        self.valve_feedback = feedback;
        self
    }

    pub fn leak_sensors(mut self, count: usize) -> Self {
        self.leak_sensors = count;
        self
    }

    /// Add an auxiliary relay reachable through maintenance commands.
    pub fn with_relay(mut self, id: impl Into<String>, description: impl Into<String>) -> Self {
        self.aux_relays.push((id.into(), description.into()));
        self
    }

    pub fn build(
        self,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> (SupplyParts, RigHandles) {
        let (cold_supply, cs_lines) = self.valve("CS", "Cold supply", &clock, &telemetry);
        let (hot_supply, hs_lines) = self.valve("HS", "Hot supply", &clock, &telemetry);
        let (heater_in, hi_lines) = self.valve("HI", "Heater input", &clock, &telemetry);
        let (heater_out, ho_lines) = self.valve("HO", "Heater output", &clock, &telemetry);

        let (hot_probe, hot_temp) = SimTempProbe::new(45.0);
        let hot_supply_temp = Thermometer::new(
            "HST",
            "Hot supply temperature",
            HOT_SUPPLY_THRESHOLD,
            hot_probe,
            telemetry.clone(),
        );

        let (heater_line, heater_power) = SimRelayLine::new();
        let (drain_line, drain) = SimRelayLine::new();
        let (pressure_line, pressure) = SimSwitchLine::new(SwitchState::On);
        let (heater_probe, heater_temp) = SimTempProbe::new(45.0);
        let heater = HeaterController::new(
            Relay::new("HR", "Heater relay", false, heater_line, telemetry.clone()),
            Relay::new("HD", "Heater drain", false, drain_line, telemetry.clone()),
            Switch::new("HP", "Heater pressure", false, pressure_line, telemetry.clone()),
            Thermometer::new("HT", "Heater temperature", 40.0, heater_probe, telemetry.clone()),
            clock.clone(),
            telemetry.clone(),
        );

        let mut detectors = Vec::new();
        let mut leak = Vec::new();
        for i in 0..self.leak_sensors {
            let (line, contact) = SimSwitchLine::new(SwitchState::Off);
            detectors.push(Switch::new(
                format!("LD{i}"),
                format!("Leak detector {i}"),
                false,
                line,
                telemetry.clone(),
            ));
            leak.push(contact);
        }
        let leak_sensor = LeakSensor::new(detectors, telemetry.clone());

        let mut relays = HashMap::new();
        let mut relay_levels = HashMap::new();
        for (id, description) in self.aux_relays {
            let (line, level) = SimRelayLine::new();
            relays.insert(
                id.clone(),
                Relay::new(id.clone(), description, false, line, telemetry.clone()),
            );
            relay_levels.insert(id, level);
        }

        let parts = SupplyParts {
            cold_supply,
            hot_supply,
            heater_in,
            heater_out,
            hot_supply_temp,
            leak: leak_sensor,
            heater,
            relays,
        };
        let handles = RigHandles {
            cold_supply: cs_lines,
            hot_supply: hs_lines,
            heater_in: hi_lines,
            heater_out: ho_lines,
            pressure,
            hot_temp,
            heater_temp,
            leak,
            heater_power,
            drain,
            relays: relay_levels,
        };
        (parts, handles)
    }

    fn valve(
        &self,
        id: &str,
        description: &str,
        clock: &Arc<dyn Clock>,
        telemetry: &Arc<dyn Telemetry>,
    ) -> (Valve, ValveLines) {
        let (open_line, open_relay) = SimRelayLine::new();
        let (close_line, close_relay) = SimRelayLine::new();

        let (switches, feedback) = if self.valve_feedback {
            let (open_sw_line, open) = SimSwitchLine::new(SwitchState::Off);
            let (close_sw_line, close) = SimSwitchLine::new(SwitchState::Off);
            let open_sw = Switch::new(
                format!("{id}/opened"),
                format!("{description} open end stop"),
                false,
                open_sw_line,
                telemetry.clone(),
            );
            let close_sw = Switch::new(
                format!("{id}/closed"),
                format!("{description} close end stop"),
                false,
                close_sw_line,
                telemetry.clone(),
            );
            (Some((open_sw, close_sw)), Some(ValveContacts { open, close }))
        } else {
            (None, None)
        };

        let valve = Valve::new(
            id,
            description,
            self.valve_timeout,
            Relay::new(format!("{id}/open"), format!("{description} open relay"), false, open_line, telemetry.clone()),
            Relay::new(format!("{id}/close"), format!("{description} close relay"), false, close_line, telemetry.clone()),
            switches,
            clock.clone(),
        );

        (valve, ValveLines { open_relay, close_relay, feedback })
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

/// End-stop contact injectors of one valve.
pub struct ValveContacts {
    pub open: SimContact,
    pub close: SimContact,
}

/// Observer/injector handles of one valve.
pub struct ValveLines {
    pub open_relay: SimLevel,
    pub close_relay: SimLevel,
    pub feedback: Option<ValveContacts>,
}

/// All the sim handles of a built rig.
pub struct RigHandles {
    pub cold_supply: ValveLines,
    pub hot_supply: ValveLines,
    pub heater_in: ValveLines,
    pub heater_out: ValveLines,
    pub pressure: SimContact,
    pub hot_temp: SimTemp,
    pub heater_temp: SimTemp,
    pub leak: Vec<SimContact>,
    pub heater_power: SimLevel,
    pub drain: SimLevel,
    pub relays: HashMap<String, SimLevel>,
}
