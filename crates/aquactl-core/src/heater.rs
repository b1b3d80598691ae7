//! [`HeaterController`] – heater power, pressure supervision, and the
//! drain/refill wash cycle.
//!
//! The controller never calls back into the orchestrator.  It receives a
//! read-only [`SupplyView`] of the orchestrator's state with every call and
//! answers with an optional [`HeaterRequest`] the orchestrator executes on
//! its own valves.  This keeps ownership single-directional while preserving
//! the coupled behaviour: a wash can only start in a stable supply state,
//! wash valves are opened by the orchestrator, and finishing a wash restores
//! whatever valve positions the current supply state calls for.

use std::sync::Arc;
use std::time::Duration;

use aquactl_hal::{Clock, Relay, Switch, Telemetry, Thermometer};
use aquactl_types::{HeaterState, SupplyState, SwitchState, TelemetryValue, ValveState};
use tracing::{error, info, warn};

// TODO: move the wash timing into the deployment config.
const WASH_DELAY: Duration = Duration::from_secs(20);
const REFILL_DELAY: Duration = Duration::from_secs(2);

/// Snapshot of the orchestrator state, taken fresh for every heater call.
#[derive(Debug, Clone, Copy)]
pub struct SupplyView {
    pub state: SupplyState,
}

impl SupplyView {
    fn in_final_state(self) -> bool {
        self.state.is_final()
    }
}

/// Action the orchestrator must perform on the heater's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterRequest {
    /// Open the cold-supply and heater-input valves feeding the wash.
    OpenWashFeed,
    /// A wash ended (or was aborted): re-apply the current supply state to
    /// restore the valve positions it calls for.
    RestoreSupply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WashStep {
    Idle,
    /// Requested but not started yet; retried every tick until the supply
    /// reaches a stable state.
    Pending,
    Fill,
    Drain,
    Refill,
}

/// Heater-loop controller.
pub struct HeaterController {
    heater: Relay,
    drain: Relay,
    pressure: Switch,
    /// Reporting only; polled here so the reading stays fresh.
    temperature: Thermometer,
    state: HeaterState,
    wash_step: WashStep,
    wash_timer: Duration,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
}

impl HeaterController {
    pub fn new(
        heater: Relay,
        drain: Relay,
        pressure: Switch,
        temperature: Thermometer,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            heater,
            drain,
            pressure,
            temperature,
            state: HeaterState::Ok,
            wash_step: WashStep::Idle,
            wash_timer: Duration::ZERO,
            clock,
            telemetry,
        }
    }

    pub fn state(&self) -> HeaterState {
        self.state
    }

    /// Request a wash cycle.  If the supply is mid-transition the request
    /// stays pending and is retried on every poll.
    pub fn request_wash(&mut self, view: SupplyView) -> Option<HeaterRequest> {
        self.wash_step = WashStep::Pending;
        self.try_start_wash(view)
    }

    /// Heater power request.
    ///
    /// In `Ok` the relay is driven directly.  In `Pressurize` an "on" request
    /// triggers a wash instead: the heater cannot be safely enabled until a
    /// wash has flushed the loop after re-pressurization.  Any other state
    /// drops the request.
    pub fn control(&mut self, on: bool, view: SupplyView) -> Option<HeaterRequest> {
        match self.state {
            HeaterState::Ok => {
                self.heater.set_state(on);
                None
            }
            HeaterState::Pressurize if on => self.request_wash(view),
            _ => None,
        }
    }

    /// One supervisory tick.  `inlet` is the folded state of the two feeder
    /// valves; anything below `Opening` aborts an in-progress wash.
    pub fn poll(&mut self, inlet: ValveState, view: SupplyView) -> Option<HeaterRequest> {
        let pressure = self.pressure.poll();

        // Nothing acts on the heater temperature yet, but someone has to
        // keep polling it for the status surface.
        self.temperature.read();

        if pressure == SwitchState::Fault {
            if self.state != HeaterState::Fault {
                error!("Heater pressure monitor fault");
                return self.apply_state(HeaterState::Fault, view);
            }
            None
        } else if self.wash_step == WashStep::Pending {
            self.try_start_wash(view)
        } else if self.wash_step != WashStep::Idle {
            self.advance_wash(inlet, pressure, view)
        } else if pressure == SwitchState::Off && self.state != HeaterState::Protection {
            warn!("Heater pressure lost");
            self.apply_state(HeaterState::Protection, view)
        } else if pressure == SwitchState::On && self.state == HeaterState::Protection {
            info!("Heater pressure restored");
            self.apply_state(HeaterState::Pressurize, view)
        } else {
            None
        }
    }

    fn advance_wash(
        &mut self,
        inlet: ValveState,
        pressure: SwitchState,
        view: SupplyView,
    ) -> Option<HeaterRequest> {
        let now = self.clock.now();

        if inlet == ValveState::Open {
            if self.wash_step == WashStep::Fill {
                self.drain.set_state(true);
                self.wash_timer = now + WASH_DELAY;
                self.wash_step = WashStep::Drain;
            }
            if self.wash_step == WashStep::Drain && now > self.wash_timer {
                self.refill();
            }
        } else if inlet != ValveState::Opening && self.wash_step != WashStep::Refill {
            // Feed integrity broken mid-wash: seal the drain and go straight
            // to refilling.
            warn!("Heater wash aborted");
            self.refill();
        }

        // The refill runs even after an abort; the drain must be sealed and
        // the loop re-pressurized before anything else may happen.
        if self.wash_step == WashStep::Refill {
            match pressure {
                SwitchState::Off => {
                    if now > self.wash_timer {
                        warn!("Heater failed to re-pressurize");
                        return self.apply_state(HeaterState::Protection, view);
                    }
                }
                SwitchState::On => {
                    let request = self.end_wash();
                    self.apply_state(HeaterState::Ok, view);
                    return request;
                }
                SwitchState::Fault => {}
            }
        }
        None
    }

    fn try_start_wash(&mut self, view: SupplyView) -> Option<HeaterRequest> {
        if view.in_final_state() {
            self.report(HeaterState::Wash);
            self.wash_step = WashStep::Fill;
            Some(HeaterRequest::OpenWashFeed)
        } else {
            None
        }
    }

    fn refill(&mut self) {
        self.drain.set_state(false);
        self.wash_timer = self.clock.now() + REFILL_DELAY;
        self.wash_step = WashStep::Refill;
    }

    fn end_wash(&mut self) -> Option<HeaterRequest> {
        if self.wash_step != WashStep::Idle {
            self.drain.set_state(false);
            self.wash_step = WashStep::Idle;
            // The orchestrator re-applies its state and re-issues the heater
            // power request, so the heater relay is not touched here.
            Some(HeaterRequest::RestoreSupply)
        } else {
            None
        }
    }

    fn apply_state(&mut self, state: HeaterState, view: SupplyView) -> Option<HeaterRequest> {
        self.report(state);

        match state {
            HeaterState::Fault | HeaterState::Protection => {
                let request = self.end_wash();
                self.heater.set_state(false);
                request
            }
            HeaterState::Pressurize if view.state == SupplyState::Heater => {
                self.request_wash(view)
            }
            _ => None,
        }
    }

    fn report(&mut self, state: HeaterState) {
        self.state = state;
        self.telemetry
            .emit("Heater/state", TelemetryValue::Int(state as i32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquactl_hal::sim::{SimContact, SimLevel, SimRelayLine, SimSwitchLine, SimTemp, SimTempProbe};
    use aquactl_hal::{ManualClock, NullTelemetry};

    struct TestHeater {
        heater: HeaterController,
        clock: Arc<ManualClock>,
        heater_level: SimLevel,
        drain_level: SimLevel,
        pressure: SimContact,
        #[allow(dead_code)]
        temp: SimTemp,
    }

    fn build() -> TestHeater {
        let telemetry: Arc<dyn Telemetry> = Arc::new(NullTelemetry);
        let clock = Arc::new(ManualClock::new());

        let (heater_line, heater_level) = SimRelayLine::new();
        let (drain_line, drain_level) = SimRelayLine::new();
        let (pressure_line, pressure) = SimSwitchLine::new(SwitchState::On);
        let (probe, temp) = SimTempProbe::new(45.0);

        let heater = HeaterController::new(
            Relay::new("HR", "Heater relay", false, heater_line, telemetry.clone()),
            Relay::new("HD", "Heater drain", false, drain_line, telemetry.clone()),
            Switch::new("HP", "Heater pressure", false, pressure_line, telemetry.clone()),
            Thermometer::new("HT", "Heater temperature", 40.0, probe, telemetry.clone()),
            clock.clone(),
            telemetry,
        );

        TestHeater { heater, clock, heater_level, drain_level, pressure, temp }
    }

    fn view(state: SupplyState) -> SupplyView {
        SupplyView { state }
    }

    #[test]
    fn control_drives_the_relay_in_ok() {
        let mut t = build();
        assert_eq!(t.heater.control(true, view(SupplyState::Heater)), None);
        assert!(t.heater_level.get());
        t.heater.control(false, view(SupplyState::Heater));
        assert!(!t.heater_level.get());
    }

    #[test]
    fn pressure_loss_then_recovery_walks_the_protection_ladder() {
        let mut t = build();

        t.pressure.set(SwitchState::Off);
        t.heater.poll(ValveState::Open, view(SupplyState::Maintenance));
        assert_eq!(t.heater.state(), HeaterState::Protection);
        assert!(!t.heater_level.get());

        t.pressure.set(SwitchState::On);
        t.heater.poll(ValveState::Open, view(SupplyState::Maintenance));
        assert_eq!(t.heater.state(), HeaterState::Pressurize);
    }

    #[test]
    fn pressurize_in_heater_supply_chains_into_a_wash() {
        let mut t = build();

        t.pressure.set(SwitchState::Off);
        t.heater.poll(ValveState::Open, view(SupplyState::Heater));
        assert_eq!(t.heater.state(), HeaterState::Protection);

        t.pressure.set(SwitchState::On);
        let request = t.heater.poll(ValveState::Open, view(SupplyState::Heater));
        assert_eq!(t.heater.state(), HeaterState::Wash);
        assert_eq!(request, Some(HeaterRequest::OpenWashFeed));
    }

    #[test]
    fn wash_request_stays_pending_in_a_transient_supply_state() {
        let mut t = build();

        assert_eq!(t.heater.request_wash(view(SupplyState::SwitchToHeater)), None);
        assert_eq!(t.heater.state(), HeaterState::Ok);

        // Retried every tick; starts once the supply settles.
        assert_eq!(t.heater.poll(ValveState::Open, view(SupplyState::SwitchToHeater)), None);
        let request = t.heater.poll(ValveState::Open, view(SupplyState::Heater));
        assert_eq!(request, Some(HeaterRequest::OpenWashFeed));
        assert_eq!(t.heater.state(), HeaterState::Wash);
    }

    #[test]
    fn full_wash_cycle_drains_refills_and_restores() {
        let mut t = build();
        let v = view(SupplyState::Heater);

        assert_eq!(t.heater.request_wash(v), Some(HeaterRequest::OpenWashFeed));

        // Inlet open: fill step opens the drain and arms the wash timer.
        t.heater.poll(ValveState::Open, v);
        assert!(t.drain_level.get());

        // Drain period elapses; the loop is drained while unpressurized.
        t.pressure.set(SwitchState::Off);
        t.clock.advance(Duration::from_secs(21));
        t.heater.poll(ValveState::Open, v);
        assert!(!t.drain_level.get()); // refilling, drain sealed

        // Pressure returns before the refill deadline: wash completes.
        t.pressure.set(SwitchState::On);
        let request = t.heater.poll(ValveState::Open, v);
        assert_eq!(request, Some(HeaterRequest::RestoreSupply));
        assert_eq!(t.heater.state(), HeaterState::Ok);
    }

    #[test]
    fn failed_refill_locks_into_protection() {
        let mut t = build();
        let v = view(SupplyState::Heater);

        t.heater.request_wash(v);
        t.heater.poll(ValveState::Open, v);

        t.pressure.set(SwitchState::Off);
        t.clock.advance(Duration::from_secs(21));
        t.heater.poll(ValveState::Open, v); // enters refill

        // Refill deadline passes with no pressure.
        t.clock.advance(Duration::from_secs(3));
        let request = t.heater.poll(ValveState::Open, v);
        assert_eq!(request, Some(HeaterRequest::RestoreSupply));
        assert_eq!(t.heater.state(), HeaterState::Protection);
        assert!(!t.heater_level.get());
    }

    #[test]
    fn broken_inlet_aborts_the_wash_into_refill() {
        let mut t = build();
        let v = view(SupplyState::Heater);

        t.heater.request_wash(v);
        t.heater.poll(ValveState::Open, v);
        assert!(t.drain_level.get());

        // A feeder valve dropped out mid-drain: seal the drain immediately.
        t.pressure.set(SwitchState::Off);
        t.heater.poll(ValveState::Fault, v);
        assert!(!t.drain_level.get());
        assert_eq!(t.heater.state(), HeaterState::Wash); // still refilling

        t.pressure.set(SwitchState::On);

        let request = t.heater.poll(ValveState::Fault, v);
        assert_eq!(request, Some(HeaterRequest::RestoreSupply));
        assert_eq!(t.heater.state(), HeaterState::Ok);
    }

    #[test]
    fn pressure_monitor_fault_shuts_the_heater_down() {
        let mut t = build();
        t.heater.control(true, view(SupplyState::Heater));
        assert!(t.heater_level.get());

        t.pressure.set(SwitchState::Fault);
        t.heater.poll(ValveState::Open, view(SupplyState::Heater));
        assert_eq!(t.heater.state(), HeaterState::Fault);
        assert!(!t.heater_level.get());

        // Requests are dropped while faulted.
        t.heater.control(true, view(SupplyState::Heater));
        assert!(!t.heater_level.get());
    }
}
