//! [`SupplyController`] – top-level supply orchestrator.
//!
//! Owns the four topology valves, the leak latch, the heater controller and
//! the hot-supply thermometer, and sequences the rig through exactly one of
//! the supply topologies (closed, central, heater).  Transitions are
//! multi-tick: each `poll` advances the active sequence one step, waiting
//! for the previous step's valves to reach their end positions before the
//! next pair moves.
//!
//! The whole unit sits behind one mutex.  The poll loop and the command
//! surface (operator commands with an audit identity) both go through it, so
//! a command observes a consistent mid-transition state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aquactl_hal::{Clock, Relay, Telemetry, Thermometer};
use aquactl_types::{
    CommandError, ControlMode, HeaterState, LeakState, SupplyState, TelemetryValue, TempState,
    ValveState,
};
use tracing::{error, info, warn};

use crate::heater::{HeaterController, HeaterRequest, SupplyView};
use crate::leak::LeakSensor;
use crate::persist::StateStore;
use crate::valve::Valve;

/// Deployment knobs of the orchestrator.
#[derive(Debug, Clone)]
pub struct SupplyConfig {
    /// Persisted state record; `None` disables persistence.
    pub state_file: Option<std::path::PathBuf>,
    /// How long the hot supply must stay warm before auto mode switches
    /// back to it.
    pub recover_delay: Duration,
    /// Pause before re-applying a restored manual state, giving the I/O
    /// layer time to settle after boot.
    pub settle_delay: Duration,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            recover_delay: Duration::from_secs(60),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// The devices the orchestrator takes ownership of.
pub struct SupplyParts {
    pub cold_supply: Valve,
    pub hot_supply: Valve,
    pub heater_in: Valve,
    pub heater_out: Valve,
    pub hot_supply_temp: Thermometer,
    pub leak: LeakSensor,
    pub heater: HeaterController,
    /// Auxiliary relays reachable only through maintenance commands.
    pub relays: HashMap<String, Relay>,
}

/// Thread-safe handle over the supply unit.
pub struct SupplyController {
    inner: Mutex<SupplyUnit>,
}

impl SupplyController {
    pub fn new(
        parts: SupplyParts,
        config: SupplyConfig,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self { inner: Mutex::new(SupplyUnit::new(parts, config, clock, telemetry)) }
    }

    /// One supervisory tick over every owned device.
    pub fn poll(&self) {
        self.lock().poll();
    }

    /// Operator command: move to one of the three resting topologies.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a transient target, `PermissionDenied` while the
    /// leak alarm is latched or in auto mode.
    pub fn set_state(&self, target: SupplyState, user: &str) -> Result<(), CommandError> {
        let mut unit = self.lock();

        if !matches!(target, SupplyState::Closed | SupplyState::Central | SupplyState::Heater) {
            warn!("{user} requested invalid supply state");
            return Err(CommandError::InvalidInput);
        }
        if unit.leak.state() == LeakState::Alarm {
            warn!("{user} supply command denied: leak detected");
            return Err(CommandError::PermissionDenied("leak detected"));
        }
        if unit.mode == ControlMode::Auto {
            warn!("{user} supply command denied: not in manual mode");
            return Err(CommandError::PermissionDenied("not in manual mode"));
        }

        info!("{user} set supply state to {target}");
        let mode = unit.mode;
        unit.save_state(target, mode);
        unit.apply_state(target);
        Ok(())
    }

    /// Operator command: change the control mode.  Always allowed.
    pub fn set_mode(&self, mode: ControlMode, user: &str) {
        let mut unit = self.lock();
        info!("{user} set control mode to {mode}");
        let state = unit.state;
        unit.save_state(state, mode);
        unit.report_mode(mode);
    }

    /// Operator command: enable or disable the leak latch (also the only way
    /// to clear a latched alarm).
    ///
    /// # Errors
    ///
    /// `InvalidInput` for any target other than `Enabled`/`Disabled`.
    pub fn set_leak_state(&self, state: LeakState, user: &str) -> Result<(), CommandError> {
        if !matches!(state, LeakState::Enabled | LeakState::Disabled) {
            warn!("{user} requested invalid leak latch state");
            return Err(CommandError::InvalidInput);
        }
        let mut unit = self.lock();
        info!("{user} set leak latch to {state:?}");
        unit.leak.set_state(state);
        Ok(())
    }

    /// Operator command: start a heater wash cycle.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for any target other than `Wash`, `PermissionDenied`
    /// while the leak alarm is latched.
    pub fn set_heater_state(&self, state: HeaterState, user: &str) -> Result<(), CommandError> {
        if state != HeaterState::Wash {
            warn!("{user} requested invalid heater state");
            return Err(CommandError::InvalidInput);
        }
        let mut unit = self.lock();
        if unit.leak.state() == LeakState::Alarm {
            warn!("{user} wash command denied: leak detected");
            return Err(CommandError::PermissionDenied("leak detected"));
        }
        info!("{user} requested a heater wash");
        let view = unit.view();
        if let Some(request) = unit.heater.request_wash(view) {
            unit.handle_request(request);
        }
        Ok(())
    }

    /// Maintenance command: drive a single valve, bypassing the topology
    /// state machine.  Returns the valve state after the command.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` outside maintenance mode, `NotFound` for an
    /// unknown id, `InvalidInput` for a transient target.
    pub fn valve_control(
        &self,
        id: &str,
        target: ValveState,
        user: &str,
    ) -> Result<ValveState, CommandError> {
        let mut unit = self.lock();
        if unit.mode != ControlMode::Maintenance {
            warn!("{user} valve command denied: not in maintenance mode");
            return Err(CommandError::PermissionDenied("not in maintenance mode"));
        }
        let Some(valve) = unit.valve_mut(id) else {
            return Err(CommandError::NotFound(id.to_string()));
        };
        if !valve.set_state(target, true) {
            return Err(CommandError::InvalidInput);
        }
        let result = valve.state();
        info!("{user} set valve {id} to {target}");
        unit.report_state(SupplyState::Maintenance);
        Ok(result)
    }

    /// Maintenance command: drive an auxiliary relay.  Returns the relay
    /// state after the command.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` outside maintenance mode, `NotFound` for an
    /// unknown id.
    pub fn relay_control(&self, id: &str, on: bool, user: &str) -> Result<bool, CommandError> {
        let mut unit = self.lock();
        if unit.mode != ControlMode::Maintenance {
            warn!("{user} relay command denied: not in maintenance mode");
            return Err(CommandError::PermissionDenied("not in maintenance mode"));
        }
        let Some(relay) = unit.relays.get_mut(id) else {
            return Err(CommandError::NotFound(id.to_string()));
        };
        relay.set_state(on);
        let result = relay.state();
        info!("{user} set relay {id} to {on}");
        unit.report_state(SupplyState::Maintenance);
        Ok(result)
    }

    pub fn state(&self) -> SupplyState {
        self.lock().state
    }

    pub fn mode(&self) -> ControlMode {
        self.lock().mode
    }

    pub fn leak_state(&self) -> LeakState {
        self.lock().leak.state()
    }

    pub fn heater_state(&self) -> HeaterState {
        self.lock().heater.state()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SupplyUnit> {
        self.inner.lock().expect("supply unit poisoned")
    }
}

struct SupplyUnit {
    cold_supply: Valve,
    hot_supply: Valve,
    heater_in: Valve,
    heater_out: Valve,
    hot_temp: Thermometer,
    leak: LeakSensor,
    heater: HeaterController,
    relays: HashMap<String, Relay>,
    state: SupplyState,
    mode: ControlMode,
    /// Step counter of the active transition sequence.
    step: u32,
    /// `None` while disarmed; armed-and-elapsed at boot so a warm hot
    /// supply is adopted on the very first tick.
    recover_at: Option<Duration>,
    recover_delay: Duration,
    store: Option<StateStore>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
}

impl SupplyUnit {
    fn new(
        parts: SupplyParts,
        config: SupplyConfig,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let mut unit = Self {
            cold_supply: parts.cold_supply,
            hot_supply: parts.hot_supply,
            heater_in: parts.heater_in,
            heater_out: parts.heater_out,
            hot_temp: parts.hot_supply_temp,
            leak: parts.leak,
            heater: parts.heater,
            relays: parts.relays,
            state: SupplyState::Maintenance,
            mode: ControlMode::Manual,
            step: 0,
            recover_at: Some(Duration::ZERO),
            recover_delay: config.recover_delay,
            store: config.state_file.map(StateStore::new),
            clock,
            telemetry,
        };

        let restored = match unit.store.as_ref().map(StateStore::load) {
            Some(Some(saved)) => Some(saved),
            Some(None) => {
                error!("Could not read saved state; falling back to defaults");
                None
            }
            None => None,
        };

        match restored {
            Some(saved) => {
                unit.report_mode(saved.mode);
                if saved.mode == ControlMode::Manual {
                    // Give the I/O layer a moment before driving relays.
                    std::thread::sleep(config.settle_delay);
                    info!("Bringing back manual control state: {}", saved.state);
                    unit.apply_state(saved.state);
                } else {
                    unit.report_state(unit.state);
                }
            }
            None => {
                unit.report_mode(unit.mode);
                unit.report_state(unit.state);
            }
        }

        unit
    }

    fn poll(&mut self) {
        if self.leak.poll() {
            warn!("Leak alarm: forcing the supply closed");
            self.apply_state(SupplyState::Closed);
        }

        self.cold_supply.poll();
        self.hot_supply.poll();
        self.heater_in.poll();
        self.heater_out.poll();

        let any_fault = [&self.cold_supply, &self.hot_supply, &self.heater_in, &self.heater_out]
            .iter()
            .any(|v| v.state() == ValveState::Fault);

        if any_fault {
            if self.state != SupplyState::Fault {
                error!("Supply valve fault");
                self.report_state(SupplyState::Fault);
                let view = self.view();
                self.heater.control(false, view);
            }
        } else {
            self.run_transition();
        }

        let inlet = self.inlet_state();
        let view = self.view();
        if let Some(request) = self.heater.poll(inlet, view) {
            self.handle_request(request);
        }

        self.run_recovery();
    }

    /// Advance the active topology-transition sequence by at most one step.
    fn run_transition(&mut self) {
        match self.state {
            SupplyState::Closing => {
                let all_closed = [
                    &self.cold_supply,
                    &self.hot_supply,
                    &self.heater_in,
                    &self.heater_out,
                ]
                .iter()
                .all(|v| v.state() == ValveState::Closed);
                if all_closed {
                    self.report_state(SupplyState::Closed);
                }
            }
            SupplyState::SwitchToCentral => {
                if self.heater_in.state() == ValveState::Closed
                    && self.heater_out.state() == ValveState::Closed
                {
                    if self.step == 0 {
                        self.cold_supply.set_state(ValveState::Open, false);
                        self.hot_supply.set_state(ValveState::Open, false);
                        self.step = 1;
                    }
                    // Re-read: opening can complete within the same tick.
                    if self.step == 1
                        && self.cold_supply.state() == ValveState::Open
                        && self.hot_supply.state() == ValveState::Open
                    {
                        self.report_state(SupplyState::Central);
                    }
                }
            }
            SupplyState::SwitchToHeater => {
                if self.hot_supply.state() == ValveState::Closed {
                    if self.step == 0 {
                        self.heater_in.set_state(ValveState::Open, false);
                        self.heater_out.set_state(ValveState::Open, false);
                        self.cold_supply.set_state(ValveState::Open, false);
                        self.step = 1;
                    }
                    if self.step == 1
                        && self.heater_in.state() == ValveState::Open
                        && self.heater_out.state() == ValveState::Open
                        && self.cold_supply.state() == ValveState::Open
                    {
                        self.report_state(SupplyState::Heater);
                        let view = self.view();
                        if let Some(request) = self.heater.control(true, view) {
                            self.handle_request(request);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Temperature-driven supply selection, active in auto mode only.
    fn run_recovery(&mut self) {
        let auto_ok = self.mode == ControlMode::Auto && self.leak.state() != LeakState::Alarm;

        self.hot_temp.read();
        match self.hot_temp.state() {
            TempState::Fault => self.recover_at = None,
            TempState::Cold => {
                self.recover_at = None;
                if auto_ok
                    && matches!(
                        self.state,
                        SupplyState::Central | SupplyState::Closed | SupplyState::Maintenance
                    )
                {
                    warn!("Hot supply went cold; switching to heater");
                    self.apply_state(SupplyState::Heater);
                }
            }
            TempState::Normal => {
                let now = self.clock.now();
                match self.recover_at {
                    None => self.recover_at = Some(now + self.recover_delay),
                    Some(at) => {
                        if now >= at
                            && auto_ok
                            && matches!(
                                self.state,
                                SupplyState::Heater | SupplyState::Closed | SupplyState::Maintenance
                            )
                        {
                            info!("Hot supply recovered; switching to central");
                            self.apply_state(SupplyState::Central);
                        }
                    }
                }
            }
        }
    }

    /// Kick off the transition sequence towards `target`.
    fn apply_state(&mut self, target: SupplyState) {
        match target {
            SupplyState::Closed => {
                let view = self.view();
                self.heater.control(false, view);
                // Emergency path: force past any fault latch.
                for valve in [
                    &mut self.cold_supply,
                    &mut self.hot_supply,
                    &mut self.heater_in,
                    &mut self.heater_out,
                ] {
                    valve.set_state(ValveState::Closed, true);
                }
                self.report_state(SupplyState::Closing);
            }
            SupplyState::Central => {
                let view = self.view();
                self.heater.control(false, view);
                self.heater_in.set_state(ValveState::Closed, false);
                self.heater_out.set_state(ValveState::Closed, false);
                self.report_state(SupplyState::SwitchToCentral);
            }
            SupplyState::Heater => {
                self.hot_supply.set_state(ValveState::Closed, false);
                self.report_state(SupplyState::SwitchToHeater);
            }
            other => self.report_state(other),
        }
        self.step = 0;
    }

    fn handle_request(&mut self, request: HeaterRequest) {
        match request {
            HeaterRequest::OpenWashFeed => {
                self.cold_supply.set_state(ValveState::Open, false);
                self.heater_in.set_state(ValveState::Open, false);
            }
            HeaterRequest::RestoreSupply => {
                let state = self.state;
                self.apply_state(state);
            }
        }
    }

    /// Folded state of the two valves feeding the heater loop.
    fn inlet_state(&self) -> ValveState {
        let cs = self.cold_supply.state();
        let hi = self.heater_in.state();
        if cs == ValveState::Open && hi == ValveState::Open {
            ValveState::Open
        } else if matches!(cs, ValveState::Open | ValveState::Opening)
            && matches!(hi, ValveState::Open | ValveState::Opening)
        {
            ValveState::Opening
        } else {
            ValveState::Fault
        }
    }

    fn valve_mut(&mut self, id: &str) -> Option<&mut Valve> {
        [
            &mut self.cold_supply,
            &mut self.hot_supply,
            &mut self.heater_in,
            &mut self.heater_out,
        ]
        .into_iter()
        .find(|v| v.id() == id)
    }

    fn view(&self) -> SupplyView {
        SupplyView { state: self.state }
    }

    fn save_state(&mut self, state: SupplyState, mode: ControlMode) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(state, mode) {
                // A dead state file must not fail the command.
                error!("Could not save state: {err}");
            }
        }
    }

    fn report_state(&mut self, state: SupplyState) {
        self.state = state;
        self.telemetry
            .emit("ValveController/state", TelemetryValue::Int(state as i32));
    }

    fn report_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
        self.telemetry
            .emit("ValveController/mode", TelemetryValue::Int(mode as i32));
    }
}
