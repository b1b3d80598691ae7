//! In-process simulated drivers for testing without physical hardware.
//!
//! Each constructor returns the boxed driver plus a cheaply clonable handle
//! through which a test (or the daemon's demo rig) injects sensor readings
//! and observes actuator line levels while the control core owns the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aquactl_types::SwitchState;

use crate::relay::RelayLine;
use crate::switch::SwitchLine;
use crate::thermometer::TempProbe;

// ────────────────────────────────────────────────────────────────────────────
// Relay
// ────────────────────────────────────────────────────────────────────────────

/// Observer handle for a simulated relay's physical line level.
#[derive(Clone, Default)]
pub struct SimLevel(Arc<AtomicBool>);

impl SimLevel {
    /// Current physical line level (`true` = energised).
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Simulated binary output line.  Records the last applied level.
pub struct SimRelayLine {
    level: SimLevel,
}

impl SimRelayLine {
    pub fn new() -> (Box<Self>, SimLevel) {
        let level = SimLevel::default();
        (Box::new(Self { level: level.clone() }), level)
    }
}

impl RelayLine for SimRelayLine {
    fn apply(&mut self, energized: bool) {
        self.level.0.store(energized, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Switch
// ────────────────────────────────────────────────────────────────────────────

/// Injector handle for a simulated switch contact.
#[derive(Clone)]
pub struct SimContact(Arc<Mutex<SwitchState>>);

impl SimContact {
    /// Set the raw (pre-inversion) contact state the line will read next.
    pub fn set(&self, state: SwitchState) {
        *self.0.lock().expect("sim contact poisoned") = state;
    }
}

/// Simulated discrete input line.
pub struct SimSwitchLine {
    contact: SimContact,
}

impl SimSwitchLine {
    pub fn new(initial: SwitchState) -> (Box<Self>, SimContact) {
        let contact = SimContact(Arc::new(Mutex::new(initial)));
        (Box::new(Self { contact: contact.clone() }), contact)
    }
}

impl SwitchLine for SimSwitchLine {
    fn read(&mut self) -> SwitchState {
        *self.contact.0.lock().expect("sim contact poisoned")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Thermometer
// ────────────────────────────────────────────────────────────────────────────

/// Injector handle for a simulated temperature probe.
#[derive(Clone)]
pub struct SimTemp(Arc<Mutex<f32>>);

impl SimTemp {
    /// Set the raw reading the probe will return next.  NaN simulates an
    /// unreachable sensor.
    pub fn set(&self, value: f32) {
        *self.0.lock().expect("sim temp poisoned") = value;
    }
}

/// Simulated temperature probe.
pub struct SimTempProbe {
    temp: SimTemp,
}

impl SimTempProbe {
    pub fn new(initial: f32) -> (Box<Self>, SimTemp) {
        let temp = SimTemp(Arc::new(Mutex::new(initial)));
        (Box::new(Self { temp: temp.clone() }), temp)
    }
}

impl TempProbe for SimTempProbe {
    fn measure(&mut self) -> f32 {
        *self.temp.0.lock().expect("sim temp poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_line_records_level() {
        let (mut line, level) = SimRelayLine::new();
        assert!(!level.get());
        line.apply(true);
        assert!(level.get());
        line.apply(false);
        assert!(!level.get());
    }

    #[test]
    fn switch_line_reads_injected_state() {
        let (mut line, contact) = SimSwitchLine::new(SwitchState::Off);
        assert_eq!(line.read(), SwitchState::Off);
        contact.set(SwitchState::Fault);
        assert_eq!(line.read(), SwitchState::Fault);
    }

    #[test]
    fn temp_probe_reads_injected_value() {
        let (mut probe, temp) = SimTempProbe::new(42.0);
        assert_eq!(probe.measure(), 42.0);
        temp.set(f32::NAN);
        assert!(probe.measure().is_nan());
    }
}
