//! `aquactl-core` – the control-state engine.
//!
//! Everything safety-relevant lives here: the state machines that keep the
//! plumbing rig in exactly one coherent state at any time and degrade into a
//! closed/fault configuration on any actuator anomaly.
//!
//! # Modules
//!
//! - [`valve`] – [`Valve`][valve::Valve]: 2-relay/2-switch motorized valve
//!   state machine with timeout-based fault detection.
//! - [`leak`] – [`LeakSensor`][leak::LeakSensor]: polls an array of
//!   detectors and latches a system-wide alarm.
//! - [`heater`] – [`HeaterController`][heater::HeaterController]: heater
//!   power, pressure supervision, and the drain/refill wash cycle.
//! - [`supply`] – [`SupplyController`][supply::SupplyController]: top-level
//!   orchestrator sequencing the three supply topologies under one lock,
//!   with crash-recoverable persisted state.
//! - [`persist`] – the fixed-size checksummed state record.
//! - [`rig`] – [`SimRig`][rig::SimRig]: builder assembling a fully simulated
//!   rig for tests and the default daemon deployment.

pub mod heater;
pub mod leak;
pub mod persist;
pub mod rig;
pub mod supply;
pub mod valve;

pub use heater::{HeaterController, HeaterRequest, SupplyView};
pub use leak::LeakSensor;
pub use persist::{SavedState, StateStore};
pub use rig::{RigHandles, SimRig};
pub use supply::{SupplyConfig, SupplyController, SupplyParts};
pub use valve::Valve;
