//! `aquactl-hal` – hardware abstraction layer.
//!
//! The control core never touches GPIO lines, I2C expanders or 1-wire files
//! directly.  Drivers implement the three capability traits defined here and
//! the core consumes the logical device wrappers built on top of them:
//!
//! - [`relay`] – [`RelayLine`][relay::RelayLine] driver trait and the
//!   [`Relay`][relay::Relay] wrapper that resolves the de-energized polarity
//!   and reports every logical state change.
//! - [`switch`] – [`SwitchLine`][switch::SwitchLine] driver trait and the
//!   edge-reporting [`Switch`][switch::Switch] wrapper.
//! - [`thermometer`] – [`TempProbe`][thermometer::TempProbe] driver trait
//!   and the threshold-deriving [`Thermometer`][thermometer::Thermometer].
//! - [`clock`] – monotonic [`Clock`][clock::Clock] abstraction; all control
//!   timers are polled against it.
//! - [`bus`] – the [`Telemetry`][bus::Telemetry] sink contract and the
//!   deduplicating last-value [`ValueBus`][bus::ValueBus].
//! - [`sim`] – in-process simulated drivers with shared handles, used by the
//!   test suites and by the default daemon rig.

pub mod bus;
pub mod clock;
pub mod relay;
pub mod sim;
pub mod switch;
pub mod thermometer;

pub use bus::{NullTelemetry, Telemetry, ValueBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use relay::{Relay, RelayLine};
pub use switch::{Switch, SwitchLine};
pub use thermometer::{TempProbe, Thermometer};
