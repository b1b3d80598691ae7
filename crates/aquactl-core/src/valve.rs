//! [`Valve`] – motorized valve state machine.
//!
//! A valve owns one open-relay and one close-relay (mandatory) and,
//! optionally, a pair of end-stop switches.  Cheap motors without position
//! feedback run open-loop: they are assumed to have reached the target once
//! the travel timeout elapses.  Valves *with* feedback treat the same
//! timeout as a mechanical fault.

use std::sync::Arc;
use std::time::Duration;

use aquactl_hal::{Clock, Relay, Switch};
use aquactl_types::{SwitchState, ValveState};
use tracing::error;

/// A motorized valve.
///
/// The two relays are never energised simultaneously: every transition
/// de-energises the opposing relay before driving its own.
pub struct Valve {
    id: String,
    description: String,
    state: ValveState,
    changed_at: Duration,
    timeout: Duration,
    open_relay: Relay,
    close_relay: Relay,
    open_switch: Option<Switch>,
    close_switch: Option<Switch>,
    clock: Arc<dyn Clock>,
}

impl Valve {
    /// Construct a valve in the `Reset` state.  `switches` is the optional
    /// `(open, close)` end-stop pair.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        timeout: Duration,
        open_relay: Relay,
        close_relay: Relay,
        switches: Option<(Switch, Switch)>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (open_switch, close_switch) = match switches {
            Some((open, close)) => (Some(open), Some(close)),
            None => (None, None),
        };
        Self {
            id: id.into(),
            description: description.into(),
            state: ValveState::Reset,
            changed_at: Duration::ZERO,
            timeout,
            open_relay,
            close_relay,
            open_switch,
            close_switch,
            clock,
        }
    }

    /// Command a transition to `Open`, `Closed` or `Reset`.
    ///
    /// Returns `false` for any other target, with no side effect.  A valve
    /// latched in `Fault` ignores the command unless `force` is set, but
    /// still returns `true` (accepted-but-no-op keeps callers simple).
    pub fn set_state(&mut self, target: ValveState, force: bool) -> bool {
        if !matches!(target, ValveState::Open | ValveState::Closed | ValveState::Reset) {
            return false;
        }

        if self.state != ValveState::Fault || force {
            match target {
                ValveState::Open => {
                    self.close_relay.set_state(false);
                    self.open_relay.set_state(true);
                    if self.state != ValveState::Open {
                        if self.state != ValveState::Opening {
                            self.changed_at = self.clock.now();
                        }
                        self.state = ValveState::Opening;
                    }
                }
                ValveState::Closed => {
                    self.open_relay.set_state(false);
                    self.close_relay.set_state(true);
                    if self.state != ValveState::Closed {
                        if self.state != ValveState::Closing {
                            self.changed_at = self.clock.now();
                        }
                        self.state = ValveState::Closing;
                    }
                }
                ValveState::Reset => {
                    self.close_relay.set_state(false);
                    self.open_relay.set_state(false);
                    self.state = ValveState::Reset;
                }
                _ => unreachable!(),
            }

            // Releasing one relay can instantaneously satisfy an end stop.
            self.refresh_from_switches();
        }

        true
    }

    /// Refresh the position from the end-stop switches, then check the
    /// travel timer on a valve still in motion.
    pub fn poll(&mut self) {
        self.refresh_from_switches();

        if matches!(self.state, ValveState::Opening | ValveState::Closing)
            && self.clock.now() - self.changed_at > self.timeout
        {
            if self.open_switch.is_some() {
                // Feedback present but the end stop never tripped.
                error!("Valve {} {} timeout", self.id, self.state);
                self.state = ValveState::Fault;
            } else {
                // Open-loop motor: travel time is the only feedback there is.
                self.state = if self.state == ValveState::Opening {
                    ValveState::Open
                } else {
                    ValveState::Closed
                };
            }
        }
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn refresh_from_switches(&mut self) {
        let (open_st, close_st) = match (self.open_switch.as_mut(), self.close_switch.as_mut()) {
            (Some(open), Some(close)) => (open.poll(), close.poll()),
            _ => return,
        };

        if open_st == SwitchState::Fault {
            self.report_fault("open sensor fault");
        } else if close_st == SwitchState::Fault {
            self.report_fault("close sensor fault");
        } else if open_st == SwitchState::On && close_st == SwitchState::On {
            // Contradictory reading, likely an electronics defect.
            self.report_fault("reports both open and closed");
        } else if open_st == SwitchState::On && self.state == ValveState::Opening {
            self.state = ValveState::Open;
        } else if close_st == SwitchState::On && self.state == ValveState::Closing {
            self.state = ValveState::Closed;
        }
    }

    fn report_fault(&mut self, what: &str) {
        // Log once on entry, not on every poll while faulted.
        if self.state != ValveState::Fault {
            self.state = ValveState::Fault;
            error!("Valve {} {}", self.id, what);
        }
    }
}
