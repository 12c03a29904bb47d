//! Hysteretic operational state machine.
//!
//! Two thresholds, evaluated once per tick:
//!
//! - `risk ≥ RISK_CRITICAL` → [`OperationalState::Stopped`], from any state;
//! - `risk < RISK_WARNING` → [`OperationalState::Running`], from any state;
//! - anything in between holds the current state.
//!
//! A stopped machine therefore stays stopped through the warning band until
//! risk falls below the lower threshold, and a running one keeps running
//! until the upper threshold is reached.

use proxisafe_types::OperationalState;
use tracing::info;

use crate::risk::{RISK_CRITICAL, RISK_WARNING};

/// Pure transition function.
pub fn next_state(current: OperationalState, risk: f64) -> OperationalState {
    if risk >= RISK_CRITICAL {
        OperationalState::Stopped
    } else if risk < RISK_WARNING {
        OperationalState::Running
    } else {
        current
    }
}

/// A state change produced by [`SafetyStateMachine::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: OperationalState,
    pub to: OperationalState,
    /// Score that caused the change.
    pub risk: f64,
}

/// Holds the current [`OperationalState`] between ticks.
///
/// # Example
///
/// ```
/// use proxisafe_kernel::state_machine::SafetyStateMachine;
/// use proxisafe_types::OperationalState;
///
/// let mut machine = SafetyStateMachine::default();
/// assert!(machine.evaluate(0.6).is_none());
/// let t = machine.evaluate(0.8).unwrap();
/// assert_eq!(t.to, OperationalState::Stopped);
/// assert!(machine.evaluate(0.6).is_none());
/// assert_eq!(machine.state(), OperationalState::Stopped);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SafetyStateMachine {
    state: OperationalState,
}

impl SafetyStateMachine {
    pub fn new(initial: OperationalState) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> OperationalState {
        self.state
    }

    /// Apply one risk sample. Returns the transition if the state changed.
    pub fn evaluate(&mut self, risk: f64) -> Option<Transition> {
        let from = self.state;
        let to = next_state(from, risk);
        if to == from {
            return None;
        }
        self.state = to;
        info!(%from, %to, risk, "operational state changed");
        Some(Transition { from, to, risk })
    }
}
