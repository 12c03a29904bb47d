//! `proxisafe-kernel` – Risk & State
//!
//! The decision core of the monitor. It does not look at pixels; it turns a
//! sensor snapshot and a distance into a risk score and an operational state.
//!
//! # Modules
//!
//! - [`risk`] – [`compute_risk`][risk::compute_risk]: weighted fusion of the
//!   normalised sensor readings and marker proximity into a score in `[0, 1]`.
//! - [`state_machine`] – [`SafetyStateMachine`][state_machine::SafetyStateMachine]:
//!   two-threshold hysteresis that maps risk onto
//!   [`OperationalState`][proxisafe_types::OperationalState].
//! - [`advisor`] – operator suggestions for the current risk band.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat tracking for
//!   the background loops so a stalled pipeline is visible to operators.

pub mod advisor;
pub mod risk;
pub mod state_machine;
pub mod watchdog;

pub use advisor::suggestions;
pub use risk::{RISK_CRITICAL, RISK_WARNING, RiskBand, compute_risk};
pub use state_machine::{SafetyStateMachine, Transition, next_state};
pub use watchdog::{ComponentHealth, Watchdog};
