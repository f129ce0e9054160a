//! Error types for simulation and protocol operations.

use crate::module::ModuleId;
use thiserror::Error;

/// Errors raised by the simulation kernel and the modules running on it.
///
/// Recoverable conditions (a lost unit, a stale acknowledgement) are not
/// errors: they are handled inside the protocol's retry loop. Everything in
/// this enum is a programming or wiring defect and halts the run rather than
/// corrupting state silently.
#[derive(Debug, Error)]
pub enum SimError {
    /// An event targeted a module id that was never registered.
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),

    /// A module tried to arm its timer while one was already armed.
    ///
    /// At most one armed timer per module; callers must cancel or wait for
    /// the pending one first.
    #[error("module {owner} already has an armed timer")]
    TimerAlreadyArmed {
        /// The module that attempted the second arm.
        owner: ModuleId,
    },

    /// A module sent through a gate index it does not have.
    #[error("module {module} has no gate {gate}")]
    NoSuchGate {
        /// The sending module.
        module: ModuleId,
        /// The gate index that was out of range.
        gate: usize,
    },

    /// A module received an event it defines no behavior for.
    #[error("unexpected event for module {module}: {detail}")]
    UnexpectedEvent {
        /// The module the event was delivered to.
        module: ModuleId,
        /// What arrived and why it is invalid there.
        detail: String,
    },

    /// A protocol invariant was violated.
    #[error("protocol contract violated: {0}")]
    ContractViolation(String),
}

/// Result type alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
