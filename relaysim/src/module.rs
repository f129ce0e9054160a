//! Module abstraction: the unit of behavior the kernel dispatches events to.
//!
//! A module is single-owner of its own state. The kernel delivers one event
//! at a time and the handler runs to completion; "waiting" is always
//! expressed by arming a timer or expecting a future delivery, never by
//! blocking.

use std::any::Any;
use std::fmt;

use crate::error::SimResult;
use crate::events::TimerHandle;
use crate::sim::ModuleContext;

/// Identifier of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// Returns the raw index of this module in the registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An inbound event as seen by a module handler.
///
/// The kind is an explicit tag carried on the event: a handler never infers
/// "is this my timer or a reply" from object identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent<M> {
    /// A unit delivered by the channel.
    UnitArrived(M),
    /// The firing of a timer this module armed, identified by its handle.
    TimerFired(TimerHandle),
}

/// Behavior of a simulated module.
///
/// Handlers are synchronous and run to completion; the context is the only
/// door back into the kernel (sending units, arming and cancelling timers).
/// Returning an error halts the run: errors model invariant violations, not
/// recoverable conditions.
pub trait SimModule<M> {
    /// Called once before the first event is processed.
    ///
    /// Modules that bootstrap the simulation (an auto-starting sender, a
    /// relay seeding the first bounce) emit their initial unit here.
    fn initialize(&mut self, ctx: &mut ModuleContext<'_, M>) -> SimResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called for each event delivered to this module.
    fn handle_event(&mut self, ctx: &mut ModuleContext<'_, M>, event: ModuleEvent<M>)
        -> SimResult<()>;

    /// Returns `self` for typed post-run inspection.
    fn as_any(&self) -> &dyn Any;
}
