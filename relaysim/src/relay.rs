//! Simple relay modules.
//!
//! The undemanding end of the tutorial spectrum: each of these does one
//! small thing to an arriving unit (bounce it, count it down, hold it,
//! scatter it) with no contract beyond decrement-and-forward-or-drop. They
//! exist to exercise the substrate and to seed workloads for the delivery
//! pair's channel.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::error::{SimError, SimResult};
use crate::events::TimerHandle;
use crate::module::{ModuleEvent, SimModule};
use crate::rng::RandomSource;
use crate::sim::ModuleContext;

/// Returns every arriving unit through gate 0.
///
/// Two bouncers wired at each other exchange a unit forever; bound such a
/// run with [`crate::SimWorld::run_until`].
pub struct Bouncer;

impl<M: 'static> SimModule<M> for Bouncer {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, M>,
        event: ModuleEvent<M>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(unit) => ctx.send(unit),
            ModuleEvent::TimerFired(handle) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("timer {handle:?} fired for a bouncer, which arms none"),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decrements a counter per arrival and forwards until it reaches zero.
///
/// At zero the arriving unit is dropped and the bounce ends. Construct with
/// [`CountingRelay::with_initial`] on one side to seed the first unit at
/// initialization.
pub struct CountingRelay<M> {
    remaining: u64,
    initial: Option<M>,
}

impl<M> CountingRelay<M> {
    /// Creates a relay that forwards until `limit` arrivals have been seen.
    pub fn new(limit: u64) -> Self {
        Self {
            remaining: limit,
            initial: None,
        }
    }

    /// Creates a relay that additionally emits `unit` at initialization to
    /// bootstrap the exchange.
    pub fn with_initial(limit: u64, unit: M) -> Self {
        Self {
            remaining: limit,
            initial: Some(unit),
        }
    }

    /// Arrivals still to be forwarded before this relay stops.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<M: fmt::Debug + 'static> SimModule<M> for CountingRelay<M> {
    fn initialize(&mut self, ctx: &mut ModuleContext<'_, M>) -> SimResult<()> {
        if let Some(unit) = self.initial.take() {
            tracing::debug!("sending initial unit");
            ctx.send(unit)?;
        }
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, M>,
        event: ModuleEvent<M>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(unit) => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    tracing::debug!(?unit, "counter reached zero, dropping unit");
                    Ok(())
                } else {
                    tracing::debug!(remaining = self.remaining, "forwarding unit");
                    ctx.send(unit)
                }
            }
            ModuleEvent::TimerFired(handle) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("timer {handle:?} fired for a counting relay, which arms none"),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Holds each arriving unit for a fixed processing delay before forwarding.
///
/// The delay is modeled as a self-scheduled timer, never a blocking wait.
/// Units arriving while one is held queue up and leave in FIFO order, one
/// delay apart.
pub struct DelayedRelay<M> {
    delay: Duration,
    pending: VecDeque<M>,
    timer: Option<TimerHandle>,
}

impl<M> DelayedRelay<M> {
    /// Creates a relay with the given per-unit processing delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: VecDeque::new(),
            timer: None,
        }
    }

    /// Units currently held waiting for their delay to elapse.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }
}

impl<M: 'static> SimModule<M> for DelayedRelay<M> {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, M>,
        event: ModuleEvent<M>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(unit) => {
                self.pending.push_back(unit);
                if self.timer.is_none() {
                    self.timer = Some(ctx.arm_timer(self.delay)?);
                }
                Ok(())
            }
            ModuleEvent::TimerFired(handle) => {
                if self.timer != Some(handle) {
                    return Err(SimError::UnexpectedEvent {
                        module: ctx.me(),
                        detail: format!("timer {handle:?} is not the armed processing timer"),
                    });
                }
                self.timer = None;
                let unit = self.pending.pop_front().ok_or_else(|| {
                    SimError::ContractViolation(
                        "processing timer fired with nothing queued".to_string(),
                    )
                })?;
                ctx.send(unit)?;
                if !self.pending.is_empty() {
                    self.timer = Some(ctx.arm_timer(self.delay)?);
                }
                Ok(())
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Forwards each arriving unit to one randomly chosen out-gate.
///
/// The choice is drawn from an injected random source, so fan-out patterns
/// replay exactly under a fixed seed.
pub struct RandomFanout<R> {
    rng: R,
}

impl<R: RandomSource> RandomFanout<R> {
    /// Creates a fan-out relay with its own injected random source.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<M: 'static, R: RandomSource + 'static> SimModule<M> for RandomFanout<R> {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, M>,
        event: ModuleEvent<M>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(unit) => {
                let gates = ctx.gate_count();
                if gates == 0 {
                    return Err(SimError::NoSuchGate {
                        module: ctx.me(),
                        gate: 0,
                    });
                }
                let gate = self.rng.choice_index(gates);
                tracing::debug!(gate, "forwarding unit to random neighbor");
                ctx.send_via(gate, unit)
            }
            ModuleEvent::TimerFired(handle) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("timer {handle:?} fired for a fan-out relay, which arms none"),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
