//! Core simulation world and event dispatch.
//!
//! `SimWorld` owns the logical clock, the event queue, the registered
//! modules and the wiring between them. Scheduling is single-threaded and
//! cooperative: one event is popped, time advances to its timestamp, and the
//! target module's handler runs to completion before the next event is
//! touched. For a given seed and topology a run is fully deterministic.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use crate::{
    config::{sample_duration, NetworkConfig},
    error::{SimError, SimResult},
    events::{Event, EventQueue, ScheduledEvent, TimerHandle},
    module::{ModuleEvent, ModuleId, SimModule},
    rng::SimRng,
};

struct SimInner<M> {
    current_time: Duration,
    queue: EventQueue<M>,
    next_sequence: u64,

    // Timer facility: at most one armed handle per module. The map doubles
    // as the tombstone store: a popped timer event whose handle no longer
    // matches its owner's entry was cancelled or superseded and is dropped.
    next_timer_id: u64,
    armed: HashMap<ModuleId, TimerHandle>,

    // Out-gates per module, indexed by module id.
    gates: Vec<Vec<ModuleId>>,

    network: NetworkConfig,
    rng: SimRng,
    events_processed: u64,
}

impl<M> SimInner<M> {
    fn new(network: NetworkConfig, seed: u64) -> Self {
        Self {
            current_time: Duration::ZERO,
            queue: EventQueue::new(),
            next_sequence: 0,
            next_timer_id: 0,
            armed: HashMap::new(),
            gates: Vec::new(),
            network,
            rng: SimRng::new(seed),
            events_processed: 0,
        }
    }

    fn schedule_at(&mut self, time: Duration, event: Event<M>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.schedule(ScheduledEvent::new(time, event, sequence));
    }
}

/// Handler-side facade over the kernel.
///
/// A context is handed to a module for the duration of one callback; it is
/// the only way a module reaches the channel and the timer facility.
pub struct ModuleContext<'a, M> {
    inner: &'a Rc<RefCell<SimInner<M>>>,
    me: ModuleId,
}

impl<M> ModuleContext<'_, M> {
    /// Returns the current simulation time.
    pub fn now(&self) -> Duration {
        self.inner.borrow().current_time
    }

    /// Returns the id of the module this context belongs to.
    pub fn me(&self) -> ModuleId {
        self.me
    }

    /// Returns how many out-gates this module has been wired with.
    pub fn gate_count(&self) -> usize {
        self.inner.borrow().gates[self.me.0].len()
    }

    /// Sends a unit through this module's first out-gate.
    ///
    /// Best-effort and asynchronous: the unit is delivered after a latency
    /// sampled independently per send, with no ordering guarantee relative
    /// to other in-flight units.
    pub fn send(&mut self, unit: M) -> SimResult<()> {
        self.send_via(0, unit)
    }

    /// Sends a unit through the out-gate at index `gate`.
    pub fn send_via(&mut self, gate: usize, unit: M) -> SimResult<()> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let dst = *inner
            .gates
            .get(self.me.0)
            .and_then(|gates| gates.get(gate))
            .ok_or(SimError::NoSuchGate {
                module: self.me,
                gate,
            })?;

        let latency = sample_duration(&inner.network.delivery_latency, &mut inner.rng);
        let at = inner.current_time + latency;
        tracing::trace!(from = %self.me, to = %dst, ?latency, "unit handed to channel");
        inner.schedule_at(at, Event::Delivery { dst, unit });
        Ok(())
    }

    /// Arms this module's timer to fire after `duration`.
    ///
    /// At most one timer may be armed per module; arming while already armed
    /// is a contract violation, not a rearm.
    pub fn arm_timer(&mut self, duration: Duration) -> SimResult<TimerHandle> {
        let mut inner = self.inner.borrow_mut();
        if inner.armed.contains_key(&self.me) {
            return Err(SimError::TimerAlreadyArmed { owner: self.me });
        }

        let handle = TimerHandle(inner.next_timer_id);
        inner.next_timer_id += 1;
        inner.armed.insert(self.me, handle);

        let at = inner.current_time + duration;
        inner.schedule_at(
            at,
            Event::TimerFired {
                owner: self.me,
                handle,
            },
        );
        tracing::trace!(owner = %self.me, ?handle, ?duration, "timer armed");
        Ok(handle)
    }

    /// Cancels a pending timer.
    ///
    /// Guaranteed: a cancelled timer never delivers its firing. No-op-safe
    /// if the handle already fired or was superseded.
    pub fn cancel_timer(&mut self, handle: TimerHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.armed.get(&self.me) == Some(&handle) {
            inner.armed.remove(&self.me);
            tracing::trace!(owner = %self.me, ?handle, "timer cancelled");
        }
    }
}

/// The central simulation coordinator.
///
/// Owns all mutable simulation state; modules are registered with
/// [`SimWorld::add_module`], wired with [`SimWorld::connect`], and driven by
/// [`SimWorld::step`] or the `run_*` loops.
pub struct SimWorld<M> {
    inner: Rc<RefCell<SimInner<M>>>,
    modules: Vec<Box<dyn SimModule<M>>>,
    names: Vec<String>,
    initialized: usize,
}

impl<M: 'static> SimWorld<M> {
    /// Creates a world with default channel configuration and seed 0.
    pub fn new() -> Self {
        Self::new_with_config_and_seed(NetworkConfig::default(), 0)
    }

    /// Creates a world with default channel configuration and the given
    /// seed for deterministic randomness.
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_with_config_and_seed(NetworkConfig::default(), seed)
    }

    /// Creates a world with a custom channel configuration and seed 0.
    pub fn new_with_config(network: NetworkConfig) -> Self {
        Self::new_with_config_and_seed(network, 0)
    }

    /// Creates a world with both a custom channel configuration and a seed.
    pub fn new_with_config_and_seed(network: NetworkConfig, seed: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SimInner::new(network, seed))),
            modules: Vec::new(),
            names: Vec::new(),
            initialized: 0,
        }
    }

    /// Registers a module and returns its id.
    pub fn add_module(
        &mut self,
        name: impl Into<String>,
        module: Box<dyn SimModule<M>>,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.modules.push(module);
        self.names.push(name.into());
        self.inner.borrow_mut().gates.push(Vec::new());
        id
    }

    /// Wires an out-gate from `from` to `to`.
    ///
    /// Gates are indexed in wiring order; a module's first `connect` becomes
    /// gate 0 (the default gate for [`ModuleContext::send`]).
    pub fn connect(&mut self, from: ModuleId, to: ModuleId) -> SimResult<()> {
        let mut inner = self.inner.borrow_mut();
        if to.0 >= inner.gates.len() {
            return Err(SimError::ModuleNotFound(to));
        }
        let gates = inner
            .gates
            .get_mut(from.0)
            .ok_or(SimError::ModuleNotFound(from))?;
        gates.push(to);
        Ok(())
    }

    /// Runs `initialize` for every module that has not been initialized yet.
    ///
    /// Called implicitly by the `run_*` loops; idempotent.
    pub fn initialize(&mut self) -> SimResult<()> {
        while self.initialized < self.modules.len() {
            let idx = self.initialized;
            self.initialized += 1;
            tracing::debug!(module = %self.names[idx], "initializing");
            let mut ctx = ModuleContext {
                inner: &self.inner,
                me: ModuleId(idx),
            };
            self.modules[idx].initialize(&mut ctx)?;
        }
        Ok(())
    }

    /// Processes the next scheduled event and advances time.
    ///
    /// Returns `true` if more events remain afterwards. Cancelled timer
    /// firings are consumed here and never reach a module.
    pub fn step(&mut self) -> SimResult<bool> {
        let scheduled = {
            let mut inner = self.inner.borrow_mut();
            match inner.queue.pop_earliest() {
                Some(scheduled) => {
                    // Advance logical time to the event timestamp.
                    inner.current_time = scheduled.time();
                    inner.events_processed += 1;
                    Some(scheduled)
                }
                None => None,
            }
        };

        let Some(scheduled) = scheduled else {
            return Ok(false);
        };

        match scheduled.into_event() {
            Event::Delivery { dst, unit } => {
                tracing::trace!(to = %dst, "delivering unit");
                self.dispatch(dst, ModuleEvent::UnitArrived(unit))?;
            }
            Event::TimerFired { owner, handle } => {
                let live = {
                    let mut inner = self.inner.borrow_mut();
                    if inner.armed.get(&owner) == Some(&handle) {
                        // Firing consumes the armed entry; the owner may
                        // rearm from inside its handler.
                        inner.armed.remove(&owner);
                        true
                    } else {
                        false
                    }
                };
                if live {
                    tracing::trace!(owner = %owner, ?handle, "timer fired");
                    self.dispatch(owner, ModuleEvent::TimerFired(handle))?;
                } else {
                    tracing::trace!(owner = %owner, ?handle, "discarding cancelled timer");
                }
            }
        }

        Ok(!self.inner.borrow().queue.is_empty())
    }

    fn dispatch(&mut self, target: ModuleId, event: ModuleEvent<M>) -> SimResult<()> {
        let module = self
            .modules
            .get_mut(target.0)
            .ok_or(SimError::ModuleNotFound(target))?;
        let mut ctx = ModuleContext {
            inner: &self.inner,
            me: target,
        };
        module.handle_event(&mut ctx, event)
    }

    /// Initializes, then processes events until the queue drains.
    ///
    /// Suitable for workloads that terminate on their own (a counting relay
    /// reaching zero, a sender with a message limit). An unbounded sender
    /// never drains its queue; drive it with [`SimWorld::run_until`] instead.
    pub fn run_until_empty(&mut self) -> SimResult<()> {
        self.initialize()?;
        while self.step()? {}
        Ok(())
    }

    /// Initializes, then processes every event scheduled at or before
    /// `deadline`, leaving the clock at `deadline`.
    pub fn run_until(&mut self, deadline: Duration) -> SimResult<()> {
        self.initialize()?;
        loop {
            let due = {
                let inner = self.inner.borrow();
                matches!(inner.queue.peek_earliest(), Some(next) if next.time() <= deadline)
            };
            if !due {
                break;
            }
            self.step()?;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.current_time < deadline {
            inner.current_time = deadline;
        }
        Ok(())
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> Duration {
        self.inner.borrow().current_time
    }

    /// Returns `true` if there are events waiting to be processed.
    pub fn has_pending_events(&self) -> bool {
        !self.inner.borrow().queue.is_empty()
    }

    /// Returns the number of events waiting to be processed.
    pub fn pending_event_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Returns the number of events processed so far.
    pub fn events_processed(&self) -> u64 {
        self.inner.borrow().events_processed
    }

    /// Returns the registered name of a module.
    pub fn module_name(&self, id: ModuleId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    /// Typed access to a module's state, for inspection after (or between)
    /// runs.
    pub fn module<T: 'static>(&self, id: ModuleId) -> Option<&T> {
        self.modules.get(id.0)?.as_any().downcast_ref::<T>()
    }
}

impl<M: 'static> Default for SimWorld<M> {
    fn default() -> Self {
        Self::new()
    }
}
