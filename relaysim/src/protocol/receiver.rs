//! Receiver half of the reliable delivery pair.

use std::any::Any;

use serde::Serialize;

use crate::error::{SimError, SimResult};
use crate::module::{ModuleEvent, SimModule};
use crate::protocol::messages::{Ack, Unit};
use crate::rng::RandomSource;
use crate::sim::ModuleContext;

/// Counters exposed by a receiver for inspection and invariant checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Data units that reached the receiver.
    pub arrivals: u64,
    /// Arrivals discarded by the loss draw.
    pub dropped: u64,
    /// Acknowledgements sent back.
    pub acks_sent: u64,
}

/// Receiver that simulates an unreliable link by discarding arrivals.
///
/// Each arriving data unit is judged independently with a fresh draw from
/// the injected random source: with probability `loss_probability` the unit
/// is dropped without a reply, otherwise an acknowledgement carrying the
/// unit's sequence number goes back out gate 0. No state is carried across
/// messages, so the receiver is trivially restartable and indifferent to
/// arrival reordering.
pub struct LossyReceiver<R> {
    loss_probability: f64,
    rng: R,
    stats: ReceiverStats,
}

impl<R: RandomSource> LossyReceiver<R> {
    /// Creates a receiver with the given loss probability and its own
    /// injected random source.
    pub fn new(loss_probability: f64, rng: R) -> Self {
        Self {
            loss_probability,
            rng,
            stats: ReceiverStats::default(),
        }
    }

    /// Returns the receiver's counters.
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

impl<R: RandomSource + 'static> SimModule<Unit> for LossyReceiver<R> {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, Unit>,
        event: ModuleEvent<Unit>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(Unit::Data(msg)) => {
                self.stats.arrivals += 1;
                if self.rng.random_ratio() < self.loss_probability {
                    tracing::debug!(seq = msg.seq, "message lost");
                    self.stats.dropped += 1;
                    return Ok(());
                }
                tracing::debug!(seq = msg.seq, "received, acknowledging");
                ctx.send(Unit::Ack(Ack { seq: msg.seq }))?;
                self.stats.acks_sent += 1;
                Ok(())
            }
            ModuleEvent::UnitArrived(Unit::Ack(ack)) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("ack for seq {} arrived at a receiver", ack.seq),
            }),
            ModuleEvent::TimerFired(handle) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("timer {handle:?} fired for a receiver, which arms none"),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
