//! Sender half of the reliable delivery pair.

use std::any::Any;
use std::time::Duration;

use serde::Serialize;

use crate::config::ProtocolConfig;
use crate::error::{SimError, SimResult};
use crate::events::TimerHandle;
use crate::module::{ModuleEvent, SimModule};
use crate::protocol::messages::{Ack, DataMessage, Unit};
use crate::sim::ModuleContext;

/// Counters exposed by a sender for inspection and invariant checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Transmission attempts handed to the channel, retransmissions
    /// included.
    pub data_sent: u64,
    /// Attempts beyond the first per message.
    pub retransmits: u64,
    /// Acknowledgements accepted (one per message).
    pub acks_accepted: u64,
    /// Acknowledgements ignored as stale duplicates.
    pub stale_acks: u64,
    /// Highest sequence number acknowledged so far (0 before the first).
    pub last_acked_seq: u64,
}

/// Timeout-driven stop-and-wait sender.
///
/// Holds at most one outstanding message; its state is always exactly one
/// of {nothing outstanding, one outstanding message with an armed timer}.
/// On timeout the stored message is re-sent unchanged and the timer rearmed:
/// fixed timeout, unbounded retries, no backoff. The sender advances to the
/// next sequence number only when the outstanding message is acknowledged.
pub struct StopAndWaitSender {
    timeout: Duration,
    auto_start: bool,
    message_limit: Option<u64>,
    next_seq: u64,
    outstanding: Option<DataMessage>,
    timer: Option<TimerHandle>,
    stats: SenderStats,
}

impl StopAndWaitSender {
    /// Creates a sender from a protocol configuration.
    ///
    /// Uses `timeout`, `auto_start` and `message_limit`; the loss
    /// probability belongs to the receiver.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            timeout: config.timeout,
            auto_start: config.auto_start,
            message_limit: config.message_limit,
            next_seq: 1,
            outstanding: None,
            timer: None,
            stats: SenderStats::default(),
        }
    }

    /// Returns the sender's counters.
    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Returns the sequence number of the outstanding message, if any.
    pub fn outstanding_seq(&self) -> Option<u64> {
        self.outstanding.as_ref().map(|msg| msg.seq)
    }

    /// Returns `true` if the retransmission timer is currently armed.
    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    fn send_next(&mut self, ctx: &mut ModuleContext<'_, Unit>) -> SimResult<()> {
        let msg = DataMessage { seq: self.next_seq };
        self.next_seq += 1;

        tracing::debug!(seq = msg.seq, "sending data message");
        ctx.send(Unit::Data(msg.clone()))?;
        self.timer = Some(ctx.arm_timer(self.timeout)?);
        self.outstanding = Some(msg);
        self.stats.data_sent += 1;
        Ok(())
    }

    fn on_timeout(&mut self, ctx: &mut ModuleContext<'_, Unit>) -> SimResult<()> {
        // The handle was consumed by firing; the kernel never delivers a
        // cancelled or superseded one, so an outstanding message must exist.
        self.timer = None;
        let msg = self.outstanding.clone().ok_or_else(|| {
            SimError::ContractViolation(
                "retransmission timer fired with no outstanding message".to_string(),
            )
        })?;

        tracing::debug!(seq = msg.seq, "timeout, retransmitting");
        ctx.send(Unit::Data(msg))?;
        self.timer = Some(ctx.arm_timer(self.timeout)?);
        self.stats.data_sent += 1;
        self.stats.retransmits += 1;
        Ok(())
    }

    fn on_ack(&mut self, ctx: &mut ModuleContext<'_, Unit>, ack: Ack) -> SimResult<()> {
        match self.outstanding.as_ref() {
            Some(outstanding) if ack.seq == outstanding.seq => {
                tracing::debug!(seq = ack.seq, "acknowledged");
                if let Some(handle) = self.timer.take() {
                    ctx.cancel_timer(handle);
                }
                self.outstanding = None;
                self.stats.acks_accepted += 1;
                self.stats.last_acked_seq = ack.seq;

                let limit_reached = self
                    .message_limit
                    .is_some_and(|limit| self.stats.acks_accepted >= limit);
                if limit_reached {
                    tracing::debug!(
                        acked = self.stats.acks_accepted,
                        "message limit reached, going idle"
                    );
                } else {
                    self.send_next(ctx)?;
                }
                Ok(())
            }
            Some(outstanding) if ack.seq < outstanding.seq => {
                tracing::debug!(
                    seq = ack.seq,
                    outstanding = outstanding.seq,
                    "ignoring stale acknowledgement"
                );
                self.stats.stale_acks += 1;
                Ok(())
            }
            Some(outstanding) => Err(SimError::ContractViolation(format!(
                "ack for seq {} ahead of outstanding seq {}",
                ack.seq, outstanding.seq
            ))),
            None => {
                // Idle after the message limit: duplicates of an already
                // acknowledged message are stale; anything else was never
                // sent.
                if ack.seq < self.next_seq {
                    tracing::debug!(seq = ack.seq, "ignoring stale acknowledgement while idle");
                    self.stats.stale_acks += 1;
                    Ok(())
                } else {
                    Err(SimError::ContractViolation(format!(
                        "ack for seq {} which was never sent",
                        ack.seq
                    )))
                }
            }
        }
    }
}

impl SimModule<Unit> for StopAndWaitSender {
    fn initialize(&mut self, ctx: &mut ModuleContext<'_, Unit>) -> SimResult<()> {
        if self.auto_start {
            self.send_next(ctx)?;
        }
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, Unit>,
        event: ModuleEvent<Unit>,
    ) -> SimResult<()> {
        match event {
            ModuleEvent::TimerFired(handle) => {
                if self.timer != Some(handle) {
                    return Err(SimError::UnexpectedEvent {
                        module: ctx.me(),
                        detail: format!(
                            "timer {handle:?} fired but is not the armed retransmission timer"
                        ),
                    });
                }
                self.on_timeout(ctx)
            }
            ModuleEvent::UnitArrived(Unit::Ack(ack)) => self.on_ack(ctx, ack),
            ModuleEvent::UnitArrived(Unit::Data(msg)) => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("data unit seq {} arrived at a sender", msg.seq),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
