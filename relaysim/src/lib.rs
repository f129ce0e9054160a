//! # relaysim
//!
//! A deterministic discrete-event simulator for message-relay protocols.
//!
//! The substrate is small and fixed: a logical clock, a time-ordered event
//! queue with deterministic tie-breaks, modules with run-to-completion
//! handlers, a single-shot timer per module, and a best-effort channel with
//! sampled latency. On top of it sit two kinds of workload:
//!
//! - simple relay modules ([`relay`]): bounce, count down, delay, fan out;
//! - the reliable delivery pair ([`protocol`]): a stop-and-wait sender that
//!   retransmits on timeout and a receiver that simulates packet loss and
//!   acknowledges what survives.
//!
//! Every source of randomness is injected and seeded, so any run can be
//! replayed exactly.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Configuration for the channel and the delivery protocol.
pub mod config;
/// Error types and result alias.
pub mod error;
/// Event scheduling primitives.
pub mod events;
/// Module trait and inbound event types.
pub mod module;
/// The reliable stop-and-wait delivery pair.
pub mod protocol;
/// Simple relay modules.
pub mod relay;
/// Injected deterministic randomness.
pub mod rng;
/// The simulation world and event dispatch.
pub mod sim;

pub use config::{sample_duration, NetworkConfig, ProtocolConfig};
pub use error::{SimError, SimResult};
pub use events::{Event, EventQueue, ScheduledEvent, TimerHandle};
pub use module::{ModuleEvent, ModuleId, SimModule};
pub use protocol::{Ack, DataMessage, LossyReceiver, ReceiverStats, SenderStats,
    StopAndWaitSender, Unit};
pub use relay::{Bouncer, CountingRelay, DelayedRelay, RandomFanout};
pub use rng::{RandomSource, SimRng};
pub use sim::{ModuleContext, SimWorld};
