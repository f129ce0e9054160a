//! Reliable stop-and-wait delivery over an unreliable channel.
//!
//! The pair layered on the substrate: a [`StopAndWaitSender`] that keeps one
//! message outstanding and retransmits on timeout, and a [`LossyReceiver`]
//! that probabilistically discards arrivals and acknowledges the rest. All
//! reliability comes from this layer; the channel underneath guarantees
//! nothing.
//!
//! Wiring: sender gate 0 -> receiver, receiver gate 0 -> sender.

mod messages;
mod receiver;
mod sender;

pub use messages::{Ack, DataMessage, Unit};
pub use receiver::{LossyReceiver, ReceiverStats};
pub use sender::{SenderStats, StopAndWaitSender};
