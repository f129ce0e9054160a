//! Configuration for the simulated channel and the delivery protocol.

use std::ops::Range;
use std::time::Duration;

use crate::rng::RandomSource;

/// Configuration for the simulated channel.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Latency range applied to each unit handed to the channel.
    ///
    /// Every send samples independently, so nothing orders two in-flight
    /// units relative to each other; any reliability sits in the protocol
    /// layered on top.
    pub delivery_latency: Range<Duration>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Zero latency: replies land at the same instant they are sent,
        // which keeps simple scenarios exact (ack at t=0, resend at t=1.0).
        Self {
            delivery_latency: Duration::ZERO..Duration::ZERO,
        }
    }
}

impl NetworkConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A LAN-flavored latency range for less synthetic runs.
    pub fn lan() -> Self {
        Self {
            delivery_latency: Duration::from_micros(100)..Duration::from_millis(2),
        }
    }
}

/// Sample a random duration from a range.
///
/// An empty range (start >= end) yields the start value without consuming
/// randomness, so zero-latency configurations stay draw-for-draw identical
/// across runs that differ only in channel latency.
pub fn sample_duration<R: RandomSource>(range: &Range<Duration>, rng: &mut R) -> Duration {
    let start_nanos = range.start.as_nanos() as u64;
    let end_nanos = range.end.as_nanos() as u64;
    if start_nanos >= end_nanos {
        return range.start;
    }
    Duration::from_nanos(rng.random_range_u64(start_nanos..end_nanos))
}

/// Configuration for the reliable delivery pair.
///
/// These are the read-only inputs the hosting code supplies; the protocol
/// never mutates them at runtime.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Retransmission timeout: how long the sender waits for an
    /// acknowledgement before re-emitting the stored message.
    pub timeout: Duration,
    /// Probability in `[0.0, 1.0]` that the receiver discards an arriving
    /// data unit.
    pub loss_probability: f64,
    /// Whether the sender emits its first message at initialization.
    pub auto_start: bool,
    /// Number of messages to push before going idle; `None` sends forever.
    ///
    /// This bounds messages, not retransmission attempts: any single
    /// message is retried without limit until acknowledged.
    pub message_limit: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            loss_probability: 0.1,
            auto_start: true,
            message_limit: None,
        }
    }
}
