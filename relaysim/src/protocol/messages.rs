//! Unit types exchanged by the reliable delivery pair.

/// An application data unit.
///
/// The sequence number is monotonically increasing, starts at 1, and is
/// unique per sender instance. Cloning a stored message is how the sender
/// produces the independent copy handed to the channel on each transmission
/// attempt; the original never leaves the sender, so retransmission never
/// reconstructs a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    /// Sequence number of this message.
    pub seq: u64,
}

/// An acknowledgement unit.
///
/// Carries the sequence number of the data unit it confirms so the sender
/// can tell an acknowledgement for its outstanding message apart from a
/// stale one that survived in flight past a retransmission. This is the
/// strict variant: an earlier rendition of this protocol used an empty
/// marker ack, which misattributes a late ack to whatever message is
/// current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Sequence number being acknowledged.
    pub seq: u64,
}

/// The unit type carried by the channel between the delivery pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// An application data unit, sender to receiver.
    Data(DataMessage),
    /// An acknowledgement, receiver to sender.
    Ack(Ack),
}
