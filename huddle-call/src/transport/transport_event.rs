use huddle_core::{RosterEvent, SignalingEnvelope};

/// What a joined transport delivers to the call session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Fresh full roster of the room.
    Roster(RosterEvent),

    /// Negotiation traffic addressed to the local participant.
    Signal(SignalingEnvelope),

    /// The relay link dropped. Nothing is delivered until `Reconnected`.
    Disconnected,

    /// The relay link came back; a roster snapshot follows.
    Reconnected,
}
