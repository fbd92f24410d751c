mod media;
mod participant;
mod relay;
mod room;
mod roster;
mod signaling;

pub use media::MediaKind;
pub use participant::ParticipantId;
pub use relay::RelayFrame;
pub use room::RoomId;
pub use roster::RosterEvent;
pub use signaling::{IceCandidate, IceServerConfig, SignalingEnvelope, SignalingMessage};
