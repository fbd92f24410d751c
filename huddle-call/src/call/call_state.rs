use crate::error::MediaError;
use crate::media::LocalMediaState;
use crate::peer::{NegotiationState, PeerConnection, Role};
use huddle_core::{ParticipantId, RoomId};
use std::collections::{BTreeMap, BTreeSet};

/// Coarse connection status shown per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// Negotiation failed and a restart is scheduled.
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerStatus {
    pub role: Role,
    pub negotiation: NegotiationState,
    pub connection: ConnectionState,
    pub generation: u32,
    pub remote_audio: bool,
    pub remote_video: bool,
}

impl From<&PeerConnection> for PeerStatus {
    fn from(peer: &PeerConnection) -> Self {
        let connection = match peer.state() {
            NegotiationState::Connected => ConnectionState::Connected,
            NegotiationState::Failed => ConnectionState::Reconnecting,
            _ => ConnectionState::Connecting,
        };
        let media = peer.remote_media();
        Self {
            role: peer.role(),
            negotiation: peer.state(),
            connection,
            generation: peer.generation(),
            remote_audio: media.audio,
            remote_video: media.video,
        }
    }
}

/// Why a call ended without the user leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFailure {
    /// The relay link stayed down longer than the reconnect window.
    TransportLost,
}

/// Everything the UI renders for the current call.
#[derive(Debug, Clone, Default)]
pub struct CallState {
    pub room: Option<RoomId>,
    pub connection_by_participant: BTreeMap<ParticipantId, PeerStatus>,
    pub local_media: LocalMediaState,
    /// Roster members whose connection gave up. Retried only after they
    /// leave and rejoin.
    pub unreachable: BTreeSet<ParticipantId>,
    pub error: Option<CallFailure>,
    pub media_error: Option<MediaError>,
}

impl CallState {
    pub fn is_active(&self) -> bool {
        self.room.is_some()
    }

    pub fn status(&self, participant: &ParticipantId) -> Option<&PeerStatus> {
        self.connection_by_participant.get(participant)
    }

    pub fn connected(&self) -> impl Iterator<Item = &ParticipantId> {
        self.connection_by_participant
            .iter()
            .filter(|(_, status)| status.connection == ConnectionState::Connected)
            .map(|(id, _)| id)
    }
}
