use crate::media::LocalTrack;
use anyhow::Result;
use async_trait::async_trait;
use huddle_core::{IceCandidate, MediaKind, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Callbacks of a native connection, turned into mailbox messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// A local ICE candidate was gathered and should be trickled to the remote.
    LocalCandidate(IceCandidate),
    /// ICE connected; media flows.
    Connected,
    Disconnected,
    Failed,
    RemoteTrack(MediaKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub remote: ParticipantId,
    /// Identifies which connection entry produced the event.
    pub instance: Uuid,
    pub event: NativeEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackReplacement {
    /// The existing sender now carries the new track.
    InPlace,
    /// A sender was added; the pair must renegotiate for it to take effect.
    RenegotiationRequired,
}

/// One native peer-to-peer media connection.
#[async_trait]
pub trait NativeConnection: Send + Sync {
    async fn attach_tracks(&self, tracks: &[Arc<LocalTrack>]) -> Result<()>;

    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self, ice_restart: bool) -> Result<String>;

    /// Creates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn replace_video_track(&self, track: Option<Arc<LocalTrack>>) -> Result<TrackReplacement>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<()>;
}

/// Builds native connections. Events of the new connection go to `events`.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        local: ParticipantId,
        remote: ParticipantId,
        instance: Uuid,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Arc<dyn NativeConnection>>;

    /// Forgets any per-track state kept for the local track `track_id`.
    fn release_track(&self, _track_id: &str) {}
}
