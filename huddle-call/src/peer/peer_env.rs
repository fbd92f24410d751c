use crate::config::CallConfig;
use crate::media::LocalTrack;
use crate::peer::{ConnectionEvent, ConnectionFactory, MediaFlags, TimerSink};
use crate::transport::SignalingTransport;
use huddle_core::ParticipantId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a peer state machine needs from its call session.
pub struct PeerEnv {
    pub local: ParticipantId,
    pub transport: Arc<dyn SignalingTransport>,
    pub factory: Arc<dyn ConnectionFactory>,
    pub events: mpsc::UnboundedSender<ConnectionEvent>,
    pub timers: TimerSink,
    pub config: Arc<CallConfig>,
    /// Tracks attached to each connection when it is created.
    pub outgoing_tracks: Vec<Arc<LocalTrack>>,
    /// Local mute flags, announced to each peer once it connects.
    pub local_media: MediaFlags,
    /// Set while the relay link is down; no timers fire transitions then.
    pub paused: bool,
}
