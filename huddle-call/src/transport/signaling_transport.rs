use crate::error::TransportError;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use huddle_core::{ParticipantId, RoomId, SignalingEnvelope};
use tokio::sync::mpsc;

/// Room-scoped, ordered relay the call session signals through.
///
/// One instance serves one local participant. Inbound roster snapshots and
/// envelopes arrive on the receiver handed out by `join_room`, in the order
/// the relay delivered them.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn join_room(
        &self,
        room: &RoomId,
        local: ParticipantId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    async fn send(
        &self,
        target: ParticipantId,
        envelope: SignalingEnvelope,
    ) -> Result<(), TransportError>;

    /// Unsubscribes and tells the roster the local participant left.
    async fn leave_room(&self) -> Result<(), TransportError>;
}
