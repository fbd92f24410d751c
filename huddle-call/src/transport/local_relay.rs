use crate::error::{ProtocolAnomaly, TransportError};
use crate::transport::{SignalingTransport, TransportEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::codec::{decode_frame, encode_frame};
use huddle_core::{ParticipantId, RelayFrame, RoomId, RosterEvent, SignalingEnvelope};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CLIENT_QUEUE: usize = 256;

struct Member {
    frames: mpsc::UnboundedSender<String>,
    linked: AtomicBool,
}

struct RelayInner {
    rooms: DashMap<RoomId, BTreeMap<ParticipantId, Arc<Member>>>,
    history: Mutex<Vec<SignalingEnvelope>>,
}

/// In-process room relay.
///
/// Frames travel as JSON text, the same shape a websocket relay would push,
/// and are delivered in send order per member.
#[derive(Clone)]
pub struct LocalRelay {
    inner: Arc<RelayInner>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A transport handle for one participant.
    pub fn client(&self) -> RelayClient {
        RelayClient {
            relay: self.clone(),
            joined: Mutex::new(None),
        }
    }

    pub fn roster(&self, room: &RoomId) -> RosterEvent {
        self.inner
            .rooms
            .get(room)
            .map(|members| RosterEvent::new(members.keys().copied()))
            .unwrap_or_default()
    }

    /// Every envelope the relay routed, in routing order.
    pub async fn history(&self) -> Vec<SignalingEnvelope> {
        self.inner.history.lock().await.clone()
    }

    /// Drops the link of `participant` in every room it is in. The member
    /// stays on the roster so it can come back.
    pub fn sever(&self, participant: &ParticipantId) {
        for room in self.inner.rooms.iter() {
            if let Some(member) = room.value().get(participant) {
                member.linked.store(false, Ordering::SeqCst);
                push(member, &RelayFrame::LinkLost);
            }
        }
    }

    pub fn restore(&self, participant: &ParticipantId) {
        for room in self.inner.rooms.iter() {
            if let Some(member) = room.value().get(participant) {
                member.linked.store(true, Ordering::SeqCst);
                push(member, &RelayFrame::LinkRestored);
                push(
                    member,
                    &RelayFrame::Roster(RosterEvent::new(room.value().keys().copied())),
                );
            }
        }
    }

    /// Pushes a raw text frame to one member, bypassing the codec.
    pub fn inject_raw(&self, room: &RoomId, participant: &ParticipantId, text: &str) -> bool {
        let Some(members) = self.inner.rooms.get(room) else {
            return false;
        };
        let Some(member) = members.get(participant) else {
            return false;
        };
        member.frames.send(text.to_owned()).is_ok()
    }

    fn attach(&self, room: &RoomId, participant: ParticipantId, frames: mpsc::UnboundedSender<String>) {
        let member = Arc::new(Member {
            frames,
            linked: AtomicBool::new(true),
        });
        self.inner
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(participant, member);
        info!(room = %room, participant = %participant, "Participant joined relay room");
        self.broadcast_roster(room);
    }

    fn detach(&self, room: &RoomId, participant: &ParticipantId) {
        let now_empty = match self.inner.rooms.get_mut(room) {
            Some(mut members) => {
                members.remove(participant);
                members.is_empty()
            }
            None => return,
        };

        info!(room = %room, participant = %participant, "Participant left relay room");
        if now_empty {
            self.inner.rooms.remove_if(room, |_, members| members.is_empty());
        } else {
            self.broadcast_roster(room);
        }
    }

    fn broadcast_roster(&self, room: &RoomId) {
        let Some(members) = self.inner.rooms.get(room) else {
            return;
        };
        let frame = RelayFrame::Roster(RosterEvent::new(members.keys().copied()));
        for member in members.values() {
            if member.linked.load(Ordering::SeqCst) {
                push(member, &frame);
            }
        }
    }

    async fn route(&self, room: &RoomId, envelope: SignalingEnvelope) -> Result<(), TransportError> {
        let target = {
            let members = self.inner.rooms.get(room).ok_or(TransportError::NotJoined)?;
            let sender = members
                .get(&envelope.sender)
                .ok_or(TransportError::NotJoined)?;
            if !sender.linked.load(Ordering::SeqCst) {
                return Err(TransportError::Disconnected);
            }
            members.get(&envelope.target).cloned()
        };

        let Some(target) = target else {
            debug!(target = %envelope.target, "Dropping envelope for participant outside the room");
            return Ok(());
        };
        if !target.linked.load(Ordering::SeqCst) {
            debug!(target = %envelope.target, "Dropping envelope for unlinked participant");
            return Ok(());
        }

        let text = encode_frame(&RelayFrame::Signal(envelope.clone()))
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        self.inner.history.lock().await.push(envelope);
        if target.frames.send(text).is_err() {
            warn!("Relay member queue closed while routing");
        }
        Ok(())
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn push(member: &Member, frame: &RelayFrame) {
    match encode_frame(frame) {
        Ok(text) => {
            let _ = member.frames.send(text);
        }
        Err(e) => error!("Failed to encode relay frame: {}", e),
    }
}

struct Joined {
    room: RoomId,
    local: ParticipantId,
    pump: JoinHandle<()>,
}

/// `SignalingTransport` backed by a `LocalRelay`.
pub struct RelayClient {
    relay: LocalRelay,
    joined: Mutex<Option<Joined>>,
}

impl RelayClient {
    fn spawn_pump(
        local: ParticipantId,
        mut frames: mpsc::UnboundedReceiver<String>,
        events: mpsc::Sender<TransportEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(text) = frames.recv().await {
                let event = match decode_frame(&text) {
                    Ok(RelayFrame::Roster(roster)) => TransportEvent::Roster(roster),
                    Ok(RelayFrame::Signal(envelope)) => TransportEvent::Signal(envelope),
                    Ok(RelayFrame::LinkLost) => TransportEvent::Disconnected,
                    Ok(RelayFrame::LinkRestored) => TransportEvent::Reconnected,
                    Err(e) => {
                        warn!(
                            participant = %local,
                            "Dropping relay frame: {}",
                            ProtocolAnomaly::Malformed(e.to_string())
                        );
                        continue;
                    }
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }
            debug!(participant = %local, "Relay pump finished");
        })
    }
}

#[async_trait]
impl SignalingTransport for RelayClient {
    async fn join_room(
        &self,
        room: &RoomId,
        local: ParticipantId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let mut joined = self.joined.lock().await;
        if joined.is_some() {
            return Err(TransportError::AlreadyJoined);
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(CLIENT_QUEUE);
        let pump = Self::spawn_pump(local, frames_rx, events_tx);

        self.relay.attach(room, local, frames_tx);
        *joined = Some(Joined {
            room: room.clone(),
            local,
            pump,
        });
        Ok(events_rx)
    }

    async fn send(
        &self,
        target: ParticipantId,
        envelope: SignalingEnvelope,
    ) -> Result<(), TransportError> {
        let room = {
            let joined = self.joined.lock().await;
            let joined = joined.as_ref().ok_or(TransportError::NotJoined)?;
            debug_assert_eq!(envelope.sender, joined.local);
            joined.room.clone()
        };
        debug_assert_eq!(envelope.target, target);
        self.relay.route(&room, envelope).await
    }

    async fn leave_room(&self) -> Result<(), TransportError> {
        let joined = self
            .joined
            .lock()
            .await
            .take()
            .ok_or(TransportError::NotJoined)?;
        joined.pump.abort();
        self.relay.detach(&joined.room, &joined.local);
        Ok(())
    }
}
