use crate::call::{CallCommand, CallFailure, CallState, PeerStatus, RosterSynchronizer};
use crate::error::{CallError, ProtocolAnomaly};
use crate::media::LocalMediaManager;
use crate::peer::{ConnectionEvent, PeerEnv, PeerOutcome, PeerRegistry, PeerTimer};
use crate::transport::TransportEvent;
use huddle_core::{MediaKind, ParticipantId, RoomId, RosterEvent, SignalingEnvelope};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Mailbox ends a session reads from.
pub struct SessionChannels {
    pub commands: mpsc::Receiver<CallCommand>,
    pub transport: mpsc::Receiver<TransportEvent>,
    pub connections: mpsc::UnboundedReceiver<ConnectionEvent>,
    pub timers: mpsc::UnboundedReceiver<PeerTimer>,
}

/// One active call. Lives inside its own task and owns every peer.
pub struct CallSession {
    room: RoomId,
    registry: PeerRegistry,
    roster: RosterSynchronizer,
    media: LocalMediaManager,
    env: PeerEnv,
    channels: SessionChannels,
    state: Arc<watch::Sender<CallState>>,
    /// Set while the relay link is down.
    reconnect_deadline: Option<Instant>,
}

impl CallSession {
    pub fn new(
        room: RoomId,
        media: LocalMediaManager,
        env: PeerEnv,
        channels: SessionChannels,
        state: Arc<watch::Sender<CallState>>,
    ) -> Self {
        Self {
            registry: PeerRegistry::new(env.local),
            roster: RosterSynchronizer::new(env.local),
            room,
            media,
            env,
            channels,
            state,
            reconnect_deadline: None,
        }
    }

    pub async fn run(mut self) {
        info!(room = %self.room, local = %self.env.local, "Call session started");
        self.publish();

        loop {
            let deadline = self.reconnect_deadline;

            tokio::select! {
                cmd = self.channels.commands.recv() => {
                    match cmd {
                        Some(c) => {
                            if !self.handle_command(c).await {
                                break;
                            }
                        }
                        None => {
                            info!("Coordinator dropped. Leaving call.");
                            self.teardown().await;
                            break;
                        }
                    }
                }

                evt = self.channels.transport.recv() => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            self.fail_call(CallFailure::TransportLost).await;
                            break;
                        }
                    }
                }

                Some(evt) = self.channels.connections.recv() => {
                    self.handle_connection_event(evt).await;
                }

                Some(timer) = self.channels.timers.recv() => {
                    self.handle_timer(timer).await;
                }

                _ = sleep_until(deadline) => {
                    warn!("Relay link did not come back in time");
                    self.fail_call(CallFailure::TransportLost).await;
                    break;
                }
            }

            self.publish();
        }

        info!(room = %self.room, "Call session finished");
    }

    /// Returns false once the session has been left.
    async fn handle_command(&mut self, cmd: CallCommand) -> bool {
        match cmd {
            CallCommand::Leave { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return false;
            }
            CallCommand::ToggleMic { reply } => {
                let result = self.toggle(MediaKind::Audio).await;
                self.publish();
                let _ = reply.send(result);
            }
            CallCommand::ToggleCamera { reply } => {
                let result = self.toggle(MediaKind::Video).await;
                self.publish();
                let _ = reply.send(result);
            }
            CallCommand::ToggleScreenShare { reply } => {
                let result = self.toggle_screen_share().await;
                self.publish();
                let _ = reply.send(result);
            }
        }
        true
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Roster(roster) => self.reconcile(&roster).await,

            TransportEvent::Signal(envelope) => self.handle_signal(envelope).await,

            TransportEvent::Disconnected => {
                info!("Relay link lost, pausing negotiation");
                self.env.paused = true;
                self.reconnect_deadline
                    .get_or_insert_with(|| Instant::now() + self.env.config.reconnect_timeout);
            }

            TransportEvent::Reconnected => {
                info!("Relay link restored");
                self.env.paused = false;
                self.reconnect_deadline = None;
                for peer in self.registry.all_mut() {
                    peer.resume(&self.env);
                }
            }
        }
    }

    async fn reconcile(&mut self, roster: &RosterEvent) {
        if !roster.contains(&self.env.local) {
            debug!("Ignoring roster snapshot that does not list us yet");
            return;
        }
        let change = self
            .roster
            .reconcile(&mut self.registry, &self.env, roster)
            .await;
        if !change.is_empty() {
            debug!(?change, "Roster reconciled");
        }
    }

    async fn handle_signal(&mut self, envelope: SignalingEnvelope) {
        if envelope.target != self.env.local {
            warn!("{}", ProtocolAnomaly::Misaddressed(envelope.target));
            return;
        }

        let sender = envelope.sender;
        let Some(peer) = self.registry.get_mut(&sender) else {
            warn!(
                "{}",
                ProtocolAnomaly::UnknownSender {
                    from: sender,
                    kind: envelope.message.label(),
                }
            );
            return;
        };

        let outcome = peer
            .handle_signal(&self.env, envelope.seq, envelope.message)
            .await;
        self.settle(sender, outcome).await;
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        let Some(peer) = self.registry.get_mut(&event.remote) else {
            debug!("Dropping event for departed peer {}", event.remote);
            return;
        };
        if peer.instance() != event.instance {
            debug!("Dropping event from a previous connection to {}", event.remote);
            return;
        }

        let outcome = peer.handle_native(&self.env, event.event).await;
        self.settle(event.remote, outcome).await;
    }

    async fn handle_timer(&mut self, timer: PeerTimer) {
        if self.env.paused {
            debug!("Relay link down, dropping {:?} for {}", timer.kind, timer.remote);
            return;
        }
        let Some(peer) = self.registry.get_mut(&timer.remote) else {
            return;
        };

        let remote = timer.remote;
        let outcome = peer.handle_timer(&self.env, timer).await;
        self.settle(remote, outcome).await;
    }

    /// Drops a peer that ran out of restarts.
    async fn settle(&mut self, remote: ParticipantId, outcome: PeerOutcome) {
        if outcome == PeerOutcome::Unreachable {
            warn!("Peer {} is unreachable, dropping its connection", remote);
            self.registry.remove(&remote).await;
            self.roster.mark_unreachable(remote);
        }
    }

    async fn toggle(&mut self, kind: MediaKind) -> Result<bool, CallError> {
        let enabled = !self.media.is_enabled(kind);
        self.media.set_track_enabled(kind, enabled)?;
        self.env.local_media = self.media.flags();

        for peer in self.registry.all_mut() {
            peer.notify_media(&self.env, kind, enabled).await;
        }
        info!("Local {} turned {}", kind, if enabled { "on" } else { "off" });
        Ok(enabled)
    }

    async fn toggle_screen_share(&mut self) -> Result<bool, CallError> {
        let (video, sharing) = if self.media.is_screen_sharing() {
            if let Some(screen) = self.media.outgoing_video() {
                self.env.factory.release_track(screen.id());
            }
            (self.media.stop_screen_share(), false)
        } else {
            (Some(self.media.start_screen_share().await?), true)
        };

        self.env.outgoing_tracks = self.media.outgoing_tracks();
        self.env.local_media = self.media.flags();
        let swap = self
            .media
            .replace_video_track(video, &mut self.registry, &self.env)
            .await;
        for remote in swap.unreachable {
            self.settle(remote, PeerOutcome::Unreachable).await;
        }
        Ok(sharing)
    }

    async fn teardown(&mut self) {
        info!(room = %self.room, "Leaving call");
        self.release_all().await;
        self.state.send_replace(CallState::default());
    }

    async fn fail_call(&mut self, failure: CallFailure) {
        self.release_all().await;
        self.state.send_replace(CallState {
            error: Some(failure),
            ..CallState::default()
        });
    }

    async fn release_all(&mut self) {
        self.channels.transport.close();
        self.registry.clear().await;
        for track in self.media.state().tracks {
            self.env.factory.release_track(track.id());
        }
        self.media.release();
        if let Err(e) = self.env.transport.leave_room().await {
            debug!("Relay leave failed: {}", e);
        }
    }

    fn publish(&self) {
        let connection_by_participant = self
            .registry
            .all()
            .map(|peer| (peer.remote(), PeerStatus::from(peer)))
            .collect();
        let local_media = self.media.state();
        let unreachable = self.roster.unreachable().clone();
        let room = self.room.clone();

        self.state.send_modify(|state| {
            state.room = Some(room);
            state.connection_by_participant = connection_by_participant;
            state.local_media = local_media;
            state.unreachable = unreachable;
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
