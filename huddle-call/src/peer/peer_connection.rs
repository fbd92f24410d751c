use crate::error::{NegotiationError, ProtocolAnomaly};
use crate::media::LocalTrack;
use crate::peer::{
    NativeConnection, NativeEvent, NegotiationState, PeerEnv, PeerTimer, Role, SdpKind, TimerKind,
    TrackReplacement,
};
use huddle_core::{IceCandidate, MediaKind, ParticipantId, SignalingEnvelope, SignalingMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Remote candidates held back per connection before the rest are dropped.
pub const MAX_PENDING_CANDIDATES: usize = 64;

/// What the owner of a peer has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOutcome {
    Continue,
    /// Restarts are exhausted. The entry must be closed and removed.
    Unreachable,
}

/// Whether audio and video are flowing. Used both for what the remote
/// announced through `MediaToggle` and for what we announce on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFlags {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Negotiation state machine for one remote participant.
pub struct PeerConnection {
    local: ParticipantId,
    remote: ParticipantId,
    instance: Uuid,
    role: Role,
    state: NegotiationState,
    /// Remote candidates that arrived before the remote description, tagged
    /// with their generation, in arrival order.
    pending_remote_candidates: VecDeque<(u32, IceCandidate)>,
    remote_description_set: bool,
    native: Option<Arc<dyn NativeConnection>>,
    last_activity: Instant,
    generation: u32,
    restart_attempts: usize,
    next_seq: u64,
    last_remote_seq: Option<u64>,
    remote_media: MediaFlags,
    media_announced: bool,
    renegotiation_pending: bool,
    timer: Option<JoinHandle<()>>,
    timer_token: u64,
}

impl PeerConnection {
    pub fn new(local: ParticipantId, remote: ParticipantId) -> Self {
        Self {
            local,
            remote,
            instance: Uuid::new_v4(),
            role: Role::for_pair(local, remote),
            state: NegotiationState::Idle,
            pending_remote_candidates: VecDeque::new(),
            remote_description_set: false,
            native: None,
            last_activity: Instant::now(),
            generation: 0,
            restart_attempts: 0,
            next_seq: 0,
            last_remote_seq: None,
            remote_media: MediaFlags::default(),
            media_announced: false,
            renegotiation_pending: false,
            timer: None,
            timer_token: 0,
        }
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    pub fn remote(&self) -> ParticipantId {
        self.remote
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn restart_attempts(&self) -> usize {
        self.restart_attempts
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_remote_candidates.len()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn remote_media(&self) -> MediaFlags {
        self.remote_media
    }

    /// First move after the entry is created. Only the initiator offers; the
    /// responder waits for that offer under the negotiation timeout.
    pub async fn begin(&mut self, env: &PeerEnv) -> PeerOutcome {
        match self.role {
            Role::Initiator => self.offer(env, false).await,
            Role::Responder => {
                self.arm(env, env.config.negotiation_timeout, TimerKind::NegotiationTimeout);
                PeerOutcome::Continue
            }
        }
    }

    pub async fn handle_signal(
        &mut self,
        env: &PeerEnv,
        seq: u64,
        message: SignalingMessage,
    ) -> PeerOutcome {
        if self.state.is_terminal() {
            return PeerOutcome::Continue;
        }
        self.last_activity = Instant::now();

        if let Some(last) = self.last_remote_seq
            && seq <= last
        {
            self.anomaly(ProtocolAnomaly::SequenceRegression {
                from: self.remote,
                seq,
                last,
            });
        }
        self.last_remote_seq = Some(seq);

        match message {
            SignalingMessage::Offer { sdp, generation } => self.on_offer(env, sdp, generation).await,
            SignalingMessage::Answer { sdp, generation } => {
                self.on_answer(env, sdp, generation).await
            }
            SignalingMessage::IceCandidate {
                candidate,
                generation,
            } => {
                self.on_candidate(candidate, generation).await;
                PeerOutcome::Continue
            }
            SignalingMessage::MediaToggle { kind, enabled } => {
                info!("Peer {} turned {} {}", self.remote, kind, on_off(enabled));
                match kind {
                    MediaKind::Audio => self.remote_media.audio = enabled,
                    MediaKind::Video => self.remote_media.video = enabled,
                }
                PeerOutcome::Continue
            }
            SignalingMessage::RenegotiationNeeded { generation } => {
                self.on_renegotiation_request(env, generation).await
            }
        }
    }

    pub async fn handle_native(&mut self, env: &PeerEnv, event: NativeEvent) -> PeerOutcome {
        if self.state.is_terminal() {
            return PeerOutcome::Continue;
        }

        match event {
            NativeEvent::LocalCandidate(candidate) => {
                let generation = self.generation;
                self.send(
                    env,
                    SignalingMessage::IceCandidate {
                        candidate,
                        generation,
                    },
                )
                .await;
                PeerOutcome::Continue
            }
            NativeEvent::Connected => self.mark_connected(env).await,
            NativeEvent::Disconnected => {
                debug!("Peer {} connection interrupted", self.remote);
                PeerOutcome::Continue
            }
            NativeEvent::Failed if self.state == NegotiationState::Failed => PeerOutcome::Continue,
            NativeEvent::Failed => self.fail(env, NegotiationError::TransportFailure),
            NativeEvent::RemoteTrack(kind) => {
                info!("Receiving {} from peer {}", kind, self.remote);
                PeerOutcome::Continue
            }
        }
    }

    pub async fn handle_timer(&mut self, env: &PeerEnv, timer: PeerTimer) -> PeerOutcome {
        if timer.instance != self.instance
            || timer.token != self.timer_token
            || timer.generation != self.generation
            || self.state.is_terminal()
        {
            debug!("Ignoring stale {:?} for peer {}", timer.kind, self.remote);
            return PeerOutcome::Continue;
        }
        self.timer = None;

        match timer.kind {
            TimerKind::NegotiationTimeout if self.state == NegotiationState::Connected => {
                PeerOutcome::Continue
            }
            TimerKind::NegotiationTimeout => self.fail(env, NegotiationError::Timeout),
            TimerKind::RestartDue if self.state != NegotiationState::Failed => {
                PeerOutcome::Continue
            }
            TimerKind::RestartDue => self.restart(env).await,
        }
    }

    /// Re-arms whatever timer the current state needs after the relay link
    /// came back.
    pub fn resume(&mut self, env: &PeerEnv) {
        match self.state {
            NegotiationState::Connected | NegotiationState::Closed => {}
            NegotiationState::Failed => self.arm(env, Duration::ZERO, TimerKind::RestartDue),
            _ => self.arm(env, env.config.negotiation_timeout, TimerKind::NegotiationTimeout),
        }
    }

    /// Informs the remote that a local track was muted or unmuted.
    pub async fn notify_media(&mut self, env: &PeerEnv, kind: MediaKind, enabled: bool) {
        if self.state.is_terminal() {
            return;
        }
        self.send(env, SignalingMessage::MediaToggle { kind, enabled })
            .await;
    }

    /// Swaps the outgoing video. Returns `None` when the connection does not
    /// exist yet (it will pick the track up on creation) or the swap failed.
    pub async fn replace_video_track(
        &mut self,
        env: &PeerEnv,
        track: Option<Arc<LocalTrack>>,
    ) -> (Option<TrackReplacement>, PeerOutcome) {
        let Some(native) = self.native.clone() else {
            return (None, PeerOutcome::Continue);
        };

        match native.replace_video_track(track).await {
            Ok(TrackReplacement::InPlace) => (Some(TrackReplacement::InPlace), PeerOutcome::Continue),
            Ok(TrackReplacement::RenegotiationRequired) => {
                let outcome = self.request_renegotiation(env).await;
                (Some(TrackReplacement::RenegotiationRequired), outcome)
            }
            Err(e) => {
                warn!("Failed to replace video track for peer {}: {:#}", self.remote, e);
                (None, PeerOutcome::Continue)
            }
        }
    }

    /// Releases the native connection and drops anything buffered.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel_timer();

        let dropped = self.pending_remote_candidates.len();
        self.pending_remote_candidates.clear();
        self.remote_description_set = false;

        if let Some(native) = self.native.take()
            && let Err(e) = native.close().await
        {
            warn!("Failed to close connection to peer {}: {:#}", self.remote, e);
        }

        self.transition(NegotiationState::Closed);
        debug!(
            "Peer {} closed ({} buffered candidates dropped)",
            self.remote, dropped
        );
    }

    async fn offer(&mut self, env: &PeerEnv, ice_restart: bool) -> PeerOutcome {
        match self.try_offer(env, ice_restart).await {
            Ok(()) => PeerOutcome::Continue,
            Err(e) => self.fail(env, e),
        }
    }

    async fn try_offer(&mut self, env: &PeerEnv, ice_restart: bool) -> Result<(), NegotiationError> {
        let native = self.native(env).await?;
        let sdp = native
            .create_offer(ice_restart)
            .await
            .map_err(NegotiationError::Native)?;
        self.transition(NegotiationState::OfferCreated);

        let generation = self.generation;
        self.send(env, SignalingMessage::Offer { sdp, generation })
            .await;
        self.transition(NegotiationState::OfferSent);

        self.arm(env, env.config.negotiation_timeout, TimerKind::NegotiationTimeout);
        Ok(())
    }

    async fn on_offer(&mut self, env: &PeerEnv, sdp: String, generation: u32) -> PeerOutcome {
        if self.role == Role::Initiator {
            if matches!(
                self.state,
                NegotiationState::OfferCreated | NegotiationState::OfferSent
            ) {
                debug!("Offer glare with peer {}, keeping ours", self.remote);
                self.transition(NegotiationState::Reconciling);
            }
            self.anomaly(ProtocolAnomaly::UnexpectedOffer(self.remote));
            return PeerOutcome::Continue;
        }

        if generation < self.generation {
            self.anomaly(ProtocolAnomaly::StaleGeneration {
                from: self.remote,
                kind: "offer",
                generation,
            });
            return PeerOutcome::Continue;
        }
        if generation == self.generation
            && !matches!(
                self.state,
                NegotiationState::Idle | NegotiationState::Failed
            )
        {
            self.anomaly(ProtocolAnomaly::DuplicateDescription {
                from: self.remote,
                kind: "offer",
                generation,
            });
            return PeerOutcome::Continue;
        }

        if generation > self.generation {
            self.advance_generation(generation);
        }
        self.cancel_timer();

        match self.try_answer(env, sdp).await {
            Ok(connected) => self.after_exchange(env, connected).await,
            Err(e) => self.fail(env, e),
        }
    }

    async fn try_answer(&mut self, env: &PeerEnv, sdp: String) -> Result<bool, NegotiationError> {
        let native = self.native(env).await?;

        self.transition(NegotiationState::OfferReceived);
        self.remote_description_set = false;
        native
            .set_remote_description(SdpKind::Offer, sdp)
            .await
            .map_err(|e| NegotiationError::MalformedDescription(format!("{e:#}")))?;
        self.remote_description_applied(&native).await;

        let answer = native.create_answer().await.map_err(NegotiationError::Native)?;
        self.transition(NegotiationState::AnswerCreated);

        let generation = self.generation;
        self.send(
            env,
            SignalingMessage::Answer {
                sdp: answer,
                generation,
            },
        )
        .await;
        self.transition(NegotiationState::AnswerSent);

        Ok(native.is_connected())
    }

    async fn on_answer(&mut self, env: &PeerEnv, sdp: String, generation: u32) -> PeerOutcome {
        if self.role == Role::Responder {
            self.anomaly(ProtocolAnomaly::UnexpectedAnswer(self.remote));
            return PeerOutcome::Continue;
        }
        if generation != self.generation {
            self.anomaly(ProtocolAnomaly::StaleGeneration {
                from: self.remote,
                kind: "answer",
                generation,
            });
            return PeerOutcome::Continue;
        }
        if !self.state.awaiting_answer() {
            self.anomaly(ProtocolAnomaly::DuplicateDescription {
                from: self.remote,
                kind: "answer",
                generation,
            });
            return PeerOutcome::Continue;
        }

        match self.try_apply_answer(sdp).await {
            Ok(connected) => self.after_exchange(env, connected).await,
            Err(e) => self.fail(env, e),
        }
    }

    async fn try_apply_answer(&mut self, sdp: String) -> Result<bool, NegotiationError> {
        let native = self.native.clone().ok_or_else(|| {
            NegotiationError::Native(anyhow::anyhow!("answer arrived before any offer was made"))
        })?;

        native
            .set_remote_description(SdpKind::Answer, sdp)
            .await
            .map_err(|e| NegotiationError::MalformedDescription(format!("{e:#}")))?;
        self.transition(NegotiationState::AnswerReceived);
        self.remote_description_applied(&native).await;

        Ok(native.is_connected())
    }

    async fn on_candidate(&mut self, candidate: IceCandidate, generation: u32) {
        if generation < self.generation {
            self.anomaly(ProtocolAnomaly::StaleGeneration {
                from: self.remote,
                kind: "candidate",
                generation,
            });
            return;
        }
        // Only the initiator moves the generation forward.
        if generation > self.generation && self.role == Role::Initiator {
            self.anomaly(ProtocolAnomaly::FutureGeneration {
                from: self.remote,
                kind: "candidate",
                generation,
            });
            return;
        }

        match self.native.clone() {
            Some(native) if self.remote_description_set && generation == self.generation => {
                self.apply_candidate(&native, candidate).await;
            }
            _ if self.pending_remote_candidates.len() >= MAX_PENDING_CANDIDATES => {
                self.anomaly(ProtocolAnomaly::CandidateOverflow {
                    from: self.remote,
                    limit: MAX_PENDING_CANDIDATES,
                });
            }
            _ => {
                debug!(
                    "Buffering candidate from peer {} until its description is set",
                    self.remote
                );
                self.pending_remote_candidates
                    .push_back((generation, candidate));
            }
        }
    }

    async fn on_renegotiation_request(&mut self, env: &PeerEnv, generation: u32) -> PeerOutcome {
        if self.role == Role::Responder {
            self.anomaly(ProtocolAnomaly::UnexpectedOffer(self.remote));
            return PeerOutcome::Continue;
        }
        debug!(
            "Peer {} asked for renegotiation at generation {}",
            self.remote, generation
        );
        self.request_renegotiation(env).await
    }

    async fn request_renegotiation(&mut self, env: &PeerEnv) -> PeerOutcome {
        match self.role {
            Role::Initiator if self.state == NegotiationState::Connected => {
                self.advance_generation(self.generation + 1);
                info!("Renegotiating with peer {}", self.remote);
                self.offer(env, false).await
            }
            Role::Initiator => {
                self.renegotiation_pending = true;
                PeerOutcome::Continue
            }
            Role::Responder => {
                let generation = self.generation;
                self.send(env, SignalingMessage::RenegotiationNeeded { generation })
                    .await;
                PeerOutcome::Continue
            }
        }
    }

    async fn after_exchange(&mut self, env: &PeerEnv, connected: bool) -> PeerOutcome {
        if connected {
            self.mark_connected(env).await
        } else {
            self.arm(env, env.config.negotiation_timeout, TimerKind::NegotiationTimeout);
            PeerOutcome::Continue
        }
    }

    async fn mark_connected(&mut self, env: &PeerEnv) -> PeerOutcome {
        if !self.remote_description_set {
            debug!(
                "Peer {} reported connected before its description was applied",
                self.remote
            );
            return PeerOutcome::Continue;
        }
        self.cancel_timer();
        if self.state != NegotiationState::Connected {
            info!(
                "Peer {} connected as {:?} (generation {})",
                self.remote, self.role, self.generation
            );
            self.transition(NegotiationState::Connected);
        }
        self.restart_attempts = 0;

        if !self.media_announced {
            self.media_announced = true;
            self.announce_media(env).await;
        }

        if self.renegotiation_pending {
            self.renegotiation_pending = false;
            return self.request_renegotiation(env).await;
        }
        PeerOutcome::Continue
    }

    /// Tells the remote our current mute flags. Toggles made before this
    /// pair existed never reached it.
    async fn announce_media(&mut self, env: &PeerEnv) {
        let flags = env.local_media;
        for (kind, enabled) in [(MediaKind::Audio, flags.audio), (MediaKind::Video, flags.video)] {
            self.send(env, SignalingMessage::MediaToggle { kind, enabled })
                .await;
        }
    }

    fn fail(&mut self, env: &PeerEnv, error: NegotiationError) -> PeerOutcome {
        self.cancel_timer();
        self.transition(NegotiationState::Failed);

        let Some(delay) = env.config.restart_backoff.get(self.restart_attempts).copied() else {
            warn!(
                "Giving up on peer {} after {} restarts: {}",
                self.remote, self.restart_attempts, error
            );
            return PeerOutcome::Unreachable;
        };

        self.restart_attempts += 1;
        warn!(
            "Negotiation with peer {} failed ({}), restart {} in {:?}",
            self.remote, error, self.restart_attempts, delay
        );
        self.arm(env, delay, TimerKind::RestartDue);
        PeerOutcome::Continue
    }

    async fn restart(&mut self, env: &PeerEnv) -> PeerOutcome {
        match self.role {
            Role::Initiator => {
                self.advance_generation(self.generation + 1);
                info!(
                    "ICE restart with peer {} (generation {})",
                    self.remote, self.generation
                );
                self.offer(env, true).await
            }
            Role::Responder => {
                self.arm(env, env.config.negotiation_timeout, TimerKind::NegotiationTimeout);
                PeerOutcome::Continue
            }
        }
    }

    async fn native(&mut self, env: &PeerEnv) -> Result<Arc<dyn NativeConnection>, NegotiationError> {
        if let Some(native) = &self.native {
            return Ok(native.clone());
        }

        let native = env
            .factory
            .connect(env.local, self.remote, self.instance, env.events.clone())
            .await
            .map_err(NegotiationError::Native)?;
        self.native = Some(native.clone());

        native
            .attach_tracks(&env.outgoing_tracks)
            .await
            .map_err(NegotiationError::Native)?;
        Ok(native)
    }

    /// Marks the remote description as set and flushes buffered candidates of
    /// the current generation, oldest first. Later generations stay queued.
    async fn remote_description_applied(&mut self, native: &Arc<dyn NativeConnection>) {
        self.remote_description_set = true;

        let current = self.generation;
        let queued = std::mem::take(&mut self.pending_remote_candidates);
        for (generation, candidate) in queued {
            if generation == current {
                self.apply_candidate(native, candidate).await;
            } else if generation > current {
                self.pending_remote_candidates
                    .push_back((generation, candidate));
            }
        }
    }

    async fn apply_candidate(&self, native: &Arc<dyn NativeConnection>, candidate: IceCandidate) {
        if let Err(e) = native.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate for peer {}: {:#}", self.remote, e);
        }
    }

    fn advance_generation(&mut self, generation: u32) {
        self.generation = generation;
        self.remote_description_set = false;
        self.pending_remote_candidates
            .retain(|(queued, _)| *queued >= generation);
    }

    async fn send(&mut self, env: &PeerEnv, message: SignalingMessage) {
        let label = message.label();
        let envelope = SignalingEnvelope {
            sender: env.local,
            target: self.remote,
            seq: self.next_seq,
            message,
        };
        self.next_seq += 1;

        debug!("Sending {} to peer {} (seq {})", label, self.remote, envelope.seq);
        if let Err(e) = env.transport.send(self.remote, envelope).await {
            warn!("Failed to send {} to peer {}: {}", label, self.remote, e);
        }
    }

    fn arm(&mut self, env: &PeerEnv, delay: Duration, kind: TimerKind) {
        self.cancel_timer();
        self.timer_token += 1;
        let timer = PeerTimer {
            remote: self.remote,
            instance: self.instance,
            token: self.timer_token,
            generation: self.generation,
            kind,
        };
        self.timer = Some(env.timers.arm(delay, timer));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn transition(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!("Peer {}: {:?} -> {:?}", self.remote, self.state, next);
            self.state = next;
        }
    }

    fn anomaly(&self, anomaly: ProtocolAnomaly) {
        warn!("Protocol anomaly in state {:?}: {}", self.state, anomaly);
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
