use crate::media::LocalTrack;
use crate::peer::{
    ConnectionEvent, ConnectionFactory, NativeConnection, NativeEvent, SdpKind, TrackReplacement,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{IceCandidate, MediaKind, ParticipantId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

const CANDIDATES_PER_DESCRIPTION: usize = 2;

/// Whether ICE can get through between a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    Healthy,
    Blocked,
}

type PairKey = (ParticipantId, ParticipantId);

fn pair_key(a: ParticipantId, b: ParticipantId) -> PairKey {
    if a <= b { (a, b) } else { (b, a) }
}

struct NetworkInner {
    links: DashMap<PairKey, LinkPolicy>,
    endpoints: DashMap<(ParticipantId, ParticipantId), Arc<LoopbackConnection>>,
    counter: AtomicU64,
    evaluation: Mutex<()>,
}

/// In-memory stand-in for the network between participants.
///
/// A pair connects once both endpoints hold each other's descriptions and
/// the link is healthy. A blocked link fails every description round.
#[derive(Clone)]
pub struct LoopbackNetwork {
    inner: Arc<NetworkInner>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                links: DashMap::new(),
                endpoints: DashMap::new(),
                counter: AtomicU64::new(0),
                evaluation: Mutex::new(()),
            }),
        }
    }

    /// Future description rounds between `a` and `b` fail.
    pub fn block(&self, a: ParticipantId, b: ParticipantId) {
        self.inner.links.insert(pair_key(a, b), LinkPolicy::Blocked);
    }

    pub fn heal(&self, a: ParticipantId, b: ParticipantId) {
        self.inner.links.insert(pair_key(a, b), LinkPolicy::Healthy);
    }

    /// Blocks the pair and fails whatever is up right now.
    pub fn break_link(&self, a: ParticipantId, b: ParticipantId) {
        self.block(a, b);
        for (local, remote) in [(a, b), (b, a)] {
            if let Some(endpoint) = self.connection(local, remote) {
                endpoint.set_connected(false);
                endpoint.emit(NativeEvent::Failed);
            }
        }
    }

    pub fn link(&self, a: ParticipantId, b: ParticipantId) -> LinkPolicy {
        self.inner
            .links
            .get(&pair_key(a, b))
            .map(|policy| *policy)
            .unwrap_or(LinkPolicy::Healthy)
    }

    /// The live connection `local` holds towards `remote`.
    pub fn connection(
        &self,
        local: ParticipantId,
        remote: ParticipantId,
    ) -> Option<Arc<LoopbackConnection>> {
        self.inner
            .endpoints
            .get(&(local, remote))
            .map(|endpoint| endpoint.clone())
    }

    pub fn applied_candidates(&self, local: ParticipantId, remote: ParticipantId) -> Vec<IceCandidate> {
        self.connection(local, remote)
            .map(|endpoint| endpoint.applied_candidates())
            .unwrap_or_default()
    }
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkInner {
    /// Settles the description round between `local` and `remote`, once.
    fn evaluate(&self, local: ParticipantId, remote: ParticipantId) {
        let Ok(_guard) = self.evaluation.lock() else {
            return;
        };
        let (Some(near), Some(far)) = (
            self.endpoints.get(&(local, remote)).map(|e| e.clone()),
            self.endpoints.get(&(remote, local)).map(|e| e.clone()),
        ) else {
            return;
        };

        let Some(round) = near.completed_round(&far) else {
            return;
        };
        if !near.start_round(&round) || !far.start_round(&round) {
            return;
        }

        let policy = self
            .links
            .get(&pair_key(local, remote))
            .map(|policy| *policy)
            .unwrap_or(LinkPolicy::Healthy);
        debug!("Loopback round between {} and {}: {:?}", local, remote, policy);

        for endpoint in [&near, &far] {
            match policy {
                LinkPolicy::Healthy => {
                    endpoint.set_connected(true);
                    endpoint.emit(NativeEvent::Connected);
                }
                LinkPolicy::Blocked => {
                    endpoint.set_connected(false);
                    endpoint.emit(NativeEvent::Failed);
                }
            }
        }
    }
}

#[async_trait]
impl ConnectionFactory for LoopbackNetwork {
    async fn connect(
        &self,
        local: ParticipantId,
        remote: ParticipantId,
        instance: Uuid,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Arc<dyn NativeConnection>> {
        let endpoint = Arc::new(LoopbackConnection {
            network: Arc::downgrade(&self.inner),
            local,
            remote,
            instance,
            events,
            state: Mutex::new(EndpointState::default()),
        });
        self.inner.endpoints.insert((local, remote), endpoint.clone());
        Ok(endpoint)
    }
}

#[derive(Default)]
struct EndpointState {
    local_description: Option<String>,
    remote_description: Option<String>,
    applied: Vec<IceCandidate>,
    senders: Vec<MediaKind>,
    connected: bool,
    closed: bool,
    last_round: Option<(String, String)>,
}

/// One side of a loopback pair.
pub struct LoopbackConnection {
    network: Weak<NetworkInner>,
    local: ParticipantId,
    remote: ParticipantId,
    instance: Uuid,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Mutex<EndpointState>,
}

impl LoopbackConnection {
    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.with_state(|state| state.applied.clone())
            .unwrap_or_default()
    }

    pub fn has_sender(&self, kind: MediaKind) -> bool {
        self.with_state(|state| state.senders.contains(&kind))
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.with_state(|state| state.closed).unwrap_or(true)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EndpointState) -> T) -> Result<T> {
        match self.state.lock() {
            Ok(mut state) => Ok(f(&mut state)),
            Err(_) => bail!("loopback endpoint state poisoned"),
        }
    }

    fn emit(&self, event: NativeEvent) {
        let closed = self.with_state(|state| state.closed).unwrap_or(true);
        if closed {
            return;
        }
        let _ = self.events.send(ConnectionEvent {
            remote: self.remote,
            instance: self.instance,
            event,
        });
    }

    fn set_connected(&self, connected: bool) {
        let _ = self.with_state(|state| state.connected = connected);
    }

    /// The description pair both endpoints agree on, if any.
    fn completed_round(&self, far: &LoopbackConnection) -> Option<(String, String)> {
        let near = self
            .with_state(|s| (s.local_description.clone(), s.remote_description.clone(), s.closed))
            .ok()?;
        let far = far
            .with_state(|s| (s.local_description.clone(), s.remote_description.clone(), s.closed))
            .ok()?;

        match (near, far) {
            ((Some(nl), Some(nr), false), (Some(fl), Some(fr), false)) if nl == fr && nr == fl => {
                Some(if nl <= nr { (nl, nr) } else { (nr, nl) })
            }
            _ => None,
        }
    }

    fn start_round(&self, round: &(String, String)) -> bool {
        self.with_state(|state| {
            if state.last_round.as_ref() == Some(round) {
                false
            } else {
                state.last_round = Some(round.clone());
                true
            }
        })
        .unwrap_or(false)
    }

    fn describe(&self, kind: &str, ice_restart: bool) -> Result<String> {
        let network = self.network.upgrade();
        let round = network
            .as_ref()
            .map(|n| n.counter.fetch_add(1, Ordering::Relaxed))
            .unwrap_or_default();
        let senders = self.with_state(|state| {
            if state.closed {
                None
            } else {
                Some(
                    state
                        .senders
                        .iter()
                        .map(|kind| kind.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                )
            }
        })?;
        let Some(senders) = senders else {
            bail!("connection to {} is closed", self.remote);
        };

        let sdp = format!(
            "v=0 {kind} {}->{} round={round} restart={ice_restart} senders={senders}",
            self.local, self.remote
        );
        self.with_state(|state| state.local_description = Some(sdp.clone()))?;

        for n in 0..CANDIDATES_PER_DESCRIPTION {
            let port = 50_000 + (round as usize * CANDIDATES_PER_DESCRIPTION + n) % 10_000;
            self.emit(NativeEvent::LocalCandidate(IceCandidate {
                candidate: format!("candidate:{round}{n} 1 udp 2130706431 127.0.0.1 {port} typ host"),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            }));
        }
        Ok(sdp)
    }

    fn settle(&self) {
        if let Some(network) = self.network.upgrade() {
            network.evaluate(self.local, self.remote);
        }
    }
}

#[async_trait]
impl NativeConnection for LoopbackConnection {
    async fn attach_tracks(&self, tracks: &[Arc<LocalTrack>]) -> Result<()> {
        self.with_state(|state| {
            for track in tracks {
                if !state.senders.contains(&track.kind()) {
                    state.senders.push(track.kind());
                }
            }
        })
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<String> {
        let sdp = self.describe("offer", ice_restart)?;
        self.settle();
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let has_remote = self.with_state(|state| state.remote_description.is_some())?;
        if !has_remote {
            bail!("cannot answer without a remote offer");
        }
        let sdp = self.describe("answer", false)?;
        self.settle();
        Ok(sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let expected = match kind {
            SdpKind::Offer => "v=0 offer ",
            SdpKind::Answer => "v=0 answer ",
        };
        if !sdp.starts_with(expected) {
            bail!("not a loopback {:?}: {:?}", kind, sdp);
        }
        self.with_state(|state| state.remote_description = Some(sdp))?;
        self.settle();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.with_state(|state| {
            if state.remote_description.is_none() {
                bail!("candidate before remote description");
            }
            state.applied.push(candidate);
            Ok(())
        })?
    }

    async fn replace_video_track(&self, _track: Option<Arc<LocalTrack>>) -> Result<TrackReplacement> {
        self.with_state(|state| {
            if state.senders.contains(&MediaKind::Video) {
                TrackReplacement::InPlace
            } else {
                state.senders.push(MediaKind::Video);
                TrackReplacement::RenegotiationRequired
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.with_state(|state| state.connected && !state.closed)
            .unwrap_or(false)
    }

    async fn close(&self) -> Result<()> {
        self.with_state(|state| {
            state.closed = true;
            state.connected = false;
        })?;
        if let Some(network) = self.network.upgrade() {
            network
                .endpoints
                .remove_if(&(self.local, self.remote), |_, e| e.instance == self.instance);
        }
        Ok(())
    }
}
