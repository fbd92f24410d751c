use crate::peer::PeerConnection;
use futures::future::join_all;
use huddle_core::ParticipantId;
use std::collections::HashMap;
use tracing::debug;

/// Connection entries keyed by remote participant. At most one per remote.
pub struct PeerRegistry {
    local: ParticipantId,
    peers: HashMap<ParticipantId, PeerConnection>,
}

impl PeerRegistry {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            peers: HashMap::new(),
        }
    }

    /// Returns the entry for `remote`, creating an idle one if needed.
    pub fn ensure(&mut self, remote: ParticipantId) -> &mut PeerConnection {
        let local = self.local;
        self.peers.entry(remote).or_insert_with(|| {
            debug!("Creating connection entry for peer {}", remote);
            PeerConnection::new(local, remote)
        })
    }

    /// Closes and drops the entry. Returns whether one existed.
    pub async fn remove(&mut self, remote: &ParticipantId) -> bool {
        match self.peers.remove(remote) {
            Some(mut peer) => {
                peer.close().await;
                true
            }
            None => false,
        }
    }

    /// Closes every entry concurrently.
    pub async fn clear(&mut self) {
        let mut peers: Vec<PeerConnection> = self.peers.drain().map(|(_, peer)| peer).collect();
        join_all(peers.iter_mut().map(|peer| peer.close())).await;
    }

    pub fn get(&self, remote: &ParticipantId) -> Option<&PeerConnection> {
        self.peers.get(remote)
    }

    pub fn get_mut(&mut self, remote: &ParticipantId) -> Option<&mut PeerConnection> {
        self.peers.get_mut(remote)
    }

    pub fn contains(&self, remote: &ParticipantId) -> bool {
        self.peers.contains_key(remote)
    }

    pub fn all(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut PeerConnection> {
        self.peers.values_mut()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
