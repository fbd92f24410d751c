use crate::peer::{PeerEnv, PeerOutcome, PeerRegistry};
use huddle_core::{ParticipantId, RosterEvent};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// What one roster snapshot changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RosterChange {
    pub joined: Vec<ParticipantId>,
    pub left: Vec<ParticipantId>,
    /// Peers that gave up while being set up by this snapshot.
    pub unreachable: Vec<ParticipantId>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.unreachable.is_empty()
    }
}

/// Keeps the registry equal to the roster minus the local participant and
/// the peers that were given up on.
pub struct RosterSynchronizer {
    local: ParticipantId,
    unreachable: BTreeSet<ParticipantId>,
}

impl RosterSynchronizer {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            unreachable: BTreeSet::new(),
        }
    }

    pub fn unreachable(&self) -> &BTreeSet<ParticipantId> {
        &self.unreachable
    }

    /// Stops reconnecting to `remote` until it leaves the roster.
    pub fn mark_unreachable(&mut self, remote: ParticipantId) {
        self.unreachable.insert(remote);
    }

    pub async fn reconcile(
        &mut self,
        registry: &mut PeerRegistry,
        env: &PeerEnv,
        roster: &RosterEvent,
    ) -> RosterChange {
        let mut change = RosterChange::default();

        for id in registry.ids() {
            if !roster.contains(&id) && registry.remove(&id).await {
                info!("Peer {} left the call", id);
                change.left.push(id);
            }
        }
        self.unreachable.retain(|id| roster.contains(id));

        for &id in &roster.participants {
            if id == self.local || registry.contains(&id) || self.unreachable.contains(&id) {
                continue;
            }

            info!("Peer {} joined the call", id);
            change.joined.push(id);
            let outcome = registry.ensure(id).begin(env).await;
            if outcome == PeerOutcome::Unreachable {
                warn!("Peer {} is unreachable", id);
                registry.remove(&id).await;
                self.unreachable.insert(id);
                change.unreachable.push(id);
            }
        }

        change
    }
}
