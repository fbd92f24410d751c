use std::sync::Arc;
use std::time::Duration;

use huddle_call::{CallConfig, CallCoordinator, LocalRelay, LoopbackNetwork, SyntheticDevices};
use huddle_core::{ParticipantId, RoomId};

pub const A: ParticipantId = ParticipantId::from_u128(1);
pub const B: ParticipantId = ParticipantId::from_u128(2);
pub const C: ParticipantId = ParticipantId::from_u128(3);
pub const D: ParticipantId = ParticipantId::from_u128(4);

/// Config with restart and reconnect windows short enough for tests.
pub fn fast_config() -> CallConfig {
    CallConfig {
        ice_servers: vec![],
        negotiation_timeout: Duration::from_secs(2),
        restart_backoff: vec![Duration::from_millis(20), Duration::from_millis(40)],
        reconnect_timeout: Duration::from_millis(300),
        ..CallConfig::default()
    }
}

pub struct TestParticipant {
    pub id: ParticipantId,
    pub coordinator: CallCoordinator,
    pub devices: Arc<SyntheticDevices>,
}

/// Participants wired to one in-process relay and one loopback network.
pub struct MeshHarness {
    pub relay: LocalRelay,
    pub network: LoopbackNetwork,
    pub room: RoomId,
    pub config: CallConfig,
}

impl MeshHarness {
    pub fn new(room: &str) -> Self {
        Self::with_config(room, fast_config())
    }

    pub fn with_config(room: &str, config: CallConfig) -> Self {
        Self {
            relay: LocalRelay::new(),
            network: LoopbackNetwork::new(),
            room: RoomId::from(room),
            config,
        }
    }

    pub fn participant(&self, id: ParticipantId) -> TestParticipant {
        self.participant_with(id, SyntheticDevices::new())
    }

    pub fn participant_with(&self, id: ParticipantId, devices: SyntheticDevices) -> TestParticipant {
        let devices = Arc::new(devices);
        let coordinator = CallCoordinator::new(
            id,
            Arc::new(self.relay.client()),
            Arc::new(self.network.clone()),
            devices.clone(),
            self.config.clone(),
        );
        TestParticipant {
            id,
            coordinator,
            devices,
        }
    }

    /// Joins every participant in order and returns them.
    pub async fn join_all(&self, ids: &[ParticipantId]) -> anyhow::Result<Vec<TestParticipant>> {
        let mut participants = Vec::with_capacity(ids.len());
        for &id in ids {
            let participant = self.participant(id);
            participant.coordinator.join_call(self.room.clone()).await?;
            participants.push(participant);
        }
        Ok(participants)
    }
}
