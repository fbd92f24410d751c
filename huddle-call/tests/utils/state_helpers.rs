use std::time::Duration;

use anyhow::{Context, Result};
use huddle_call::{CallCoordinator, CallState, ConnectionState};
use huddle_core::ParticipantId;

/// Timeout for a mesh to settle (ms).
pub const SETTLE_TIMEOUT_MS: u64 = 5000;

/// Waits until the coordinator's state satisfies `predicate`.
pub async fn wait_for_state<F>(coordinator: &CallCoordinator, predicate: F) -> Result<CallState>
where
    F: FnMut(&CallState) -> bool,
{
    let mut rx = coordinator.state();
    let state = tokio::time::timeout(
        Duration::from_millis(SETTLE_TIMEOUT_MS),
        rx.wait_for(predicate),
    )
    .await
    .context("Timed out waiting for call state")?
    .context("Call state channel closed")?
    .clone();
    Ok(state)
}

/// Waits until the coordinator reports `Connected` for every id in `peers`.
pub async fn wait_connected(
    coordinator: &CallCoordinator,
    peers: &[ParticipantId],
) -> Result<CallState> {
    wait_for_state(coordinator, |state| {
        peers.iter().all(|id| {
            state
                .status(id)
                .is_some_and(|s| s.connection == ConnectionState::Connected)
        })
    })
    .await
    .with_context(|| format!("{} never connected to {:?}", coordinator.local_id(), peers))
}

/// Waits until every participant is connected to every other one.
pub async fn wait_full_mesh(coordinators: &[&CallCoordinator]) -> Result<()> {
    let ids: Vec<ParticipantId> = coordinators.iter().map(|c| c.local_id()).collect();
    for coordinator in coordinators {
        let others: Vec<ParticipantId> = ids
            .iter()
            .copied()
            .filter(|id| *id != coordinator.local_id())
            .collect();
        wait_connected(coordinator, &others).await?;
    }
    Ok(())
}
