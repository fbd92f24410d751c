use huddle_call::ConnectionState;

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_for_state};

#[tokio::test]
async fn test_unreachable_peer_is_isolated() {
    init_tracing();

    let harness = MeshHarness::new("flaky-link");
    harness.network.block(B, C);

    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let (a, b, c) = (
        &participants[0].coordinator,
        &participants[1].coordinator,
        &participants[2].coordinator,
    );

    let state = wait_for_state(b, |s| s.unreachable.contains(&C))
        .await
        .expect("B never gave up on C");
    assert!(state.status(&C).is_none());

    let state = wait_connected(b, &[A]).await.unwrap();
    assert_eq!(state.status(&A).unwrap().connection, ConnectionState::Connected);
    assert!(state.unreachable.contains(&C));

    wait_for_state(c, |s| s.unreachable.contains(&B))
        .await
        .expect("C never gave up on B");
    wait_connected(c, &[A]).await.expect("C lost A");
    wait_connected(a, &[B, C]).await.expect("A lost a peer");

    // restarts stay bounded
    let restarts = harness
        .relay
        .history()
        .await
        .iter()
        .filter(|e| e.sender == B && e.target == C)
        .filter(|e| matches!(e.message, huddle_core::SignalingMessage::Offer { .. }))
        .count();
    assert_eq!(restarts, 1 + harness.config.max_restarts());
}

#[tokio::test]
async fn test_unreachable_peer_is_retried_after_rejoin() {
    init_tracing();

    let harness = MeshHarness::new("flaky-link-rejoin");
    harness.network.block(B, C);

    let participants = harness.join_all(&[B, C]).await.expect("Failed to join");
    let (b, c) = (&participants[0].coordinator, &participants[1].coordinator);
    wait_for_state(b, |s| s.unreachable.contains(&C))
        .await
        .expect("B never gave up on C");

    harness.network.heal(B, C);
    c.leave_call().await.expect("C failed to leave");
    wait_for_state(b, |s| s.unreachable.is_empty())
        .await
        .expect("B kept C as unreachable after it left");

    c.join_call(harness.room.clone())
        .await
        .expect("C failed to rejoin");
    wait_connected(b, &[C]).await.expect("B never reached C");
}
