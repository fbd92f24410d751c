use std::time::Duration;

use huddle_call::{CallError, CallFailure};

use crate::integration::init_tracing;
use crate::utils::{A, B, MeshHarness, wait_connected, wait_for_state};

#[tokio::test]
async fn test_transport_loss_ends_call() {
    init_tracing();

    let harness = MeshHarness::new("lost-link");
    let participants = harness.join_all(&[A, B]).await.expect("Failed to join");
    let (a, b) = (&participants[0].coordinator, &participants[1].coordinator);
    wait_connected(b, &[A]).await.expect("Pair did not connect");

    harness.relay.sever(&B);

    let state = wait_for_state(b, |s| s.error.is_some())
        .await
        .expect("B never gave up on the relay");
    assert_eq!(state.error, Some(CallFailure::TransportLost));
    assert!(state.connection_by_participant.is_empty());
    assert!(!b.is_in_call());
    assert!(matches!(b.toggle_mic().await, Err(CallError::NotInCall)));
    assert!(harness.network.connection(B, A).is_none());

    wait_for_state(a, |s| s.status(&B).is_none())
        .await
        .expect("A kept B after it dropped out");

    // the UI may simply join again
    b.join_call(harness.room.clone())
        .await
        .expect("Rejoin failed");
    wait_connected(b, &[A]).await.expect("Rejoined B never reached A");
}

#[tokio::test]
async fn test_transport_blip_resumes() {
    init_tracing();

    let harness = MeshHarness::new("blip");
    let participants = harness.join_all(&[A, B]).await.expect("Failed to join");
    let b = &participants[1].coordinator;
    wait_connected(b, &[A]).await.expect("Pair did not connect");

    harness.relay.sever(&B);
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.relay.restore(&B);

    tokio::time::sleep(harness.config.reconnect_timeout * 2).await;
    assert!(b.is_in_call());
    let state = wait_connected(b, &[A]).await.expect("Pair dropped");
    assert!(state.error.is_none());
}
