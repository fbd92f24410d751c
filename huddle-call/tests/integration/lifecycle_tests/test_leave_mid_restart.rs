use std::time::Duration;

use huddle_call::{CallError, ConnectionState};

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, fast_config, wait_connected, wait_for_state};

#[tokio::test]
async fn test_leave_while_a_pair_is_restarting() {
    init_tracing();

    let mut config = fast_config();
    config.restart_backoff = vec![Duration::from_millis(400), Duration::from_millis(400)];
    let harness = MeshHarness::with_config("half-broken", config);
    harness.network.block(B, C);

    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let b = &participants[1].coordinator;

    wait_connected(b, &[A]).await.expect("B never reached A");
    wait_for_state(b, |s| {
        s.status(&C)
            .is_some_and(|p| p.connection == ConnectionState::Reconnecting)
    })
    .await
    .expect("B never started restarting C");

    let tracks = b.state().borrow().local_media.tracks.clone();
    b.leave_call().await.expect("Leave failed mid-restart");

    let state = b.state().borrow().clone();
    assert!(!b.is_in_call());
    assert!(state.connection_by_participant.is_empty());
    assert_eq!(state.local_media.active_tracks(), 0);
    assert!(tracks.iter().all(|t| !t.is_live()));
    assert!(harness.network.connection(B, C).is_none());
    assert!(harness.network.connection(B, A).is_none());

    // Outlive every restart timer B had armed.
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let state = b.state().borrow().clone();
    assert!(!state.is_active());
    assert!(state.connection_by_participant.is_empty());
    assert!(state.error.is_none());
    assert!(harness.network.connection(B, C).is_none());
    assert!(matches!(b.toggle_mic().await, Err(CallError::NotInCall)));
    assert!(!harness.relay.roster(&harness.room).contains(&B));
}
