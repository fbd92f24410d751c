use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_for_state, wait_full_mesh};

#[tokio::test]
async fn test_leave_releases_resources() {
    init_tracing();

    let harness = MeshHarness::new("leaving");
    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    let b = &participants[1].coordinator;
    let tracks = b.state().borrow().local_media.tracks.clone();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.is_live()));

    b.leave_call().await.expect("Leave failed");

    assert!(!b.is_in_call());
    assert!(tracks.iter().all(|t| !t.is_live()));
    let state = b.state().borrow().clone();
    assert!(state.connection_by_participant.is_empty());
    assert_eq!(state.local_media.active_tracks(), 0);
    assert!(harness.network.connection(B, A).is_none());
    assert!(harness.network.connection(B, C).is_none());
    assert!(!harness.relay.roster(&harness.room).contains(&B));

    let a = &participants[0].coordinator;
    wait_for_state(a, |s| s.status(&B).is_none())
        .await
        .expect("A kept B");
    wait_connected(a, &[C]).await.expect("A lost C");
    wait_for_state(&participants[2].coordinator, |s| s.status(&B).is_none())
        .await
        .expect("C kept B");
}
