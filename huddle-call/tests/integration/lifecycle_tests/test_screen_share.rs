use huddle_call::{DevicePolicy, NegotiationState, SyntheticDevices};
use huddle_core::MediaKind;

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_for_state, wait_full_mesh};

#[tokio::test]
async fn test_screen_share_replaces_camera_in_place() {
    init_tracing();

    let harness = MeshHarness::new("slides");
    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    let b = &participants[1].coordinator;
    assert!(b.toggle_screen_share().await.expect("Share failed"));

    let state = b.state().borrow().clone();
    assert!(state.local_media.screen_sharing);
    assert!(state.connection_by_participant.values().all(|p| p.generation == 0));

    assert!(!b.toggle_screen_share().await.expect("Unshare failed"));
    let state = wait_connected(b, &[A, C]).await.unwrap();
    assert!(!state.local_media.screen_sharing);
    assert!(state.local_media.camera_enabled);
}

#[tokio::test]
async fn test_screen_share_without_camera_renegotiates_per_pair() {
    init_tracing();

    let harness = MeshHarness::new("slides-no-camera");
    let no_camera = || SyntheticDevices::new().with_camera(DevicePolicy::Missing);
    let participants = [A, B, C].map(|id| harness.participant_with(id, no_camera()));
    for p in &participants {
        p.coordinator
            .join_call(harness.room.clone())
            .await
            .expect("Failed to join");
    }
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    let b = &participants[1].coordinator;
    assert!(b.toggle_screen_share().await.expect("Share failed"));

    // B answers A, so A has to offer again; B offers to C itself
    wait_for_state(b, |s| {
        [A, C].iter().all(|id| {
            s.status(id).is_some_and(|p| {
                p.generation == 1 && p.negotiation == NegotiationState::Connected
            })
        })
    })
    .await
    .expect("Renegotiation did not complete");

    for remote in [A, C] {
        let connection = harness.network.connection(B, remote).unwrap();
        assert!(connection.has_sender(MediaKind::Video));
    }
    let a_state = wait_connected(&participants[0].coordinator, &[B, C])
        .await
        .unwrap();
    assert_eq!(a_state.status(&C).unwrap().generation, 0);
}
