use huddle_call::SyntheticDevices;

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_for_state};

#[tokio::test]
async fn test_late_joiner_sees_earlier_mute() {
    init_tracing();

    let harness = MeshHarness::new("muted-before-you-came");
    let participants = harness.join_all(&[A, B]).await.expect("Failed to join");
    let a = &participants[0].coordinator;
    wait_connected(a, &[B]).await.expect("A and B never connected");

    assert!(!a.toggle_mic().await.expect("Toggle failed"));

    let c = harness.participant(C);
    c.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("C failed to join");
    wait_connected(&c.coordinator, &[A, B])
        .await
        .expect("C never joined the mesh");

    let state = wait_for_state(&c.coordinator, |s| {
        s.status(&A).is_some_and(|p| !p.remote_audio)
    })
    .await
    .expect("C never learned A is muted");
    assert!(state.status(&A).unwrap().remote_video);

    let b_view = state.status(&B).unwrap();
    assert!(b_view.remote_audio);
    assert!(b_view.remote_video);
}

#[tokio::test]
async fn test_trackless_participant_shows_as_muted() {
    init_tracing();

    let harness = MeshHarness::new("no-devices");
    let a = harness.participant(A);
    let b = harness.participant_with(B, SyntheticDevices::denied());
    a.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("A failed to join");
    b.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("B failed to join");
    wait_connected(&a.coordinator, &[B])
        .await
        .expect("A never reached B");

    let state = wait_for_state(&a.coordinator, |s| {
        s.status(&B)
            .is_some_and(|p| !p.remote_audio && !p.remote_video)
    })
    .await
    .expect("A still renders B as unmuted");
    assert!(state.status(&B).is_some());

    let b_view = wait_for_state(&b.coordinator, |s| s.status(&A).is_some())
        .await
        .expect("B lost A");
    let a_seen_by_b = b_view.status(&A).unwrap();
    assert!(a_seen_by_b.remote_audio && a_seen_by_b.remote_video);
}
