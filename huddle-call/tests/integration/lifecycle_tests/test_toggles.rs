use huddle_core::SignalingMessage;

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_for_state, wait_full_mesh};

#[tokio::test]
async fn test_toggles_do_not_renegotiate() {
    init_tracing();

    let harness = MeshHarness::new("muting");
    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");
    let offers_before = count_offers(&harness).await;

    let a = &participants[0].coordinator;
    assert!(!a.toggle_mic().await.expect("Toggle failed"));

    let state = a.state().borrow().clone();
    assert!(!state.local_media.mic_enabled);
    assert!(state.local_media.camera_enabled);

    for observer in [&participants[1].coordinator, &participants[2].coordinator] {
        let state = wait_for_state(observer, |s| s.status(&A).is_some_and(|p| !p.remote_audio))
            .await
            .expect("Mute never arrived");
        assert!(state.status(&A).unwrap().remote_video);
        wait_connected(observer, &[A]).await.expect("Mute broke the pair");
    }

    assert!(!a.toggle_camera().await.expect("Toggle failed"));
    assert!(a.toggle_mic().await.expect("Toggle failed"));
    wait_for_state(&participants[1].coordinator, |s| {
        s.status(&A)
            .is_some_and(|p| p.remote_audio && !p.remote_video)
    })
    .await
    .expect("Toggles did not arrive in order");

    assert_eq!(count_offers(&harness).await, offers_before);
}

async fn count_offers(harness: &MeshHarness) -> usize {
    harness
        .relay
        .history()
        .await
        .iter()
        .filter(|e| matches!(e.message, SignalingMessage::Offer { .. }))
        .count()
}
