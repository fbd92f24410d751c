use huddle_call::{CallError, MediaError, SyntheticDevices};
use huddle_core::MediaKind;

use crate::integration::init_tracing;
use crate::utils::{A, B, MeshHarness, wait_connected};

#[tokio::test]
async fn test_permission_denied_join() {
    init_tracing();

    let harness = MeshHarness::new("no-camera-allowed");
    let a = harness.participant(A);
    let b = harness.participant_with(B, SyntheticDevices::denied());

    a.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("A failed to join");
    b.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("Denied capture must not block joining");

    let state = wait_connected(&b.coordinator, &[A])
        .await
        .expect("B should still receive A");
    assert_eq!(state.media_error, Some(MediaError::PermissionDenied));
    assert!(!state.local_media.mic_enabled);
    assert!(!state.local_media.camera_enabled);
    assert!(state.local_media.tracks.is_empty());

    assert!(matches!(
        b.coordinator.toggle_mic().await,
        Err(CallError::Media(MediaError::NoTrack(MediaKind::Audio)))
    ));
    wait_connected(&a.coordinator, &[B]).await.expect("A lost B");
}
