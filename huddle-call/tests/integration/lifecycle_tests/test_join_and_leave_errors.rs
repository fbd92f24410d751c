use huddle_call::CallError;

use crate::integration::init_tracing;
use crate::utils::{A, MeshHarness};

#[tokio::test]
async fn test_join_and_leave_errors() {
    init_tracing();

    let harness = MeshHarness::new("errors");
    let a = harness.participant(A);

    assert!(matches!(a.coordinator.leave_call().await, Err(CallError::NotInCall)));
    assert!(matches!(a.coordinator.toggle_mic().await, Err(CallError::NotInCall)));

    a.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("Join failed");
    assert!(a.coordinator.is_in_call());
    assert!(matches!(
        a.coordinator.join_call(harness.room.clone()).await,
        Err(CallError::AlreadyInCall)
    ));

    a.coordinator.leave_call().await.expect("Leave failed");
    assert!(matches!(a.coordinator.leave_call().await, Err(CallError::NotInCall)));
    assert!(matches!(
        a.coordinator.toggle_screen_share().await,
        Err(CallError::NotInCall)
    ));

    // a fresh session after leaving
    a.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("Rejoin failed");
    assert_eq!(a.devices.opened(), 4);
    a.coordinator.leave_call().await.expect("Leave failed");
}
