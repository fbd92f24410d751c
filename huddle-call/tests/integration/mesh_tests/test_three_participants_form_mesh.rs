use huddle_call::{NegotiationState, Role};

use crate::integration::init_tracing;
use crate::utils::{A, B, C, MeshHarness, wait_connected, wait_full_mesh};

#[tokio::test]
async fn test_three_participants_form_mesh() {
    init_tracing();

    let harness = MeshHarness::new("study-hall");
    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();

    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    let b = &participants[1].coordinator;
    let state = wait_connected(b, &[A, C]).await.unwrap();
    assert_eq!(state.connection_by_participant.len(), 2);
    assert!(!state.connection_by_participant.contains_key(&B));

    let to_a = state.status(&A).unwrap();
    let to_c = state.status(&C).unwrap();
    assert_eq!(to_a.role, Role::Responder);
    assert_eq!(to_c.role, Role::Initiator);
    assert_eq!(to_a.negotiation, NegotiationState::Connected);
    assert_eq!(to_c.negotiation, NegotiationState::Connected);
    assert!(state.unreachable.is_empty());
}
