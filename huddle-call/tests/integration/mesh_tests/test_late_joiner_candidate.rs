use std::time::Duration;

use huddle_core::codec::encode_frame;
use huddle_core::{IceCandidate, RelayFrame, SignalingEnvelope, SignalingMessage};

use crate::integration::init_tracing;
use crate::utils::{A, B, C, D, MeshHarness, wait_connected, wait_full_mesh};

const EARLY: &str = "candidate:early 1 udp 1 10.0.0.4 40000 typ host";

#[tokio::test]
async fn test_candidate_from_unknown_sender_is_dropped() {
    init_tracing();

    let harness = MeshHarness::new("late-joiner");
    let participants = harness
        .join_all(&[A, B, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    // D's candidate reaches B before D shows up in the roster
    let early = RelayFrame::Signal(SignalingEnvelope {
        sender: D,
        target: B,
        seq: 0,
        message: SignalingMessage::IceCandidate {
            candidate: IceCandidate::new(EARLY),
            generation: 0,
        },
    });
    let text = encode_frame(&early).unwrap();
    assert!(harness.relay.inject_raw(&harness.room, &B, &text));

    let b = &participants[1].coordinator;
    let state = wait_connected(b, &[A, C]).await.unwrap();
    assert!(state.status(&D).is_none());

    let d = harness.participant(D);
    d.coordinator
        .join_call(harness.room.clone())
        .await
        .expect("D failed to join");

    wait_connected(b, &[A, C, D]).await.expect("B never reached D");
    wait_connected(&d.coordinator, &[A, B, C])
        .await
        .expect("D never reached the mesh");

    let applied = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let applied = harness.network.applied_candidates(B, D);
            if !applied.is_empty() {
                break applied;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("B never applied a candidate from D");
    assert!(applied.iter().all(|c| c.candidate != EARLY));
}
