use std::collections::BTreeSet;

use huddle_core::SignalingMessage;

use crate::integration::init_tracing;
use crate::utils::{A, B, C, D, MeshHarness, wait_full_mesh};

#[tokio::test]
async fn test_single_initiator_per_pair() {
    init_tracing();

    let harness = MeshHarness::new("glare-free");
    let participants = harness
        .join_all(&[D, B, A, C])
        .await
        .expect("Failed to join");
    let coordinators: Vec<_> = participants.iter().map(|p| &p.coordinator).collect();
    wait_full_mesh(&coordinators)
        .await
        .expect("Mesh did not settle");

    let history = harness.relay.history().await;
    let mut offering_pairs = BTreeSet::new();
    for envelope in &history {
        match &envelope.message {
            SignalingMessage::Offer { .. } => {
                assert!(
                    envelope.sender < envelope.target,
                    "{} offered to lower id {}",
                    envelope.sender,
                    envelope.target
                );
                offering_pairs.insert((envelope.sender, envelope.target));
            }
            SignalingMessage::Answer { .. } => {
                assert!(envelope.sender > envelope.target);
            }
            _ => {}
        }
    }

    // every pair of four negotiated exactly once, from its lower id
    assert_eq!(offering_pairs.len(), 6);
    let offers = history
        .iter()
        .filter(|e| matches!(e.message, SignalingMessage::Offer { .. }))
        .count();
    assert_eq!(offers, 6);
}
