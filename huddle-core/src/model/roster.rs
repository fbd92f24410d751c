use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full membership snapshot of a room. Never a delta.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RosterEvent {
    pub participants: BTreeSet<ParticipantId>,
}

impl RosterEvent {
    pub fn new(participants: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            participants: participants.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains(id)
    }
}
