use huddle_core::ParticipantId;

/// Which side of a pair creates offers. Fixed for the lifetime of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// The lower id initiates, so exactly one side of any pair offers.
    pub fn for_pair(local: ParticipantId, remote: ParticipantId) -> Self {
        if local < remote {
            Role::Initiator
        } else {
            Role::Responder
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    OfferSent,
    /// A remote offer crossed ours; ours stands and the answer is awaited.
    Reconciling,
    AnswerReceived,
    OfferReceived,
    AnswerCreated,
    AnswerSent,
    Connected,
    Failed,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Closed)
    }

    pub fn awaiting_answer(self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent | NegotiationState::Reconciling
        )
    }
}
