use huddle_core::{MediaKind, ParticipantId};
use thiserror::Error;

/// Capture failures. All of them are recoverable: a call proceeds with the
/// affected tracks missing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to capture was denied")]
    PermissionDenied,
    #[error("capture device is unavailable")]
    DeviceUnavailable,
    #[error("no local {0} track")]
    NoTrack(MediaKind),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("remote description rejected: {0}")]
    MalformedDescription(String),
    #[error("connection reported failure")]
    TransportFailure,
    #[error("negotiation did not complete in time")]
    Timeout,
    #[error("native connection: {0:#}")]
    Native(anyhow::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("relay link is down")]
    Disconnected,
    #[error("not joined to a room")]
    NotJoined,
    #[error("already joined to a room")]
    AlreadyJoined,
    #[error("frame codec: {0}")]
    Codec(String),
}

/// Messages that do not fit the current negotiation state. Logged and
/// dropped, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolAnomaly {
    #[error("offer from {0}, which never offers to us")]
    UnexpectedOffer(ParticipantId),
    #[error("answer from {0}, which never answers us")]
    UnexpectedAnswer(ParticipantId),
    #[error("duplicate {kind} from {from} (generation {generation})")]
    DuplicateDescription {
        from: ParticipantId,
        kind: &'static str,
        generation: u32,
    },
    #[error("{kind} from {from} for stale generation {generation}")]
    StaleGeneration {
        from: ParticipantId,
        kind: &'static str,
        generation: u32,
    },
    #[error("{kind} from {from} for generation {generation}, which we never started")]
    FutureGeneration {
        from: ParticipantId,
        kind: &'static str,
        generation: u32,
    },
    #[error("more than {limit} candidates from {from} waiting for a description")]
    CandidateOverflow { from: ParticipantId, limit: usize },
    #[error("{kind} from {from} with no connection entry")]
    UnknownSender {
        from: ParticipantId,
        kind: &'static str,
    },
    #[error("envelope from {from} went backwards: seq {seq} after {last}")]
    SequenceRegression {
        from: ParticipantId,
        seq: u64,
        last: u64,
    },
    #[error("envelope addressed to {0}, not to us")]
    Misaddressed(ParticipantId),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("already in a call")]
    AlreadyInCall,
    #[error("not in a call")]
    NotInCall,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("call session stopped before replying")]
    SessionGone,
}
