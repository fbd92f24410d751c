use crate::model::media::MediaKind;
use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// One trickled network path. Opaque to the signaling layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Per-pair negotiation traffic.
///
/// `generation` is the ICE generation of the sender's connection; it grows by
/// one on every ICE restart so late messages from an older attempt can be told
/// apart from the current one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "d")]
pub enum SignalingMessage {
    Offer {
        sdp: String,
        generation: u32,
    },
    Answer {
        sdp: String,
        generation: u32,
    },
    IceCandidate {
        #[serde(flatten)]
        candidate: IceCandidate,
        generation: u32,
    },
    MediaToggle {
        kind: MediaKind,
        enabled: bool,
    },
    /// Sent by the answering side when it needs a new offer, since it never
    /// creates one itself.
    RenegotiationNeeded {
        generation: u32,
    },
}

impl SignalingMessage {
    pub fn label(&self) -> &'static str {
        match self {
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice-candidate",
            SignalingMessage::MediaToggle { .. } => "media-toggle",
            SignalingMessage::RenegotiationNeeded { .. } => "renegotiation-needed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalingEnvelope {
    pub sender: ParticipantId,
    pub target: ParticipantId,
    /// Monotonic per (sender, target). Diagnostic only.
    pub seq: u64,
    pub message: SignalingMessage,
}
