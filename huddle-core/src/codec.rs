//! JSON text codec for relay frames.

use crate::model::RelayFrame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode_frame(frame: &RelayFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(CodecError::Encode)
}

pub fn decode_frame(text: &str) -> Result<RelayFrame, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        IceCandidate, MediaKind, ParticipantId, RosterEvent, SignalingEnvelope, SignalingMessage,
    };

    fn envelope(message: SignalingMessage) -> RelayFrame {
        RelayFrame::Signal(SignalingEnvelope {
            sender: ParticipantId::from_u128(1),
            target: ParticipantId::from_u128(2),
            seq: 7,
            message,
        })
    }

    #[test]
    fn candidate_fields_are_flattened_on_the_wire() {
        let frame = envelope(SignalingMessage::IceCandidate {
            candidate: IceCandidate {
                candidate: "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host".into(),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            },
            generation: 3,
        });

        let text = encode_frame(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let message = &value["d"]["message"];

        assert_eq!(message["op"], "IceCandidate");
        assert_eq!(message["d"]["sdp_mid"], "0");
        assert_eq!(message["d"]["generation"], 3);
        assert_eq!(decode_frame(&text).unwrap(), frame);
    }

    #[test]
    fn media_toggle_uses_lowercase_kind() {
        let text = encode_frame(&envelope(SignalingMessage::MediaToggle {
            kind: MediaKind::Audio,
            enabled: false,
        }))
        .unwrap();

        assert!(text.contains(r#""kind":"audio""#));
    }

    #[test]
    fn roster_round_trips_as_sorted_set() {
        let frame = RelayFrame::Roster(RosterEvent::new([
            ParticipantId::from_u128(3),
            ParticipantId::from_u128(1),
        ]));
        let decoded = decode_frame(&encode_frame(&frame).unwrap()).unwrap();

        let RelayFrame::Roster(roster) = decoded else {
            panic!("expected roster frame");
        };
        let ids: Vec<_> = roster.participants.into_iter().collect();
        assert_eq!(
            ids,
            vec![ParticipantId::from_u128(1), ParticipantId::from_u128(3)]
        );
    }

    #[test]
    fn unknown_op_is_a_decode_error() {
        let err = decode_frame(r#"{"op":"Teleport","d":{}}"#).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));

        assert!(decode_frame("not json").is_err());
    }
}
