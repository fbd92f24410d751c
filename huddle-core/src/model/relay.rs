use crate::model::roster::RosterEvent;
use crate::model::signaling::SignalingEnvelope;
use serde::{Deserialize, Serialize};

/// Frames a room relay pushes down to one connected client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "op", content = "d")]
pub enum RelayFrame {
    Roster(RosterEvent),
    Signal(SignalingEnvelope),
    LinkLost,
    LinkRestored,
}
