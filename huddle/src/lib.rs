pub use huddle_core::{ParticipantId, RoomId};

pub mod model {
    pub use huddle_core::codec;
    pub use huddle_core::model::*;
}

#[cfg(feature = "call")]
pub mod call {
    pub use huddle_call::*;
}
