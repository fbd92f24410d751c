use crate::error::CallError;
use tokio::sync::oneshot;

/// Requests from the coordinator handle to its session actor.
#[derive(Debug)]
pub enum CallCommand {
    /// Tear the session down. Replied to once everything is released.
    Leave { reply: oneshot::Sender<()> },

    /// Each toggle replies with the new enabled state.
    ToggleMic {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleCamera {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleScreenShare {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
}
