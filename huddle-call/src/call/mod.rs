mod call_command;
mod call_coordinator;
mod call_session;
mod call_state;
mod roster_sync;

pub use call_command::*;
pub use call_coordinator::*;
pub use call_session::*;
pub use call_state::*;
pub use roster_sync::*;
