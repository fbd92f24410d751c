mod loopback;
mod native;
mod negotiation_state;
mod peer_connection;
mod peer_env;
mod registry;
mod rtc_connection;
mod timers;

pub use loopback::*;
pub use native::*;
pub use negotiation_state::*;
pub use peer_connection::*;
pub use peer_env::*;
pub use registry::*;
pub use rtc_connection::*;
pub use timers::*;
