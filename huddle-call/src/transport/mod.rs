mod local_relay;
mod signaling_transport;
mod transport_event;

pub use local_relay::*;
pub use signaling_transport::*;
pub use transport_event::*;
