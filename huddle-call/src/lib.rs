pub mod call;
pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod transport;

pub use call::*;
pub use config::CallConfig;
pub use error::*;
pub use media::*;
pub use peer::*;
pub use transport::*;
