use crate::media::MediaConstraints;
use huddle_core::IceServerConfig;
use std::time::Duration;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Call tuning knobs.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub media: MediaConstraints,
    /// How long a pair may stay short of `Connected` before it counts as failed.
    pub negotiation_timeout: Duration,
    /// Delay before each ICE restart. Its length is the restart budget.
    pub restart_backoff: Vec<Duration>,
    /// How long a lost relay link may stay down before the call is abandoned.
    pub reconnect_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl CallConfig {
    pub fn max_restarts(&self) -> usize {
        self.restart_backoff.len()
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned()],
                username: None,
                credential: None,
            }],
            media: MediaConstraints::default(),
            negotiation_timeout: Duration::from_secs(15),
            restart_backoff: vec![Duration::from_secs(1), Duration::from_secs(3)],
            reconnect_timeout: Duration::from_secs(10),
            mailbox_capacity: 256,
        }
    }
}
