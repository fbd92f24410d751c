use huddle_core::ParticipantId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    NegotiationTimeout,
    RestartDue,
}

/// A timer firing. `instance` and `token` identify the exact arming, so a
/// firing that was superseded or outlived its connection is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTimer {
    pub remote: ParticipantId,
    pub instance: Uuid,
    pub token: u64,
    pub generation: u32,
    pub kind: TimerKind,
}

/// Posts timer firings into the call session mailbox.
#[derive(Clone)]
pub struct TimerSink {
    tx: mpsc::UnboundedSender<PeerTimer>,
}

impl TimerSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerTimer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn arm(&self, delay: Duration, timer: PeerTimer) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(timer);
        })
    }
}
