use huddle_core::MediaKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> MediaKind {
        match self {
            TrackSource::Microphone => MediaKind::Audio,
            TrackSource::Camera | TrackSource::Screen => MediaKind::Video,
        }
    }
}

/// A captured local track shared by every outgoing connection.
///
/// `enabled` is flipped in place: muting never touches the connections.
#[derive(Debug)]
pub struct LocalTrack {
    id: String,
    source: TrackSource,
    enabled: AtomicBool,
    live: AtomicBool,
}

impl LocalTrack {
    pub fn new(source: TrackSource) -> Arc<Self> {
        Arc::new(Self {
            id: format!("{:?}-{}", source, Uuid::new_v4()).to_lowercase(),
            source,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.source.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Ends capture. A stopped track is never restarted.
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
    }
}
