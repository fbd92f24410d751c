use crate::error::MediaError;
use crate::media::{LocalTrack, TrackSource};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capture backend. Opening a device may prompt the user, so every call is
/// a suspension point.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, source: TrackSource) -> Result<Arc<LocalTrack>, MediaError>;
}

/// How a synthetic device answers an open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePolicy {
    Available,
    Denied,
    Missing,
}

/// Devices that produce silent/black tracks. Used by headless runs and tests.
#[derive(Debug)]
pub struct SyntheticDevices {
    microphone: DevicePolicy,
    camera: DevicePolicy,
    screen: DevicePolicy,
    opened: AtomicUsize,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self {
            microphone: DevicePolicy::Available,
            camera: DevicePolicy::Available,
            screen: DevicePolicy::Available,
            opened: AtomicUsize::new(0),
        }
    }

    /// Every prompt is refused.
    pub fn denied() -> Self {
        Self {
            microphone: DevicePolicy::Denied,
            camera: DevicePolicy::Denied,
            screen: DevicePolicy::Denied,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn with_camera(mut self, policy: DevicePolicy) -> Self {
        self.camera = policy;
        self
    }

    pub fn with_microphone(mut self, policy: DevicePolicy) -> Self {
        self.microphone = policy;
        self
    }

    pub fn with_screen(mut self, policy: DevicePolicy) -> Self {
        self.screen = policy;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn open(&self, source: TrackSource) -> Result<Arc<LocalTrack>, MediaError> {
        let policy = match source {
            TrackSource::Microphone => &self.microphone,
            TrackSource::Camera => &self.camera,
            TrackSource::Screen => &self.screen,
        };
        match policy {
            DevicePolicy::Available => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(LocalTrack::new(source))
            }
            DevicePolicy::Denied => Err(MediaError::PermissionDenied),
            DevicePolicy::Missing => Err(MediaError::DeviceUnavailable),
        }
    }
}
