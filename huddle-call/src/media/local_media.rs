use crate::error::MediaError;
use crate::media::{LocalTrack, MediaDevices, TrackSource};
use crate::peer::{MediaFlags, PeerEnv, PeerOutcome, PeerRegistry, TrackReplacement};
use huddle_core::{MediaKind, ParticipantId};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Snapshot of local capture, as rendered by the UI.
#[derive(Debug, Clone, Default)]
pub struct LocalMediaState {
    pub mic_enabled: bool,
    pub camera_enabled: bool,
    pub screen_sharing: bool,
    pub tracks: Vec<Arc<LocalTrack>>,
}

impl LocalMediaState {
    pub fn active_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }
}

/// Result of swapping the outgoing video on every connection.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VideoSwap {
    pub in_place: usize,
    pub renegotiated: usize,
    pub unreachable: Vec<ParticipantId>,
}

/// Owns local capture for one call.
pub struct LocalMediaManager {
    devices: Arc<dyn MediaDevices>,
    microphone: Option<Arc<LocalTrack>>,
    camera: Option<Arc<LocalTrack>>,
    screen: Option<Arc<LocalTrack>>,
}

impl LocalMediaManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            microphone: None,
            camera: None,
            screen: None,
        }
    }

    /// Opens the requested devices. A partial result is kept; the error is
    /// returned only when nothing requested could be opened.
    pub async fn acquire(
        &mut self,
        constraints: MediaConstraints,
    ) -> Result<LocalMediaState, MediaError> {
        let mut first_error = None;

        if constraints.audio && self.microphone.is_none() {
            match self.devices.open(TrackSource::Microphone).await {
                Ok(track) => self.microphone = Some(track),
                Err(e) => {
                    warn!("Microphone unavailable: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if constraints.video && self.camera.is_none() {
            match self.devices.open(TrackSource::Camera).await {
                Ok(track) => self.camera = Some(track),
                Err(e) => {
                    warn!("Camera unavailable: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if self.microphone.is_none() && self.camera.is_none() => Err(e),
            _ => {
                info!(
                    audio = self.microphone.is_some(),
                    video = self.camera.is_some(),
                    "Local media acquired"
                );
                Ok(self.state())
            }
        }
    }

    pub fn state(&self) -> LocalMediaState {
        LocalMediaState {
            mic_enabled: self.microphone.as_ref().is_some_and(|t| t.is_enabled()),
            camera_enabled: self.camera.as_ref().is_some_and(|t| t.is_enabled()),
            screen_sharing: self.screen.is_some(),
            tracks: self
                .microphone
                .iter()
                .chain(self.camera.iter())
                .chain(self.screen.iter())
                .cloned()
                .collect(),
        }
    }

    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        self.track(kind).is_some_and(|t| t.is_enabled())
    }

    /// Mute flags as announced to peers. A missing track counts as disabled.
    pub fn flags(&self) -> MediaFlags {
        MediaFlags {
            audio: self.is_enabled(MediaKind::Audio),
            video: self.is_enabled(MediaKind::Video),
        }
    }

    /// Flips the track flag in place. Connections are not touched.
    pub fn set_track_enabled(&mut self, kind: MediaKind, enabled: bool) -> Result<(), MediaError> {
        let track = self.track(kind).ok_or(MediaError::NoTrack(kind))?;
        track.set_enabled(enabled);
        debug!(%kind, enabled, "Local track toggled");
        Ok(())
    }

    /// Tracks every new connection starts with.
    pub fn outgoing_tracks(&self) -> Vec<Arc<LocalTrack>> {
        self.microphone
            .iter()
            .chain(self.outgoing_video().iter())
            .cloned()
            .collect()
    }

    pub fn outgoing_video(&self) -> Option<Arc<LocalTrack>> {
        self.screen.clone().or_else(|| self.camera.clone())
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    /// Opens a display track and makes it the outgoing video.
    pub async fn start_screen_share(&mut self) -> Result<Arc<LocalTrack>, MediaError> {
        if let Some(screen) = &self.screen {
            return Ok(screen.clone());
        }
        let screen = self.devices.open(TrackSource::Screen).await?;
        info!(track = screen.id(), "Screen share started");
        self.screen = Some(screen.clone());
        Ok(screen)
    }

    /// Ends the screen share and returns the video that should go out instead.
    pub fn stop_screen_share(&mut self) -> Option<Arc<LocalTrack>> {
        if let Some(screen) = self.screen.take() {
            screen.stop();
            info!(track = screen.id(), "Screen share stopped");
        }
        self.camera.clone()
    }

    /// Points every connection's outgoing video at `track`.
    ///
    /// Connections that can swap the sender in place do so; the others run a
    /// renegotiation scoped to that one pair.
    pub async fn replace_video_track(
        &self,
        track: Option<Arc<LocalTrack>>,
        registry: &mut PeerRegistry,
        env: &PeerEnv,
    ) -> VideoSwap {
        let mut swap = VideoSwap::default();
        for peer in registry.all_mut() {
            match peer.replace_video_track(env, track.clone()).await {
                (Some(TrackReplacement::InPlace), _) => swap.in_place += 1,
                (Some(TrackReplacement::RenegotiationRequired), PeerOutcome::Continue) => {
                    swap.renegotiated += 1
                }
                (_, PeerOutcome::Unreachable) => swap.unreachable.push(peer.remote()),
                (None, PeerOutcome::Continue) => {}
            }
        }
        debug!(?swap, "Outgoing video replaced");
        swap
    }

    /// Stops every track. Safe to call repeatedly, and before `acquire`.
    pub fn release(&mut self) {
        for track in [self.microphone.take(), self.camera.take(), self.screen.take()]
            .into_iter()
            .flatten()
        {
            track.stop();
        }
    }

    fn track(&self, kind: MediaKind) -> Option<&Arc<LocalTrack>> {
        match kind {
            MediaKind::Audio => self.microphone.as_ref(),
            MediaKind::Video => self.camera.as_ref(),
        }
    }
}

impl Drop for LocalMediaManager {
    fn drop(&mut self) {
        self.release();
    }
}
