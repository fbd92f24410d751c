use crate::call::{CallCommand, CallSession, CallState, SessionChannels};
use crate::config::CallConfig;
use crate::error::CallError;
use crate::media::{LocalMediaManager, MediaDevices};
use crate::peer::{ConnectionFactory, PeerEnv, TimerSink};
use crate::transport::SignalingTransport;
use huddle_core::{ParticipantId, RoomId};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct ActiveCall {
    commands: mpsc::Sender<CallCommand>,
    task: JoinHandle<()>,
}

struct CoordinatorInner {
    local: ParticipantId,
    transport: Arc<dyn SignalingTransport>,
    factory: Arc<dyn ConnectionFactory>,
    devices: Arc<dyn MediaDevices>,
    config: Arc<CallConfig>,
    state: Arc<watch::Sender<CallState>>,
    active: Mutex<Option<ActiveCall>>,
}

/// Public handle of the call feature for one local participant.
///
/// Cheap to clone. Each join spawns a fresh `CallSession` task; every other
/// operation is a message to that task.
#[derive(Clone)]
pub struct CallCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl CallCoordinator {
    pub fn new(
        local: ParticipantId,
        transport: Arc<dyn SignalingTransport>,
        factory: Arc<dyn ConnectionFactory>,
        devices: Arc<dyn MediaDevices>,
        config: CallConfig,
    ) -> Self {
        let (state, _) = watch::channel(CallState::default());
        Self {
            inner: Arc::new(CoordinatorInner {
                local,
                transport,
                factory,
                devices,
                config: Arc::new(config),
                state: Arc::new(state),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.inner.local
    }

    /// Observable call state. The first value after `join_call` already
    /// carries the room and the local media.
    pub fn state(&self) -> watch::Receiver<CallState> {
        self.inner.state.subscribe()
    }

    pub fn is_in_call(&self) -> bool {
        self.inner.state.borrow().is_active()
    }

    pub async fn join_call(&self, room: RoomId) -> Result<(), CallError> {
        let inner = &self.inner;
        let mut active = inner.active.lock().await;
        if active.is_some() && self.is_in_call() {
            return Err(CallError::AlreadyInCall);
        }
        if let Some(ended) = active.take() {
            let _ = ended.task.await;
        }

        info!(room = %room, local = %inner.local, "Joining call");
        let mut media = LocalMediaManager::new(inner.devices.clone());
        let media_error = media.acquire(inner.config.media).await.err();
        if let Some(e) = &media_error {
            warn!("Joining without local media: {}", e);
        }

        let transport_rx = match inner.transport.join_room(&room, inner.local).await {
            Ok(rx) => rx,
            Err(e) => {
                media.release();
                return Err(e.into());
            }
        };

        let (commands_tx, commands_rx) = mpsc::channel(inner.config.mailbox_capacity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timers, timers_rx) = TimerSink::new();

        let env = PeerEnv {
            local: inner.local,
            transport: inner.transport.clone(),
            factory: inner.factory.clone(),
            events: events_tx,
            timers,
            config: inner.config.clone(),
            outgoing_tracks: media.outgoing_tracks(),
            local_media: media.flags(),
            paused: false,
        };

        inner.state.send_replace(CallState {
            room: Some(room.clone()),
            local_media: media.state(),
            media_error,
            ..CallState::default()
        });

        let session = CallSession::new(
            room,
            media,
            env,
            SessionChannels {
                commands: commands_rx,
                transport: transport_rx,
                connections: events_rx,
                timers: timers_rx,
            },
            inner.state.clone(),
        );
        let task = tokio::spawn(session.run());

        *active = Some(ActiveCall {
            commands: commands_tx,
            task,
        });
        Ok(())
    }

    /// Leaves the call and waits until every resource is released.
    pub async fn leave_call(&self) -> Result<(), CallError> {
        let Some(call) = self.inner.active.lock().await.take() else {
            return Err(CallError::NotInCall);
        };
        if !self.is_in_call() {
            let _ = call.task.await;
            return Err(CallError::NotInCall);
        }

        let (reply, done) = oneshot::channel();
        if call.commands.send(CallCommand::Leave { reply }).await.is_err() {
            return Err(CallError::NotInCall);
        }
        let _ = done.await;
        if let Err(e) = call.task.await {
            warn!("Call session task failed: {}", e);
        }
        Ok(())
    }

    /// Returns whether the microphone is now enabled.
    pub async fn toggle_mic(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleMic { reply }).await
    }

    pub async fn toggle_camera(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleCamera { reply })
            .await
    }

    /// Returns whether the screen is now being shared.
    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleScreenShare { reply })
            .await
    }

    async fn request<F>(&self, make: F) -> Result<bool, CallError>
    where
        F: FnOnce(oneshot::Sender<Result<bool, CallError>>) -> CallCommand,
    {
        let commands = {
            let mut active = self.inner.active.lock().await;
            match active.as_ref() {
                Some(call) if self.is_in_call() => call.commands.clone(),
                _ => {
                    *active = None;
                    return Err(CallError::NotInCall);
                }
            }
        };

        let (reply, response) = oneshot::channel();
        commands
            .send(make(reply))
            .await
            .map_err(|_| CallError::NotInCall)?;
        match response.await {
            Ok(result) => result,
            Err(_) if !self.is_in_call() => Err(CallError::NotInCall),
            Err(_) => Err(CallError::SessionGone),
        }
    }
}
