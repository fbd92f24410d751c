use crate::config::CallConfig;
use crate::media::LocalTrack;
use crate::peer::{
    ConnectionEvent, ConnectionFactory, NativeConnection, NativeEvent, SdpKind, TrackReplacement,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{IceCandidate, MediaKind, ParticipantId};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use uuid::Uuid;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

const STREAM_ID: &str = "huddle-local";

/// One sample track per local capture track, shared by every connection.
type SampleTracks = Arc<DashMap<String, Arc<TrackLocalStaticSample>>>;

/// Builds webrtc-rs peer connections.
pub struct RtcConnectionFactory {
    api: API,
    ice_servers: Vec<RTCIceServer>,
    tracks: SampleTracks,
}

impl RtcConnectionFactory {
    pub fn new(config: &CallConfig) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            api,
            ice_servers,
            tracks: Arc::new(DashMap::new()),
        })
    }
}

/// Returns the sample track that carries `track`, creating it on first use.
fn sample_track(tracks: &SampleTracks, track: &LocalTrack) -> Arc<dyn TrackLocal + Send + Sync> {
    tracks
        .entry(track.id().to_owned())
        .or_insert_with(|| {
            let mime_type = match track.kind() {
                MediaKind::Audio => MIME_TYPE_OPUS,
                MediaKind::Video => MIME_TYPE_VP8,
            };
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_owned(),
                STREAM_ID.to_owned(),
            ))
        })
        .clone()
}

#[async_trait]
impl ConnectionFactory for RtcConnectionFactory {
    async fn connect(
        &self,
        local: ParticipantId,
        remote: ParticipantId,
        instance: Uuid,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Arc<dyn NativeConnection>> {
        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(rtc_config).await?);

        let emit = move |event: NativeEvent| {
            let _ = events.send(ConnectionEvent {
                remote,
                instance,
                event,
            });
        };

        let on_state = emit.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            info!("Connection state to peer {} changed: {:?}", remote, s);
            match s {
                RTCPeerConnectionState::Connected => on_state(NativeEvent::Connected),
                RTCPeerConnectionState::Disconnected => on_state(NativeEvent::Disconnected),
                RTCPeerConnectionState::Failed => on_state(NativeEvent::Failed),
                _ => {}
            }
            Box::pin(async {})
        }));

        let on_candidate = emit.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            if let Some(json) = c.and_then(|c| c.to_json().ok()) {
                on_candidate(NativeEvent::LocalCandidate(IceCandidate {
                    candidate: json.candidate,
                    sdp_mid: json.sdp_mid,
                    sdp_m_line_index: json.sdp_mline_index,
                }));
            }
            Box::pin(async {})
        }));

        let on_track = emit;
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let kind = match track.kind() {
                    RTPCodecType::Audio => Some(MediaKind::Audio),
                    RTPCodecType::Video => Some(MediaKind::Video),
                    _ => None,
                };
                if let Some(kind) = kind {
                    on_track(NativeEvent::RemoteTrack(kind));
                }
                Box::pin(async {})
            },
        ));

        debug!("Created peer connection {} -> {}", local, remote);
        Ok(Arc::new(RtcConnection {
            tracks: self.tracks.clone(),
            pc,
            video_sender: Mutex::new(None),
        }))
    }

    fn release_track(&self, track_id: &str) {
        if self.tracks.remove(track_id).is_some() {
            debug!("Released sample track {}", track_id);
        }
    }
}

/// webrtc-rs backed `NativeConnection`.
pub struct RtcConnection {
    tracks: SampleTracks,
    pc: Arc<RTCPeerConnection>,
    video_sender: Mutex<Option<Arc<RTCRtpSender>>>,
}

impl RtcConnection {
    async fn add_sender(&self, track: &LocalTrack) -> Result<()> {
        let sample = sample_track(&self.tracks, track);
        let sender = self
            .pc
            .add_track(sample)
            .await
            .with_context(|| format!("failed to add {} sender", track.id()))?;
        if track.kind() == MediaKind::Video {
            *self.video_sender.lock().await = Some(sender);
        }
        Ok(())
    }
}

#[async_trait]
impl NativeConnection for RtcConnection {
    async fn attach_tracks(&self, tracks: &[Arc<LocalTrack>]) -> Result<()> {
        for track in tracks {
            self.add_sender(track).await?;
        }

        // Receive both kinds even when we send neither.
        for (kind, codec) in [
            (MediaKind::Audio, RTPCodecType::Audio),
            (MediaKind::Video, RTPCodecType::Video),
        ] {
            if !tracks.iter().any(|t| t.kind() == kind) {
                self.pc
                    .add_transceiver_from_kind(
                        codec,
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Recvonly,
                            send_encodings: vec![],
                        }),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<String> {
        let offer = self
            .pc
            .create_offer(Some(RTCOfferOptions {
                ice_restart,
                ..Default::default()
            }))
            .await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await?;
        Ok(())
    }

    async fn replace_video_track(&self, track: Option<Arc<LocalTrack>>) -> Result<TrackReplacement> {
        let sample = track.as_deref().map(|t| sample_track(&self.tracks, t));

        let mut sender = self.video_sender.lock().await;
        if let Some(sender) = sender.as_ref() {
            sender.replace_track(sample).await?;
            return Ok(TrackReplacement::InPlace);
        }

        let Some(sample) = sample else {
            return Ok(TrackReplacement::InPlace);
        };
        *sender = Some(self.pc.add_track(sample).await?);
        Ok(TrackReplacement::RenegotiationRequired)
    }

    fn is_connected(&self) -> bool {
        self.pc.connection_state() == RTCPeerConnectionState::Connected
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}
