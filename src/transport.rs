//! Collaborator seams: peer session, media tracks, data channels and
//! signaling. The session logic only talks to these traits; `loopback`
//! and `signaling` provide in-process and TCP implementations.

pub mod loopback;
pub mod signaling;

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::common::BallFrame;

pub use loopback::{LoopbackDataChannel, LoopbackPeer};
pub use signaling::{MemorySignaling, TcpSignaling};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("end of stream")]
    EndOfStream,
    #[error("data channel '{label}' is not open (state: {state:?})")]
    NotOpen { label: String, state: ReadyState },
    #[error("invalid session description: {0}")]
    InvalidDescription(String),
    #[error("cannot {action} in signaling state {state:?}")]
    InvalidState { action: &'static str, state: SignalingState },
    #[error("peer connection is closed")]
    Closed,
    #[error("signaling channel closed")]
    SignalingClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: String) -> Self {
        Self { sdp_type: SdpType::Offer, sdp }
    }

    pub fn answer(sdp: String) -> Self {
        Self { sdp_type: SdpType::Answer, sdp }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Messages exchanged over the signaling channel, one JSON object each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate(IceCandidate),
    Bye,
}

impl From<SessionDescription> for SignalMessage {
    fn from(description: SessionDescription) -> Self {
        match description.sdp_type {
            SdpType::Offer => SignalMessage::Offer { sdp: description.sdp },
            SdpType::Answer => SignalMessage::Answer { sdp: description.sdp },
        }
    }
}

pub type TrackHandler = Box<dyn Fn(Box<dyn VideoTrack>) + Send + Sync>;
pub type DataChannelHandler = Box<dyn Fn(Arc<dyn DataChannel>) + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(String) + Send + Sync>;

/// Pull side of a video track.
#[async_trait]
pub trait VideoTrack: Send {
    fn id(&self) -> &str;

    /// Next frame; an error ends the track.
    async fn recv(&mut self) -> anyhow::Result<BallFrame>;
}

pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    /// Fails unless the channel is open.
    fn send(&self, text: &str) -> anyhow::Result<()>;

    fn on_message(&self, handler: MessageHandler);

    fn close(&self);
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_track(&self, track: Box<dyn VideoTrack>) -> anyhow::Result<()>;

    fn create_data_channel(&self, label: &str) -> anyhow::Result<Arc<dyn DataChannel>>;

    async fn create_offer(&self) -> anyhow::Result<SessionDescription>;

    async fn create_answer(&self) -> anyhow::Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> anyhow::Result<()>;

    fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()>;

    fn signaling_state(&self) -> SignalingState;

    fn on_track(&self, handler: TrackHandler);

    fn on_data_channel(&self, handler: DataChannelHandler);

    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Signaling: Send + Sync {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()>;

    async fn receive(&self) -> anyhow::Result<SignalMessage>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Applies one signaling message to the peer. Returns `false` on `Bye`.
///
/// Offers are answered right away; answers and candidates are applied.
pub async fn apply_signal(peer: &dyn PeerConnection, signaling: &dyn Signaling,
                          message: SignalMessage) -> anyhow::Result<bool> {
    match message {
        SignalMessage::Offer { sdp } => {
            log::info!("Received offer");
            peer.set_remote_description(SessionDescription::offer(sdp)).await?;
            let answer = peer.create_answer().await?;
            peer.set_local_description(answer).await?;
            if let Some(local) = peer.local_description() {
                signaling.send(local.into()).await?;
            }
        }
        SignalMessage::Answer { sdp } => {
            log::info!("Received answer");
            peer.set_remote_description(SessionDescription::answer(sdp)).await?;
        }
        SignalMessage::Candidate(candidate) => {
            peer.add_ice_candidate(candidate).await?;
        }
        SignalMessage::Bye => {
            log::info!("Received bye");
            return Ok(false);
        }
    }
    Ok(true)
}
