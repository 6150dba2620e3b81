use std::sync::Arc;
use crate::transport::{DataChannel, PeerConnection, ReadyState, Signaling, SignalingState};

/// Label of the data channel carrying estimates.
pub const ESTIMATE_CHANNEL_LABEL: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideChannelState {
    Unopened,
    Negotiating,
    Open,
    Closed,
}

/// Opens the estimate channel on an already-running session by creating
/// the channel locally and renegotiating with a fresh offer.
pub struct SideChannelNegotiator {
    peer: Arc<dyn PeerConnection>,
    signaling: Arc<dyn Signaling>,
    label: String,
    channel: Option<Arc<dyn DataChannel>>,
    requested: bool,
}

impl SideChannelNegotiator {
    pub fn new(peer: Arc<dyn PeerConnection>, signaling: Arc<dyn Signaling>) -> Self {
        Self {
            peer,
            signaling,
            label: ESTIMATE_CHANNEL_LABEL.to_string(),
            channel: None,
            requested: false,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn state(&self) -> SideChannelState {
        match &self.channel {
            None if self.requested => SideChannelState::Closed,
            None => SideChannelState::Unopened,
            Some(channel) => match channel.ready_state() {
                ReadyState::Connecting => SideChannelState::Negotiating,
                ReadyState::Open => SideChannelState::Open,
                ReadyState::Closing | ReadyState::Closed => SideChannelState::Closed,
            },
        }
    }

    /// Creates the channel and sends the renegotiation offer. Only the
    /// first call does anything; later calls are rejected.
    pub async fn open_side_channel(&mut self) -> anyhow::Result<()> {
        if self.requested {
            anyhow::bail!("side channel '{}' was already requested", self.label);
        }
        self.requested = true;

        let state = self.peer.signaling_state();
        if state != SignalingState::Stable {
            anyhow::bail!("cannot renegotiate side channel in signaling state {:?}", state);
        }

        let channel = self.peer.create_data_channel(&self.label)?;
        self.channel = Some(channel);

        let offer = self.peer.create_offer().await?;
        self.peer.set_local_description(offer).await?;
        let local = self
            .peer
            .local_description()
            .ok_or_else(|| anyhow::anyhow!("no local description after renegotiation offer"))?;
        self.signaling.send(local.into()).await?;

        log::info!("Side channel '{}' requested, renegotiating", self.label);
        Ok(())
    }

    /// Sends only while the channel is open; returns whether it was sent.
    pub fn send(&self, text: &str) -> anyhow::Result<bool> {
        match &self.channel {
            Some(channel) if channel.ready_state() == ReadyState::Open => {
                channel.send(text)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
    }
}
