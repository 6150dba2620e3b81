//! In-process peer pair standing in for a real media/data transport.
//!
//! Descriptions are a reduced SDP: `m=video <id> sendonly|recvonly` and
//! `m=application <label>` lines. Media flows over tokio channels once the
//! sending peer reaches `Stable`; a data-channel end opens when its own peer
//! reaches `Stable` and the other end exists.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::common::BallFrame;
use crate::transport::{
    DataChannel, DataChannelHandler, IceCandidate, MessageHandler, PeerConnection, ReadyState,
    SdpType, SessionDescription, SignalingState, TrackHandler, TransportError, VideoTrack,
};

const MEDIA_BUFFER: usize = 4;

#[derive(Default)]
struct Link {
    video: Mutex<HashMap<String, mpsc::Sender<BallFrame>>>,
    channels: Mutex<HashMap<String, [Option<Arc<LoopbackDataChannel>>; 2]>>,
}

impl Link {
    fn channel_end(&self, label: &str, side: usize) -> Option<Arc<LoopbackDataChannel>> {
        self.channels
            .lock()
            .get(label)
            .and_then(|ends| ends[side].clone())
    }

    fn register_channel(&self, end: &Arc<LoopbackDataChannel>) {
        let mut channels = self.channels.lock();
        let ends = channels.entry(end.label.clone()).or_default();
        ends[end.side] = Some(Arc::clone(end));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MediaLine {
    Video { id: String, sending: bool },
    Application { label: String },
}

fn write_sdp(session_id: u64, version: u64, lines: &[MediaLine]) -> String {
    let mut sdp = format!("v=0\no=- {} {} IN IP4 127.0.0.1\ns=-\n", session_id, version);
    for line in lines {
        match line {
            MediaLine::Video { id, sending } => {
                let direction = if *sending { "sendonly" } else { "recvonly" };
                sdp.push_str(&format!("m=video {} {}\n", id, direction));
            }
            MediaLine::Application { label } => {
                sdp.push_str(&format!("m=application {}\n", label));
            }
        }
    }
    sdp
}

fn parse_sdp(sdp: &str) -> Result<Vec<MediaLine>, TransportError> {
    let mut lines = sdp.lines();
    if lines.next().map(str::trim) != Some("v=0") {
        return Err(TransportError::InvalidDescription("missing version line".to_string()));
    }

    let mut media = Vec::new();
    for line in lines {
        let Some(rest) = line.trim().strip_prefix("m=") else { continue };
        let fields: Vec<&str> = rest.split_whitespace().collect();
        match fields.as_slice() {
            ["video", id, "sendonly"] => media.push(MediaLine::Video { id: id.to_string(), sending: true }),
            ["video", id, "recvonly"] => media.push(MediaLine::Video { id: id.to_string(), sending: false }),
            ["application", label] => media.push(MediaLine::Application { label: label.to_string() }),
            _ => return Err(TransportError::InvalidDescription(format!("bad media line '{}'", line))),
        }
    }
    Ok(media)
}

/// Receiving end of a loopback video track.
pub struct LoopbackRemoteTrack {
    id: String,
    rx: mpsc::Receiver<BallFrame>,
}

#[async_trait]
impl VideoTrack for LoopbackRemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    async fn recv(&mut self) -> anyhow::Result<BallFrame> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| TransportError::EndOfStream.into())
    }
}

#[derive(Default)]
struct Inbox {
    handler: Option<Arc<MessageHandler>>,
    backlog: Vec<String>,
}

/// One end of a loopback data channel.
pub struct LoopbackDataChannel {
    label: String,
    side: usize,
    state: Mutex<ReadyState>,
    inbox: Mutex<Inbox>,
    link: Weak<Link>,
}

impl LoopbackDataChannel {
    fn new(label: &str, side: usize, link: &Arc<Link>) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            side,
            state: Mutex::new(ReadyState::Connecting),
            inbox: Mutex::new(Inbox::default()),
            link: Arc::downgrade(link),
        })
    }

    fn set_state(&self, state: ReadyState) {
        *self.state.lock() = state;
    }

    fn deliver(&self, text: String) {
        if self.ready_state() == ReadyState::Closed {
            return;
        }

        let handler = {
            let mut inbox = self.inbox.lock();
            match inbox.handler.clone() {
                Some(handler) => handler,
                None => {
                    inbox.backlog.push(text);
                    return;
                }
            }
        };
        handler(text);
    }
}

impl DataChannel for LoopbackDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&self, text: &str) -> anyhow::Result<()> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(TransportError::NotOpen { label: self.label.clone(), state }.into());
        }

        let link = self.link.upgrade().ok_or(TransportError::Closed)?;
        let other = link
            .channel_end(&self.label, 1 - self.side)
            .ok_or(TransportError::Closed)?;
        other.deliver(text.to_string());
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) {
        let handler = Arc::new(handler);
        let backlog = {
            let mut inbox = self.inbox.lock();
            inbox.handler = Some(Arc::clone(&handler));
            std::mem::take(&mut inbox.backlog)
        };
        for text in backlog {
            handler(text);
        }
    }

    fn close(&self) {
        self.set_state(ReadyState::Closed);
        if let Some(link) = self.link.upgrade() {
            if let Some(other) = link.channel_end(&self.label, 1 - self.side) {
                other.set_state(ReadyState::Closed);
            }
        }
        log::debug!("Data channel '{}' closed", self.label);
    }
}

struct LocalTrack {
    id: String,
    track: Option<Box<dyn VideoTrack>>,
}

struct PeerState {
    signaling_state: SignalingState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    version: u64,
    local_tracks: Vec<LocalTrack>,
    remote_tracks: HashSet<String>,
    channels: Vec<String>,
    on_track: Option<Arc<TrackHandler>>,
    on_data_channel: Option<Arc<DataChannelHandler>>,
    pending_tracks: Vec<Box<dyn VideoTrack>>,
    pending_channels: Vec<Arc<dyn DataChannel>>,
    pumps: Vec<JoinHandle<()>>,
}

impl PeerState {
    fn new() -> Self {
        Self {
            signaling_state: SignalingState::Stable,
            local: None,
            remote: None,
            version: 0,
            local_tracks: Vec::new(),
            remote_tracks: HashSet::new(),
            channels: Vec::new(),
            on_track: None,
            on_data_channel: None,
            pending_tracks: Vec::new(),
            pending_channels: Vec::new(),
            pumps: Vec::new(),
        }
    }

    fn expect_state(&self, action: &'static str, expected: SignalingState) -> Result<(), TransportError> {
        if self.signaling_state != expected {
            return Err(TransportError::InvalidState { action, state: self.signaling_state });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.signaling_state == SignalingState::Closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

/// One side of an in-process peer connection.
pub struct LoopbackPeer {
    side: usize,
    session_id: u64,
    link: Arc<Link>,
    state: Mutex<PeerState>,
}

impl LoopbackPeer {
    pub fn pair() -> (LoopbackPeer, LoopbackPeer) {
        let link = Arc::new(Link::default());
        let make = |side: usize| LoopbackPeer {
            side,
            session_id: 1000 + side as u64,
            link: Arc::clone(&link),
            state: Mutex::new(PeerState::new()),
        };
        (make(0), make(1))
    }

    fn other_side(&self) -> usize {
        1 - self.side
    }

    // Called whenever this peer returns to `Stable` after an exchange.
    fn on_stable(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for local in state.local_tracks.iter_mut() {
            if local.track.is_none() {
                continue;
            }
            let Some(tx) = self.link.video.lock().remove(&local.id) else { continue };
            let Some(mut track) = local.track.take() else { continue };
            let id = local.id.clone();

            log::debug!("peer{}: starting media for track '{}'", self.side, id);
            let pump = tokio::spawn(async move {
                loop {
                    match track.recv().await {
                        Ok(frame) => {
                            if tx.send(frame).await.is_err() {
                                log::debug!("Track '{}' receiver gone", id);
                                break;
                            }
                        }
                        Err(err) => {
                            log::debug!("Track '{}' ended: {}", id, err);
                            break;
                        }
                    }
                }
            });
            state.pumps.push(pump);
        }

        for label in state.channels.iter() {
            let own = self.link.channel_end(label, self.side);
            let other = self.link.channel_end(label, self.other_side());
            if let (Some(own), Some(_)) = (own, other) {
                if own.ready_state() == ReadyState::Connecting {
                    own.set_state(ReadyState::Open);
                    log::debug!("peer{}: data channel '{}' opened", self.side, label);
                }
            }
        }
    }

    fn media_lines(state: &PeerState) -> Vec<MediaLine> {
        let mut lines: Vec<MediaLine> = state
            .local_tracks
            .iter()
            .map(|t| MediaLine::Video { id: t.id.clone(), sending: true })
            .collect();
        let mut remote: Vec<&String> = state.remote_tracks.iter().collect();
        remote.sort();
        lines.extend(remote.into_iter().map(|id| MediaLine::Video { id: id.clone(), sending: false }));
        lines.extend(state.channels.iter().map(|label| MediaLine::Application { label: label.clone() }));
        lines
    }
}

#[async_trait]
impl PeerConnection for LoopbackPeer {
    fn add_track(&self, track: Box<dyn VideoTrack>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let id = track.id().to_string();
        if state.local_tracks.iter().any(|t| t.id == id) {
            anyhow::bail!("track '{}' already added", id);
        }
        state.local_tracks.push(LocalTrack { id, track: Some(track) });
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> anyhow::Result<Arc<dyn DataChannel>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        if state.channels.iter().any(|l| l == label) {
            anyhow::bail!("data channel '{}' already exists", label);
        }

        let end = LoopbackDataChannel::new(label, self.side, &self.link);
        self.link.register_channel(&end);
        state.channels.push(label.to_string());
        Ok(end)
    }

    async fn create_offer(&self) -> anyhow::Result<SessionDescription> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.expect_state("create offer", SignalingState::Stable)?;
        state.version += 1;
        let sdp = write_sdp(self.session_id, state.version, &Self::media_lines(&state));
        Ok(SessionDescription::offer(sdp))
    }

    async fn create_answer(&self) -> anyhow::Result<SessionDescription> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.expect_state("create answer", SignalingState::HaveRemoteOffer)?;
        let remote = state
            .remote
            .as_ref()
            .ok_or_else(|| TransportError::InvalidDescription("no remote offer".to_string()))?;

        let lines: Vec<MediaLine> = parse_sdp(&remote.sdp)?
            .into_iter()
            .map(|line| match line {
                MediaLine::Video { id, sending } => MediaLine::Video { id, sending: !sending },
                other => other,
            })
            .collect();
        state.version += 1;
        Ok(SessionDescription::answer(write_sdp(self.session_id, state.version, &lines)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> anyhow::Result<()> {
        let stable = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            let stable = match description.sdp_type {
                SdpType::Offer => {
                    state.expect_state("set local offer", SignalingState::Stable)?;
                    state.signaling_state = SignalingState::HaveLocalOffer;
                    false
                }
                SdpType::Answer => {
                    state.expect_state("set local answer", SignalingState::HaveRemoteOffer)?;
                    state.signaling_state = SignalingState::Stable;
                    true
                }
            };
            state.local = Some(description);
            stable
        };

        if stable {
            self.on_stable();
        }
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().local.clone()
    }

    async fn set_remote_description(&self, description: SessionDescription) -> anyhow::Result<()> {
        let lines = parse_sdp(&description.sdp)?;

        let mut new_tracks: Vec<Box<dyn VideoTrack>> = Vec::new();
        let mut new_channels: Vec<Arc<dyn DataChannel>> = Vec::new();
        let (stable, on_track, on_data_channel) = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            let stable = match description.sdp_type {
                SdpType::Offer => {
                    state.expect_state("set remote offer", SignalingState::Stable)?;
                    state.signaling_state = SignalingState::HaveRemoteOffer;
                    false
                }
                SdpType::Answer => {
                    state.expect_state("set remote answer", SignalingState::HaveLocalOffer)?;
                    state.signaling_state = SignalingState::Stable;
                    true
                }
            };
            state.remote = Some(description);

            for line in lines {
                match line {
                    MediaLine::Video { id, sending: true } => {
                        let known = state.remote_tracks.contains(&id)
                            || state.local_tracks.iter().any(|t| t.id == id);
                        if known {
                            continue;
                        }
                        let (tx, rx) = mpsc::channel(MEDIA_BUFFER);
                        self.link.video.lock().insert(id.clone(), tx);
                        state.remote_tracks.insert(id.clone());
                        new_tracks.push(Box::new(LoopbackRemoteTrack { id, rx }));
                    }
                    MediaLine::Video { sending: false, .. } => {}
                    MediaLine::Application { label } => {
                        if state.channels.contains(&label) {
                            continue;
                        }
                        let end = LoopbackDataChannel::new(&label, self.side, &self.link);
                        self.link.register_channel(&end);
                        state.channels.push(label);
                        new_channels.push(end);
                    }
                }
            }

            let on_track = state.on_track.clone();
            let on_data_channel = state.on_data_channel.clone();
            if on_track.is_none() {
                state.pending_tracks.append(&mut new_tracks);
            }
            if on_data_channel.is_none() {
                state.pending_channels.append(&mut new_channels);
            }
            (stable, on_track, on_data_channel)
        };

        if let Some(handler) = on_track {
            for track in new_tracks {
                log::debug!("peer{}: remote track '{}'", self.side, track.id());
                handler(track);
            }
        }
        if let Some(handler) = on_data_channel {
            for channel in new_channels {
                log::debug!("peer{}: remote data channel '{}'", self.side, channel.label());
                handler(channel);
            }
        }

        if stable {
            self.on_stable();
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()> {
        self.state.lock().ensure_open()?;
        log::trace!("peer{}: ignoring candidate '{}'", self.side, candidate.candidate);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.state.lock().signaling_state
    }

    fn on_track(&self, handler: TrackHandler) {
        let handler = Arc::new(handler);
        let pending = {
            let mut state = self.state.lock();
            state.on_track = Some(Arc::clone(&handler));
            std::mem::take(&mut state.pending_tracks)
        };
        for track in pending {
            handler(track);
        }
    }

    fn on_data_channel(&self, handler: DataChannelHandler) {
        let handler = Arc::new(handler);
        let pending = {
            let mut state = self.state.lock();
            state.on_data_channel = Some(Arc::clone(&handler));
            std::mem::take(&mut state.pending_channels)
        };
        for channel in pending {
            handler(channel);
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        let (pumps, labels, remote_tracks) = {
            let mut state = self.state.lock();
            if state.signaling_state == SignalingState::Closed {
                return Ok(());
            }
            state.signaling_state = SignalingState::Closed;
            state.local_tracks.clear();
            (
                std::mem::take(&mut state.pumps),
                state.channels.clone(),
                state.remote_tracks.iter().cloned().collect::<Vec<_>>(),
            )
        };

        for pump in pumps {
            pump.abort();
        }
        for label in labels {
            if let Some(end) = self.link.channel_end(&label, self.side) {
                end.close();
            }
        }
        let mut video = self.link.video.lock();
        for id in remote_tracks {
            video.remove(&id);
        }
        log::debug!("peer{}: closed", self.side);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdp_round_trip_keeps_media_lines() {
        let lines = vec![
            MediaLine::Video { id: "ball".to_string(), sending: true },
            MediaLine::Application { label: "chat".to_string() },
        ];
        assert_eq!(parse_sdp(&write_sdp(1, 2, &lines)).unwrap(), lines);
        assert!(parse_sdp("m=video ball").is_err());
        assert!(parse_sdp("v=0\nm=video ball sideways").is_err());
    }

    #[tokio::test]
    async fn channel_opens_only_after_answer_applied() {
        let (server, client) = LoopbackPeer::pair();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        server.on_data_channel(Box::new(move |channel| {
            let sink = Arc::clone(&sink);
            channel.on_message(Box::new(move |text| sink.lock().push(text)));
        }));

        let channel = client.create_data_channel("chat").unwrap();
        let offer = client.create_offer().await.unwrap();
        client.set_local_description(offer.clone()).await.unwrap();
        assert_eq!(channel.ready_state(), ReadyState::Connecting);
        assert!(channel.send("early").is_err());

        server.set_remote_description(offer).await.unwrap();
        let answer = server.create_answer().await.unwrap();
        server.set_local_description(answer.clone()).await.unwrap();
        assert_eq!(channel.ready_state(), ReadyState::Connecting);

        client.set_remote_description(answer).await.unwrap();
        assert_eq!(channel.ready_state(), ReadyState::Open);
        channel.send("0,1,2").unwrap();
        assert_eq!(*received.lock(), vec!["0,1,2".to_string()]);
    }

    #[tokio::test]
    async fn answer_without_offer_is_rejected() {
        let (peer, _) = LoopbackPeer::pair();
        let answer = SessionDescription::answer("v=0\n".to_string());
        assert!(peer.set_remote_description(answer).await.is_err());
        assert_eq!(peer.signaling_state(), SignalingState::Stable);
    }
}
