use std::sync::{Arc, Weak};
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::common::DetectorConfig;
use crate::relay::{relay_track, FrameSink, RelayStats};
use crate::side_channel::SideChannelNegotiator;
use crate::transport::{apply_signal, PeerConnection, Signaling, VideoTrack};

const RELAY_DRAIN: Duration = Duration::from_secs(2);

type RelayResult = anyhow::Result<RelayStats>;

struct TrackContext {
    peer: Weak<dyn PeerConnection>,
    signaling: Arc<dyn Signaling>,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    config: DetectorConfig,
    done: mpsc::UnboundedSender<RelayResult>,
    relays: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackContext {
    fn start_relay(&self, track: Box<dyn VideoTrack>) {
        let Some(peer) = self.peer.upgrade() else {
            log::warn!("Track '{}' arrived after the session ended", track.id());
            return;
        };
        let Some(sink) = self.sink.lock().take() else {
            log::warn!("Ignoring additional track '{}'", track.id());
            return;
        };

        log::info!("Receiving track '{}'", track.id());
        let negotiator = SideChannelNegotiator::new(peer, Arc::clone(&self.signaling));
        let config = self.config.clone();
        let done = self.done.clone();
        let relay = tokio::spawn(async move {
            let result = relay_track(track, sink, negotiator, &config).await;
            let _ = done.send(result);
        });
        self.relays.lock().push(relay);
    }
}

/// Client session: answers offers, relays the incoming track through the
/// detector and reports estimates until the server says bye.
///
/// Returns the relay statistics when a track was received and finished.
pub async fn run(peer: Arc<dyn PeerConnection>, signaling: Arc<dyn Signaling>,
                 sink: Box<dyn FrameSink>, config: &DetectorConfig) -> anyhow::Result<Option<RelayStats>> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let context = Arc::new(TrackContext {
        peer: Arc::downgrade(&peer),
        signaling: Arc::clone(&signaling),
        sink: Mutex::new(Some(sink)),
        config: config.clone(),
        done: done_tx,
        relays: Mutex::new(Vec::new()),
    });

    let handler_context = Arc::clone(&context);
    peer.on_track(Box::new(move |track| handler_context.start_relay(track)));

    let mut stats = None;
    loop {
        tokio::select! {
            message = signaling.receive() => {
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        log::info!("Signaling ended: {:#}", err);
                        break;
                    }
                };
                if !apply_signal(peer.as_ref(), signaling.as_ref(), message).await? {
                    break;
                }
            }
            Some(result) = done_rx.recv() => {
                stats = Some(result?);
            }
        }
    }

    let relays = std::mem::take(&mut *context.relays.lock());
    for mut relay in relays {
        if tokio::time::timeout(RELAY_DRAIN, &mut relay).await.is_err() {
            log::warn!("Relay did not finish within {:?}, aborting", RELAY_DRAIN);
            relay.abort();
        }
    }
    while let Ok(result) = done_rx.try_recv() {
        match result {
            Ok(result) => stats = Some(result),
            Err(err) => log::warn!("Relay ended with error: {:#}", err),
        }
    }

    Ok(stats)
}
