use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use crate::common::SimulatorConfig;
use crate::scorer::{ScoreSummary, Scorer};
use crate::simulator::{BallSimulator, BallVideoTrack};
use crate::transport::{apply_signal, PeerConnection, SignalMessage, Signaling};

/// Time left for in-flight estimates after the last frame before saying bye.
const DRAIN_AFTER_END: Duration = Duration::from_millis(500);

async fn stream_ended(ended: &mut watch::Receiver<bool>) {
    let done = ended.wait_for(|ended| *ended).await.is_ok();
    if !done {
        std::future::pending::<()>().await;
    }
}

/// Server session: offers the ball track, scores estimates arriving on any
/// data channel the client opens and runs until bye, signaling loss, or
/// the end of a finite stream.
pub async fn run(peer: Arc<dyn PeerConnection>, signaling: Arc<dyn Signaling>,
                 config: &SimulatorConfig, max_frames: Option<u64>) -> anyhow::Result<ScoreSummary> {
    config.validate()?;
    let track = BallVideoTrack::new(BallSimulator::new(config.clone())).with_max_frames(max_frames);
    let scorer = Arc::new(Scorer::new(track.ledger()));
    let mut ended = track.subscribe_end();

    let channel_scorer = Arc::clone(&scorer);
    peer.on_data_channel(Box::new(move |channel| {
        log::info!("Client opened data channel '{}'", channel.label());
        let scorer = Arc::clone(&channel_scorer);
        channel.on_message(Box::new(move |text| {
            scorer.on_message(&text);
        }));
    }));

    peer.add_track(Box::new(track))?;
    let offer = peer.create_offer().await?;
    peer.set_local_description(offer).await?;
    let local = peer
        .local_description()
        .ok_or_else(|| anyhow::anyhow!("no local description after offer"))?;
    signaling.send(local.into()).await?;
    log::info!("Offer sent, streaming {}", config.to_string().replace('\n', " | "));

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
            _ = stream_ended(&mut ended) => {
                log::info!("Stream finished, draining estimates");
                tokio::time::sleep(DRAIN_AFTER_END).await;
                if let Err(err) = signaling.send(SignalMessage::Bye).await {
                    log::debug!("Failed to send bye: {:#}", err);
                }
                break;
            }
        }
    }

    let summary = scorer.summary();
    log::info!("{}", summary.to_string());
    Ok(summary)
}
