//! Runs the ball server and the detecting client against each other.
//!
//! ```bash
//! ball_session --frames 300 --record-to ./frames
//! RUST_LOG=debug ball_session --detector centroid
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use bvr_ball::common::{DetectorKind, SessionConfig};
use bvr_ball::transport::{LoopbackPeer, PeerConnection, Signaling, TcpSignaling};
use bvr_ball::{client, relay, server};

/// Bouncing-ball streaming session with client-side detection and
/// server-side scoring.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON session config; command-line flags override its values
    #[arg(long, env = "BALL_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Signaling host
    #[arg(long)]
    signaling_host: Option<String>,

    /// Signaling port
    #[arg(long)]
    signaling_port: Option<u16>,

    /// Write received frames as PNG files into this directory
    #[arg(long)]
    record_to: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Ball detector: hough, centroid
    #[arg(long, value_parser = parse_detector)]
    detector: Option<DetectorKind>,
}

fn parse_detector(value: &str) -> Result<DetectorKind, String> {
    DetectorKind::from_str(value).ok_or_else(|| {
        format!("unknown detector '{}', expected one of {:?}", value, DetectorKind::all_detector_kinds())
    })
}

impl Args {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::new(),
        };
        if let Some(host) = &self.signaling_host {
            config.signaling_host = host.clone();
        }
        if let Some(port) = self.signaling_port {
            config.signaling_port = port;
        }
        if let Some(dir) = &self.record_to {
            config.record_to = Some(dir.clone());
        }
        if let Some(frames) = self.frames {
            config.max_frames = Some(frames);
        }
        if let Some(kind) = self.detector {
            config.detector.kind = kind;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.session_config()?;
    log::info!("Session config:\n{}", config.to_string());

    let addr = config.signaling_addr()?;
    let (server_signaling, client_signaling) =
        tokio::try_join!(TcpSignaling::listen(addr), TcpSignaling::connect(addr))?;
    let server_signaling: Arc<dyn Signaling> = Arc::new(server_signaling);
    let client_signaling: Arc<dyn Signaling> = Arc::new(client_signaling);

    let (server_peer, client_peer) = LoopbackPeer::pair();
    let server_peer: Arc<dyn PeerConnection> = Arc::new(server_peer);
    let client_peer: Arc<dyn PeerConnection> = Arc::new(client_peer);

    let sink = relay::sink_for(config.record_to.as_deref());
    let session = async {
        tokio::try_join!(
            server::run(Arc::clone(&server_peer), Arc::clone(&server_signaling), &config.simulator, config.max_frames),
            client::run(Arc::clone(&client_peer), Arc::clone(&client_signaling), sink, &config.detector),
        )
    };

    let outcome = tokio::select! {
        result = session => Some(result),
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, shutting down");
            None
        }
    };

    for signaling in [&server_signaling, &client_signaling] {
        if let Err(err) = signaling.close().await {
            log::debug!("Signaling close: {:#}", err);
        }
    }
    server_peer.close().await?;
    client_peer.close().await?;

    if let Some(result) = outcome {
        let (summary, stats) = result?;
        if let Some(stats) = stats {
            println!("Frames relayed: {} | Estimates sent: {} | Dropped by detector queue: {}",
                     stats.frames, stats.sent, stats.dropped);
        }
        println!("{}", summary.to_string());
    }
    Ok(())
}
