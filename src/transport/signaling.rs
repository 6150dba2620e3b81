use std::net::SocketAddr;
use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use crate::transport::{SignalMessage, Signaling, TransportError};

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// Newline-delimited JSON signaling over a single TCP connection.
pub struct TcpSignaling {
    reader: Mutex<Lines<BufReader<OwnedReadHalf>>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpSignaling {
    /// Binds `addr` and waits for exactly one peer.
    pub async fn listen(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind signaling socket {}", addr))?;
        log::info!("Signaling listening on {}", addr);
        let (stream, peer_addr) = listener.accept().await?;
        log::info!("Signaling peer connected from {}", peer_addr);
        Self::from_stream(stream)
    }

    /// Connects to a listening peer, retrying while it is not up yet.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let mut attempt = 0;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    log::info!("Signaling connected to {}", addr);
                    return Self::from_stream(stream);
                }
                Err(err) if attempt + 1 < CONNECT_ATTEMPTS => {
                    log::debug!("Signaling connect to {} failed ({}), retrying", addr, err);
                    attempt += 1;
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to connect signaling to {}", addr));
                }
            }
        }
    }

    fn from_stream(stream: TcpStream) -> anyhow::Result<Self> {
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(BufReader::new(read_half).lines()),
            writer: Mutex::new(write_half),
        })
    }
}

#[async_trait]
impl Signaling for TcpSignaling {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> anyhow::Result<SignalMessage> {
        let mut reader = self.reader.lock().await;
        loop {
            let line = reader
                .next_line()
                .await?
                .ok_or(TransportError::SignalingClosed)?;
            if line.trim().is_empty() {
                continue;
            }
            let message = serde_json::from_str(&line)
                .with_context(|| format!("Invalid signaling message '{}'", line))?;
            return Ok(message);
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        // The peer may already be gone.
        if let Err(err) = self.send(SignalMessage::Bye).await {
            log::debug!("Failed to send bye: {}", err);
        }
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

/// In-process signaling pair backed by tokio channels.
pub struct MemorySignaling {
    tx: mpsc::UnboundedSender<SignalMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<SignalMessage>>,
}

impl MemorySignaling {
    pub fn pair() -> (MemorySignaling, MemorySignaling) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            MemorySignaling { tx: a_tx, rx: Mutex::new(b_rx) },
            MemorySignaling { tx: b_tx, rx: Mutex::new(a_rx) },
        )
    }
}

#[async_trait]
impl Signaling for MemorySignaling {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        self.tx
            .send(message)
            .map_err(|_| TransportError::SignalingClosed.into())
    }

    async fn receive(&self) -> anyhow::Result<SignalMessage> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| TransportError::SignalingClosed.into())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let _ = self.tx.send(SignalMessage::Bye);
        Ok(())
    }
}
