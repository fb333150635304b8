//! Connector Module
//!
//! The raw duplex-connection primitive the channel layer builds on: open a
//! bidirectional text-frame pipe to an address and observe its close. The
//! production implementation speaks WebSocket via tokio-tungstenite; tests
//! substitute a scripted connector.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::channel::frame::CLOSE_ABNORMAL;
use crate::error::ChannelError;

// == Frames ==
/// Frame headed to the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Text(String),
    /// Deliberate teardown; closes with the normal code (1000)
    Close,
}

/// Frame or event arriving from the peer. `Closed` is always the final item.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Text(String),
    Closed { code: u16 },
}

// == Duplex ==
/// One live bidirectional connection, seen as a pair of frame channels.
pub struct Duplex {
    pub outgoing: mpsc::Sender<Outgoing>,
    pub incoming: mpsc::Receiver<Incoming>,
}

// == Connector Trait ==
/// Opens duplex connections. Supplied by the host environment.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Duplex, ChannelError>;
}

// == WebSocket Connector ==
/// Production connector pumping a WebSocket stream through frame channels.
#[derive(Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Duplex, ChannelError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
        debug!(url, "websocket established");

        let (mut write, mut read) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(64);
        let (in_tx, in_rx) = mpsc::channel::<Incoming>(64);

        // Writer half: forward frames until Close or sink failure.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                match frame {
                    Outgoing::Text(text) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = write
                            .send(Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "client disconnect".into(),
                            })))
                            .await;
                        break;
                    }
                }
            }
        });

        // Reader half: forward text frames, always terminate with Closed.
        tokio::spawn(async move {
            let code = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(Incoming::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_ABNORMAL);
                    }
                    // Protocol-level ping/pong and binary frames are not part
                    // of the application wire format.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read failed");
                        break CLOSE_ABNORMAL;
                    }
                    None => break CLOSE_ABNORMAL,
                }
            };
            let _ = in_tx.send(Incoming::Closed { code }).await;
        });

        Ok(Duplex {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
