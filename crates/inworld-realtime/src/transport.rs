//! WebSocket transport.
//!
//! A connection is a writer task fed by an unbounded channel and a reader task
//! that reports frames, closes and errors back to the client as
//! [`TransportEvent`]s tagged with the connection generation.

use crate::error::ClientError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError, Message,
        client::IntoClientRequest,
        error::ProtocolError,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::frame::coding::CloseCode,
    },
};
use tracing::{debug, info, warn};

/// Everything needed to open the session socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    /// Value of the `Authorization` header, `"{type} {token}"`.
    pub authorization: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(String),
    Closed { clean: bool, code: Option<u16>, reason: String },
    Error(String),
}

/// Sender half handed to a connection so it can report back to the client.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the client is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// The sending side of an open connection.
pub trait Outbound: Send + Sync {
    /// Queues one text frame for the socket.
    fn send(&self, frame: String) -> Result<(), ClientError>;
    /// Starts the close handshake. Waits at most the close grace period.
    fn close(&mut self);
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        request: ConnectRequest,
        events: TransportEvents,
    ) -> Result<Box<dyn Outbound>, ClientError>;
}

enum Outgoing {
    Frame(String),
    Close,
}

/// `Connector` on top of tokio-tungstenite.
pub struct WsConnector {
    close_grace: Duration,
}

impl WsConnector {
    pub fn new(close_grace: Duration) -> Self {
        Self { close_grace }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        request: ConnectRequest,
        events: TransportEvents,
    ) -> Result<Box<dyn Outbound>, ClientError> {
        let mut ws_request = request.url.as_str().into_client_request()?;
        ws_request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&request.authorization)?);

        let (ws_stream, _) = connect_async(ws_request).await?;
        let (mut sink, mut stream) = ws_stream.split();
        info!(url = %request.url, generation = events.generation(), "WebSocket connected");

        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
        let close_grace = self.close_grace;
        let writer_events = events.clone();
        tokio::spawn(async move {
            while let Some(outgoing) = rx.recv().await {
                match outgoing {
                    Outgoing::Frame(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!(error = %e, "Failed to send frame");
                            writer_events.emit(TransportEvent::Error(e.to_string()));
                            writer_events.emit(TransportEvent::Closed {
                                clean: false,
                                code: None,
                                reason: "write failed".to_string(),
                            });
                            break;
                        }
                    }
                    Outgoing::Close => {
                        if tokio::time::timeout(close_grace, sink.close()).await.is_err() {
                            debug!("Close handshake timed out");
                        }
                        break;
                    }
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if !events.emit(TransportEvent::Frame(text)) {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(frame.code), frame.reason.into_owned()),
                            None => (None, String::new()),
                        };
                        info!(?code, %reason, "WebSocket closed by server");
                        events.emit(TransportEvent::Closed {
                            clean: matches!(code, Some(CloseCode::Normal)),
                            code: code.map(u16::from),
                            reason,
                        });
                        return;
                    }
                    Ok(_) => {}
                    Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "WebSocket error");
                        events.emit(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            events.emit(TransportEvent::Closed {
                clean: false,
                code: None,
                reason: "connection dropped".to_string(),
            });
        });

        Ok(Box::new(WsOutbound {
            tx,
            reader: reader.abort_handle(),
            close_grace,
            closed: false,
        }))
    }
}

struct WsOutbound {
    tx: mpsc::UnboundedSender<Outgoing>,
    reader: AbortHandle,
    close_grace: Duration,
    closed: bool,
}

impl Outbound for WsOutbound {
    fn send(&self, frame: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.tx
            .send(Outgoing::Frame(frame))
            .map_err(|_| ClientError::TransportClosed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.tx.send(Outgoing::Close);
        let reader = self.reader.clone();
        let grace = self.close_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            reader.abort();
        });
    }
}

impl Drop for WsOutbound {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.tx.send(Outgoing::Close);
            self.reader.abort();
        }
    }
}
