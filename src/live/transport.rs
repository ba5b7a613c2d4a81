//! Transport for the live session.
//!
//! A [`Transport`] turns a [`Setup`] into an open [`SessionLink`]: an
//! outbound queue of client messages and an inbound queue of transport
//! events. The websocket implementation runs one writer and one reader task;
//! the session never touches the socket directly.

use crate::error::{LingoError, Result};
use crate::live::protocol::{ClientMessage, ServerMessage, Setup};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// What the inbound side of a link delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(ServerMessage),
    Closed { reason: Option<String> },
    Error { message: String },
}

/// An open session connection.
pub struct SessionLink {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    reader: Option<JoinHandle<()>>,
}

/// Far end of an in-memory link, standing in for the remote service.
pub struct RemoteEnd {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<ClientMessage>,
}

impl SessionLink {
    /// A link backed by channels only.
    pub fn in_memory() -> (Self, RemoteEnd) {
        let (outbound, sent) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();
        (
            Self {
                outbound,
                inbound,
                reader: None,
            },
            RemoteEnd { events, sent },
        )
    }

    /// Sender for client messages; clones share the same FIFO queue.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outbound.clone()
    }

    /// Next inbound event; `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    /// Close the connection.
    ///
    /// Dropping the outbound queue lets the writer send a close frame; the
    /// reader is aborted so no further inbound messages are delivered.
    pub fn close(mut self) {
        self.inbound.close();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        debug!("session link closed");
    }
}

impl RemoteEnd {
    /// Deliver a server message as JSON text.
    pub fn send_json(&self, json: &str) -> Result<()> {
        self.send(TransportEvent::Message(ServerMessage::parse(json)?))
    }

    pub fn send(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| LingoError::SessionClosed)
    }

    /// Everything the client has sent so far.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut sent = Vec::new();
        while let Ok(message) = self.sent.try_recv() {
            sent.push(message);
        }
        sent
    }

    /// Wait for the next client message.
    pub async fn next_sent(&mut self) -> Option<ClientMessage> {
        self.sent.recv().await
    }

    /// True once the client closed the link.
    pub fn client_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Opens live sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, setup: Setup) -> Result<SessionLink>;
}

/// Websocket transport to the Gemini Live endpoint.
pub struct GeminiTransport {
    endpoint: String,
    api_key: String,
    connect_timeout: Duration,
}

impl GeminiTransport {
    pub fn new(endpoint: &str, api_key: &str, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            connect_timeout,
        }
    }

    fn url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.api_key)
    }

    async fn writer_task(
        mut write: futures_util::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<ClientMessage>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        while let Some(message) = rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "dropping unencodable client message");
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                error!(error = %e, "failed to send websocket message");
                events
                    .send(TransportEvent::Error {
                        message: e.to_string(),
                    })
                    .ok();
                return;
            }
        }

        if let Err(e) = write.close().await {
            debug!(error = %e, "websocket close failed");
        }
        debug!("writer task terminated");
    }

    async fn reader_task(
        mut read: futures_util::stream::SplitStream<WsStream>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        while let Some(frame) = read.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                // The live API sends JSON in binary frames too.
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("ignoring non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    info!(reason = ?reason, "live session closed by server");
                    events.send(TransportEvent::Closed { reason }).ok();
                    return;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "websocket error");
                    events
                        .send(TransportEvent::Error {
                            message: e.to_string(),
                        })
                        .ok();
                    return;
                }
            };

            match ServerMessage::parse(&text) {
                Ok(message) => {
                    if events.send(TransportEvent::Message(message)).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring unparseable server message"),
            }
        }

        events.send(TransportEvent::Closed { reason: None }).ok();
        debug!("reader task terminated");
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn connect(&self, setup: Setup) -> Result<SessionLink> {
        if self.api_key.is_empty() {
            return Err(LingoError::Connect {
                message: "no API key configured (set LINGO_API_KEY)".to_string(),
            });
        }

        info!(endpoint = %self.endpoint, model = %setup.model, "connecting to live session");

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(self.url()))
            .await
            .map_err(|_| LingoError::Connect {
                message: format!(
                    "timed out after {}",
                    humantime::format_duration(self.connect_timeout)
                ),
            })?
            .map_err(|e| LingoError::Connect {
                message: e.to_string(),
            })?;

        let (write, read) = ws_stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();

        // Setup must be the first frame on the socket.
        outbound
            .send(ClientMessage::Setup(setup))
            .map_err(|_| LingoError::SessionClosed)?;

        tokio::spawn(Self::writer_task(write, outbound_rx, events.clone()));
        let reader = tokio::spawn(Self::reader_task(read, events));

        Ok(SessionLink {
            outbound,
            inbound,
            reader: Some(reader),
        })
    }
}

/// Transport handing out a prepared link, or failing.
pub struct MockTransport {
    link: std::sync::Mutex<Option<SessionLink>>,
    failure: Option<String>,
    delay: Duration,
}

impl MockTransport {
    pub fn new(link: SessionLink) -> Self {
        Self {
            link: std::sync::Mutex::new(Some(link)),
            failure: None,
            delay: Duration::ZERO,
        }
    }

    /// A transport whose every connect attempt fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            link: std::sync::Mutex::new(None),
            failure: Some(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    /// Delay connect, to model a slow handshake.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _setup: Setup) -> Result<SessionLink> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(LingoError::Connect {
                message: message.clone(),
            });
        }
        let mut link = self.link.lock().map_err(|e| LingoError::Other(e.to_string()))?;
        link.take().ok_or_else(|| LingoError::Connect {
            message: "mock link already used".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::create_pcm_blob;

    #[tokio::test]
    async fn in_memory_link_carries_both_directions() {
        let (mut link, mut remote) = SessionLink::in_memory();

        link.sender()
            .send(ClientMessage::audio(create_pcm_blob(&[0.1])))
            .unwrap();
        assert!(matches!(
            remote.next_sent().await,
            Some(ClientMessage::RealtimeInput(_))
        ));

        remote.send_json(r#"{"setupComplete": {}}"#).unwrap();
        assert!(matches!(link.recv().await, Some(TransportEvent::Message(_))));
    }

    #[tokio::test]
    async fn closing_link_is_visible_to_remote() {
        let (link, remote) = SessionLink::in_memory();
        assert!(!remote.client_closed());
        link.close();
        assert!(remote.client_closed());
        assert!(remote.send(TransportEvent::Closed { reason: None }).is_err());
    }

    #[tokio::test]
    async fn remote_drop_ends_inbound() {
        let (mut link, remote) = SessionLink::in_memory();
        drop(remote);
        assert_eq!(link.recv().await, None);
    }

    #[tokio::test]
    async fn mock_transport_hands_out_link_once() {
        let (link, _remote) = SessionLink::in_memory();
        let transport = MockTransport::new(link);
        let setup = Setup::new("m", "Kore", String::new());
        assert!(transport.connect(setup.clone()).await.is_ok());
        assert!(matches!(
            transport.connect(setup).await,
            Err(LingoError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn failing_transport_reports_connect_error() {
        let transport = MockTransport::failing("refused");
        let err = transport
            .connect(Setup::new("m", "Kore", String::new()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.user_message(), "Connection error. Please try again.");
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_dialing() {
        let transport = GeminiTransport::new("wss://example.invalid/ws", "", Duration::from_secs(1));
        let err = transport
            .connect(Setup::new("m", "Kore", String::new()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("LINGO_API_KEY"));
    }

    #[test]
    fn url_appends_key() {
        let transport = GeminiTransport::new("wss://host/ws", "abc", Duration::from_secs(1));
        assert_eq!(transport.url(), "wss://host/ws?key=abc");
        let transport = GeminiTransport::new("wss://host/ws?alt=1", "abc", Duration::from_secs(1));
        assert_eq!(transport.url(), "wss://host/ws?alt=1&key=abc");
    }
}
