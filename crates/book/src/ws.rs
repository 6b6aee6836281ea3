//! WebSocket transport over tokio-tungstenite.

use crate::engine::{BookTransport, TransportError};
use crate::wire::{AuthPayload, SnapshotMessage, UpdateMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to one instrument's diff feed.
///
/// The URL already ends in the instrument's symbol; the venue decides the
/// feed from the path. After the socket opens we send the credentials as a
/// JSON text frame and the venue answers with the snapshot.
pub struct WsTransport {
    url: String,
    stream: Option<WsStream>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        WsTransport {
            url: url.into(),
            stream: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read frames until the next text frame, ignoring control frames.
    async fn next_text(stream: &mut WsStream) -> Result<String, TransportError> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl BookTransport for WsTransport {
    async fn connect(&mut self, auth: &AuthPayload) -> Result<SnapshotMessage, TransportError> {
        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let credentials = serde_json::to_string(auth)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        stream
            .send(Message::Text(credentials.into()))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let text = Self::next_text(&mut stream).await?;
        let snapshot: SnapshotMessage = serde_json::from_str(&text)
            .map_err(|e| TransportError::Malformed(format!("snapshot: {e}")))?;

        self.stream = Some(stream);
        Ok(snapshot)
    }

    async fn next_update(&mut self) -> Result<Option<UpdateMessage>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let text = Self::next_text(stream).await?;
        // The venue sends a bare empty string as a keepalive.
        if text.is_empty() || text == "\"\"" {
            return Ok(None);
        }
        let update: UpdateMessage = serde_json::from_str(&text)
            .map_err(|e| TransportError::Malformed(format!("update: {e}")))?;
        Ok(Some(update))
    }
}
