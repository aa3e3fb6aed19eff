//! WebSocket dialer using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Connection, ConnectionId, Connector, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Connector`] that opens WebSocket connections (`ws://` or `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        url: &str,
    ) -> Result<WebSocketConnection, TransportError> {
        let target = websocket_url(url);
        let (ws, response) = tokio_tungstenite::connect_async(target.as_ref())
            .await
            .map_err(|e| classify(url, e))?;

        let id = ConnectionId::next();
        tracing::debug!(
            %id,
            url,
            status = %response.status(),
            "WebSocket connection established"
        );

        // Split so a pending read never blocks a write.
        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// Rewrites `http(s)://` endpoints to the matching WebSocket scheme. Other
/// URLs pass through unchanged.
fn websocket_url(url: &str) -> std::borrow::Cow<'_, str> {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}").into()
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}").into()
    } else {
        url.into()
    }
}

/// Maps a tungstenite error to a transient or terminal [`TransportError`].
fn classify(url: &str, err: WsError) -> TransportError {
    match err {
        WsError::Io(source) => TransportError::Connect {
            url: url.to_string(),
            source,
        },
        WsError::Http(response) => TransportError::Handshake {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        },
        WsError::HttpFormat(e) => TransportError::Handshake {
            url: url.to_string(),
            reason: e.to_string(),
        },
        WsError::Url(e) => TransportError::Handshake {
            url: url.to_string(),
            reason: e.to_string(),
        },
        WsError::Protocol(e) => TransportError::Handshake {
            url: url.to_string(),
            reason: e.to_string(),
        },
        other => TransportError::Connect {
            url: url.to_string(),
            source: std::io::Error::other(other),
        },
    }
}

/// A single client-side WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::text(frame.to_owned()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec()).map(Some).map_err(
                        |e| {
                            TransportError::ReceiveFailed(std::io::Error::new(
                                std::io::ErrorKind::InvalidData,
                                e,
                            ))
                        },
                    );
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
