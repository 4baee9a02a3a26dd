//! WebSocket transport over `tokio-tungstenite`

use std::io::ErrorKind;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{ConnectError, TransportError};
use crate::transport::{Connector, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a trx-control server over WebSocket
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&mut self, uri: &str) -> Result<WsTransport, ConnectError> {
        let (stream, response) = connect_async(uri)
            .await
            .map_err(|e| classify_connect_error(uri, e))?;
        debug!("WebSocket handshake with {} returned {}", uri, response.status());
        Ok(WsTransport { stream })
    }
}

/// An open WebSocket connection
pub struct WsTransport {
    stream: WsStream,
}

impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream.send(Message::text(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };
            match message? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(e) => warn!("Skipping binary frame that is not UTF-8: {}", e),
                },
                Message::Close(frame) => {
                    debug!("Server closed WebSocket: {:?}", frame);
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}

/// Map a tungstenite connect failure onto the relay's connect taxonomy
fn classify_connect_error(uri: &str, err: tungstenite::Error) -> ConnectError {
    let uri = uri.to_string();
    match err {
        tungstenite::Error::Io(e) if e.kind() == ErrorKind::ConnectionRefused => {
            ConnectError::Refused { uri }
        }
        tungstenite::Error::Io(e) => ConnectError::Unreachable {
            uri,
            reason: e.to_string(),
        },
        tungstenite::Error::Url(e) => ConnectError::InvalidUri {
            uri,
            reason: e.to_string(),
        },
        tungstenite::Error::Http(response) => ConnectError::Handshake {
            uri,
            reason: format!("server answered HTTP {}", response.status()),
        },
        e @ (tungstenite::Error::HttpFormat(_) | tungstenite::Error::Protocol(_)) => {
            ConnectError::Handshake {
                uri,
                reason: e.to_string(),
            }
        }
        other => ConnectError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_is_classified() {
        let err = classify_connect_error(
            "ws://127.0.0.1:1",
            tungstenite::Error::Io(std::io::Error::from(ErrorKind::ConnectionRefused)),
        );
        assert!(matches!(err, ConnectError::Refused { .. }));
    }

    #[test]
    fn test_other_io_is_unreachable() {
        let err = classify_connect_error(
            "ws://radio-server.invalid:14290",
            tungstenite::Error::Io(std::io::Error::from(ErrorKind::TimedOut)),
        );
        assert!(matches!(err, ConnectError::Unreachable { .. }));
    }

    #[test]
    fn test_bad_scheme_is_invalid_uri() {
        let err = classify_connect_error(
            "http://localhost",
            tungstenite::Error::Url(tungstenite::error::UrlError::UnsupportedUrlScheme),
        );
        assert!(matches!(err, ConnectError::InvalidUri { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused_on_closed_port() {
        // Bind then drop to find a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = WsConnector::new()
            .connect(&format!("ws://127.0.0.1:{}", port))
            .await;
        assert!(matches!(result, Err(ConnectError::Refused { .. })));
    }
}
