use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::StreamError;
use crate::state::CloseInfo;
use crate::transport::{Connector, Socket, SocketEvent};

/// Close frame without a status code.
const NO_STATUS_RECEIVED: u16 = 1005;

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    failed: bool,
}

impl Connector for WsConnector {
    type Socket = WsSocket;

    async fn open(&self, url: &str) -> Result<WsSocket, StreamError> {
        let (inner, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        tracing::debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(WsSocket {
            inner,
            failed: false,
        })
    }
}

impl Socket for WsSocket {
    async fn next_event(&mut self) -> Option<SocketEvent> {
        if self.failed {
            return None;
        }
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(e) => {
                    // tungstenite does not promise to end the stream after an error
                    self.failed = true;
                    return Some(SocketEvent::Error(e.to_string()));
                }
            };
            match message {
                Message::Text(text) => return Some(SocketEvent::Text(text.as_str().to_owned())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(SocketEvent::Text(text)),
                    Err(_) => tracing::warn!(len = bytes.len(), "dropping non-utf8 binary frame"),
                },
                Message::Close(frame) => {
                    let close = match frame {
                        Some(frame) => {
                            CloseInfo::clean(u16::from(frame.code), frame.reason.as_str())
                        }
                        None => CloseInfo::clean(NO_STATUS_RECEIVED, ""),
                    };
                    return Some(SocketEvent::Closed(close));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.inner
            .send(Message::text(text))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.inner.close(Some(frame)).await {
            tracing::debug!(err = %e, "websocket close handshake failed");
        }
    }
}
