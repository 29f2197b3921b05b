use std::future::Future;

use crate::error::StreamError;
use crate::state::CloseInfo;

/// Something that happened on an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    /// Transport-level error. The socket may still deliver a close afterwards.
    Error(String),
    Closed(CloseInfo),
}

/// Opens sockets to a push endpoint.
pub trait Connector: Send + Sync + 'static {
    type Socket: Socket;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Socket, StreamError>> + Send;
}

/// One open connection.
///
/// `next_event` returning `None` means the peer vanished without a close
/// frame; the client treats that as an abnormal close.
pub trait Socket: Send + 'static {
    fn next_event(&mut self) -> impl Future<Output = Option<SocketEvent>> + Send;

    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), StreamError>> + Send;

    fn close(&mut self, code: u16, reason: &str) -> impl Future<Output = ()> + Send;
}
