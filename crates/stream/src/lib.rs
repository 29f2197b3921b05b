//! Reconnecting push-stream client.
//!
//! One [`StreamHandle`] owns at most one live socket, decodes each text frame
//! as JSON into the handler's message type and hands it over in arrival
//! order. Unclean closes are retried with a linear backoff until the attempt
//! budget runs out, after which the handle reports [`ConnectionState::Failed`]
//! and waits for an explicit [`StreamHandle::connect`].

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod state;
pub mod transport;
pub mod ws;

pub use client::{connect, StreamHandle};
pub use config::StreamConfig;
pub use error::StreamError;
pub use handler::StreamHandler;
pub use state::{CloseInfo, ConnectionState};
pub use transport::{Connector, Socket, SocketEvent};
pub use ws::WsConnector;
