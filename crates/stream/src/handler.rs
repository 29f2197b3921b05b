use serde::de::DeserializeOwned;

use crate::error::StreamError;
use crate::state::CloseInfo;

/// The single subscriber registered on a stream handle.
///
/// Callbacks run on the handle's supervisor task, one at a time and in frame
/// arrival order. They must not block.
pub trait StreamHandler: Send + Sync + 'static {
    /// Type every inbound text frame is decoded into.
    type Message: DeserializeOwned + Send;

    fn on_message(&self, message: Self::Message);

    fn on_open(&self) {}

    fn on_close(&self, _close: &CloseInfo) {}

    fn on_error(&self, _error: &StreamError) {}
}
