use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Notify};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::handler::StreamHandler;
use crate::state::{CloseInfo, ConnectionState, NORMAL_CLOSURE};
use crate::transport::{Connector, Socket, SocketEvent};

/// Open a subscription to `url` and start connecting in the background.
///
/// Never blocks and never fails: problems show up in [`StreamHandle::state`]
/// and through [`StreamHandler::on_error`]. Must be called inside a tokio
/// runtime.
pub fn connect<C, H>(
    url: impl Into<String>,
    config: StreamConfig,
    connector: C,
    handler: H,
) -> StreamHandle<C, H>
where
    C: Connector,
    H: StreamHandler,
{
    let (state, _) = watch::channel(ConnectionState::Disconnected);
    let handle = StreamHandle {
        shared: Arc::new(Shared {
            id: Uuid::new_v4(),
            url: url.into(),
            config,
            connector,
            handler,
            state,
            visible: AtomicBool::new(true),
            control: Mutex::new(Control::default()),
        }),
    };
    handle.connect();
    handle
}

/// Owner of one logical subscription. Dropping it disconnects.
pub struct StreamHandle<C: Connector, H: StreamHandler> {
    shared: Arc<Shared<C, H>>,
}

struct Shared<C, H> {
    id: Uuid,
    url: String,
    config: StreamConfig,
    connector: C,
    handler: H,
    state: watch::Sender<ConnectionState>,
    visible: AtomicBool,
    control: Mutex<Control>,
}

/// Bookkeeping for the supervisor task. Every state write goes through this
/// lock together with a generation check, so a cancelled supervisor can never
/// overwrite the state chosen by `disconnect`.
#[derive(Default)]
struct Control {
    generation: u64,
    /// Present while a supervisor runs; doubles as the busy guard.
    active: Option<Supervisor>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    attempts: u32,
    /// `connect` was called while the supervisor was between attempts.
    reconnect_requested: bool,
    last_error: Option<String>,
}

struct Supervisor {
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

enum AfterClose {
    Retry(Duration),
    Stop,
}

impl<C: Connector, H: StreamHandler> StreamHandle<C, H> {
    /// Identifier used in log fields for this subscription.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// Start connecting unless a connection is already being opened or held.
    ///
    /// While a reconnect is waiting out its backoff this wakes it instead of
    /// opening a second socket. After `failed` the retry budget starts over.
    pub fn connect(&self) {
        let shared = &self.shared;
        if let Err(err) = validate_url(&shared.url) {
            tracing::error!(subscription = %shared.id, err = %err, "cannot open stream");
            shared.lock().last_error = Some(err.to_string());
            shared.state.send_replace(ConnectionState::Error);
            shared.handler.on_error(&err);
            return;
        }

        let mut control = shared.lock();
        if let Some(active) = &control.active {
            if *shared.state.borrow() == ConnectionState::Disconnected {
                tracing::debug!(subscription = %shared.id, "reconnect requested while backing off");
                active.wake.notify_one();
                control.reconnect_requested = true;
            } else {
                tracing::debug!(
                    subscription = %shared.id,
                    "connect ignored, connection already in progress"
                );
            }
            return;
        }

        if *shared.state.borrow() == ConnectionState::Failed {
            control.attempts = 0;
        }
        control.reconnect_requested = false;
        control.generation += 1;
        let generation = control.generation;
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        control.active = Some(Supervisor {
            cancel: cancel.clone(),
            wake: Arc::clone(&wake),
        });
        shared.state.send_replace(ConnectionState::Connecting);
        drop(control);

        let shared = Arc::clone(shared);
        tokio::spawn(async move { shared.supervise(generation, cancel, wake).await });
    }

    /// Close the connection with a normal-closure frame and cancel any pending
    /// reconnect. Safe to call any number of times.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        let mut control = shared.lock();
        control.outbound = None;
        if let Some(active) = control.active.take() {
            active.cancel.cancel();
            tracing::info!(subscription = %shared.id, "stream disconnected by client");
        }
        shared.state.send_replace(ConnectionState::Disconnected);
    }

    /// Serialize `message` as JSON and queue it. Returns `false` without
    /// touching the state when the connection is not open.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!(
                    subscription = %self.shared.id,
                    err = %e,
                    "failed to encode outbound message"
                );
                self.shared.lock().last_error = Some(format!("failed to encode message: {e}"));
                false
            }
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        let control = self.shared.lock();
        if *self.shared.state.borrow() != ConnectionState::Connected {
            tracing::warn!(
                subscription = %self.shared.id,
                "stream is not connected, message not sent"
            );
            return false;
        }
        match &control.outbound {
            Some(tx) => tx.send(text.into()).is_ok(),
            None => false,
        }
    }

    /// Tell the handle whether the process is in the foreground. Reconnects
    /// are only scheduled while visible; becoming visible again while
    /// disconnected reconnects right away.
    pub fn set_visible(&self, visible: bool) {
        self.shared.visible.store(visible, Ordering::SeqCst);
        if visible
            && self.state() == ConnectionState::Disconnected
            && self.shared.config.should_reconnect
        {
            self.connect();
        }
    }
}

impl<C: Connector, H: StreamHandler> Drop for StreamHandle<C, H> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<C: Connector, H: StreamHandler> Shared<C, H> {
    fn lock(&self) -> MutexGuard<'_, Control> {
        // Control holds plain data; a panic elsewhere leaves it consistent.
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(control: &Control, generation: u64) -> bool {
        control.generation == generation && control.active.is_some()
    }

    /// Set `state` if this supervisor still owns the handle.
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let control = self.lock();
        if !Self::is_current(&control, generation) {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    /// Move to `connecting` for a new attempt, consuming any pending
    /// explicit reconnect request.
    fn begin_attempt(&self, generation: u64) -> bool {
        let mut control = self.lock();
        if !Self::is_current(&control, generation) {
            return false;
        }
        control.reconnect_requested = false;
        self.state.send_replace(ConnectionState::Connecting);
        true
    }

    async fn supervise(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        wake: Arc<Notify>,
    ) {
        loop {
            if !self.begin_attempt(generation) {
                break;
            }
            tracing::debug!(subscription = %self.id, url = %self.url, "opening stream");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                opened = self.connector.open(&self.url) => opened,
            };

            let close = match opened {
                Ok(socket) => match self.run_session(generation, &cancel, socket).await {
                    Some(close) => close,
                    None => break,
                },
                Err(err) => {
                    self.report_error(generation, &err);
                    CloseInfo::abnormal()
                }
            };

            match self.after_close(generation, &close) {
                Some(AfterClose::Retry(delay)) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = wake.notified() => {
                            tracing::debug!(
                                subscription = %self.id,
                                "reconnecting ahead of schedule"
                            );
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Some(AfterClose::Stop) | None => break,
            }
        }

        let mut control = self.lock();
        if control.generation == generation {
            control.active = None;
            control.outbound = None;
        }
    }

    /// Drive one open socket until it closes. Returns `None` when cancelled.
    async fn run_session(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        mut socket: C::Socket,
    ) -> Option<CloseInfo> {
        let (tx, mut outbound) = mpsc::unbounded_channel();
        let current = {
            let mut control = self.lock();
            let current = Self::is_current(&control, generation);
            if current {
                control.attempts = 0;
                control.outbound = Some(tx);
                control.last_error = None;
                self.state.send_replace(ConnectionState::Connected);
            }
            current
        };
        if !current {
            socket.close(NORMAL_CLOSURE, &self.config.close_reason).await;
            return None;
        }
        tracing::info!(subscription = %self.id, url = %self.url, "stream connected");
        self.handler.on_open();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    socket.close(NORMAL_CLOSURE, &self.config.close_reason).await;
                    return None;
                }
                Some(text) = outbound.recv() => {
                    if let Err(err) = socket.send_text(text).await {
                        self.report_error(generation, &err);
                    }
                }
                event = socket.next_event() => match event {
                    Some(SocketEvent::Text(text)) => {
                        if cancel.is_cancelled() {
                            continue;
                        }
                        self.dispatch(&text);
                    }
                    Some(SocketEvent::Error(reason)) => {
                        self.report_error(generation, &StreamError::Transport(reason));
                    }
                    Some(SocketEvent::Closed(close)) => return Some(close),
                    None => return Some(CloseInfo::abnormal()),
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<H::Message>(text) {
            Ok(message) => self.handler.on_message(message),
            Err(e) => {
                tracing::warn!(subscription = %self.id, err = %e, "dropping undecodable frame");
                self.lock().last_error = Some("Failed to parse message".to_string());
                self.handler.on_error(&StreamError::Decode(e));
            }
        }
    }

    fn report_error(&self, generation: u64, err: &StreamError) {
        {
            let mut control = self.lock();
            if !Self::is_current(&control, generation) {
                return;
            }
            control.last_error = Some(err.to_string());
            if err.is_transport() {
                self.state.send_replace(ConnectionState::Error);
            }
        }
        tracing::warn!(subscription = %self.id, err = %err, "stream error");
        self.handler.on_error(err);
    }

    /// Apply the reconnect policy to a close. `None` when the supervisor has
    /// been superseded.
    fn after_close(&self, generation: u64, close: &CloseInfo) -> Option<AfterClose> {
        if !self.transition(generation, ConnectionState::Disconnected) {
            return None;
        }
        {
            let mut control = self.lock();
            control.outbound = None;
        }
        tracing::info!(
            subscription = %self.id,
            code = close.code,
            clean = close.clean,
            "stream closed"
        );
        self.handler.on_close(close);

        let mut control = self.lock();
        if !Self::is_current(&control, generation) {
            return None;
        }
        if control.reconnect_requested {
            // An explicit connect raced the close; honour it with a fresh budget.
            control.reconnect_requested = false;
            control.attempts = 0;
            tracing::debug!(subscription = %self.id, "reconnecting on request after close");
            return Some(AfterClose::Retry(Duration::ZERO));
        }

        let config = &self.config;
        let visible = self.visible.load(Ordering::SeqCst);
        if config.should_reconnect
            && control.attempts < config.max_reconnect_attempts
            && !close.clean
            && visible
        {
            control.attempts += 1;
            let delay = config.backoff(control.attempts);
            tracing::info!(
                subscription = %self.id,
                attempt = control.attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            return Some(AfterClose::Retry(delay));
        }

        if control.attempts >= config.max_reconnect_attempts {
            tracing::error!(
                subscription = %self.id,
                attempts = control.attempts,
                "giving up on stream after exhausting reconnect attempts"
            );
            self.state.send_replace(ConnectionState::Failed);
        }
        control.active = None;
        Some(AfterClose::Stop)
    }
}

fn validate_url(url: &str) -> Result<(), StreamError> {
    let invalid = |reason: String| StreamError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let uri = url.parse::<Uri>().map_err(|e| invalid(e.to_string()))?;
    match uri.scheme_str() {
        Some("ws") | Some("wss") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme {other}"))),
        None => return Err(invalid("missing scheme".to_string())),
    }
    if uri.host().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
