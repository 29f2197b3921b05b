use std::sync::Arc;

use eventsync_core::auth::Session;

use crate::config::AppConfig;
use crate::view::ViewHandle;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: AppConfig,
    session: Session,
    view: ViewHandle,
}

impl AppState {
    pub fn new(config: AppConfig, session: Session, view: ViewHandle) -> Self {
        Self {
            inner: Arc::new(InnerState { config, session, view }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// The signed-in user the view acts for.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn view(&self) -> &ViewHandle {
        &self.inner.view
    }
}
