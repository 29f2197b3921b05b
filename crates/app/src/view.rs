//! The events view: one reconciliation store fed by the push stream and by
//! REST results, driven from a single task.

use std::collections::VecDeque;
use std::future::Future;

use eventsync_core::events::{PushMessage, SyncNotice};
use eventsync_core::model::{
    Attendee, AttendeeDraft, EntityId, Event, EventDraft, Task, TaskDraft,
};
use eventsync_core::store::{ReconciliationStore, StoreSnapshot};
use eventsync_stream::{
    CloseInfo, ConnectionState, Connector, StreamError, StreamHandle, StreamHandler,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::rest::{RestClient, RestError};

/// Notices kept for the status API.
const RECENT_NOTICES: usize = 20;

/// Stream handler that hands decoded push messages to the view task.
pub struct PushForwarder {
    tx: mpsc::UnboundedSender<PushMessage>,
}

impl PushForwarder {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamHandler for PushForwarder {
    type Message = PushMessage;

    fn on_message(&self, message: PushMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("view gone, dropping push message");
        }
    }

    fn on_open(&self) {
        tracing::info!("push stream connected");
    }

    fn on_close(&self, close: &CloseInfo) {
        tracing::info!(
            code = close.code,
            reason = %close.reason,
            clean = close.clean,
            "push stream closed"
        );
    }

    fn on_error(&self, error: &StreamError) {
        tracing::warn!(err = %error, "push stream error");
    }
}

/// The parts of a stream handle the view drives.
pub trait LiveStream: Send + 'static {
    fn state(&self) -> ConnectionState;

    fn subscribe_state(&self) -> watch::Receiver<ConnectionState>;

    fn last_error(&self) -> Option<String>;

    fn connect(&self);

    fn disconnect(&self);

    fn set_visible(&self, visible: bool);
}

impl<C: Connector, H: StreamHandler> LiveStream for StreamHandle<C, H> {
    fn state(&self) -> ConnectionState {
        StreamHandle::state(self)
    }

    fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        StreamHandle::subscribe_state(self)
    }

    fn last_error(&self) -> Option<String> {
        StreamHandle::last_error(self)
    }

    fn connect(&self) {
        StreamHandle::connect(self)
    }

    fn disconnect(&self) {
        StreamHandle::disconnect(self)
    }

    fn set_visible(&self, visible: bool) {
        StreamHandle::set_visible(self, visible)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    OpenEvent(EntityId),
    CloseEvent,
    /// Flip completion of a task in the open event, optimistically.
    ToggleTask(EntityId),
    DeleteTask(EntityId),
    CreateEvent(EventDraft),
    UpdateEvent(EntityId, EventDraft),
    DeleteEvent(EntityId),
    /// Add a task to the open event.
    CreateTask(TaskDraft),
    UpdateTask(EntityId, TaskDraft),
    /// Add an attendee to the open event.
    CreateAttendee(AttendeeDraft),
    UpdateAttendee(EntityId, AttendeeDraft),
    DeleteAttendee(EntityId),
    /// Refetch the events list and the open event's children.
    Refresh,
    Reconnect,
    SetVisible(bool),
}

/// A finished REST call, reported back to the view task.
#[derive(Debug)]
enum Completion {
    Events(Result<Vec<Event>, RestError>),
    Tasks {
        event_id: EntityId,
        result: Result<Vec<Task>, RestError>,
    },
    Attendees {
        event_id: EntityId,
        result: Result<Vec<Attendee>, RestError>,
    },
    TaskToggled {
        event_id: EntityId,
        previous: Task,
        result: Result<Task, RestError>,
    },
    TaskDeleted {
        event_id: EntityId,
        task_id: EntityId,
        result: Result<(), RestError>,
    },
    EventSaved(Result<Event, RestError>),
    EventDeleted {
        event_id: EntityId,
        result: Result<(), RestError>,
    },
    TaskSaved {
        event_id: EntityId,
        result: Result<Task, RestError>,
    },
    AttendeeSaved {
        event_id: EntityId,
        result: Result<Attendee, RestError>,
    },
    AttendeeDeleted {
        event_id: EntityId,
        attendee_id: EntityId,
        result: Result<(), RestError>,
    },
}

/// What the view shows, republished after every change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub connection: ConnectionState,
    pub stream_error: Option<String>,
    /// Most recent REST failure.
    pub last_error: Option<String>,
    #[serde(flatten)]
    pub store: StoreSnapshot,
    pub recent_notices: Vec<String>,
}

/// Channels into a running view.
#[derive(Clone)]
pub struct ViewHandle {
    commands: mpsc::Sender<ViewCommand>,
    snapshot: watch::Receiver<ViewSnapshot>,
}

impl ViewHandle {
    /// Queue a command. Fails only when the view task has stopped.
    pub async fn send(&self, command: ViewCommand) -> Result<(), ViewCommand> {
        self.commands.send(command).await.map_err(|e| e.0)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshot.clone()
    }
}

#[cfg(test)]
impl ViewHandle {
    pub(crate) fn from_parts(
        commands: mpsc::Sender<ViewCommand>,
        snapshot: watch::Receiver<ViewSnapshot>,
    ) -> Self {
        Self { commands, snapshot }
    }
}

pub struct EventsView<S> {
    store: ReconciliationStore,
    stream: S,
    rest: RestClient,
    pushes: mpsc::UnboundedReceiver<PushMessage>,
    commands: mpsc::Receiver<ViewCommand>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    notices: broadcast::Receiver<SyncNotice>,
    snapshot: watch::Sender<ViewSnapshot>,
    recent: VecDeque<String>,
    last_error: Option<String>,
}

impl<S: LiveStream> EventsView<S> {
    pub fn new(
        store: ReconciliationStore,
        stream: S,
        pushes: mpsc::UnboundedReceiver<PushMessage>,
        rest: RestClient,
    ) -> (Self, ViewHandle) {
        let (commands_tx, commands) = mpsc::channel(64);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let notices = store.notices().subscribe();
        let (snapshot, snapshot_rx) = watch::channel(ViewSnapshot {
            connection: stream.state(),
            stream_error: None,
            last_error: None,
            store: store.snapshot(),
            recent_notices: Vec::new(),
        });

        let view = Self {
            store,
            stream,
            rest,
            pushes,
            commands,
            completions_tx,
            completions,
            notices,
            snapshot,
            recent: VecDeque::with_capacity(RECENT_NOTICES),
            last_error: None,
        };
        let handle = ViewHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };
        (view, handle)
    }

    /// Drive the view until `shutdown` fires or every command sender is gone.
    /// The stream is disconnected on the way out; REST calls still in flight
    /// finish on their own and their results are dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut connection = self.stream.subscribe_state();
        self.refresh();
        self.publish();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(message) = self.pushes.recv() => {
                    self.store.apply_push(message);
                }
                Some(done) = self.completions.recv() => self.complete(done),
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = self.store.expire_next() => {}
                Ok(()) = connection.changed() => {
                    let state = *connection.borrow_and_update();
                    tracing::debug!(state = %state, "push stream state changed");
                }
                notice = self.notices.recv() => match notice {
                    Ok(notice) => self.remember(notice),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notice receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
            }
            self.publish();
        }

        self.stream.disconnect();
        tracing::info!("events view stopped");
    }

    fn handle(&mut self, command: ViewCommand) {
        tracing::debug!(?command, "view command");
        match command {
            ViewCommand::OpenEvent(event_id) => {
                if self.store.selected_event_id() == Some(&event_id) {
                    return;
                }
                self.store.open_event(event_id.clone());
                self.load_children(event_id);
            }
            ViewCommand::CloseEvent => self.store.close_event(),
            ViewCommand::ToggleTask(task_id) => self.toggle_task(task_id),
            ViewCommand::DeleteTask(task_id) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.delete_task(&event_id, &task_id).await;
                    Completion::TaskDeleted {
                        event_id,
                        task_id,
                        result,
                    }
                });
            }
            ViewCommand::CreateEvent(draft) => {
                let rest = self.rest.clone();
                self.spawn(async move { Completion::EventSaved(rest.create_event(&draft).await) });
            }
            ViewCommand::UpdateEvent(event_id, draft) => {
                let rest = self.rest.clone();
                self.spawn(async move {
                    Completion::EventSaved(rest.update_event(&event_id, &draft).await)
                });
            }
            ViewCommand::DeleteEvent(event_id) => {
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.delete_event(&event_id).await;
                    Completion::EventDeleted { event_id, result }
                });
            }
            ViewCommand::CreateTask(draft) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.create_task(&event_id, &draft).await;
                    Completion::TaskSaved { event_id, result }
                });
            }
            ViewCommand::UpdateTask(task_id, draft) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.update_task(&event_id, &task_id, &draft).await;
                    Completion::TaskSaved { event_id, result }
                });
            }
            ViewCommand::CreateAttendee(draft) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.create_attendee(&event_id, &draft).await;
                    Completion::AttendeeSaved { event_id, result }
                });
            }
            ViewCommand::UpdateAttendee(attendee_id, draft) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.update_attendee(&event_id, &attendee_id, &draft).await;
                    Completion::AttendeeSaved { event_id, result }
                });
            }
            ViewCommand::DeleteAttendee(attendee_id) => {
                let Some(event_id) = self.store.selected_event_id().cloned() else {
                    return;
                };
                let rest = self.rest.clone();
                self.spawn(async move {
                    let result = rest.delete_attendee(&event_id, &attendee_id).await;
                    Completion::AttendeeDeleted {
                        event_id,
                        attendee_id,
                        result,
                    }
                });
            }
            ViewCommand::Refresh => self.refresh(),
            ViewCommand::Reconnect => self.stream.connect(),
            ViewCommand::SetVisible(visible) => self.stream.set_visible(visible),
        }
    }

    fn toggle_task(&mut self, task_id: EntityId) {
        let Some(event_id) = self.store.selected_event_id().cloned() else {
            return;
        };
        let Some(previous) = self.store.tasks().get(&task_id).map(|t| t.entity.clone()) else {
            tracing::debug!(task_id = %task_id, "toggle for a task that is not listed");
            return;
        };

        let mut optimistic = previous.clone();
        optimistic.completed = !previous.completed;
        self.store.apply_local_task(&event_id, optimistic);

        let rest = self.rest.clone();
        self.spawn(async move {
            let result = rest.toggle_task(&event_id, &previous).await;
            Completion::TaskToggled {
                event_id,
                previous,
                result,
            }
        });
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Events(Ok(events)) => self.store.load_events(events),
            Completion::Events(Err(err)) => self.fail("load events", err),
            Completion::Tasks { event_id, result } => match result {
                Ok(tasks) => {
                    self.store.load_tasks(&event_id, tasks);
                }
                Err(err) => self.fail("load tasks", err),
            },
            Completion::Attendees { event_id, result } => match result {
                Ok(attendees) => {
                    self.store.load_attendees(&event_id, attendees);
                }
                Err(err) => self.fail("load attendees", err),
            },
            Completion::TaskToggled {
                event_id,
                previous,
                result,
            } => match result {
                Ok(task) => {
                    self.store.apply_local_task(&event_id, task);
                }
                Err(err) => {
                    self.store.apply_local_task(&event_id, previous);
                    self.fail("update task", err);
                }
            },
            Completion::TaskDeleted {
                event_id,
                task_id,
                result,
            } => match result {
                Ok(()) => {
                    self.store.remove_local_task(&event_id, &task_id);
                }
                Err(err) => self.fail("delete task", err),
            },
            Completion::EventSaved(result) => match result {
                Ok(event) => {
                    self.store.apply_local_event(event);
                }
                Err(err) => self.fail("save event", err),
            },
            Completion::EventDeleted { event_id, result } => match result {
                Ok(()) => {
                    self.store.remove_local_event(&event_id);
                }
                Err(err) => self.fail("delete event", err),
            },
            Completion::TaskSaved { event_id, result } => match result {
                Ok(task) => {
                    self.store.apply_local_task(&event_id, task);
                }
                Err(err) => self.fail("save task", err),
            },
            Completion::AttendeeSaved { event_id, result } => match result {
                Ok(attendee) => {
                    self.store.apply_local_attendee(&event_id, attendee);
                }
                Err(err) => self.fail("save attendee", err),
            },
            Completion::AttendeeDeleted {
                event_id,
                attendee_id,
                result,
            } => match result {
                Ok(()) => {
                    self.store.remove_local_attendee(&event_id, &attendee_id);
                }
                Err(err) => self.fail("delete attendee", err),
            },
        }
    }

    fn refresh(&mut self) {
        let rest = self.rest.clone();
        self.spawn(async move { Completion::Events(rest.list_events().await) });
        if let Some(event_id) = self.store.selected_event_id().cloned() {
            self.load_children(event_id);
        }
    }

    fn load_children(&self, event_id: EntityId) {
        let rest = self.rest.clone();
        let tasks_for = event_id.clone();
        self.spawn(async move {
            let result = rest.list_tasks(&tasks_for).await;
            Completion::Tasks {
                event_id: tasks_for,
                result,
            }
        });

        let rest = self.rest.clone();
        self.spawn(async move {
            let result = rest.list_attendees(&event_id).await;
            Completion::Attendees { event_id, result }
        });
    }

    fn spawn<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            if tx.send(call.await).is_err() {
                tracing::debug!("view gone, dropping request result");
            }
        });
    }

    fn fail(&mut self, action: &'static str, err: RestError) {
        tracing::error!(action, err = %err, "request failed");
        self.last_error = Some(err.to_string());
    }

    fn remember(&mut self, notice: SyncNotice) {
        if self.recent.len() == RECENT_NOTICES {
            self.recent.pop_front();
        }
        self.recent.push_back(notice.message());
    }

    fn publish(&self) {
        self.snapshot.send_replace(ViewSnapshot {
            connection: self.stream.state(),
            stream_error: self.stream.last_error(),
            last_error: self.last_error.clone(),
            store: self.store.snapshot(),
            recent_notices: self.recent.iter().cloned().collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post, put};
    use axum::Router;
    use eventsync_core::events::NoticeBus;
    use serde_json::{json, Value};
    use tokio::time::timeout;

    use super::*;
    use crate::rest::MemoryTokenStore;

    struct StubStream {
        state: watch::Sender<ConnectionState>,
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
    }

    impl LiveStream for StubStream {
        fn state(&self) -> ConnectionState {
            *self.state.borrow()
        }

        fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
            self.state.subscribe()
        }

        fn last_error(&self) -> Option<String> {
            None
        }

        fn connect(&self) {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.state.send_replace(ConnectionState::Connected);
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.state.send_replace(ConnectionState::Disconnected);
        }

        fn set_visible(&self, _visible: bool) {}
    }

    async fn spawn_backend() -> String {
        let router = Router::new()
            .route(
                "/api/events",
                get(|| async { Json(json!([{"id": 3, "name": "Launch"}])) }).post(
                    |Json(body): Json<Value>| async move {
                        Json(json!({"id": 5, "name": body["name"]}))
                    },
                ),
            )
            .route(
                "/api/events/3",
                put(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 3, "name": body["name"]}))
                }),
            )
            .route("/api/events/5", delete(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/api/events/3/tasks",
                get(|| async {
                    Json(json!([
                        {"id": 7, "title": "Setup chairs", "completed": false},
                        {"id": 8, "title": "Print badges", "completed": false}
                    ]))
                })
                .post(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 9, "title": body["title"], "completed": false}))
                }),
            )
            .route(
                "/api/events/3/attendees",
                get(|| async { Json(json!([])) }).post(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 11, "name": body["name"], "email": body["email"]}))
                }),
            )
            .route(
                "/api/events/3/attendees/11",
                put(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 11, "name": body["name"], "email": body["email"]}))
                })
                .delete(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/api/events/3/tasks/8",
                put(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"message": "boom"})),
                    )
                }),
            )
            .route(
                "/api/events/3/tasks/7",
                put(|Json(body): Json<Value>| async move {
                    Json(json!({"id": 7, "title": body["title"], "completed": body["completed"]}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    async fn wait_for(
        handle: &ViewHandle,
        what: &str,
        check: impl FnMut(&ViewSnapshot) -> bool,
    ) -> ViewSnapshot {
        let mut rx = handle.watch();
        let snapshot = match timeout(Duration::from_secs(5), rx.wait_for(check)).await {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => panic!("timed out waiting for {what}: {:?}", handle.snapshot()),
        };
        snapshot
    }

    fn task_in<'a>(
        snapshot: &'a ViewSnapshot,
        id: &str,
    ) -> Option<&'a eventsync_core::store::Tracked<Task>> {
        snapshot.store.tasks.iter().find(|t| t.entity.id.as_str() == id)
    }

    fn event_named(snapshot: &ViewSnapshot, id: &str) -> Option<String> {
        snapshot
            .store
            .events
            .iter()
            .find(|e| e.entity.id.as_str() == id)
            .map(|e| e.entity.name.clone())
    }

    fn start(
        base: String,
        stream_state: ConnectionState,
    ) -> (ViewHandle, CancellationToken, tokio::task::JoinHandle<()>) {
        let rest = RestClient::new(base, Arc::new(MemoryTokenStore::new(None)));
        let (_forwarder, pushes) = PushForwarder::channel();
        let (state, _) = watch::channel(stream_state);
        let stream = StubStream {
            state,
            connects: Arc::default(),
            disconnects: Arc::default(),
        };
        let store = ReconciliationStore::new(NoticeBus::new(4));
        let (view, handle) = EventsView::new(store, stream, pushes, rest);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(view.run(shutdown.clone()));
        (handle, shutdown, task)
    }

    #[tokio::test]
    async fn push_rest_and_highlight_flow_through_one_view() {
        let base = spawn_backend().await;
        let rest = RestClient::new(base, Arc::new(MemoryTokenStore::new(None)));
        let store = ReconciliationStore::with_highlight_duration(
            NoticeBus::new(16),
            Duration::from_millis(200),
        );
        let (forwarder, pushes) = PushForwarder::channel();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let connects = Arc::new(AtomicUsize::new(0));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let stream = StubStream {
            state,
            connects: connects.clone(),
            disconnects: disconnects.clone(),
        };

        let (view, handle) = EventsView::new(store, stream, pushes, rest);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(view.run(shutdown.clone()));

        wait_for(&handle, "events", |s| s.store.events.len() == 1).await;
        handle.send(ViewCommand::OpenEvent("3".into())).await.unwrap();
        wait_for(&handle, "tasks", |s| s.store.tasks.len() == 2).await;

        forwarder.on_message(
            serde_json::from_value(json!({
                "type": "TASK_UPDATE",
                "eventId": 3,
                "data": {"id": 7, "title": "Setup chairs", "completed": true}
            }))
            .unwrap(),
        );
        let flagged = wait_for(&handle, "highlight", |s| {
            task_in(s, "7").is_some_and(|t| t.just_updated)
        })
        .await;
        assert!(task_in(&flagged, "7").unwrap().entity.completed);
        assert_eq!(flagged.store.tasks.len(), 2);
        let cleared = wait_for(&handle, "highlight to clear", |s| {
            task_in(s, "7").is_some_and(|t| !t.just_updated)
        })
        .await;
        assert!(cleared
            .recent_notices
            .contains(&"Task \"Setup chairs\" completed!".to_string()));

        handle.send(ViewCommand::ToggleTask("8".into())).await.unwrap();
        let failed = wait_for(&handle, "toggle failure", |s| s.last_error.is_some()).await;
        assert_eq!(failed.last_error.as_deref(), Some("boom"));
        let reverted = wait_for(&handle, "revert", |s| {
            task_in(s, "8").is_some_and(|t| !t.entity.completed)
        })
        .await;
        assert_eq!(reverted.store.selected_event, Some(EntityId::from("3")));

        handle.send(ViewCommand::ToggleTask("7".into())).await.unwrap();
        wait_for(&handle, "toggle success", |s| {
            task_in(s, "7").is_some_and(|t| !t.entity.completed)
        })
        .await;

        handle.send(ViewCommand::Reconnect).await.unwrap();
        wait_for(&handle, "reconnect", |s| s.connection == ConnectionState::Connected).await;
        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closing_the_event_drops_late_child_results() {
        let (handle, _shutdown, task) = start(spawn_backend().await, ConnectionState::Connected);

        handle.send(ViewCommand::OpenEvent("3".into())).await.unwrap();
        handle.send(ViewCommand::CloseEvent).await.unwrap();
        wait_for(&handle, "events", |s| s.store.events.len() == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.store.selected_event, None);
        assert!(snapshot.store.tasks.is_empty());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn admin_edits_land_in_the_store() {
        let (handle, shutdown, task) = start(spawn_backend().await, ConnectionState::Connected);
        wait_for(&handle, "events", |s| s.store.events.len() == 1).await;

        let draft = |name: &str| EventDraft {
            name: name.into(),
            ..Default::default()
        };
        handle.send(ViewCommand::CreateEvent(draft("Retro"))).await.unwrap();
        wait_for(&handle, "created event", |s| {
            event_named(s, "5").as_deref() == Some("Retro")
        })
        .await;
        handle
            .send(ViewCommand::UpdateEvent("3".into(), draft("Launch day")))
            .await
            .unwrap();
        wait_for(&handle, "renamed event", |s| {
            event_named(s, "3").as_deref() == Some("Launch day")
        })
        .await;
        handle.send(ViewCommand::DeleteEvent("5".into())).await.unwrap();
        wait_for(&handle, "deleted event", |s| event_named(s, "5").is_none()).await;

        handle.send(ViewCommand::OpenEvent("3".into())).await.unwrap();
        wait_for(&handle, "tasks", |s| s.store.tasks.len() == 2).await;
        let task_draft = |title: &str| TaskDraft {
            title: title.into(),
            ..Default::default()
        };
        handle.send(ViewCommand::CreateTask(task_draft("Book venue"))).await.unwrap();
        wait_for(&handle, "created task", |s| task_in(s, "9").is_some()).await;
        handle
            .send(ViewCommand::UpdateTask("7".into(), task_draft("Stack chairs")))
            .await
            .unwrap();
        wait_for(&handle, "updated task", |s| {
            task_in(s, "7").is_some_and(|t| t.entity.title == "Stack chairs")
        })
        .await;

        let attendee = |name: &str| AttendeeDraft {
            name: name.into(),
            email: "ana@example.com".into(),
        };
        handle.send(ViewCommand::CreateAttendee(attendee("Ana"))).await.unwrap();
        wait_for(&handle, "created attendee", |s| s.store.attendees.len() == 1).await;
        handle
            .send(ViewCommand::UpdateAttendee("11".into(), attendee("Ana B")))
            .await
            .unwrap();
        wait_for(&handle, "renamed attendee", |s| {
            s.store.attendees.iter().any(|a| a.entity.name == "Ana B")
        })
        .await;
        handle.send(ViewCommand::DeleteAttendee("11".into())).await.unwrap();
        let after = wait_for(&handle, "deleted attendee", |s| s.store.attendees.is_empty()).await;
        assert_eq!(after.last_error, None);

        handle.send(ViewCommand::CreateEvent(draft(" "))).await.unwrap();
        let failed = wait_for(&handle, "validation error", |s| s.last_error.is_some()).await;
        assert_eq!(failed.last_error.as_deref(), Some("event name is required"));
        assert_eq!(failed.store.events.len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }
}
