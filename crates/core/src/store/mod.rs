//! Reconciliation of REST results and push messages into one view's state.
//!
//! Both input paths converge on the id-keyed merge in [`Collection`], so the
//! order in which a local result and the server's echo of the same change
//! arrive does not matter. There is no version in the push contract; the
//! last applied payload wins.

pub mod collection;
pub mod highlight;

use std::time::Duration;

use serde::Serialize;

use crate::events::{NoticeBus, PushMessage, SyncNotice};
use crate::model::{Attendee, Entity, EntityId, EntityKind, Event, Task};

pub use collection::{Collection, MergeOutcome, Scope, Tracked};
pub use highlight::{HighlightKey, Highlights};

/// How long a push-driven change stays highlighted.
pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_millis(600);

/// State of one view: the events list plus the tasks and attendees of the
/// event whose detail panel is open. Owned by that view alone.
#[derive(Debug)]
pub struct ReconciliationStore {
    events: Collection<Event>,
    tasks: Collection<Task>,
    attendees: Collection<Attendee>,
    selected: Option<EntityId>,
    highlights: Highlights,
    notices: NoticeBus,
}

/// Owned copy of a store's contents, as handed to renderers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub events: Vec<Tracked<Event>>,
    pub selected_event: Option<EntityId>,
    pub tasks: Vec<Tracked<Task>>,
    pub attendees: Vec<Tracked<Attendee>>,
}

impl ReconciliationStore {
    pub fn new(notices: NoticeBus) -> Self {
        Self::with_highlight_duration(notices, DEFAULT_HIGHLIGHT)
    }

    pub fn with_highlight_duration(notices: NoticeBus, duration: Duration) -> Self {
        Self {
            events: Collection::new(Scope::All),
            tasks: Collection::unloaded(),
            attendees: Collection::unloaded(),
            selected: None,
            highlights: Highlights::new(duration),
            notices,
        }
    }

    pub fn events(&self) -> &Collection<Event> {
        &self.events
    }

    pub fn tasks(&self) -> &Collection<Task> {
        &self.tasks
    }

    pub fn attendees(&self) -> &Collection<Attendee> {
        &self.attendees
    }

    pub fn selected_event_id(&self) -> Option<&EntityId> {
        self.selected.as_ref()
    }

    pub fn selected_event(&self) -> Option<&Tracked<Event>> {
        self.selected.as_ref().and_then(|id| self.events.get(id))
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    pub fn pending_highlights(&self) -> usize {
        self.highlights.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            events: self.events.as_slice().to_vec(),
            selected_event: self.selected.clone(),
            tasks: self.tasks.as_slice().to_vec(),
            attendees: self.attendees.as_slice().to_vec(),
        }
    }

    /// Install the initial events fetch.
    pub fn load_events(&mut self, events: Vec<Event>) {
        self.highlights.cancel_kind(EntityKind::Event);
        self.events.load(Scope::All, events);
        tracing::debug!(count = self.events.len(), "events loaded");
    }

    /// Open the detail panel of `event_id`. Its tasks and attendees start
    /// empty but scoped, so pushes for this event are accepted while the
    /// initial fetch is in flight.
    pub fn open_event(&mut self, event_id: EntityId) {
        if self.selected.as_ref() == Some(&event_id) {
            return;
        }
        self.close_event();
        self.tasks = Collection::new(Scope::Event(event_id.clone()));
        self.attendees = Collection::new(Scope::Event(event_id.clone()));
        tracing::debug!(event_id = %event_id, "event detail opened");
        self.selected = Some(event_id);
    }

    /// Discard the detail panel and its timers.
    pub fn close_event(&mut self) {
        if let Some(event_id) = self.selected.take() {
            tracing::debug!(event_id = %event_id, "event detail closed");
        }
        self.highlights.cancel_kind(EntityKind::Task);
        self.highlights.cancel_kind(EntityKind::Attendee);
        self.tasks = Collection::unloaded();
        self.attendees = Collection::unloaded();
    }

    /// Install a tasks fetch. Returns `false`, changing nothing, when the
    /// fetch belongs to an event that is no longer open.
    pub fn load_tasks(&mut self, event_id: &EntityId, tasks: Vec<Task>) -> bool {
        if !self.is_selected(event_id) {
            tracing::debug!(event_id = %event_id, "dropping tasks fetched for a closed event");
            return false;
        }
        self.highlights.cancel_kind(EntityKind::Task);
        self.tasks.load(Scope::Event(event_id.clone()), tasks);
        true
    }

    pub fn load_attendees(&mut self, event_id: &EntityId, attendees: Vec<Attendee>) -> bool {
        if !self.is_selected(event_id) {
            tracing::debug!(event_id = %event_id, "dropping attendees fetched for a closed event");
            return false;
        }
        self.highlights.cancel_kind(EntityKind::Attendee);
        self.attendees.load(Scope::Event(event_id.clone()), attendees);
        true
    }

    /// Merge one push message.
    pub fn apply_push(&mut self, message: PushMessage) -> MergeOutcome {
        tracing::trace!(message_type = message.type_name(), "applying push");
        match message {
            PushMessage::EventCreate { data } => {
                let notice = SyncNotice::EventCreated { name: data.name.clone() };
                self.upsert_event(data, notice)
            }
            PushMessage::EventUpdate { data } => {
                let notice = SyncNotice::EventUpdated { name: data.name.clone() };
                self.upsert_event(data, notice)
            }
            PushMessage::EventDelete { event_id } => self.delete_event(&event_id, true),
            PushMessage::TaskCreate { event_id, data } => {
                let notice = Some(SyncNotice::TaskCreated { title: data.title.clone() });
                self.upsert_task(event_id.as_ref(), data, notice)
            }
            PushMessage::TaskUpdate { event_id, data } => {
                let was_completed = self.tasks.get(&data.id).is_some_and(|t| t.entity.completed);
                let notice = (data.completed && !was_completed).then(|| SyncNotice::TaskCompleted {
                    title: data.title.clone(),
                });
                self.upsert_task(event_id.as_ref(), data, notice)
            }
            PushMessage::TaskDelete { task_id, .. } => {
                let outcome = self.tasks.apply_remote_delete(&task_id);
                if outcome.changed() {
                    self.highlights.cancel(&HighlightKey::new(EntityKind::Task, task_id.clone()));
                    self.notify(SyncNotice::TaskDeleted { id: task_id });
                }
                outcome
            }
            PushMessage::AttendeeCreate { event_id, data } => {
                let notice = SyncNotice::AttendeeCreated { name: data.name.clone() };
                self.upsert_attendee(event_id.as_ref(), data, notice)
            }
            PushMessage::AttendeeUpdate { event_id, data } => {
                let notice = SyncNotice::AttendeeUpdated { name: data.name.clone() };
                self.upsert_attendee(event_id.as_ref(), data, notice)
            }
            PushMessage::AttendeeDelete { attendee_id, .. } => {
                let outcome = self.attendees.apply_remote_delete(&attendee_id);
                if outcome.changed() {
                    self.highlights
                        .cancel(&HighlightKey::new(EntityKind::Attendee, attendee_id.clone()));
                    self.notify(SyncNotice::AttendeeRemoved { id: attendee_id });
                }
                outcome
            }
            PushMessage::Ping => MergeOutcome::Ignored,
            PushMessage::SystemStatus { status, message } => {
                tracing::info!(status = %status, message = %message, "system status");
                self.notify(SyncNotice::SystemStatus { status, message });
                MergeOutcome::Ignored
            }
        }
    }

    /// Merge the event a REST create or update returned.
    pub fn apply_local_event(&mut self, event: Event) -> MergeOutcome {
        self.events.apply_local_result(event)
    }

    /// Merge the task a REST call returned for `event_id`. Ignored when that
    /// event is no longer open.
    pub fn apply_local_task(&mut self, event_id: &EntityId, task: Task) -> MergeOutcome {
        if !self.is_selected(event_id) {
            tracing::debug!(
                event_id = %event_id,
                task_id = %task.id,
                "dropping task result for a closed event"
            );
            return MergeOutcome::Ignored;
        }
        self.tasks.apply_local_result(task)
    }

    pub fn apply_local_attendee(
        &mut self,
        event_id: &EntityId,
        attendee: Attendee,
    ) -> MergeOutcome {
        if !self.is_selected(event_id) {
            tracing::debug!(
                event_id = %event_id,
                attendee_id = %attendee.id,
                "dropping attendee result for a closed event"
            );
            return MergeOutcome::Ignored;
        }
        self.attendees.apply_local_result(attendee)
    }

    /// Reflect a successful REST delete of an event.
    pub fn remove_local_event(&mut self, event_id: &EntityId) -> MergeOutcome {
        self.delete_event(event_id, false)
    }

    pub fn remove_local_task(&mut self, event_id: &EntityId, task_id: &EntityId) -> MergeOutcome {
        if !self.is_selected(event_id) {
            return MergeOutcome::Ignored;
        }
        self.highlights.cancel(&HighlightKey::new(EntityKind::Task, task_id.clone()));
        self.tasks.apply_remote_delete(task_id)
    }

    pub fn remove_local_attendee(
        &mut self,
        event_id: &EntityId,
        attendee_id: &EntityId,
    ) -> MergeOutcome {
        if !self.is_selected(event_id) {
            return MergeOutcome::Ignored;
        }
        self.highlights
            .cancel(&HighlightKey::new(EntityKind::Attendee, attendee_id.clone()));
        self.attendees.apply_remote_delete(attendee_id)
    }

    /// Wait for the next highlight to run out and clear it. Pending forever
    /// while nothing is highlighted; cancel safe.
    pub async fn expire_next(&mut self) -> HighlightKey {
        let key = self.highlights.next_expired().await;
        let cleared = match key.kind {
            EntityKind::Event => self.events.clear_highlight(&key.id),
            EntityKind::Task => self.tasks.clear_highlight(&key.id),
            EntityKind::Attendee => self.attendees.clear_highlight(&key.id),
        };
        tracing::trace!(kind = %key.kind, id = %key.id, cleared, "highlight expired");
        key
    }

    fn is_selected(&self, event_id: &EntityId) -> bool {
        self.selected.as_ref() == Some(event_id)
    }

    fn upsert_event(&mut self, event: Event, notice: SyncNotice) -> MergeOutcome {
        let id = event.id.clone();
        let outcome = self.events.apply_remote_upsert(event, None);
        self.after_upsert(EntityKind::Event, id, outcome, Some(notice))
    }

    fn upsert_task(
        &mut self,
        origin: Option<&EntityId>,
        task: Task,
        notice: Option<SyncNotice>,
    ) -> MergeOutcome {
        let id = task.id.clone();
        let outcome = self.tasks.apply_remote_upsert(task, origin);
        self.after_upsert(EntityKind::Task, id, outcome, notice)
    }

    fn upsert_attendee(
        &mut self,
        origin: Option<&EntityId>,
        attendee: Attendee,
        notice: SyncNotice,
    ) -> MergeOutcome {
        let id = attendee.id.clone();
        let outcome = self.attendees.apply_remote_upsert(attendee, origin);
        self.after_upsert(EntityKind::Attendee, id, outcome, Some(notice))
    }

    fn after_upsert(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        outcome: MergeOutcome,
        notice: Option<SyncNotice>,
    ) -> MergeOutcome {
        if outcome.changed() {
            self.highlights.schedule(HighlightKey::new(kind, id));
            if let Some(notice) = notice {
                self.notify(notice);
            }
        }
        outcome
    }

    fn delete_event(&mut self, event_id: &EntityId, notify: bool) -> MergeOutcome {
        let mut outcome = self.events.apply_remote_delete(event_id);
        self.highlights
            .cancel(&HighlightKey::new(Event::KIND, event_id.clone()));
        if self.is_selected(event_id) {
            self.close_event();
            outcome = MergeOutcome::Removed;
        }
        if notify && outcome.changed() {
            self.notify(SyncNotice::EventDeleted { id: event_id.clone() });
        }
        outcome
    }

    fn notify(&self, notice: SyncNotice) {
        if self.notices.publish(notice).is_err() {
            tracing::trace!("no notice subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::{timeout, Instant};

    use super::*;

    fn task(value: serde_json::Value) -> Task {
        serde_json::from_value(value).unwrap()
    }

    fn event(id: u64, name: &str) -> Event {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    fn push(value: serde_json::Value) -> PushMessage {
        serde_json::from_value(value).unwrap()
    }

    fn store_with_open_event(event_id: &str, tasks: Vec<Task>) -> ReconciliationStore {
        let mut store = ReconciliationStore::new(NoticeBus::new(16));
        store.load_events(vec![event(3, "Launch")]);
        store.open_event(event_id.into());
        assert!(store.load_tasks(&event_id.into(), tasks));
        store
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_task_update_is_flagged_then_cleared() {
        let mut store = store_with_open_event(
            "3",
            vec![task(json!({"id": "7", "title": "Setup chairs", "completed": false}))],
        );
        let mut notices = store.notices().subscribe();

        let outcome = store.apply_push(push(json!({
            "type": "TASK_UPDATE",
            "eventId": "3",
            "data": {"id": 7, "title": "Setup chairs", "completed": true}
        })));
        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(store.tasks().len(), 1);
        let tracked = store.tasks().get(&EntityId::from(7u64)).unwrap();
        assert!(tracked.entity.completed);
        assert!(tracked.just_updated);
        assert_eq!(
            notices.recv().await.unwrap(),
            SyncNotice::TaskCompleted {
                title: "Setup chairs".into()
            }
        );

        let start = Instant::now();
        let expired = store.expire_next().await;
        assert_eq!(start.elapsed(), DEFAULT_HIGHLIGHT);
        assert_eq!(expired, HighlightKey::new(EntityKind::Task, "7".into()));
        assert!(!store.tasks().get(&"7".into()).unwrap().just_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn highlight_holds_until_the_full_delay() {
        let mut store = store_with_open_event("3", vec![]);
        store.apply_push(push(json!({
            "type": "EVENT_UPDATE", "data": {"id": 3, "name": "Launch day"}
        })));

        assert!(timeout(Duration::from_millis(599), store.expire_next()).await.is_err());
        assert!(store.events().get(&"3".into()).unwrap().just_updated);

        store.expire_next().await;
        assert!(!store.events().get(&"3".into()).unwrap().just_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_are_independent_per_entity() {
        let mut store = store_with_open_event(
            "3",
            vec![
                task(json!({"id": 1, "title": "a"})),
                task(json!({"id": 2, "title": "b"})),
            ],
        );
        let start = Instant::now();
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 1, "title": "a!"}
        })));
        tokio::time::advance(Duration::from_millis(300)).await;
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 2, "title": "b!"}
        })));

        assert_eq!(store.expire_next().await.id, EntityId::from("1"));
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert!(store.tasks().get(&"2".into()).unwrap().just_updated);

        assert_eq!(store.expire_next().await.id, EntityId::from("2"));
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn reflagging_restarts_the_timer() {
        let mut store = store_with_open_event("3", vec![task(json!({"id": 1, "title": "a"}))]);
        let start = Instant::now();
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 1, "title": "a1"}
        })));
        tokio::time::advance(Duration::from_millis(400)).await;
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 1, "title": "a2"}
        })));

        store.expire_next().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(store.pending_highlights(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_cancels_the_pending_clear() {
        let mut store = store_with_open_event("3", vec![task(json!({"id": 1, "title": "a"}))]);
        let mut notices = store.notices().subscribe();
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 1, "title": "a1"}
        })));
        assert_eq!(store.pending_highlights(), 1);

        let outcome = store.apply_push(push(json!({
            "type": "TASK_DELETE", "eventId": 3, "taskId": 1
        })));
        assert_eq!(outcome, MergeOutcome::Removed);
        assert_eq!(store.pending_highlights(), 0);
        assert!(timeout(Duration::from_secs(5), store.expire_next()).await.is_err());
        assert_eq!(notices.recv().await.unwrap(), SyncNotice::TaskDeleted { id: "1".into() });

        let again = store.apply_push(push(json!({
            "type": "TASK_DELETE", "eventId": 3, "taskId": "1"
        })));
        assert_eq!(again, MergeOutcome::Ignored);
    }

    #[tokio::test]
    async fn task_creation_for_another_event_is_ignored() {
        let mut store = store_with_open_event("A", vec![]);
        let outcome = store.apply_push(push(json!({
            "type": "TASK_CREATE",
            "eventId": "B",
            "data": {"id": 50, "title": "Not ours"}
        })));
        assert_eq!(outcome, MergeOutcome::Ignored);
        assert!(store.tasks().is_empty());
        assert_eq!(store.pending_highlights(), 0);

        let outcome = store.apply_push(push(json!({
            "type": "TASK_CREATE",
            "eventId": "A",
            "data": {"id": 51, "title": "Ours"}
        })));
        assert_eq!(outcome, MergeOutcome::Inserted);
    }

    #[tokio::test]
    async fn pushes_without_an_open_event_leave_children_untouched() {
        let mut store = ReconciliationStore::new(NoticeBus::default());
        store.load_events(vec![event(1, "Launch")]);
        store.apply_push(push(json!({
            "type": "ATTENDEE_CREATE", "eventId": 1, "data": {"id": 2, "name": "Ana"}
        })));
        store.apply_push(push(json!({
            "type": "TASK_CREATE", "eventId": 1, "data": {"id": 2, "title": "x"}
        })));
        assert!(store.attendees().is_empty());
        assert!(store.tasks().is_empty());
        assert_eq!(store.events().len(), 1);
    }

    #[tokio::test]
    async fn local_result_and_echo_converge_in_either_order() {
        let created = task(json!({"id": 9, "title": "Print badges"}));
        let echo = push(json!({
            "type": "TASK_CREATE", "eventId": "3", "data": {"id": "9", "title": "Print badges"}
        }));

        let mut local_first = store_with_open_event("3", vec![]);
        local_first.apply_local_task(&"3".into(), created.clone());
        local_first.apply_push(echo.clone());

        let mut echo_first = store_with_open_event("3", vec![]);
        echo_first.apply_push(echo);
        echo_first.apply_local_task(&"3".into(), created.clone());

        for store in [&local_first, &echo_first] {
            assert_eq!(store.tasks().len(), 1);
            assert_eq!(store.tasks().get(&"9".into()).unwrap().entity, created);
        }
    }

    #[tokio::test]
    async fn results_for_a_closed_event_are_dropped() {
        let mut store = store_with_open_event("3", vec![]);
        store.open_event("4".into());

        let stale = task(json!({"id": 1, "title": "late"}));
        assert_eq!(store.apply_local_task(&"3".into(), stale.clone()), MergeOutcome::Ignored);
        assert!(!store.load_tasks(&"3".into(), vec![stale]));
        assert!(store.tasks().is_empty());
        assert_eq!(store.tasks().scope(), &Scope::Event("4".into()));
    }

    #[tokio::test]
    async fn deleting_the_open_event_closes_its_detail() {
        let mut store = store_with_open_event("3", vec![task(json!({"id": 1, "title": "a"}))]);
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3, "data": {"id": 1, "title": "b"}
        })));
        let mut notices = store.notices().subscribe();

        let outcome = store.apply_push(push(json!({"type": "EVENT_DELETE", "eventId": 3})));
        assert_eq!(outcome, MergeOutcome::Removed);
        assert!(store.events().is_empty());
        assert_eq!(store.selected_event_id(), None);
        assert!(store.tasks().is_empty());
        assert_eq!(store.tasks().scope(), &Scope::Unloaded);
        assert_eq!(store.pending_highlights(), 0);
        assert_eq!(notices.recv().await.unwrap(), SyncNotice::EventDeleted { id: "3".into() });
    }

    #[tokio::test]
    async fn pushed_events_are_inserted_into_the_full_list() {
        let mut store = ReconciliationStore::new(NoticeBus::new(4));
        let mut notices = store.notices().subscribe();
        store.load_events(vec![event(1, "Launch")]);

        store.apply_push(push(json!({"type": "EVENT_CREATE", "data": {"id": 2, "name": "Retro"}})));
        assert_eq!(store.events().len(), 2);
        assert!(store.events().get(&"2".into()).unwrap().just_updated);
        assert_eq!(
            notices.recv().await.unwrap(),
            SyncNotice::EventCreated {
                name: "Retro".into()
            }
        );
    }

    #[tokio::test]
    async fn completed_notice_only_fires_on_transition() {
        let mut store = store_with_open_event(
            "3",
            vec![task(json!({"id": 1, "title": "done already", "completed": true}))],
        );
        let mut notices = store.notices().subscribe();
        store.apply_push(push(json!({
            "type": "TASK_UPDATE", "eventId": 3,
            "data": {"id": 1, "title": "done already (renamed)", "completed": true}
        })));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn housekeeping_messages_change_nothing() {
        let mut store = store_with_open_event("3", vec![]);
        let mut notices = store.notices().subscribe();
        let before = store.snapshot();

        assert_eq!(store.apply_push(PushMessage::Ping), MergeOutcome::Ignored);
        let status = push(json!({"type": "SYSTEM_STATUS", "status": "TEST", "message": "hello"}));
        assert_eq!(store.apply_push(status), MergeOutcome::Ignored);

        assert_eq!(store.snapshot().events, before.events);
        assert_eq!(
            notices.recv().await.unwrap(),
            SyncNotice::SystemStatus {
                status: "TEST".into(),
                message: "hello".into()
            }
        );
    }

    #[tokio::test]
    async fn local_removals_cancel_highlights() {
        let mut store = store_with_open_event("3", vec![]);
        store.load_attendees(&"3".into(), vec![]);
        store.apply_push(push(json!({
            "type": "ATTENDEE_CREATE", "eventId": 3, "data": {"id": 8, "name": "Ana"}
        })));
        assert_eq!(store.attendees().len(), 1);
        assert_eq!(store.pending_highlights(), 1);

        assert_eq!(store.remove_local_attendee(&"3".into(), &"8".into()), MergeOutcome::Removed);
        assert_eq!(store.pending_highlights(), 0);

        assert_eq!(store.remove_local_event(&"3".into()), MergeOutcome::Removed);
        assert_eq!(store.selected_event_id(), None);
    }
}
