use serde::Serialize;

use crate::model::{Entity, EntityId};

/// What a collection covers, which decides whether an unseen id pushed by
/// the server may be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "eventId", rename_all = "camelCase")]
pub enum Scope {
    /// No baseline fetched yet; remote inserts are ignored.
    Unloaded,
    /// The full list (the events list itself); every remote insert is accepted.
    All,
    /// Children of one event; remote inserts must name this event.
    Event(EntityId),
}

/// An entity plus the UI-only highlight flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracked<T> {
    #[serde(flatten)]
    pub entity: T,
    pub just_updated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Removed,
    /// Nothing changed: foreign-scope insert, or delete of an absent id.
    Ignored,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Ignored)
    }
}

/// Ordered entities of one kind, at most one per id.
///
/// Positions are stable: replacing an entity keeps its slot, inserts append.
/// Every merge is keyed purely by id and the last applied payload wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    scope: Scope,
    items: Vec<Tracked<T>>,
}

impl<T: Entity> Collection<T> {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            items: Vec::new(),
        }
    }

    pub fn unloaded() -> Self {
        Self::new(Scope::Unloaded)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Replace the contents with a freshly fetched baseline. Later duplicates
    /// of an id overwrite earlier ones in place.
    pub fn load(&mut self, scope: Scope, entities: Vec<T>) {
        self.scope = scope;
        self.items.clear();
        for entity in entities {
            self.apply_local_result(entity);
        }
    }

    /// Merge the entity a REST call returned. Present ids are replaced in
    /// place, others appended. The highlight flag is left as it was.
    pub fn apply_local_result(&mut self, entity: T) -> MergeOutcome {
        match self.position(entity.id()) {
            Some(index) => {
                self.items[index].entity = entity;
                MergeOutcome::Replaced
            }
            None => {
                self.items.push(Tracked {
                    entity,
                    just_updated: false,
                });
                MergeOutcome::Inserted
            }
        }
    }

    /// Merge an entity snapshot pushed by the server and flag it.
    ///
    /// `origin` is the event the message was scoped to. An unseen id is only
    /// inserted when this collection is authoritative for that origin.
    pub fn apply_remote_upsert(&mut self, entity: T, origin: Option<&EntityId>) -> MergeOutcome {
        if let Some(index) = self.position(entity.id()) {
            self.items[index] = Tracked {
                entity,
                just_updated: true,
            };
            return MergeOutcome::Replaced;
        }

        if !self.accepts_insert_from(origin) {
            tracing::debug!(
                kind = %T::KIND,
                id = %entity.id(),
                origin = ?origin.map(EntityId::as_str),
                "ignoring push for a scope this view has not loaded"
            );
            return MergeOutcome::Ignored;
        }

        self.items.push(Tracked {
            entity,
            just_updated: true,
        });
        MergeOutcome::Inserted
    }

    /// Remove `id` if present. Absent ids are a no-op, so duplicate delete
    /// deliveries are harmless.
    pub fn apply_remote_delete(&mut self, id: &EntityId) -> MergeOutcome {
        match self.position(id) {
            Some(index) => {
                self.items.remove(index);
                MergeOutcome::Removed
            }
            None => MergeOutcome::Ignored,
        }
    }

    /// Drop the highlight of `id`. Returns whether a flag was cleared.
    pub fn clear_highlight(&mut self, id: &EntityId) -> bool {
        match self.position(id) {
            Some(index) if self.items[index].just_updated => {
                self.items[index].just_updated = false;
                true
            }
            _ => false,
        }
    }

    fn accepts_insert_from(&self, origin: Option<&EntityId>) -> bool {
        match &self.scope {
            Scope::All => true,
            Scope::Event(loaded) => origin == Some(loaded),
            Scope::Unloaded => false,
        }
    }

    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|tracked| tracked.entity.id() == id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Tracked<T>> {
        self.position(id).map(|index| &self.items[index])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracked<T>> {
        self.items.iter()
    }

    pub fn entities(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|tracked| &tracked.entity)
    }

    pub fn as_slice(&self) -> &[Tracked<T>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{Event, Task};

    fn task(id: &str, title: &str, completed: bool) -> Task {
        serde_json::from_value(json!({"id": id, "title": title, "completed": completed})).unwrap()
    }

    fn task_list(event: &str, tasks: Vec<Task>) -> Collection<Task> {
        let mut collection = Collection::unloaded();
        collection.load(Scope::Event(event.into()), tasks);
        collection
    }

    #[test]
    fn repeated_remote_upsert_keeps_one_copy_with_latest_fields() {
        let mut tasks = task_list("3", vec![task("7", "Setup chairs", false)]);

        tasks.apply_remote_upsert(task("7", "Setup chairs", true), Some(&"3".into()));
        let outcome =
            tasks.apply_remote_upsert(task("7", "Set up chairs", true), Some(&"3".into()));

        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(tasks.len(), 1);
        let tracked = tasks.get(&"7".into()).unwrap();
        assert_eq!(tracked.entity.title, "Set up chairs");
        assert!(tracked.just_updated);
    }

    #[test]
    fn local_result_and_push_echo_converge_in_either_order() {
        let created = task("9", "Print badges", false);

        let mut local_first = task_list("3", vec![]);
        local_first.apply_local_result(created.clone());
        local_first.apply_remote_upsert(created.clone(), Some(&"3".into()));

        let mut push_first = task_list("3", vec![]);
        push_first.apply_remote_upsert(created.clone(), Some(&"3".into()));
        push_first.apply_local_result(created.clone());

        for tasks in [&local_first, &push_first] {
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks.get(&"9".into()).unwrap().entity, created);
        }
    }

    #[test]
    fn local_result_does_not_touch_the_highlight() {
        let mut tasks = task_list("3", vec![task("1", "a", false)]);
        assert_eq!(tasks.apply_local_result(task("1", "b", false)), MergeOutcome::Replaced);
        assert!(!tasks.get(&"1".into()).unwrap().just_updated);

        tasks.apply_remote_upsert(task("1", "c", false), Some(&"3".into()));
        tasks.apply_local_result(task("1", "d", false));
        assert!(tasks.get(&"1".into()).unwrap().just_updated);
    }

    #[test]
    fn deleting_an_absent_id_changes_nothing() {
        let mut tasks = task_list("3", vec![task("1", "a", false), task("2", "b", false)]);
        let before = tasks.clone();

        assert_eq!(tasks.apply_remote_delete(&"99".into()), MergeOutcome::Ignored);
        assert_eq!(tasks, before);

        assert_eq!(tasks.apply_remote_delete(&"1".into()), MergeOutcome::Removed);
        assert_eq!(tasks.apply_remote_delete(&"1".into()), MergeOutcome::Ignored);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn foreign_scope_creation_is_ignored() {
        let mut tasks: Collection<Task> = Collection::new(Scope::Event("A".into()));
        let outcome = tasks.apply_remote_upsert(task("5", "Elsewhere", false), Some(&"B".into()));
        assert_eq!(outcome, MergeOutcome::Ignored);
        assert!(tasks.is_empty());

        let mut unloaded: Collection<Task> = Collection::unloaded();
        unloaded.apply_remote_upsert(task("5", "Elsewhere", false), Some(&"B".into()));
        assert!(unloaded.is_empty());

        let outcome = tasks.apply_remote_upsert(task("6", "Here", false), Some(&"A".into()));
        assert_eq!(outcome, MergeOutcome::Inserted);
    }

    #[test]
    fn full_list_accepts_unseen_ids() {
        let mut events: Collection<Event> = Collection::new(Scope::All);
        let event: Event = serde_json::from_value(json!({"id": 4, "name": "Launch"})).unwrap();
        assert_eq!(events.apply_remote_upsert(event, None), MergeOutcome::Inserted);
        assert!(events.get(&"4".into()).unwrap().just_updated);
    }

    #[test]
    fn replacing_keeps_positions_stable() {
        let mut tasks = task_list(
            "3",
            vec![task("1", "a", false), task("2", "b", false), task("3", "c", false)],
        );
        tasks.apply_remote_upsert(task("2", "b2", true), Some(&"3".into()));
        let order: Vec<_> = tasks.entities().map(|t| t.id.as_str().to_string()).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn load_deduplicates_by_normalized_id() {
        let duplicate: Task = serde_json::from_value(json!({"id": 1, "title": "again"})).unwrap();
        let tasks = task_list("3", vec![task("1", "a", false), duplicate]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.get(&"1".into()).unwrap().entity.title, "again");
    }

    #[test]
    fn clear_highlight_reports_whether_a_flag_was_set() {
        let mut tasks = task_list("3", vec![task("1", "a", false)]);
        assert!(!tasks.clear_highlight(&"1".into()));
        tasks.apply_remote_upsert(task("1", "a", true), Some(&"3".into()));
        assert!(tasks.clear_highlight(&"1".into()));
        assert!(!tasks.get(&"1".into()).unwrap().just_updated);
        assert!(!tasks.clear_highlight(&"404".into()));
    }

    #[test]
    fn tracked_serializes_flag_next_to_entity_fields() {
        let tracked = Tracked {
            entity: task("7", "Setup chairs", true),
            just_updated: true,
        };
        let value = serde_json::to_value(&tracked).unwrap();
        assert_eq!(value["id"], json!("7"));
        assert_eq!(value["justUpdated"], json!(true));
    }
}
