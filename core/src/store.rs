//! Per-user scoped record collections.
//!
//! A `ScopedStore<R>` holds the current user's collection of `R` in memory and
//! rewrites the whole collection as one JSON array under `<prefix>_<user id>`
//! after every successful mutation. There is one store per record domain.

use std::rc::Rc;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::models::parse_timestamp;

/// Where newly created records land in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPolicy {
    /// Newest first.
    Prepend,
    /// Chronological.
    Append,
}

/// A record type that can live in a `ScopedStore`.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Storage key prefix; the full key is `<KEY_PREFIX>_<user id>`.
    const KEY_PREFIX: &'static str;
    const INSERT: InsertPolicy;
    /// Used in error messages, e.g. "Failed to add diet item".
    const NOUN: &'static str;
    const PLURAL: &'static str;

    /// Creation input: everything but the id.
    type New;
    /// Partial update; `None` fields are left untouched.
    type Patch;

    fn id(&self) -> &str;
    fn create(id: String, data: Self::New) -> Self;
    fn apply(&mut self, patch: Self::Patch);
}

/// A parent record owning an ordered list of child records.
///
/// Child ids are only unique within their parent's list.
pub trait Composite: Record {
    type Child: Clone;
    type NewChild;
    const CHILD_NOUN: &'static str;

    fn children(&self) -> &[Self::Child];
    fn children_mut(&mut self) -> &mut Vec<Self::Child>;
    fn child_id(child: &Self::Child) -> &str;
    fn child_timestamp(child: &Self::Child) -> &str;
    fn create_child(id: String, data: Self::NewChild) -> Self::Child;
}

#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// One child record paired with the parent that owns it.
pub struct TimelineEntry<'a, R: Composite> {
    pub parent: &'a R,
    pub record: &'a R::Child,
}

pub struct ScopedStore<R: Record> {
    backend: Rc<dyn KeyValueStore>,
    user_id: Option<String>,
    items: Vec<R>,
    loading: bool,
    error: Option<String>,
}

impl<R: Record> ScopedStore<R> {
    /// A store starts out loading and inert until it is told who the user is.
    pub fn new(backend: Rc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            user_id: None,
            items: Vec::new(),
            loading: true,
            error: None,
        }
    }

    #[must_use]
    pub fn storage_key(user_id: &str) -> String {
        format!("{}_{user_id}", R::KEY_PREFIX)
    }

    /// Observe the current user. A new non-empty id triggers a reload; no id
    /// (signed out) empties the collection without touching storage.
    pub fn set_user(&mut self, user_id: Option<&str>) {
        match user_id.filter(|id| !id.is_empty()) {
            None => {
                self.user_id = None;
                self.items.clear();
                self.loading = false;
            }
            Some(id) => {
                if self.user_id.as_deref() == Some(id) && !self.loading {
                    return;
                }
                self.user_id = Some(id.to_string());
                self.reload();
            }
        }
    }

    /// Replace the in-memory collection with what storage holds for the
    /// current user. Never fails: unreadable data loads as empty.
    pub fn reload(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            self.items.clear();
            self.loading = false;
            return;
        };
        self.loading = true;
        self.items = self.read_collection(&user_id);
        self.loading = false;
    }

    fn read_collection(&self, user_id: &str) -> Vec<R> {
        let key = Self::storage_key(user_id);
        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "no stored {}, starting empty", R::PLURAL);
                return Vec::new();
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(key = %key, error = %reason, "failed to load {}", R::PLURAL);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<R>>(&raw) {
            Ok(items) => {
                debug!(key = %key, count = items.len(), "loaded {}", R::PLURAL);
                items
            }
            Err(e) => {
                warn!(key = %key, error = %e, "stored {} are malformed, starting empty", R::PLURAL);
                Vec::new()
            }
        }
    }

    fn persist(&self, user_id: &str) -> anyhow::Result<()> {
        let key = Self::storage_key(user_id);
        let json = serde_json::to_string(&self.items)
            .with_context(|| format!("Failed to serialize {}", R::PLURAL))?;
        self.backend.set(&key, &json)?;
        debug!(key = %key, count = self.items.len(), "persisted {}", R::PLURAL);
        Ok(())
    }

    /// Run one mutation: check the user, apply `change`, persist.
    ///
    /// `change` returns `None` when there was nothing to change; the
    /// collection must be untouched in that case and nothing is written.
    fn mutate<T>(
        &mut self,
        action: &str,
        change: impl FnOnce(&mut Vec<R>) -> Option<T>,
    ) -> Result<Option<T>, StoreError> {
        self.error = None;
        let Some(user_id) = self.user_id.clone() else {
            let err = StoreError::NotAuthenticated;
            self.error = Some(err.to_string());
            return Err(err);
        };

        let Some(outcome) = change(&mut self.items) else {
            return Ok(None);
        };

        // The in-memory collection keeps the new value even if this fails.
        if let Err(source) = self.persist(&user_id) {
            let reason = format!("{source:#}");
            error!(action, error = %reason, "persist failed");
            let err = StoreError::Persist {
                action: action.to_string(),
                source,
            };
            self.error = Some(err.to_string());
            return Err(err);
        }
        Ok(Some(outcome))
    }

    /// Apply `edit` to the record with `id`. `Ok(false)` if no such record.
    pub(crate) fn modify_one(
        &mut self,
        action: &str,
        id: &str,
        edit: impl FnOnce(&mut R),
    ) -> Result<bool, StoreError> {
        let changed = self.mutate(action, |items| {
            let record = items.iter_mut().find(|r| r.id() == id)?;
            edit(record);
            Some(())
        })?;
        Ok(changed.is_some())
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = new_id();
            if !self.items.iter().any(|r| r.id() == id) {
                return id;
            }
        }
    }

    pub fn add(&mut self, data: R::New) -> Result<R, StoreError> {
        let record = R::create(self.fresh_id(), data);
        let created = record.clone();
        self.mutate(&format!("add {}", R::NOUN), move |items| {
            match R::INSERT {
                InsertPolicy::Prepend => items.insert(0, record),
                InsertPolicy::Append => items.push(record),
            }
            Some(())
        })?;
        Ok(created)
    }

    /// Shallow-merge `patch` into the record with `id`. Unknown ids are a
    /// no-op and return `Ok(false)`.
    pub fn update(&mut self, id: &str, patch: R::Patch) -> Result<bool, StoreError> {
        self.modify_one(&format!("update {}", R::NOUN), id, |record| {
            record.apply(patch);
        })
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self.mutate(&format!("remove {}", R::NOUN), |items| {
            let pos = items.iter().position(|r| r.id() == id)?;
            Some(items.remove(pos))
        })?;
        Ok(removed.is_some())
    }

    /// Empty the collection and persist the empty array.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.mutate(&format!("clear {}", R::PLURAL), |items| {
            items.clear();
            Some(())
        })?;
        Ok(())
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn items(&self) -> &[R] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

impl<R: Composite> ScopedStore<R> {
    fn fresh_child_id(&self, parent_id: &str) -> String {
        let siblings = self.get(parent_id).map(R::children).unwrap_or_default();
        loop {
            let id = new_id();
            if !siblings.iter().any(|c| R::child_id(c) == id) {
                return id;
            }
        }
    }

    /// Append a child record to a parent's list. `Ok(None)` if the parent
    /// does not exist; nothing is written in that case.
    pub fn add_child(
        &mut self,
        parent_id: &str,
        data: R::NewChild,
    ) -> Result<Option<R::Child>, StoreError> {
        let child = R::create_child(self.fresh_child_id(parent_id), data);
        self.mutate(&format!("add {}", R::CHILD_NOUN), |items| {
            let parent = items.iter_mut().find(|p| p.id() == parent_id)?;
            parent.children_mut().push(child.clone());
            Some(child)
        })
    }

    pub fn remove_child(&mut self, parent_id: &str, child_id: &str) -> Result<bool, StoreError> {
        let removed = self.mutate(&format!("remove {}", R::CHILD_NOUN), |items| {
            let children = items
                .iter_mut()
                .find(|p| p.id() == parent_id)?
                .children_mut();
            let pos = children.iter().position(|c| R::child_id(c) == child_id)?;
            Some(children.remove(pos))
        })?;
        Ok(removed.is_some())
    }

    /// Every child record across all parents, newest first. Records whose
    /// timestamp cannot be parsed go last.
    #[must_use]
    pub fn timeline(&self) -> Vec<TimelineEntry<'_, R>> {
        let mut entries: Vec<TimelineEntry<'_, R>> = self
            .items
            .iter()
            .flat_map(|parent| {
                parent
                    .children()
                    .iter()
                    .map(move |record| TimelineEntry { parent, record })
            })
            .collect();
        entries.sort_by_cached_key(|e| {
            std::cmp::Reverse(parse_timestamp(R::child_timestamp(e.record)))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use anyhow::{Result, bail};

    use super::*;
    use crate::kv::MemoryStore;
    use crate::models::{
        ChatMessage, DietItem, DietItemPatch, Medication, MedicationKind, MessageKind,
        NewChatMessage, NewDietItem, NewMedication, NewMedicationRecord, NewPrescription,
        NewSymptom, NewSymptomRecord, Prescription, Symptom,
    };

    /// Counts storage traffic and can be told to reject writes.
    #[derive(Default)]
    struct FlakyStore {
        entries: RefCell<HashMap<String, String>>,
        reads: Cell<usize>,
        writes: Cell<usize>,
        fail_writes: Cell<bool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.entries.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.get() {
                bail!("disk full");
            }
            self.writes.set(self.writes.get() + 1);
            self.entries
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn diet(name: &str, weight: f64, timestamp: &str) -> NewDietItem {
        NewDietItem {
            name: name.to_string(),
            weight,
            timestamp: Some(timestamp.to_string()),
            image_uri: None,
        }
    }

    fn dose(dosage: &str, timestamp: &str) -> NewMedicationRecord {
        NewMedicationRecord {
            id: None,
            dosage: dosage.to_string(),
            timestamp: Some(timestamp.to_string()),
            image_uri: None,
            notes: None,
        }
    }

    fn diet_store(backend: &Rc<MemoryStore>, user: &str) -> ScopedStore<DietItem> {
        let mut store = ScopedStore::new(backend.clone());
        store.set_user(Some(user));
        store
    }

    fn stored(backend: &MemoryStore, key: &str) -> Option<String> {
        backend.get(key).unwrap()
    }

    fn decoded<R: Record>(backend: &MemoryStore, user: &str) -> Vec<R> {
        let key = ScopedStore::<R>::storage_key(user);
        serde_json::from_str(&stored(backend, &key).unwrap()).unwrap()
    }

    fn reading(severity: u8, timestamp: &str) -> NewSymptomRecord {
        NewSymptomRecord {
            id: None,
            severity,
            timestamp: Some(timestamp.to_string()),
            image_uri: None,
        }
    }

    #[test]
    fn test_new_store_is_loading_until_user_seen() {
        let store: ScopedStore<DietItem> = ScopedStore::new(Rc::new(MemoryStore::new()));
        assert!(store.is_loading());
        assert!(store.user_id().is_none());
    }

    #[test]
    fn test_add_assigns_id_and_persists() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        assert!(!store.is_loading());
        assert!(store.is_empty());

        let apple = store
            .add(diet("Apple", 150.0, "2024-01-01T08:00"))
            .unwrap();
        assert!(!apple.id.is_empty());
        assert_eq!(store.items(), &[apple.clone()]);

        let raw = stored(&backend, "dietEntries_u1").unwrap();
        let decoded: Vec<DietItem> = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, store.items());
        assert_eq!(decoded[0].name, "Apple");
        assert_eq!(decoded[0].timestamp, "2024-01-01T08:00");
    }

    #[test]
    fn test_add_prepends_newest_first() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        let apple = store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        let rice = store.add(diet("Rice", 200.0, "2024-01-01T12:00")).unwrap();

        assert_ne!(apple.id, rice.id);
        let names: Vec<&str> = store.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Rice", "Apple"]);

        assert!(store.remove(&apple.id).unwrap());
        let names: Vec<&str> = store.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Rice"]);
        let decoded: Vec<DietItem> =
            serde_json::from_str(&stored(&backend, "dietEntries_u1").unwrap()).unwrap();
        assert_eq!(decoded, store.items());
    }

    #[test]
    fn test_chat_appends_in_order() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<ChatMessage> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        for text in ["first", "second", "third"] {
            store
                .add(NewChatMessage {
                    kind: MessageKind::Text,
                    content: text.to_string(),
                })
                .unwrap();
        }
        let contents: Vec<&str> = store.items().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert!(stored(&backend, "chatMessages_u1").is_some());
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        let before_items = store.items().to_vec();
        let before_blob = stored(&backend, "dietEntries_u1");

        assert!(!store.remove("missing").unwrap());
        assert_eq!(store.items(), before_items.as_slice());
        assert_eq!(stored(&backend, "dietEntries_u1"), before_blob);
        assert!(store.error().is_none());
    }

    #[test]
    fn test_remove_missing_id_does_not_create_blob() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        assert!(!store.remove("missing").unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_update_merges_only_supplied_fields() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        let apple = store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();

        let changed = store
            .update(
                &apple.id,
                DietItemPatch {
                    weight: Some(175.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(changed);

        let item = store.get(&apple.id).unwrap();
        assert!((item.weight - 175.0).abs() < f64::EPSILON);
        assert_eq!(item.name, "Apple");
        assert_eq!(item.timestamp, "2024-01-01T08:00");
        assert_eq!(item.id, apple.id);
    }

    #[test]
    fn test_update_persists_merged_record() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        let apple = store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        store.add(diet("Rice", 200.0, "2024-01-01T12:00")).unwrap();

        store
            .update(
                &apple.id,
                DietItemPatch {
                    name: Some("Green apple".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let blob: Vec<DietItem> = decoded(&backend, "u1");
        assert_eq!(blob, store.items());
        assert_eq!(blob[1].name, "Green apple");
    }

    #[test]
    fn test_update_persist_failure_keeps_change_in_memory() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let apple = store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        let before_blob = backend.entries.borrow().get("dietEntries_u1").cloned();
        backend.fail_writes.set(true);

        let err = store
            .update(
                &apple.id,
                DietItemPatch {
                    weight: Some(90.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
        assert_eq!(store.error(), Some("Failed to update diet item"));
        assert!((store.get(&apple.id).unwrap().weight - 90.0).abs() < f64::EPSILON);
        assert_eq!(
            backend.entries.borrow().get("dietEntries_u1").cloned(),
            before_blob
        );
    }

    #[test]
    fn test_remove_persist_failure_keeps_removal_in_memory() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let apple = store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        backend.fail_writes.set(true);

        assert!(store.remove(&apple.id).is_err());
        assert_eq!(store.error(), Some("Failed to remove diet item"));
        assert!(store.get(&apple.id).is_none());
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        let before = store.items().to_vec();

        let changed = store
            .update(
                "missing",
                DietItemPatch {
                    name: Some("Pear".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!changed);
        assert_eq!(store.items(), before.as_slice());
    }

    #[test]
    fn test_switching_users_never_mixes_collections() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "alice");
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();

        store.set_user(Some("bob"));
        assert!(store.is_empty());
        store.add(diet("Rice", 200.0, "2024-01-01T12:00")).unwrap();

        store.set_user(Some("alice"));
        let names: Vec<&str> = store.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Apple"]);

        let bob: Vec<DietItem> =
            serde_json::from_str(&stored(&backend, "dietEntries_bob").unwrap()).unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].name, "Rice");
    }

    #[test]
    fn test_same_user_does_not_reload() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        store.set_user(Some("u1"));
        assert_eq!(backend.reads.get(), 1);
    }

    #[test]
    fn test_sign_out_resets_without_storage_access() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        let reads = backend.reads.get();
        let writes = backend.writes.get();

        store.set_user(None);
        assert!(store.is_empty());
        assert!(!store.is_loading());
        assert_eq!(backend.reads.get(), reads);
        assert_eq!(backend.writes.get(), writes);
    }

    #[test]
    fn test_clear_then_reload_is_empty() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(stored(&backend, "dietEntries_u1").as_deref(), Some("[]"));

        let reopened = diet_store(&backend, "u1");
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_mutations_without_user_are_rejected() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(None);

        let err = store
            .add(diet("Apple", 150.0, "2024-01-01T08:00"))
            .unwrap_err();
        assert!(err.is_not_authenticated());
        assert_eq!(store.error(), Some("User not authenticated"));
        assert!(store.update("x", DietItemPatch::default()).is_err());
        assert!(store.remove("x").is_err());
        assert!(store.clear().is_err());

        assert!(store.is_empty());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_persist_failure_keeps_unpersisted_state() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        backend.fail_writes.set(true);

        let err = store
            .add(diet("Apple", 150.0, "2024-01-01T08:00"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
        assert_eq!(store.error(), Some("Failed to add diet item"));
        assert_eq!(store.len(), 1);
        assert!(backend.entries.borrow().is_empty());
    }

    #[test]
    fn test_error_cleared_by_next_attempt_and_clear_error() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<DietItem> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));

        backend.fail_writes.set(true);
        assert!(store.clear().is_err());
        assert_eq!(store.error(), Some("Failed to clear diet items"));
        store.clear_error();
        assert!(store.error().is_none());

        assert!(store.clear().is_err());
        backend.fail_writes.set(false);
        store.clear().unwrap();
        assert!(store.error().is_none());
    }

    #[test]
    fn test_malformed_blob_loads_empty_without_error() {
        let backend = Rc::new(MemoryStore::new());
        backend.set("dietEntries_u1", "{not json").unwrap();
        let store = diet_store(&backend, "u1");
        assert!(store.is_empty());
        assert!(store.error().is_none());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_back_to_back_mutations_both_persist() {
        let backend = Rc::new(MemoryStore::new());
        let mut store = diet_store(&backend, "u1");
        store.add(diet("Apple", 150.0, "2024-01-01T08:00")).unwrap();
        store.add(diet("Rice", 200.0, "2024-01-01T12:00")).unwrap();

        let reopened = diet_store(&backend, "u1");
        assert_eq!(reopened.len(), 2);
    }

    fn aspirin() -> NewMedication {
        NewMedication {
            name: "Aspirin".to_string(),
            kind: MedicationKind::Prescription,
            records: vec![dose("Taken", "2024-01-01T08:00")],
        }
    }

    #[test]
    fn test_add_child_record() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let med = store.add(aspirin()).unwrap();
        assert_eq!(med.records.len(), 1);
        assert!(!med.records[0].id.is_empty());

        let added = store
            .add_child(&med.id, dose("100mg", "2024-01-02T08:00"))
            .unwrap()
            .unwrap();
        let stored_med = store.get(&med.id).unwrap();
        assert_eq!(stored_med.name, "Aspirin");
        assert_eq!(stored_med.records.len(), 2);
        assert_eq!(stored_med.records[1].id, added.id);
        assert_ne!(stored_med.records[0].id, stored_med.records[1].id);

        let decoded: Vec<Medication> =
            serde_json::from_str(&stored(&backend, "medicationEntries_u1").unwrap()).unwrap();
        assert_eq!(decoded, store.items());
    }

    #[test]
    fn test_add_child_persist_failure_keeps_child_in_memory() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let med = store.add(aspirin()).unwrap();
        backend.fail_writes.set(true);

        let err = store
            .add_child(&med.id, dose("100mg", "2024-01-02T08:00"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
        assert_eq!(store.error(), Some("Failed to add medication record"));
        let records = &store.get(&med.id).unwrap().records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].dosage, "100mg");
    }

    #[test]
    fn test_symptom_child_ops_persist() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Symptom> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let headache = store
            .add(NewSymptom {
                name: "Headache".to_string(),
                records: vec![reading(4, "2024-01-01T08:00")],
            })
            .unwrap();

        let added = store
            .add_child(&headache.id, reading(7, "2024-01-01T18:00"))
            .unwrap()
            .unwrap();
        let blob: Vec<Symptom> = decoded(&backend, "u1");
        assert_eq!(blob, store.items());
        assert_eq!(blob[0].records.len(), 2);
        assert_eq!(blob[0].records[1].severity, 7);

        assert!(store.remove_child(&headache.id, &added.id).unwrap());
        let blob: Vec<Symptom> = decoded(&backend, "u1");
        assert_eq!(blob, store.items());
        assert_eq!(blob[0].records.len(), 1);
        assert_eq!(blob[0].records[0].severity, 4);
    }

    #[test]
    fn test_symptom_remove_child_persist_failure() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<Symptom> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let headache = store
            .add(NewSymptom {
                name: "Headache".to_string(),
                records: vec![reading(4, "2024-01-01T08:00")],
            })
            .unwrap();
        let record_id = headache.records[0].id.clone();
        backend.fail_writes.set(true);

        assert!(store.remove_child(&headache.id, &record_id).is_err());
        assert_eq!(store.error(), Some("Failed to remove symptom record"));
        assert!(store.get(&headache.id).unwrap().records.is_empty());
    }

    #[test]
    fn test_archive_persists_and_splits_lists() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Prescription> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let amoxicillin = store
            .add(NewPrescription {
                text: "Amoxicillin 500mg".to_string(),
            })
            .unwrap();
        store
            .add(NewPrescription {
                text: "Ibuprofen 200mg".to_string(),
            })
            .unwrap();

        assert!(store.archive(&amoxicillin.id).unwrap());
        let blob: Vec<Prescription> = decoded(&backend, "u1");
        assert_eq!(blob, store.items());

        let archived = store.archived();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, amoxicillin.id);
        assert!(archived[0].archived_date.is_some());
        assert_eq!(store.active().len(), 1);
        assert!(!store.archive("missing").unwrap());
    }

    #[test]
    fn test_archive_persist_failure_keeps_flag_in_memory() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<Prescription> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let p = store
            .add(NewPrescription {
                text: "Amoxicillin 500mg".to_string(),
            })
            .unwrap();
        backend.fail_writes.set(true);

        assert!(store.archive(&p.id).is_err());
        assert_eq!(store.error(), Some("Failed to archive prescription"));
        assert!(store.get(&p.id).unwrap().is_archived);
    }

    #[test]
    fn test_supplied_child_id_is_kept() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend);
        store.set_user(Some("u1"));
        let mut data = aspirin();
        data.records[0].id = Some("keep-me".to_string());
        data.records.push(dose("50mg", "2024-01-01T20:00"));

        let med = store.add(data).unwrap();
        assert_eq!(med.records[0].id, "keep-me");
        assert!(!med.records[1].id.is_empty());
        assert_ne!(med.records[1].id, "keep-me");
    }

    #[test]
    fn test_child_ops_on_unknown_parent_are_noops() {
        let backend = Rc::new(FlakyStore::default());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        store.add(aspirin()).unwrap();
        let writes = backend.writes.get();
        let before = store.items().to_vec();

        assert!(
            store
                .add_child("missing", dose("100mg", "2024-01-02T08:00"))
                .unwrap()
                .is_none()
        );
        assert!(!store.remove_child("missing", "whatever").unwrap());
        assert_eq!(store.items(), before.as_slice());
        assert_eq!(backend.writes.get(), writes);
    }

    #[test]
    fn test_remove_child_record() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend.clone());
        store.set_user(Some("u1"));
        let med = store.add(aspirin()).unwrap();
        let first = med.records[0].id.clone();

        assert!(store.remove_child(&med.id, &first).unwrap());
        assert!(store.get(&med.id).unwrap().records.is_empty());
        let blob: Vec<Medication> = decoded(&backend, "u1");
        assert_eq!(blob, store.items());
        assert!(!store.remove_child(&med.id, &first).unwrap());
    }

    #[test]
    fn test_timeline_newest_first_across_parents() {
        let backend = Rc::new(MemoryStore::new());
        let mut store: ScopedStore<Medication> = ScopedStore::new(backend);
        store.set_user(Some("u1"));
        let aspirin = store.add(aspirin()).unwrap();
        let vitamin = store
            .add(NewMedication {
                name: "Vitamin D".to_string(),
                kind: MedicationKind::Vitamin,
                records: vec![dose("1000IU", "2024-01-01T09:30:00.000Z")],
            })
            .unwrap();
        store
            .add_child(&aspirin.id, dose("100mg", "2024-01-03T08:00"))
            .unwrap();
        store.add_child(&vitamin.id, dose("?", "garbage")).unwrap();

        let order: Vec<(&str, &str)> = store
            .timeline()
            .iter()
            .map(|e| (e.parent.name.as_str(), e.record.dosage.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                ("Aspirin", "100mg"),
                ("Vitamin D", "1000IU"),
                ("Aspirin", "Taken"),
                ("Vitamin D", "?"),
            ]
        );
    }
}
