use crate::entity::{derive_aliases, EntitySource, EntityUpdate, TrackedEntityState};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One physical entity's record, shared by every alias key
type Record = Arc<RwLock<TrackedEntityState>>;

/// Entity cache maintains the latest known state of every tracked body
///
/// Every alias of an entity maps to the same record, so a single write
/// updates all of them at once and readers always see one complete sample.
/// Entries are never evicted; consumers judge staleness by timestamp.
pub struct EntityCache {
    /// Alias -> shared record
    index: DashMap<String, Record>,

    /// Serializes alias registration (first observation / new alias)
    registration: Mutex<()>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            index: DashMap::new(),
            registration: Mutex::new(()),
        }
    }

    /// Create or overwrite the entry for `name` and its derived aliases
    pub fn upsert(&self, name: &str, update: EntityUpdate) {
        let aliases = derive_aliases(name);
        self.upsert_aliases(name, &aliases, update);
    }

    /// Create or overwrite the entry for `name`, bound under every key in
    /// `aliases` (which should include `name`).
    pub fn upsert_aliases(&self, name: &str, aliases: &[String], update: EntityUpdate) {
        if let Some(record) = self.bound_record(name, aliases) {
            let mut state = record.write();
            let canonical = std::mem::take(&mut state.name);
            *state = update.into_state(canonical);
            return;
        }

        self.register(name, aliases, update);
    }

    /// Record shared by `name` and every alias, if all are already bound to it
    fn bound_record(&self, name: &str, aliases: &[String]) -> Option<Record> {
        let record = self.index.get(name).map(|r| Arc::clone(r.value()))?;
        let all_bound = aliases.iter().all(|alias| {
            self.index
                .get(alias.as_str())
                .map_or(false, |r| Arc::ptr_eq(r.value(), &record))
        });
        all_bound.then_some(record)
    }

    /// Slow path: first observation of the entity or of one of its aliases
    fn register(&self, name: &str, aliases: &[String], update: EntityUpdate) {
        let _guard = self.registration.lock();

        let keys: Vec<&str> = std::iter::once(name)
            .chain(aliases.iter().map(String::as_str))
            .collect();

        let existing = keys
            .iter()
            .find_map(|key| self.index.get(*key).map(|r| Arc::clone(r.value())));

        let record = match existing {
            Some(record) => {
                let mut state = record.write();
                let canonical = std::mem::take(&mut state.name);
                *state = update.into_state(canonical);
                drop(state);
                record
            }
            None => {
                debug!(entity = %name, aliases = ?aliases, "New tracked entity");
                Arc::new(RwLock::new(update.into_state(name.to_string())))
            }
        };

        for key in keys {
            let rebound = self
                .index
                .insert(key.to_string(), Arc::clone(&record))
                .map_or(false, |previous| !Arc::ptr_eq(&previous, &record));
            if rebound {
                debug!(alias = %key, entity = %name, "Alias rebound to another entity");
            }
        }
    }

    /// Latest state for `name` (any alias), or `None` if never observed
    pub fn get(&self, name: &str) -> Option<TrackedEntityState> {
        let record = self.index.get(name).map(|r| Arc::clone(r.value()))?;
        let state = record.read().clone();
        Some(state)
    }

    /// Any valid cached entity, preferring body positions over rigid bodies
    pub fn first_valid(&self) -> Option<TrackedEntityState> {
        let mut fallback = None;
        for state in self.snapshot() {
            if !state.valid {
                continue;
            }
            if state.source != EntitySource::RigidBody {
                return Some(state);
            }
            fallback.get_or_insert(state);
        }
        fallback
    }

    /// One state per physical entity
    pub fn snapshot(&self) -> Vec<TrackedEntityState> {
        self.distinct_records()
            .into_iter()
            .map(|record| record.read().clone())
            .collect()
    }

    /// Every key the cache answers to, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of distinct physical entities
    pub fn len(&self) -> usize {
        self.distinct_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of alias keys (>= `len()`)
    pub fn alias_count(&self) -> usize {
        self.index.len()
    }

    fn distinct_records(&self) -> Vec<Record> {
        let mut seen = HashSet::new();
        self.index
            .iter()
            .filter(|r| seen.insert(Arc::as_ptr(r.value())))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}
