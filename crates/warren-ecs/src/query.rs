//! Cached predicate queries.
//!
//! A query is registered once and addressed through an opaque [`QueryId`]
//! afterwards. The cache stores each query's matching entities as an ordered
//! list and patches that list incrementally whenever the world mutates an
//! entity, so reads never re-evaluate predicates.

use std::fmt;

use crate::entity::{Entity, EntityId};

// ---------------------------------------------------------------------------
// QueryId
// ---------------------------------------------------------------------------

/// Opaque handle for a registered query.
///
/// Handles are only meaningful for the world that issued them. Two
/// registrations are two independent queries even when their predicates
/// behave identically.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// QueryCache
// ---------------------------------------------------------------------------

type Predicate = Box<dyn Fn(&Entity) -> bool>;

struct QueryEntry {
    predicate: Predicate,
    results: Vec<EntityId>,
}

/// All registered queries and their cached result lists.
///
/// Results are kept in append order: entities that matched at registration
/// first, later matches pushed to the back as mutations land.
pub struct QueryCache {
    entries: Vec<QueryEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a predicate and seed its result list from `live`. Each
    /// entity is evaluated exactly once, in the order given.
    pub fn register<'a, P, I>(&mut self, predicate: P, live: I) -> QueryId
    where
        P: Fn(&Entity) -> bool + 'static,
        I: IntoIterator<Item = &'a Entity>,
    {
        let results = live
            .into_iter()
            .filter(|entity| predicate(entity))
            .map(|entity| entity.id())
            .collect();
        let id = QueryId(self.entries.len() as u32);
        self.entries.push(QueryEntry {
            predicate: Box::new(predicate),
            results,
        });
        id
    }

    /// The current result list for `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` was not issued by this cache.
    pub fn results(&self, id: QueryId) -> &[EntityId] {
        match self.entries.get(id.0 as usize) {
            Some(entry) => &entry.results,
            None => panic!("query {id:?} was not issued by this world"),
        }
    }

    /// Re-evaluate every predicate against `entity` and patch the result
    /// lists: the id is appended on a fresh match and removed when a
    /// previous match no longer holds. All other positions are untouched.
    pub fn refresh(&mut self, entity: &Entity) {
        for entry in &mut self.entries {
            let matches = (entry.predicate)(entity);
            let position = entry.results.iter().position(|&id| id == entity.id());
            match (matches, position) {
                (true, None) => entry.results.push(entity.id()),
                (false, Some(at)) => {
                    entry.results.remove(at);
                }
                _ => {}
            }
        }
    }

    /// Drop `id` from every result list. Used when an entity is recycled
    /// and no record is left to evaluate.
    pub fn evict(&mut self, id: EntityId) {
        for entry in &mut self.entries {
            if let Some(at) = entry.results.iter().position(|&e| e == id) {
                entry.results.remove(at);
            }
        }
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("query_count", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
