//! Router boundary: the query string is the sole persisted representation of
//! committed filter state across reloads. The wizard only needs to read the
//! current query and issue "replace" navigations; the host shell owns the
//! real history stack.

use std::sync::Mutex;

use crate::query::Query;

pub trait QueryRouter: Send + Sync {
    fn current_query(&self) -> Query;

    /// Replace the current query without pushing a history entry.
    fn replace(&self, query: Query);
}

/// In-memory router used by tests and the demo driver. Counts replaces so
/// idempotence (no redundant navigation) is observable.
#[derive(Default)]
pub struct MemoryRouter {
    inner: Mutex<MemoryRouterState>,
}

#[derive(Default)]
struct MemoryRouterState {
    query: Query,
    replaces: u64,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_count(&self) -> u64 {
        self.inner.lock().expect("router poisoned").replaces
    }

    /// Simulate an external navigation (back/forward) landing on `query`.
    pub fn set_query(&self, query: Query) {
        self.inner.lock().expect("router poisoned").query = query;
    }
}

impl QueryRouter for MemoryRouter {
    fn current_query(&self) -> Query {
        self.inner.lock().expect("router poisoned").query.clone()
    }

    fn replace(&self, query: Query) {
        let mut state = self.inner.lock().expect("router poisoned");
        state.query = query;
        state.replaces += 1;
    }
}
