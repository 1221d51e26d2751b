//! Per-request coordination cache (spec §4.3), grounded in the original's
//! `dependencies_repo.py::request_context` — five `ContextVar`s set for the
//! lifetime of one inbound request and reset in a `finally` block. Rust has
//! no implicit-context equivalent, so this is an explicit struct built at the
//! start of a webhook request and torn down via `finish()` (or `Drop`, as a
//! backstop) instead of being threaded through a context variable.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use db::repositories::EntityKind;
use tracing::debug;

pub type ExistsKey = (EntityKind, String);
pub type EntityKey = (EntityKind, i64);

/// The request-scoped DB handle participants share. Kept as a cloneable pool
/// handle rather than a literal `sqlx::Transaction` — Rust transactions
/// borrow their connection and are not `Clone`/`Send`-shareable across the
/// dependency graph the way a Python session object is; callers that need
/// atomicity open their own transaction against this pool at the point of
/// write (see `reconcile`, which writes DB before CRM in one transaction).
pub type Session = sqlx::PgPool;

#[derive(Default)]
struct Caches {
    exists: HashMap<ExistsKey, bool>,
    updated: HashSet<EntityKey>,
    creation_in_progress: HashMap<EntityKey, bool>,
    update_needed: HashSet<EntityKey>,
}

pub struct RequestContext {
    pub session: Session,
    caches: Mutex<Caches>,
}

/// Raised when an `import`/`refresh` walk revisits an entity that is still
/// being created earlier in the same dependency chain (spec §4.3, §8
/// property 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicCall(pub EntityKind, pub i64);

impl RequestContext {
    pub fn new(session: Session) -> Self {
        RequestContext { session, caches: Mutex::new(Caches::default()) }
    }

    /// Returns the cached existence result for `(kind, filter)` if this
    /// request already probed it, memoizing `probe` otherwise (spec §8
    /// property 7: exactly one DB query per distinct filter per request).
    pub async fn exists_cached<F, Fut>(&self, kind: EntityKind, filter: &str, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let key = (kind, filter.to_string());
        if let Some(cached) = self.caches.lock().expect("caches poisoned").exists.get(&key) {
            return *cached;
        }
        let result = probe().await;
        self.caches.lock().expect("caches poisoned").exists.insert(key, result);
        result
    }

    pub fn is_updated(&self, kind: EntityKind, external_id: i64) -> bool {
        self.caches.lock().expect("caches poisoned").updated.contains(&(kind, external_id))
    }

    pub fn mark_updated(&self, kind: EntityKind, external_id: i64) {
        self.caches.lock().expect("caches poisoned").updated.insert((kind, external_id));
    }

    /// Marks `(kind, external_id)` as in-progress, or returns `Err(CyclicCall)`
    /// if it already was — the caller should then substitute a tombstone
    /// default and call `schedule_refresh`.
    pub fn begin_creation(&self, kind: EntityKind, external_id: i64) -> Result<(), CyclicCall> {
        let mut caches = self.caches.lock().expect("caches poisoned");
        let key = (kind, external_id);
        if caches.creation_in_progress.contains_key(&key) {
            return Err(CyclicCall(kind, external_id));
        }
        caches.creation_in_progress.insert(key, true);
        Ok(())
    }

    pub fn end_creation(&self, kind: EntityKind, external_id: i64) {
        self.caches.lock().expect("caches poisoned").creation_in_progress.remove(&(kind, external_id));
    }

    pub fn schedule_refresh(&self, kind: EntityKind, external_id: i64) {
        self.caches.lock().expect("caches poisoned").update_needed.insert((kind, external_id));
    }

    pub fn take_update_needed(&self) -> Vec<EntityKey> {
        self.caches.lock().expect("caches poisoned").update_needed.iter().copied().collect()
    }

    pub fn has_update_needed(&self) -> bool {
        !self.caches.lock().expect("caches poisoned").update_needed.is_empty()
    }

    /// Clears every collection. Safe to call multiple times; call explicitly
    /// at the end of request handling so teardown does not depend on drop
    /// ordering, matching the original's explicit `finally` block.
    pub fn finish(&self) {
        let mut caches = self.caches.lock().expect("caches poisoned");
        debug!(
            exists_entries = caches.exists.len(),
            updated_entries = caches.updated.len(),
            update_needed_entries = caches.update_needed.len(),
            "coordination cache cleared"
        );
        caches.exists.clear();
        caches.updated.clear();
        caches.creation_in_progress.clear();
        caches.update_needed.clear();
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pool that never actually connects — the cache logic under test here
    /// never issues a query against `session`.
    fn ctx() -> RequestContext {
        let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy("postgres://localhost/test").unwrap();
        RequestContext::new(pool)
    }

    #[test]
    fn begin_creation_twice_is_cyclic() {
        let ctx = ctx();
        assert!(ctx.begin_creation(EntityKind::Deal, 1).is_ok());
        let err = ctx.begin_creation(EntityKind::Deal, 1).unwrap_err();
        assert_eq!(err, CyclicCall(EntityKind::Deal, 1));
    }

    #[tokio::test]
    async fn exists_cached_probes_only_once() {
        let ctx = ctx();
        let calls = std::sync::atomic::AtomicU32::new(0);
        for _ in 0..3 {
            ctx.exists_cached(EntityKind::Company, "external_id=7", || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                true
            })
            .await;
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn finish_clears_update_needed() {
        let ctx = ctx();
        ctx.schedule_refresh(EntityKind::Contact, 9);
        assert!(ctx.has_update_needed());
        ctx.finish();
        assert!(!ctx.has_update_needed());
    }
}
