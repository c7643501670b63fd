//! Per unit-of-work views over the registry.
//!
//! A [`ConfigContext`] pins the values one request or job sees. The first read of a
//! key copies the current shared value into the context; later merges do not touch
//! that copy until the context is cleared.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use uuid::Uuid;

pub(crate) struct ContextState {
    id: Uuid,
    values: DashMap<String, Option<String>>,
}

impl ContextState {
    pub(crate) fn clear(&self) {
        self.values.clear();
    }
}

/// A handle to one context. Clones share the same view.
#[derive(Clone)]
pub struct ConfigContext {
    inner: Arc<ContextState>,
}

impl ConfigContext {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ContextState {
                id: Uuid::new_v4(),
                values: DashMap::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextState> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The pinned value for `key`, materializing it from `shared` on first use.
    pub(crate) fn resolve<F>(&self, key: &str, shared: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(value) = self.inner.values.get(key) {
            return value.clone();
        }
        self.inner
            .values
            .entry(key.to_string())
            .or_insert_with(shared)
            .clone()
    }

    pub(crate) fn set(&self, key: &str, value: Option<String>) {
        self.inner.values.insert(key.to_string(), value);
    }

    pub(crate) fn remove(&self, key: &str) {
        self.inner.values.remove(key);
    }

    /// Whether `key` has been pinned in this context.
    pub fn is_materialized(&self, key: &str) -> bool {
        self.inner.values.contains_key(key)
    }

    /// Number of pinned keys.
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Drop every pinned value; the next read sees the shared value again.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Clear the context when the returned guard is dropped.
    pub fn guard(&self) -> ContextGuard {
        ContextGuard {
            context: self.clone(),
        }
    }
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("id", &self.inner.id)
            .field("pinned", &self.inner.values.len())
            .finish()
    }
}

/// Clears its context on drop.
#[derive(Debug)]
pub struct ContextGuard {
    context: ConfigContext,
}

impl ContextGuard {
    pub fn context(&self) -> &ConfigContext {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_pins_first_value() {
        let ctx = ConfigContext::new();
        assert_eq!(ctx.resolve("a", || Some("1".into())).as_deref(), Some("1"));
        assert_eq!(ctx.resolve("a", || Some("2".into())).as_deref(), Some("1"));
        assert!(ctx.is_materialized("a"));

        ctx.clear();
        assert!(!ctx.is_materialized("a"));
        assert_eq!(ctx.resolve("a", || Some("2".into())).as_deref(), Some("2"));
    }

    #[test]
    fn test_absent_value_is_pinned_too() {
        let ctx = ConfigContext::new();
        assert_eq!(ctx.resolve("missing", || None), None);
        assert_eq!(ctx.resolve("missing", || Some("late".into())), None);
    }

    #[test]
    fn test_guard_clears_on_drop() {
        let ctx = ConfigContext::new();
        {
            let guard = ctx.guard();
            guard.context().set("a", Some("1".into()));
            assert_eq!(ctx.len(), 1);
        }
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_clones_share_view() {
        let ctx = ConfigContext::new();
        let other = ctx.clone();
        ctx.set("a", Some("1".into()));
        assert_eq!(other.resolve("a", || None).as_deref(), Some("1"));
        assert_eq!(ctx.id(), other.id());
        other.remove("a");
        assert!(!ctx.is_materialized("a"));
    }
}
