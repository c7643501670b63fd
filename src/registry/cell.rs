//! A single named configuration entry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::{ConfigError, ConfigResult};
use crate::registry::context::ConfigContext;

/// Which value of a cell to read.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    /// The last merged value.
    Shared,
    /// The value pinned in a context, materialized from the shared value on first read.
    Context(&'a ConfigContext),
}

/// One configuration key and its values.
///
/// The key never changes. The shared value is swapped atomically by merges.
pub struct ValueCell {
    key: String,
    shared: ArcSwapOption<String>,
}

impl ValueCell {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            shared: ArcSwapOption::from(value.map(Arc::new)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the shared value. Pinned context values are not affected.
    pub fn set_shared(&self, value: Option<String>) {
        self.shared.store(value.map(Arc::new));
    }

    pub fn shared(&self) -> Option<String> {
        self.shared.load_full().map(|value| value.as_ref().clone())
    }

    /// Raw value in the given view.
    pub fn value(&self, view: View<'_>) -> Option<String> {
        match view {
            View::Shared => self.shared(),
            View::Context(ctx) => ctx.resolve(&self.key, || self.shared()),
        }
    }

    /// Value with `${key}` placeholders replaced from `interpolate_with`.
    ///
    /// Sources apply in the order supplied, each against the text produced so far, so
    /// a later source fills placeholders an earlier one introduced. Cells that are
    /// empty in the same view are skipped. When two cells share a key the first
    /// non-empty one wins.
    pub fn read(&self, view: View<'_>, interpolate_with: &[Arc<ValueCell>]) -> Option<String> {
        let mut value = self.value(view)?;
        for cell in interpolate_with {
            if let Some(text) = cell.value(view).filter(|text| !text.is_empty()) {
                value = value.replace(&format!("${{{}}}", cell.key()), &text);
            }
        }
        Some(value)
    }

    pub fn is_empty(&self, view: View<'_>) -> bool {
        self.value(view).map_or(true, |value| value.is_empty())
    }

    pub fn to_int(&self, view: View<'_>) -> ConfigResult<i32> {
        self.parse(view, "integer")
    }

    pub fn to_long(&self, view: View<'_>) -> ConfigResult<i64> {
        self.parse(view, "long")
    }

    pub fn to_double(&self, view: View<'_>) -> ConfigResult<f64> {
        self.parse(view, "double")
    }

    /// `true`/`false` in any letter case.
    pub fn to_bool(&self, view: View<'_>) -> ConfigResult<bool> {
        let value = self.value(view);
        match value.as_deref().map(str::trim) {
            Some(text) if text.eq_ignore_ascii_case("true") => Ok(true),
            Some(text) if text.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ConfigError::format(&self.key, value, "boolean")),
        }
    }

    fn parse<T: FromStr>(&self, view: View<'_>, target: &'static str) -> ConfigResult<T> {
        let value = self.value(view);
        value
            .as_deref()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| ConfigError::format(&self.key, value.clone(), target))
    }

    /// Pin `value` for this key in `ctx` without touching the shared value.
    pub fn set_context_value(&self, ctx: &ConfigContext, value: Option<String>) {
        ctx.set(&self.key, value);
    }

    /// Drop the pinned value for this key in `ctx`.
    pub fn clear_context_view(&self, ctx: &ConfigContext) {
        ctx.remove(&self.key);
    }
}

impl fmt::Display for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.load().as_deref() {
            Some(value) => f.write_str(value),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell")
            .field("key", &self.key)
            .field("shared", &self.shared())
            .finish()
    }
}
