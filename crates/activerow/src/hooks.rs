//! Per-class hook lists.
//!
//! Hooks are the sole wiring between the generic lifecycle and association
//! consistency: the lifecycle fires the reserved destroy tags, and the
//! association engine registers the nullify/cascade callbacks under them.
//! The lifecycle itself knows nothing about associations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use activerow_core::{Result, Value};

/// Fired per id before a row delete.
pub const BEFORE_DESTROY: &str = "before-destroy";
/// Fired per id after a row delete.
pub const AFTER_DESTROY: &str = "after-destroy";
/// Fired before a class drops its table.
pub const BEFORE_SELFDESTRUCT: &str = "before-selfdestruct";
/// Fired after a class drops its table.
pub const AFTER_SELFDESTRUCT: &str = "after-selfdestruct";

/// An owned hook callback. The `Arc` identity doubles as the removal handle.
pub type HookFn = Arc<dyn Fn(&[Value]) -> Result<()> + Send + Sync>;

/// Ordered callback lists keyed by a free-form tag string.
#[derive(Default)]
pub struct Hooks {
    tags: RwLock<HashMap<String, Vec<HookFn>>>,
}

impl Hooks {
    /// Append a callback under `tag`; returns the handle used for removal.
    pub fn add(&self, tag: &str, hook: HookFn) -> HookFn {
        let mut tags = self.tags.write().unwrap_or_else(|e| e.into_inner());
        tags.entry(tag.to_string()).or_default().push(hook.clone());
        hook
    }

    /// Convenience wrapper that boxes a closure and appends it.
    pub fn on<F>(&self, tag: &str, f: F) -> HookFn
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.add(tag, Arc::new(f))
    }

    /// Remove the first callback under `tag` that is pointer-identical to
    /// `handle`. Returns whether anything was removed.
    pub fn remove(&self, tag: &str, handle: &HookFn) -> bool {
        let mut tags = self.tags.write().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = tags.get_mut(tag) {
            if let Some(pos) = list.iter().position(|h| Arc::ptr_eq(h, handle)) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Invoke every callback under `tag` in registration order, passing all
    /// arguments through. The first failure aborts the remainder and
    /// propagates (fail-fast, no partial-failure isolation).
    ///
    /// The list is cloned out of the lock before dispatch so callbacks may
    /// themselves register hooks or re-enter other classes.
    pub fn call(&self, tag: &str, args: &[Value]) -> Result<()> {
        let list: Vec<HookFn> = {
            let tags = self.tags.read().unwrap_or_else(|e| e.into_inner());
            match tags.get(tag) {
                Some(list) => list.clone(),
                None => return Ok(()),
            }
        };
        tracing::debug!(tag, hooks = list.len(), "dispatching hooks");
        for hook in list {
            hook(args)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags = self.tags.read().unwrap_or_else(|e| e.into_inner());
        let mut dbg = f.debug_map();
        for (tag, list) in tags.iter() {
            dbg.entry(tag, &list.len());
        }
        dbg.finish()
    }
}
