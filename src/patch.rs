//! Idempotent behavior overrides on shared host methods
//!
//! The host may re-run plugin setup on layout changes, so installing the
//! same override twice must not double-wrap. Overrides are tracked in an
//! explicit registry of `(slot, key) -> wrapper` rather than by function
//! identity; the composed call chain is rebuilt from the surviving
//! wrappers whenever one is installed or removed.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

/// A callable method slot: JSON in, JSON out
pub type MethodFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Builds a wrapped method from the next method in the chain
pub type WrapperFn = Box<dyn Fn(MethodFn) -> MethodFn + Send + Sync>;

struct Slot {
    original: MethodFn,
    /// Wrappers in installation order, keyed for dedupe; the last
    /// installed wrapper is outermost in the composed chain
    wrappers: Vec<(String, WrapperFn)>,
    composed: MethodFn,
}

impl Slot {
    fn recompose(&mut self) {
        let mut chain = Arc::clone(&self.original);
        for (_, wrapper) in &self.wrappers {
            chain = wrapper(chain);
        }
        self.composed = chain;
    }
}

struct InstallerInner {
    slots: HashMap<String, Slot>,
}

/// Registry of patchable method slots on shared host objects
///
/// Cheap to clone (shared interior). The host defines a slot per method it
/// exposes for patching; plugin code installs wrappers by key.
#[derive(Clone)]
pub struct HookInstaller {
    inner: Arc<RwLock<InstallerInner>>,
}

impl HookInstaller {
    /// Create an installer with no slots
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InstallerInner {
                slots: HashMap::new(),
            })),
        }
    }

    /// Define (or redefine) a method slot with its original behavior
    ///
    /// Redefining replaces the original but keeps installed wrappers.
    pub fn define_slot(&self, slot: &str, original: impl Fn(&Value) -> Value + Send + Sync + 'static) {
        let mut inner = self.inner.write().unwrap();
        let original: MethodFn = Arc::new(original);
        match inner.slots.get_mut(slot) {
            Some(existing) => {
                existing.original = original;
                existing.recompose();
            }
            None => {
                inner.slots.insert(
                    slot.to_string(),
                    Slot {
                        composed: Arc::clone(&original),
                        original,
                        wrappers: Vec::new(),
                    },
                );
            }
        }
    }

    /// Install a wrapper on a slot exactly once per key
    ///
    /// A second call with the same `(slot, key)` is a no-op that leaves
    /// the existing wrapper in place; the returned disposer still refers
    /// to that key. Disposers restore the remaining chain, are safe to
    /// call multiple times, and may run in any order.
    pub fn install_once(
        &self,
        slot: &str,
        key: &str,
        wrapper: impl Fn(MethodFn) -> MethodFn + Send + Sync + 'static,
    ) -> Result<HookDisposer> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .slots
            .get_mut(slot)
            .ok_or_else(|| anyhow!("unknown method slot '{slot}'"))?;

        let already_installed = entry.wrappers.iter().any(|(k, _)| k == key);
        if !already_installed {
            entry.wrappers.push((key.to_string(), Box::new(wrapper)));
            entry.recompose();
            tracing::debug!(slot, key, "Installed method wrapper");
        } else {
            tracing::debug!(slot, key, "Wrapper already installed, skipping");
        }

        Ok(HookDisposer {
            installer: Arc::downgrade(&self.inner),
            slot: slot.to_string(),
            key: key.to_string(),
        })
    }

    /// Invoke the composed chain for a slot
    ///
    /// `None` when the slot was never defined; callers treat that as "no
    /// override point here", not an error.
    pub fn invoke(&self, slot: &str, args: &Value) -> Option<Value> {
        let composed = {
            let inner = self.inner.read().unwrap();
            inner.slots.get(slot).map(|s| Arc::clone(&s.composed))
        };
        composed.map(|f| f(args))
    }

    /// Number of wrappers currently installed on a slot
    pub fn wrapper_count(&self, slot: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .slots
            .get(slot)
            .map(|s| s.wrappers.len())
            .unwrap_or(0)
    }

    /// Remove every wrapper from every slot, restoring originals
    /// (plugin teardown)
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        for slot in inner.slots.values_mut() {
            slot.wrappers.clear();
            slot.recompose();
        }
    }
}

impl Default for HookInstaller {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores a slot's chain by removing one installed wrapper
///
/// Safe to call (or drop) multiple times; removal by key is idempotent.
pub struct HookDisposer {
    installer: Weak<RwLock<InstallerInner>>,
    slot: String,
    key: String,
}

impl HookDisposer {
    /// Remove the wrapper now; later calls are no-ops
    pub fn dispose(&mut self) {
        let Some(installer) = self.installer.upgrade() else {
            return;
        };
        let mut inner = installer.write().unwrap();
        if let Some(slot) = inner.slots.get_mut(&self.slot) {
            let before = slot.wrappers.len();
            slot.wrappers.retain(|(k, _)| k != &self.key);
            if slot.wrappers.len() != before {
                slot.recompose();
                tracing::debug!(slot = %self.slot, key = %self.key, "Removed method wrapper");
            }
        }
        self.installer = Weak::new();
    }
}
