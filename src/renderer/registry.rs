//! Per-owner component registries.
//!
//! Every rendering owner (a component instance, or the top-level
//! `render` call keyed by container) owns one [`ChildRegistry`] mapping
//! declared keys to live child instances. Each render pass is a
//! generation: `begin_pass` resets the touch set and the positional
//! counter, reconciliation touches every key it claims or inserts, and
//! `end_pass` reaps (disposes) the entries the pass never touched.
//! Unkeyed children fall back to positional identity within the pass.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::component::{ComponentType, Instance};
use crate::dom::Element;

// =============================================================================
// Registry Keys
// =============================================================================

/// Identity of one child within its owner: a declared key, or the
/// position of the unkeyed child in pass order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RegistryKey {
    Named(String),
    Positional(u32),
}

// =============================================================================
// ChildRegistry
// =============================================================================

#[derive(Default)]
pub(crate) struct ChildRegistry {
    entries: HashMap<RegistryKey, Instance>,
    touched: HashSet<RegistryKey>,
    positional: u32,
}

impl ChildRegistry {
    /// Start a new generation.
    pub(crate) fn begin_pass(&mut self) {
        self.touched.clear();
        self.positional = 0;
    }

    /// Resolve the identity for the next component encountered in pass
    /// order. A declared key already used this pass is a template bug:
    /// warn and fall back to positional identity for the duplicate.
    pub(crate) fn key_for(&mut self, declared: Option<&str>) -> RegistryKey {
        match declared {
            Some(name) => {
                let key = RegistryKey::Named(name.to_string());
                if self.touched.contains(&key) {
                    tracing::warn!(
                        key = name,
                        "duplicate component key in one render pass, using positional identity"
                    );
                    self.next_positional()
                } else {
                    key
                }
            }
            None => self.next_positional(),
        }
    }

    fn next_positional(&mut self) -> RegistryKey {
        let key = RegistryKey::Positional(self.positional);
        self.positional += 1;
        key
    }

    /// Claim an existing entry for reuse. A type mismatch under a stable
    /// key disposes the stale entry and reports no match, so the caller
    /// creates a fresh instance.
    pub(crate) fn claim(&mut self, key: &RegistryKey, ty: &ComponentType) -> Option<Instance> {
        match self.entries.get(key) {
            Some(existing) if existing.matches_type(ty) && !existing.is_disposed() => {
                self.touched.insert(key.clone());
                Some(existing.clone())
            }
            Some(_) => {
                if let Some(stale) = self.entries.remove(key) {
                    stale.dispose();
                }
                None
            }
            None => None,
        }
    }

    /// Track a freshly created instance under its key.
    pub(crate) fn insert(&mut self, key: RegistryKey, instance: Instance) {
        self.touched.insert(key.clone());
        self.entries.insert(key, instance);
    }

    /// Drop an entry without disposing it (mount-failure unwinding).
    pub(crate) fn remove(&mut self, key: &RegistryKey) -> Option<Instance> {
        self.touched.remove(key);
        self.entries.remove(key)
    }

    /// Reap every entry the current pass did not touch.
    pub(crate) fn end_pass(&mut self) {
        let reaped: Vec<RegistryKey> = self
            .entries
            .keys()
            .filter(|key| !self.touched.contains(key))
            .cloned()
            .collect();
        for key in reaped {
            if let Some(instance) = self.entries.remove(&key) {
                instance.dispose();
            }
        }
    }

    /// Named-key lookup (the owner's `components.<key>` accessor).
    pub(crate) fn get_named(&self, name: &str) -> Option<Instance> {
        self.entries.get(&RegistryKey::Named(name.to_string())).cloned()
    }

    /// Dispose every entry (owner disposal).
    pub(crate) fn dispose_all(&mut self) {
        for (_, instance) in self.entries.drain() {
            instance.dispose();
        }
        self.touched.clear();
        self.positional = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Top-level owner registries
// =============================================================================

thread_local! {
    /// One registry per render container, keyed by element identity.
    /// The instances inside hold their container alive, so a live entry
    /// can never alias a recycled allocation.
    static CONTAINER_REGISTRIES: RefCell<HashMap<usize, ChildRegistry>> =
        RefCell::new(HashMap::new());
}

/// Take the registry owned by a top-level render container (empty for a
/// container rendered into for the first time).
pub(crate) fn take_container_registry(container: &Element) -> ChildRegistry {
    CONTAINER_REGISTRIES.with(|map| {
        map.borrow_mut()
            .remove(&container.node_id())
            .unwrap_or_default()
    })
}

/// Return a container's registry after the pass.
pub(crate) fn store_container_registry(container: &Element, registry: ChildRegistry) {
    CONTAINER_REGISTRIES.with(|map| {
        map.borrow_mut().insert(container.node_id(), registry);
    });
}

/// Dispose every top-level instance and forget all container registries
/// (for testing).
pub fn reset_render_state() {
    let registries: Vec<ChildRegistry> = CONTAINER_REGISTRIES.with(|map| {
        map.borrow_mut().drain().map(|(_, registry)| registry).collect()
    });
    for mut registry in registries {
        registry.dispose_all();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Behavior, Component, ComponentType};
    use crate::renderer::Config;

    #[derive(Default)]
    struct A;
    impl Behavior for A {}
    impl Component for A {
        const NAME: &'static str = "A";
    }

    #[derive(Default)]
    struct B;
    impl Behavior for B {}
    impl Component for B {
        const NAME: &'static str = "B";
    }

    fn make(ty: &ComponentType) -> Instance {
        Instance::create(ty.clone(), Config::new())
    }

    #[test]
    fn test_positional_keys_count_up_per_pass() {
        let mut registry = ChildRegistry::default();
        registry.begin_pass();
        assert_eq!(registry.key_for(None), RegistryKey::Positional(0));
        assert_eq!(registry.key_for(None), RegistryKey::Positional(1));

        registry.begin_pass();
        assert_eq!(registry.key_for(None), RegistryKey::Positional(0));
    }

    #[test]
    fn test_duplicate_named_key_falls_back_to_positional() {
        let ty = ComponentType::of::<A>();
        let mut registry = ChildRegistry::default();
        registry.begin_pass();

        let first = registry.key_for(Some("child"));
        assert_eq!(first, RegistryKey::Named("child".to_string()));
        registry.insert(first, make(&ty));

        let second = registry.key_for(Some("child"));
        assert_eq!(second, RegistryKey::Positional(0));
    }

    #[test]
    fn test_claim_reuses_matching_type() {
        let ty = ComponentType::of::<A>();
        let mut registry = ChildRegistry::default();

        registry.begin_pass();
        let key = registry.key_for(Some("child"));
        let instance = make(&ty);
        registry.insert(key, instance.clone());
        registry.end_pass();

        registry.begin_pass();
        let key = registry.key_for(Some("child"));
        let claimed = registry.claim(&key, &ty).unwrap();
        assert!(!claimed.is_disposed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_claim_disposes_on_type_mismatch() {
        let a = ComponentType::of::<A>();
        let b = ComponentType::of::<B>();
        let mut registry = ChildRegistry::default();

        registry.begin_pass();
        let key = registry.key_for(Some("child"));
        let instance = make(&a);
        registry.insert(key.clone(), instance.clone());
        registry.end_pass();

        registry.begin_pass();
        assert!(registry.claim(&key, &b).is_none());
        assert!(instance.is_disposed());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_end_pass_reaps_untouched() {
        let ty = ComponentType::of::<A>();
        let mut registry = ChildRegistry::default();

        registry.begin_pass();
        let keep_key = registry.key_for(Some("keep"));
        let drop_key = registry.key_for(Some("drop"));
        let kept = make(&ty);
        let dropped = make(&ty);
        registry.insert(keep_key.clone(), kept.clone());
        registry.insert(drop_key, dropped.clone());
        registry.end_pass();

        registry.begin_pass();
        registry.claim(&keep_key, &ty).unwrap();
        registry.end_pass();

        assert!(!kept.is_disposed());
        assert!(dropped.is_disposed());
        assert_eq!(registry.len(), 1);
        assert!(registry.get_named("keep").is_some());
        assert!(registry.get_named("drop").is_none());
    }

    #[test]
    fn test_dispose_all() {
        let ty = ComponentType::of::<A>();
        let mut registry = ChildRegistry::default();
        registry.begin_pass();
        let key = registry.key_for(None);
        let instance = make(&ty);
        registry.insert(key, instance.clone());

        registry.dispose_all();
        assert!(instance.is_disposed());
        assert_eq!(registry.len(), 0);
    }
}
