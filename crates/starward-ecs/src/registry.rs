//! The [`Registry`] owns the entity allocator and one sparse store per
//! registered component type.
//!
//! Stores are held behind `RefCell` so that several systems arguments can be
//! borrowed at once (`components` / `components_mut`); aliasing the same
//! store mutably twice is a programmer error and panics like any `RefCell`.
//! Type erasure goes through a small `ErasedStore` trait whose only dynamic
//! capability is erase-at-index, which is what [`kill`](Registry::kill)
//! needs to scrub a dead entity from every store.

use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use crate::entity::{Entity, EntityAllocator};
use crate::sparse::SparseSlots;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Erased store
// ---------------------------------------------------------------------------

/// The one capability every store must expose without its component type:
/// clearing the slot of a killed entity.
trait ErasedStore {
    fn erase(&self, entity: Entity);
    fn clear(&self);
    fn as_any(&self) -> &dyn Any;
}

struct TypedStore<C: 'static> {
    slots: RefCell<SparseSlots<C>>,
}

impl<C: 'static> TypedStore<C> {
    fn new() -> Self {
        Self {
            slots: RefCell::new(SparseSlots::new()),
        }
    }
}

impl<C: 'static> ErasedStore for TypedStore<C> {
    fn erase(&self, entity: Entity) {
        self.slots.borrow_mut().erase(entity.index());
    }

    fn clear(&self) {
        self.slots.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owner of all component stores and the entity lifecycle.
#[derive(Default)]
pub struct Registry {
    allocator: EntityAllocator,
    /// Stores in registration order; `kill` walks this deterministically.
    stores: Vec<Box<dyn ErasedStore>>,
    /// Component type -> index into `stores`.
    index: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- component type registration ----------------------------------------

    /// Register a component type. Idempotent; re-registration keeps the
    /// existing store.
    pub fn register<C: 'static>(&mut self) {
        let type_id = TypeId::of::<C>();
        if self.index.contains_key(&type_id) {
            tracing::debug!(component = type_name::<C>(), "component already registered");
            return;
        }
        self.index.insert(type_id, self.stores.len());
        self.stores.push(Box::new(TypedStore::<C>::new()));
        tracing::debug!(component = type_name::<C>(), "registered component");
    }

    fn store<C: 'static>(&self) -> Result<&TypedStore<C>, EcsError> {
        let slot = self
            .index
            .get(&TypeId::of::<C>())
            .ok_or_else(|| EcsError::ComponentNotRegistered {
                name: type_name::<C>(),
            })?;
        let store = self.stores[*slot]
            .as_any()
            .downcast_ref::<TypedStore<C>>()
            .expect("store type map out of sync with index");
        Ok(store)
    }

    /// Shared borrow of the sparse store for `C`.
    ///
    /// The returned guard is stable for as long as it is held; zipping
    /// borrows slot views from it.
    pub fn components<C: 'static>(&self) -> Result<Ref<'_, SparseSlots<C>>, EcsError> {
        Ok(self.store::<C>()?.slots.borrow())
    }

    /// Exclusive borrow of the sparse store for `C`.
    pub fn components_mut<C: 'static>(&self) -> Result<RefMut<'_, SparseSlots<C>>, EcsError> {
        Ok(self.store::<C>()?.slots.borrow_mut())
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Spawn a fresh entity. Indices are monotonic and never reused within
    /// a match.
    pub fn spawn(&mut self) -> Entity {
        self.allocator.allocate()
    }

    /// Kill an entity: every registered store erases its slot (exactly once,
    /// in registration order), then the index is invalidated.
    pub fn kill(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        for store in &self.stores {
            store.erase(entity);
        }
        self.allocator.deallocate(entity);
        Ok(())
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// All alive entities in ascending index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter_alive()
    }

    /// Kill every entity and drop all component data (match reset).
    pub fn clear(&mut self) {
        for store in &self.stores {
            store.clear();
        }
        self.allocator.clear();
    }

    // -- component access ---------------------------------------------------

    /// Attach a component to an entity, overwriting any prior value.
    pub fn add<C: 'static>(&self, entity: Entity, component: C) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        self.components_mut::<C>()?
            .insert_at(entity.index(), component);
        Ok(())
    }

    /// Build a component in place on an entity.
    pub fn emplace<C: 'static>(
        &self,
        entity: Entity,
        build: impl FnOnce() -> C,
    ) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        self.components_mut::<C>()?
            .emplace_at(entity.index(), build);
        Ok(())
    }

    /// Detach a component. No-op if absent; fails only on unregistered type.
    pub fn remove<C: 'static>(&self, entity: Entity) -> Result<(), EcsError> {
        self.components_mut::<C>()?.erase(entity.index());
        Ok(())
    }

    /// Whether `entity` currently carries a `C`.
    pub fn has<C: 'static>(&self, entity: Entity) -> bool {
        self.components::<C>()
            .map(|slots| slots.contains(entity.index()))
            .unwrap_or(false)
    }

    /// Clone out a component value, if present.
    pub fn get_cloned<C: Clone + 'static>(&self, entity: Entity) -> Option<C> {
        self.components::<C>()
            .ok()
            .and_then(|slots| slots.get(entity.index()).cloned())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.allocator.live_count())
            .field("component_types", &self.stores.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Hp(i32);

    fn setup() -> Registry {
        let mut reg = Registry::new();
        reg.register::<Pos>();
        reg.register::<Hp>();
        reg
    }

    #[test]
    fn spawn_add_get() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Pos { x: 1.0, y: 2.0 }).unwrap();

        assert_eq!(reg.get_cloned::<Pos>(e), Some(Pos { x: 1.0, y: 2.0 }));
        assert!(reg.has::<Pos>(e));
        assert!(!reg.has::<Hp>(e));
    }

    #[test]
    fn add_overwrites() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Hp(10)).unwrap();
        reg.add(e, Hp(20)).unwrap();
        assert_eq!(reg.get_cloned::<Hp>(e), Some(Hp(20)));
    }

    #[test]
    fn add_to_dead_entity_fails() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.kill(e).unwrap();
        assert!(matches!(
            reg.add(e, Hp(1)),
            Err(EcsError::InvalidEntity { .. })
        ));
    }

    #[test]
    fn unregistered_component_fails() {
        let mut reg = setup();
        let e = reg.spawn();
        assert!(matches!(
            reg.add(e, "not registered"),
            Err(EcsError::ComponentNotRegistered { .. })
        ));
        assert!(reg.components::<String>().is_err());
    }

    #[test]
    fn kill_erases_every_store() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Pos { x: 0.0, y: 0.0 }).unwrap();
        reg.add(e, Hp(5)).unwrap();

        reg.kill(e).unwrap();
        assert!(!reg.is_valid(e));
        assert!(!reg.has::<Pos>(e));
        assert!(!reg.has::<Hp>(e));
    }

    #[test]
    fn double_kill_fails_second_time() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.kill(e).unwrap();
        assert!(matches!(
            reg.kill(e),
            Err(EcsError::InvalidEntity { .. })
        ));
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.remove::<Hp>(e).unwrap();
        assert!(!reg.has::<Hp>(e));
    }

    #[test]
    fn register_is_idempotent() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Hp(3)).unwrap();
        reg.register::<Hp>();
        assert_eq!(reg.get_cloned::<Hp>(e), Some(Hp(3)), "store survives");
    }

    #[test]
    fn clear_resets_everything() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Hp(3)).unwrap();
        reg.clear();
        assert_eq!(reg.entity_count(), 0);
        assert!(!reg.is_valid(e));

        let e2 = reg.spawn();
        assert_eq!(e2.index(), 0, "reset restarts the index space");
    }

    #[test]
    fn entities_lists_alive_only() {
        let mut reg = setup();
        let a = reg.spawn();
        let b = reg.spawn();
        let c = reg.spawn();
        reg.kill(b).unwrap();

        let alive: Vec<_> = reg.entities().collect();
        assert_eq!(alive, vec![a, c]);
    }
}
