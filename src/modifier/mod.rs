//! Modifiers: named bundles of behavior attached to entities.
//!
//! A modifier is the unit cards speak in - "Deathwatch", "+2 attack while
//! wounded" - composed from [`ModifierMixin`]s that hook its lifecycle.
//! Mixins do the actual work: registering interceptors, subscribing to bus
//! events, firing one-shot effects.
//!
//! ## Stacking
//!
//! A stackable modifier applied to an entity that already carries it does not
//! attach a second copy; the existing copy's stack count is incremented. The
//! count lives behind a shared [`StackCount`] handle so interceptors built by
//! mixins read the live value on every fold. Removing one application
//! decrements the count; the modifier only detaches when the count reaches
//! zero (or when removal is forced, as dispel does).

mod mixins;

pub use mixins::{
    DyingWishMixin, FlagInterceptorMixin, GameEventMixin, ModifierDuration, OpeningGambitMixin,
    StatInterceptorMixin,
};

use std::cell::Cell;
use std::rc::Rc;

use crate::core::entity::EntityId;
use crate::core::player::PlayerId;
use crate::core::point::Vec3;
use crate::core::session::Session;

/// Modifier identifier. Two modifiers with the same id are the same modifier
/// for stacking purposes.
pub type ModifierId = String;

/// Shared, live stack counter.
///
/// Interceptor closures capture a clone of this handle so a fold always sees
/// the current stack count, not the count at registration time.
#[derive(Clone, Debug)]
pub struct StackCount(Rc<Cell<u32>>);

impl StackCount {
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self(Rc::new(Cell::new(count)))
    }

    /// Current stack count.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub(crate) fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Decrement, saturating at zero. Returns the new count.
    pub(crate) fn decrement(&self) -> u32 {
        let next = self.0.get().saturating_sub(1);
        self.0.set(next);
        next
    }
}

impl Default for StackCount {
    fn default() -> Self {
        Self::new(1)
    }
}

/// What a mixin hook knows about its surroundings.
#[derive(Clone, Debug)]
pub struct ModifierContext {
    /// The entity the modifier is attached to.
    pub entity: EntityId,
    /// The owning modifier's id.
    pub modifier_id: ModifierId,
    /// The player owning the entity.
    pub player: PlayerId,
    /// Live handle to the modifier's stack count.
    pub stacks: StackCount,
}

/// Lifecycle hooks of a modifier component.
///
/// All hooks default to no-ops; a mixin implements the ones it cares about.
pub trait ModifierMixin {
    /// The modifier was attached to an entity.
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let _ = (session, ctx);
    }

    /// A non-stackable modifier was applied again while already attached.
    fn on_reapply(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let _ = (session, ctx);
    }

    /// The modifier was detached (removal, dispel, or entity destruction).
    fn on_removed(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let _ = (session, ctx);
    }
}

/// A named bundle of mixins attached to an entity.
pub struct Modifier {
    pub id: ModifierId,
    pub stackable: bool,
    stacks: StackCount,
    pub(crate) mixins: Vec<Box<dyn ModifierMixin>>,
}

impl Modifier {
    /// Start building a modifier with the given id.
    pub fn new(id: impl Into<ModifierId>) -> Self {
        Self {
            id: id.into(),
            stackable: false,
            stacks: StackCount::new(1),
            mixins: Vec::new(),
        }
    }

    /// Mark the modifier stackable.
    #[must_use]
    pub fn stackable(mut self, stackable: bool) -> Self {
        self.stackable = stackable;
        self
    }

    /// Attach a mixin.
    #[must_use]
    pub fn with_mixin(mut self, mixin: impl ModifierMixin + 'static) -> Self {
        self.mixins.push(Box::new(mixin));
        self
    }

    /// Current stack count.
    #[must_use]
    pub fn stacks(&self) -> u32 {
        self.stacks.get()
    }

    /// Live handle to the stack count.
    #[must_use]
    pub fn stack_handle(&self) -> StackCount {
        self.stacks.clone()
    }
}

impl std::fmt::Debug for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modifier")
            .field("id", &self.id)
            .field("stackable", &self.stackable)
            .field("stacks", &self.stacks.get())
            .field("mixins", &self.mixins.len())
            .finish()
    }
}

/// Strip every modifier from the entity standing at `point`.
///
/// Removal is forced: stack counts are ignored and each modifier detaches
/// wholly, running its `on_removed` hooks (which tear down interceptors and
/// bus subscriptions). An empty cell is a no-op.
pub fn dispel_at(session: &mut Session, point: Vec3) {
    let Some(entity_id) = session.get_entity_at(point) else {
        return;
    };
    let ids: Vec<ModifierId> = session
        .entity(entity_id)
        .map(|e| e.modifiers.iter().map(|m| m.id.clone()).collect())
        .unwrap_or_default();
    for id in ids {
        // A removal hook may have cascaded into removing another modifier
        // already; missing ids are fine here.
        let _ = session.remove_modifier(entity_id, &id, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_count_is_shared() {
        let modifier = Modifier::new("test_buff").stackable(true);
        let handle = modifier.stack_handle();

        assert_eq!(modifier.stacks(), 1);
        handle.increment();
        assert_eq!(modifier.stacks(), 2);
        assert_eq!(handle.decrement(), 1);
        assert_eq!(modifier.stacks(), 1);
    }

    #[test]
    fn test_decrement_saturates() {
        let stacks = StackCount::new(0);
        assert_eq!(stacks.decrement(), 0);
    }

    #[test]
    fn test_builder() {
        struct Noop;
        impl ModifierMixin for Noop {}

        let modifier = Modifier::new("glow").with_mixin(Noop).with_mixin(Noop);
        assert_eq!(modifier.id, "glow");
        assert!(!modifier.stackable);
        assert_eq!(modifier.mixins.len(), 2);
    }
}
