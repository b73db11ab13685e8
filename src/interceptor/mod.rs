//! Interceptor pipelines and reactive values.
//!
//! Every derived stat and permission on an entity flows through an
//! [`Interceptable`]: an ordered list of transformation functions folded over
//! a base value. Cards never edit stats in place - they register an
//! interceptor and the next read reflects it.
//!
//! ## Ordering
//!
//! Folds run in priority-ascending order; entries with equal priority run in
//! registration order. Two interceptors on the same pipeline therefore always
//! compose the same way, which keeps the simulation reproducible.
//!
//! [`ReactiveValue`] is the companion primitive for the one stat that is
//! stored rather than derived (current health): a value cell that fires a
//! callback once per crossing into a watched region, decoupling "the value
//! changed" from "the consequence of the value".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::entity::EntityId;

/// A registered transformation over a pipeline value.
pub type InterceptorFn<T, Ctx> = Arc<dyn Fn(T, &Ctx) -> T>;

struct Entry<T, Ctx> {
    priority: i32,
    seq: u64,
    func: InterceptorFn<T, Ctx>,
}

/// An ordered pipeline of transformation functions over a base value.
///
/// An empty pipeline is the identity function. Registration and removal are
/// O(n) in the (small) entry count; folding snapshots the entry list so a
/// function removed mid-fold still participates in the current fold.
pub struct Interceptable<T, Ctx> {
    entries: Vec<Entry<T, Ctx>>,
    next_seq: u64,
}

impl<T, Ctx> Default for Interceptable<T, Ctx> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T: Clone, Ctx> Interceptable<T, Ctx> {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformation at the given priority.
    ///
    /// Lower priorities fold first; equal priorities fold in registration
    /// order.
    pub fn add(&mut self, func: InterceptorFn<T, Ctx>, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;

        // Insert after the last entry with priority <= ours, keeping the
        // entry list permanently sorted by (priority, seq).
        let at = self
            .entries
            .iter()
            .rposition(|e| e.priority <= priority)
            .map_or(0, |i| i + 1);
        self.entries.insert(at, Entry { priority, seq, func });
    }

    /// Deregister a transformation by function identity.
    ///
    /// Returns `true` if an entry was removed. Unknown functions are a no-op:
    /// an absent interceptor behaves as identity.
    pub fn remove(&mut self, func: &InterceptorFn<T, Ctx>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !Arc::ptr_eq(&e.func, func));
        self.entries.len() != before
    }

    /// Fold `base` through every registered transformation.
    #[must_use]
    pub fn get_value(&self, base: T, ctx: &Ctx) -> T {
        // Snapshot so a removal performed by external code while we hold the
        // entry list (e.g. via interior mutability in a context) cannot
        // perturb this fold.
        let snapshot: Vec<InterceptorFn<T, Ctx>> =
            self.entries.iter().map(|e| e.func.clone()).collect();
        snapshot.iter().fold(base, |acc, f| f(acc, ctx))
    }

    /// Number of registered transformations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the pipeline empty (identity)?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T, Ctx> std::fmt::Debug for Interceptable<T, Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptable")
            .field("entries", &self.entries.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

/// Names the numeric pipelines on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKey {
    Attack,
    MaxHp,
    Reach,
    DamageTaken,
}

/// Names the boolean (permission) pipelines on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagKey {
    CanMove,
    CanAttack,
    CanRetaliate,
    CanBeAttackTarget,
}

/// Fold context for numeric pipelines.
///
/// `entity` is the pipeline owner. `other` is the counterpart where one
/// exists (attack target, damage source). `amount` is the raw value for
/// damage folds.
#[derive(Clone, Copy, Debug)]
pub struct StatContext {
    pub entity: EntityId,
    pub other: Option<EntityId>,
    pub amount: Option<i64>,
}

impl StatContext {
    /// Context with only the owning entity.
    #[must_use]
    pub fn of(entity: EntityId) -> Self {
        Self {
            entity,
            other: None,
            amount: None,
        }
    }
}

/// Fold context for permission pipelines.
#[derive(Clone, Copy, Debug)]
pub struct FlagContext {
    pub entity: EntityId,
    pub other: Option<EntityId>,
}

impl FlagContext {
    /// Context with only the owning entity.
    #[must_use]
    pub fn of(entity: EntityId) -> Self {
        Self {
            entity,
            other: None,
        }
    }

    /// Context with a counterpart entity (target or source).
    #[must_use]
    pub fn between(entity: EntityId, other: EntityId) -> Self {
        Self {
            entity,
            other: Some(other),
        }
    }
}

/// A numeric interceptor.
pub type StatInterceptor = InterceptorFn<i64, StatContext>;
/// A permission interceptor.
pub type FlagInterceptor = InterceptorFn<bool, FlagContext>;

/// A stored value that fires a callback when it crosses a watched condition.
///
/// The callback fires once per observed crossing into the watched region,
/// not once per write: writing `0` twice in a row fires once. Leaving the
/// region re-arms the watcher. [`ReactiveValue::lazy_set_initial`] exists so
/// an owner can assign the true starting value after construction without
/// triggering the callback.
pub struct ReactiveValue<T> {
    value: T,
    tripped: bool,
    watch: Box<dyn Fn(&T) -> bool>,
    on_trip: Box<dyn Fn(&T)>,
}

impl<T> ReactiveValue<T> {
    /// Create a value cell watching `watch`, firing `on_trip` on crossings.
    ///
    /// Construction never fires, even if the initial value is already inside
    /// the watched region.
    pub fn new(
        value: T,
        watch: impl Fn(&T) -> bool + 'static,
        on_trip: impl Fn(&T) + 'static,
    ) -> Self {
        let tripped = watch(&value);
        Self {
            value,
            tripped,
            watch: Box::new(watch),
            on_trip: Box::new(on_trip),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Assign the true starting value without firing the callback.
    pub fn lazy_set_initial(&mut self, value: T) {
        self.tripped = (self.watch)(&value);
        self.value = value;
    }

    /// Write a new value, firing the callback if this write crosses into the
    /// watched region.
    pub fn set(&mut self, value: T) {
        let in_region = (self.watch)(&value);
        self.value = value;
        if in_region {
            if !self.tripped {
                self.tripped = true;
                (self.on_trip)(&self.value);
            }
        } else {
            self.tripped = false;
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveValue")
            .field("value", &self.value)
            .field("tripped", &self.tripped)
            .finish()
    }
}
