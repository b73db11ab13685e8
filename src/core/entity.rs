//! Entities: the simulated actors on the board.
//!
//! An entity owns its position, health, per-turn action counters, attached
//! modifiers, and one interceptor pipeline per derived property. Stats are
//! never cached - every read of `attack`, `max_hp` or `reach` re-folds the
//! pipeline over the card's base value, so interceptor churn is visible on
//! the very next read.
//!
//! Health is the one stored stat. It lives in a [`ReactiveValue`] whose
//! watcher schedules death handling when it crosses zero: destruction is
//! deferred to the action queue, so effects resolving in the same tick still
//! find the entity in the registry.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config;
use crate::core::player::{CardIndex, PlayerId};
use crate::core::point::{is_within_cells, Vec3};
use crate::core::session::Session;
use crate::interceptor::{
    FlagContext, FlagInterceptor, FlagKey, Interceptable, ReactiveValue, StatContext,
    StatInterceptor, StatKey,
};
use crate::modifier::Modifier;
use crate::scheduler::ActionQueue;

/// Unique identifier for an entity within a session.
///
/// Ids are never reused: a "return to play" effect summons a new entity with
/// a fresh id rather than resurrecting the old one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Persisted entity shape.
///
/// Optional fields default from the card blueprint when absent, so an entity
/// can be reconstructed from a fresh card reference plus minimal mutable
/// state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEntity {
    pub id: u32,
    pub position: Vec3,
    pub card_index: CardIndex,
    pub player_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movements_taken: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacks_taken: Option<u32>,
}

/// One pipeline per derived property.
#[derive(Debug, Default)]
pub struct EntityInterceptors {
    pub attack: Interceptable<i64, StatContext>,
    pub max_hp: Interceptable<i64, StatContext>,
    pub reach: Interceptable<i64, StatContext>,
    pub damage_taken: Interceptable<i64, StatContext>,
    pub can_move: Interceptable<bool, FlagContext>,
    pub can_attack: Interceptable<bool, FlagContext>,
    pub can_retaliate: Interceptable<bool, FlagContext>,
    pub can_be_attack_target: Interceptable<bool, FlagContext>,
}

impl EntityInterceptors {
    /// The numeric pipeline for a key.
    pub fn stat_mut(&mut self, key: StatKey) -> &mut Interceptable<i64, StatContext> {
        match key {
            StatKey::Attack => &mut self.attack,
            StatKey::MaxHp => &mut self.max_hp,
            StatKey::Reach => &mut self.reach,
            StatKey::DamageTaken => &mut self.damage_taken,
        }
    }

    /// The permission pipeline for a key.
    pub fn flag_mut(&mut self, key: FlagKey) -> &mut Interceptable<bool, FlagContext> {
        match key {
            FlagKey::CanMove => &mut self.can_move,
            FlagKey::CanAttack => &mut self.can_attack,
            FlagKey::CanRetaliate => &mut self.can_retaliate,
            FlagKey::CanBeAttackTarget => &mut self.can_be_attack_target,
        }
    }
}

/// A unit or general on the board.
pub struct Entity {
    pub id: EntityId,
    pub position: Vec3,
    card_index: CardIndex,
    player_id: PlayerId,
    movements_taken: u32,
    attacks_taken: u32,
    current_hp: ReactiveValue<i64>,
    /// Attached modifiers, insertion order = application order.
    pub modifiers: Vec<Modifier>,
    pub(crate) interceptors: EntityInterceptors,
}

impl Entity {
    /// Build an entity from its persisted shape.
    ///
    /// `default_hp` is the blueprint's max health, used when the serialized
    /// form omits `hp`. The queue handle lets the health watcher schedule
    /// death handling without holding a session borrow.
    pub fn new(options: SerializedEntity, default_hp: i64, queue: &ActionQueue) -> Self {
        let id = EntityId(options.id);
        let death_queue = queue.clone();
        let mut current_hp = ReactiveValue::new(
            default_hp,
            |hp| *hp <= 0,
            move |_| {
                let q = death_queue.clone();
                q.schedule(Box::new(move |session: &mut Session| {
                    session.resolve_death(id);
                }));
            },
        );
        current_hp.lazy_set_initial(options.hp.unwrap_or(default_hp));

        Self {
            id,
            position: options.position,
            card_index: options.card_index,
            player_id: options.player_id,
            movements_taken: options.movements_taken.unwrap_or(0),
            attacks_taken: options.attacks_taken.unwrap_or(0),
            current_hp,
            modifiers: Vec::new(),
            interceptors: EntityInterceptors::default(),
        }
    }

    /// Owning player.
    #[must_use]
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Index of the owning card in the player's card list.
    #[must_use]
    pub fn card_index(&self) -> CardIndex {
        self.card_index
    }

    /// Movements taken this turn.
    #[must_use]
    pub fn movements_taken(&self) -> u32 {
        self.movements_taken
    }

    /// Attacks taken this turn.
    #[must_use]
    pub fn attacks_taken(&self) -> u32 {
        self.attacks_taken
    }

    // === Derived stats ===

    /// Current attack: the card's base value folded through `attack`.
    #[must_use]
    pub fn attack(&self, session: &Session) -> i64 {
        let base = session
            .blueprint_of(self.id)
            .map_or(0, |blueprint| blueprint.attack);
        self.interceptors
            .attack
            .get_value(base, &StatContext::of(self.id))
    }

    /// Current max health: the card's base value folded through `max_hp`.
    ///
    /// Never negative, so the hp clamp below always has a valid range.
    #[must_use]
    pub fn max_hp(&self, session: &Session) -> i64 {
        let base = session
            .blueprint_of(self.id)
            .map_or(0, |blueprint| blueprint.max_hp);
        self.interceptors
            .max_hp
            .get_value(base, &StatContext::of(self.id))
            .max(0)
    }

    /// Current movement reach, folded through `reach`.
    #[must_use]
    pub fn reach(&self, session: &Session) -> i64 {
        self.interceptors
            .reach
            .get_value(config::UNIT_REACH, &StatContext::of(self.id))
    }

    /// Current health, clamped into `[0, max_hp]` on read as well as write
    /// so that a max-health debuff is reflected immediately.
    #[must_use]
    pub fn hp(&self, session: &Session) -> i64 {
        (*self.current_hp.get()).clamp(0, self.max_hp(session))
    }

    /// Clamped health write. `max_hp` is passed in because deriving it needs
    /// a session borrow the caller already holds.
    pub(crate) fn set_hp(&mut self, value: i64, max_hp: i64) {
        self.current_hp.set(value.clamp(0, max_hp.max(0)));
    }

    /// Damage the entity would take from a raw power value, after the
    /// `damage_taken` fold (shields and resistances transform it here).
    #[must_use]
    pub fn damage_taken(&self, amount: i64, session: &Session) -> i64 {
        let _ = session;
        self.interceptors.damage_taken.get_value(
            amount,
            &StatContext {
                entity: self.id,
                other: None,
                amount: Some(amount),
            },
        )
    }

    // === Legality ===

    /// Can this entity move `distance` cells this turn?
    ///
    /// `None` means the destination is unreachable, which always fails.
    #[must_use]
    pub fn can_move(&self, distance: Option<u32>, session: &Session) -> bool {
        let base = match distance {
            Some(d) => {
                i64::from(d) <= self.reach(session)
                    && self.movements_taken < config::MAX_MOVEMENTS_PER_TURN
            }
            None => false,
        };
        self.interceptors
            .can_move
            .get_value(base, &FlagContext::of(self.id))
    }

    /// Adjacency test from the current position, or from a hypothetical one
    /// for move-then-attack legality pre-checks.
    #[must_use]
    pub fn can_attack_at(&self, point: Vec3, simulated_position: Option<Vec3>) -> bool {
        is_within_cells(
            simulated_position.unwrap_or(self.position),
            point,
            config::MELEE_RANGE,
        )
    }

    /// Full attack legality: adjacency, attack counter, enmity, the
    /// attacker's `can_attack` fold, and the target's own say.
    #[must_use]
    pub fn can_attack(&self, target: &Entity, session: &Session) -> bool {
        if !self.can_attack_at(target.position, None) {
            return false;
        }

        let base = self.attacks_taken < config::MAX_ATTACKS_PER_TURN
            && target.player_id != self.player_id;

        self.interceptors
            .can_attack
            .get_value(base, &FlagContext::between(self.id, target.id))
            && target.can_be_attacked(self.id, session)
    }

    /// May `source` retaliate against this entity's attack?
    ///
    /// Seeded with "this entity is still alive": a lethally damaged unit
    /// never strikes back, even though its destruction has only been
    /// scheduled, not yet resolved.
    #[must_use]
    pub fn can_retaliate(&self, source: EntityId, session: &Session) -> bool {
        self.interceptors
            .can_retaliate
            .get_value(self.hp(session) > 0, &FlagContext::between(self.id, source))
    }

    /// May `source` pick this entity as an attack target?
    #[must_use]
    pub fn can_be_attacked(&self, source: EntityId, session: &Session) -> bool {
        let _ = session;
        self.interceptors
            .can_be_attack_target
            .get_value(true, &FlagContext::between(self.id, source))
    }

    /// Is this entity a general?
    #[must_use]
    pub fn is_general(&self, session: &Session) -> bool {
        session
            .blueprint_of(self.id)
            .is_some_and(|b| b.kind == crate::cards::CardKind::General)
    }

    // === Turn bookkeeping ===

    /// Reset per-turn counters. Called exactly once per owning player's turn
    /// start.
    pub(crate) fn start_turn(&mut self) {
        self.movements_taken = 0;
        self.attacks_taken = 0;
    }

    pub(crate) fn register_move(&mut self) {
        self.movements_taken += 1;
    }

    pub(crate) fn register_attack(&mut self) {
        self.attacks_taken += 1;
    }

    // === Interceptor registration ===

    /// Register a numeric interceptor on one of this entity's pipelines.
    pub fn add_stat_interceptor(&mut self, key: StatKey, func: StatInterceptor, priority: i32) {
        self.interceptors.stat_mut(key).add(func, priority);
    }

    /// Deregister a numeric interceptor by identity.
    pub fn remove_stat_interceptor(&mut self, key: StatKey, func: &StatInterceptor) -> bool {
        self.interceptors.stat_mut(key).remove(func)
    }

    /// Register a permission interceptor on one of this entity's pipelines.
    pub fn add_flag_interceptor(&mut self, key: FlagKey, func: FlagInterceptor, priority: i32) {
        self.interceptors.flag_mut(key).add(func, priority);
    }

    /// Deregister a permission interceptor by identity.
    pub fn remove_flag_interceptor(&mut self, key: FlagKey, func: &FlagInterceptor) -> bool {
        self.interceptors.flag_mut(key).remove(func)
    }

    // === Modifiers ===

    /// Find an attached modifier by id.
    #[must_use]
    pub fn get_modifier(&self, id: &str) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.id == id)
    }

    /// Mutable modifier lookup.
    pub fn get_modifier_mut(&mut self, id: &str) -> Option<&mut Modifier> {
        self.modifiers.iter_mut().find(|m| m.id == id)
    }

    /// Is a modifier with this id attached?
    #[must_use]
    pub fn has_modifier(&self, id: &str) -> bool {
        self.get_modifier(id).is_some()
    }

    /// Persisted shape of this entity.
    #[must_use]
    pub fn serialize(&self, session: &Session) -> SerializedEntity {
        SerializedEntity {
            id: self.id.0,
            position: self.position,
            card_index: self.card_index,
            player_id: self.player_id,
            hp: Some(self.hp(session)),
            movements_taken: Some(self.movements_taken),
            attacks_taken: Some(self.attacks_taken),
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("player_id", &self.player_id)
            .field("card_index", &self.card_index)
            .field("hp", self.current_hp.get())
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

/// Registry of live entities.
///
/// Iteration follows insertion order so that area effects resolve
/// deterministically.
#[derive(Debug, Default)]
pub struct EntitySystem {
    entities: FxHashMap<EntityId, Entity>,
    order: Vec<EntityId>,
    next_id: u32,
}

impl EntitySystem {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: FxHashMap::default(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate the next entity id.
    pub fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert an entity. Keeps the id allocator ahead of deserialized ids.
    pub fn insert(&mut self, entity: Entity) {
        if entity.id.0 >= self.next_id {
            self.next_id = entity.id.0 + 1;
        }
        self.order.push(entity.id);
        self.entities.insert(entity.id, entity);
    }

    /// Remove an entity, returning it.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.order.retain(|&e| e != id);
        self.entities.remove(&id)
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable entity lookup.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// The entity standing exactly at a point, if any.
    #[must_use]
    pub fn entity_at(&self, point: Vec3) -> Option<EntityId> {
        self.iter().find(|e| e.position == point).map(|e| e.id)
    }

    /// Entities within one cell of a point, excluding one standing exactly
    /// on it.
    #[must_use]
    pub fn nearby(&self, point: Vec3) -> Vec<EntityId> {
        self.iter()
            .filter(|e| e.position != point && is_within_cells(point, e.position, 1))
            .map(|e| e.id)
            .collect()
    }

    /// Iterate entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// Iterate entity ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.order.iter().copied()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Is the registry empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
