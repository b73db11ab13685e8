//! The session: root aggregate of one duel.
//!
//! Owns every subsystem - board, players, entities, card registry, event
//! bus, action queue, presentation handle, RNG - and exposes the player
//! commands (`play_card`, `perform_attack`, `move_entity`, `start_turn`) plus
//! the primitive operations cards compose (`deal_damage`, `heal`,
//! `add_modifier`, ...).
//!
//! ## Sequencing
//!
//! Each operation follows the same shape: emit the `before` event, run the
//! presentation cue, commit the state mutation, emit the `after` event. The
//! cue calls return when the visual completes, so listeners on `after` events
//! always observe committed state. Consequences that must not run inline
//! (death handling) go through the action queue; every player command drains
//! the queue before returning.
//!
//! ## Versioning
//!
//! A monotonic version counter bumps on every mutation. Derived caches (the
//! distance maps) key off it and conservatively recompute after any change.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::board::{Board, Cell, DistanceCache, DistanceMap};
use crate::cards::{Card, CardBlueprint, CardKind, CardRegistry};
use crate::core::config;
use crate::core::entity::{Entity, EntityId, EntitySystem, SerializedEntity};
use crate::core::player::{CardIndex, PlayerId, PlayerSystem};
use crate::core::point::{is_within_cells, Vec3};
use crate::core::rng::GameRng;
use crate::events::{
    event_names, EventBus, EventListener, EventPattern, GameEvent, SubscriptionId,
};
use crate::fx::{animations, AnimationOptions, FxSystem, TokenStep};
use crate::interceptor::{FlagInterceptor, FlagKey, StatInterceptor, StatKey};
use crate::modifier::{Modifier, ModifierContext};
use crate::scheduler::{ActionQueue, ScheduledStep};

/// Failures that indicate corrupt or inconsistent input, not normal game
/// states. Absent-but-expected state (empty cell, unreachable destination,
/// no card selected at play time) resolves to `false`/`None` instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("unknown card blueprint `{0}`")]
    UnknownBlueprint(String),
    #[error("no modifier `{id}` on {entity}")]
    UnknownModifier { entity: EntityId, id: String },
    #[error("{player} has no card at index {index}")]
    UnknownCard { player: PlayerId, index: CardIndex },
    #[error("serialized entity {0} does not resolve to a card")]
    MalformedEntity(u32),
    #[error("{0} is not on the board")]
    OffBoard(Vec3),
    #[error("{0} is occupied")]
    Occupied(Vec3),
    #[error("followup targets do not satisfy the card's targeting")]
    InvalidFollowup,
}

/// One running duel.
pub struct Session {
    registry: CardRegistry,
    board: Board,
    players: PlayerSystem,
    entities: EntitySystem,
    bus: EventBus,
    queue: ActionQueue,
    fx: Box<dyn FxSystem>,
    rng: GameRng,
    distance_cache: DistanceCache,
    version: u64,
    current_player: PlayerId,
    turn: u32,
}

impl Session {
    /// Create a session over a board with a card registry and a presentation
    /// layer. Players are added separately.
    #[must_use]
    pub fn new(registry: CardRegistry, board: Board, fx: Box<dyn FxSystem>, seed: u64) -> Self {
        Self {
            registry,
            board,
            players: PlayerSystem::new(),
            entities: EntitySystem::new(),
            bus: EventBus::new(),
            queue: ActionQueue::new(),
            fx,
            rng: GameRng::new(seed),
            distance_cache: DistanceCache::new(),
            version: 0,
            current_player: PlayerId::new(0),
            turn: 0,
        }
    }

    // === Accessors ===

    /// The board.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The player registry.
    #[must_use]
    pub fn players(&self) -> &PlayerSystem {
        &self.players
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable entity lookup.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// The entity standing at a point, if any.
    #[must_use]
    pub fn get_entity_at(&self, point: Vec3) -> Option<EntityId> {
        self.entities.entity_at(point)
    }

    /// Entities within one cell of a point, excluding one exactly on it.
    #[must_use]
    pub fn get_nearby_entities(&self, point: Vec3) -> Vec<EntityId> {
        self.entities.nearby(point)
    }

    /// The cell at a point, if the board has one.
    #[must_use]
    pub fn get_cell_at(&self, point: Vec3) -> Option<&Cell> {
        self.board.cell_at(point)
    }

    /// Cells reachable in one step from a point.
    #[must_use]
    pub fn get_neighbor_destinations(&self, point: Vec3) -> smallvec::SmallVec<[Vec3; 8]> {
        self.board.neighbor_destinations(point)
    }

    /// The card an entity was summoned from.
    #[must_use]
    pub fn card_of(&self, id: EntityId) -> Option<&Card> {
        let entity = self.entities.get(id)?;
        self.players
            .get_player_by_id(entity.player_id())?
            .card(entity.card_index())
    }

    /// The blueprint behind an entity's card.
    #[must_use]
    pub fn blueprint_of(&self, id: EntityId) -> Option<&CardBlueprint> {
        self.registry.get(&self.card_of(id)?.blueprint_id)
    }

    /// The followup targets chosen when an entity's card was played.
    #[must_use]
    pub fn followup_targets_of(&self, id: EntityId) -> Vec<Vec3> {
        self.card_of(id)
            .map(|c| c.followup_targets.to_vec())
            .unwrap_or_default()
    }

    /// A player's general entity, once summoned.
    #[must_use]
    pub fn general_of(&self, player: PlayerId) -> Option<EntityId> {
        self.players.get_player_by_id(player)?.general
    }

    /// The opposing player's general.
    #[must_use]
    pub fn opponent_general(&self, player: PlayerId) -> Option<EntityId> {
        self.players.opponent_of(player)?.general
    }

    /// The player whose turn it is.
    #[must_use]
    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    /// Completed `start_turn` count.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Mutation counter. Bumps on every state change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    /// The presentation layer.
    pub fn fx_mut(&mut self) -> &mut dyn FxSystem {
        self.fx.as_mut()
    }

    /// The session RNG.
    pub fn rng_mut(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    // === Players and cards ===

    /// Add a player to the duel.
    pub fn add_player(&mut self, name: impl Into<String>) -> PlayerId {
        self.players.add_player(name)
    }

    /// Put a card instance into a player's list.
    pub fn give_card(
        &mut self,
        player: PlayerId,
        blueprint_id: &str,
    ) -> Result<CardIndex, SessionError> {
        if self.registry.get(blueprint_id).is_none() {
            return Err(SessionError::UnknownBlueprint(blueprint_id.to_string()));
        }
        let p = self
            .players
            .get_player_mut(player)
            .ok_or(SessionError::UnknownPlayer(player))?;
        Ok(p.add_card(Card::new(blueprint_id, player)))
    }

    /// Play a card: validate followup targeting, then summon the entity (or
    /// resolve the spell), attach blueprint modifiers, announce creation,
    /// and drain the queue.
    ///
    /// Returns the summoned entity, or `None` for spells.
    pub fn play_card(
        &mut self,
        player: PlayerId,
        card_index: CardIndex,
        position: Vec3,
        targets: &[Vec3],
    ) -> Result<Option<EntityId>, SessionError> {
        let blueprint_id = self
            .players
            .get_player_by_id(player)
            .and_then(|p| p.card(card_index))
            .map(|c| c.blueprint_id.clone())
            .ok_or(SessionError::UnknownCard {
                player,
                index: card_index,
            })?;
        let (kind, followup, factories, on_play) = {
            let bp = self
                .registry
                .get(&blueprint_id)
                .ok_or_else(|| SessionError::UnknownBlueprint(blueprint_id.clone()))?;
            (
                bp.kind,
                bp.followup.clone(),
                bp.modifiers.clone(),
                bp.on_play.clone(),
            )
        };

        match &followup {
            Some(f) => {
                if targets.len() < f.min_targets || targets.len() > f.max_targets {
                    return Err(SessionError::InvalidFollowup);
                }
                for &t in targets {
                    if !(f.is_targetable)(self, position, t) {
                        return Err(SessionError::InvalidFollowup);
                    }
                }
            }
            None => {
                if !targets.is_empty() {
                    return Err(SessionError::InvalidFollowup);
                }
            }
        }
        if let Some(card) = self
            .players
            .get_player_mut(player)
            .and_then(|p| p.card_mut(card_index))
        {
            card.followup_targets = targets.iter().copied().collect();
        }

        debug!(%player, card = %blueprint_id, %position, "play card");

        if kind == CardKind::Spell {
            if let Some(effect) = on_play {
                effect(self, player, targets);
            }
            self.flush();
            return Ok(None);
        }

        let id = self.entities.alloc_id();
        let entity_id = self.create_entity(SerializedEntity {
            id: id.raw(),
            position,
            card_index,
            player_id: player,
            hp: None,
            movements_taken: None,
            attacks_taken: None,
        })?;
        if kind == CardKind::General {
            if let Some(p) = self.players.get_player_mut(player) {
                p.general = Some(entity_id);
            }
        }
        for factory in factories {
            self.add_modifier(entity_id, factory())?;
        }
        self.emit(
            GameEvent::new(event_names::CREATED)
                .with_entity(entity_id)
                .with_player(player)
                .with_point(position),
        );
        self.flush();
        Ok(Some(entity_id))
    }

    // === Entity lifecycle ===

    /// Register an entity from its persisted shape. Does not announce
    /// creation; `play_card` does that for summons, and deserialization
    /// must not re-trigger creation effects.
    pub fn create_entity(
        &mut self,
        serialized: SerializedEntity,
    ) -> Result<EntityId, SessionError> {
        if !self.board.contains(serialized.position) {
            return Err(SessionError::OffBoard(serialized.position));
        }
        if self.entities.entity_at(serialized.position).is_some() {
            return Err(SessionError::Occupied(serialized.position));
        }
        let blueprint_id = self
            .players
            .get_player_by_id(serialized.player_id)
            .and_then(|p| p.card(serialized.card_index))
            .map(|c| c.blueprint_id.clone())
            .ok_or(SessionError::MalformedEntity(serialized.id))?;
        let default_hp = self
            .registry
            .get(&blueprint_id)
            .map(|b| b.max_hp)
            .ok_or(SessionError::UnknownBlueprint(blueprint_id))?;

        let entity = Entity::new(serialized, default_hp, &self.queue);
        let id = entity.id;
        self.entities.insert(entity);
        self.touch();
        Ok(id)
    }

    /// Persisted shape of a live entity.
    pub fn serialize_entity(&self, id: EntityId) -> Result<SerializedEntity, SessionError> {
        self.entities
            .get(id)
            .map(|e| e.serialize(self))
            .ok_or(SessionError::UnknownEntity(id))
    }

    /// Remove an entity: out of the registry first, then the destruction
    /// announcement (dying wishes fire here, with the point of death), then
    /// teardown of its remaining modifiers. Unknown ids are a no-op.
    pub fn destroy(&mut self, id: EntityId) {
        let Some(mut entity) = self.entities.remove(id) else {
            return;
        };
        self.touch();
        let player = entity.player_id();
        let position = entity.position;
        debug!(entity = %id, %position, "destroy");
        if let Some(p) = self.players.get_player_mut(player) {
            if p.general == Some(id) {
                p.general = None;
            }
        }
        self.emit(
            GameEvent::new(event_names::DESTROYED)
                .with_entity(id)
                .with_player(player)
                .with_point(position),
        );
        for mut modifier in entity.modifiers.drain(..) {
            let ctx = ModifierContext {
                entity: id,
                modifier_id: modifier.id.clone(),
                player,
                stacks: modifier.stack_handle(),
            };
            for mixin in &mut modifier.mixins {
                mixin.on_removed(self, &ctx);
            }
        }
    }

    /// Scheduled continuation of a health watcher trip: death animation,
    /// then destruction. The entity may already be gone if something else
    /// destroyed it first.
    pub(crate) fn resolve_death(&mut self, id: EntityId) {
        if self.entities.get(id).is_none() {
            return;
        }
        self.fx
            .play_animation(id, animations::DEATH, AnimationOptions::default());
        self.destroy(id);
    }

    // === Combat ===

    /// Full attack resolution. Returns `false` without side effects when the
    /// attack is illegal.
    pub fn perform_attack(&mut self, attacker: EntityId, target: EntityId) -> bool {
        let legal = match (self.entity(attacker), self.entity(target)) {
            (Some(a), Some(t)) => a.can_attack(t, self),
            _ => false,
        };
        if !legal {
            return false;
        }
        debug!(%attacker, %target, "attack");

        self.emit(
            GameEvent::new(event_names::BEFORE_ATTACK)
                .with_entity(attacker)
                .with_other(Some(target)),
        );

        let power = self.entity(attacker).map_or(0, |e| e.attack(self));
        self.deal_damage(attacker, target, power);

        // Retaliation reads post-damage state: a lethally wounded target is
        // still in the registry (destruction is queued) but its hp is 0, so
        // the retaliation gate fails.
        let retaliates = self.entities.get(attacker).is_some()
            && self
                .entity(target)
                .is_some_and(|t| t.can_retaliate(attacker, self));
        if retaliates {
            let back = self.entity(target).map_or(0, |e| e.attack(self));
            self.deal_damage(target, attacker, back);
        }

        self.emit(
            GameEvent::new(event_names::AFTER_ATTACK)
                .with_entity(attacker)
                .with_other(Some(target)),
        );
        if let Some(a) = self.entities.get_mut(attacker) {
            a.register_attack();
        }
        self.touch();
        self.flush();
        true
    }

    /// One strike: announce, play the attack animation to its impact frame,
    /// resolve the target's `take_damage`, announce completion. Returns the
    /// damage actually applied.
    pub fn deal_damage(&mut self, source: EntityId, target: EntityId, power: i64) -> i64 {
        self.emit(
            GameEvent::new(event_names::BEFORE_DEAL_DAMAGE)
                .with_entity(source)
                .with_other(Some(target))
                .with_amount(power),
        );
        self.fx.play_animation(
            source,
            animations::ATTACK,
            AnimationOptions::until_frame(config::ATTACK_IMPACT_FRAME),
        );
        let dealt = self.take_damage(target, power, Some(source));
        self.emit(
            GameEvent::new(event_names::AFTER_DEAL_DAMAGE)
                .with_entity(source)
                .with_other(Some(target))
                .with_amount(dealt),
        );
        dealt
    }

    /// Apply damage to an entity: fold the raw power through its
    /// `damage_taken` pipeline, announce, show the damage number and the hit
    /// animation, then mutate health. Health mutates only after the hit
    /// animation completes. Returns the folded amount; 0 for unknown ids.
    pub fn take_damage(&mut self, target: EntityId, power: i64, source: Option<EntityId>) -> i64 {
        let Some(final_damage) = self.entity(target).map(|e| e.damage_taken(power, self)) else {
            return 0;
        };
        self.emit(
            GameEvent::new(event_names::BEFORE_TAKE_DAMAGE)
                .with_entity(target)
                .with_other(source)
                .with_amount(final_damage),
        );
        if self.entities.get(target).is_none() {
            return final_damage;
        }

        // No explicit source (spell damage): the opponent general is the
        // implied source for the damage number.
        let indicator_source = source.or_else(|| {
            let owner = self.entity(target).map(Entity::player_id)?;
            self.opponent_general(owner)
        });
        if let Some(src) = indicator_source {
            self.fx.display_damage_indicator(src, target, final_damage);
        }
        self.fx
            .play_animation(target, animations::HIT, AnimationOptions::default());

        let Some((current, max)) = self.entity(target).map(|e| (e.hp(self), e.max_hp(self)))
        else {
            return final_damage;
        };
        if let Some(e) = self.entities.get_mut(target) {
            e.set_hp(current - final_damage, max);
        }
        self.touch();
        self.emit(
            GameEvent::new(event_names::AFTER_TAKE_DAMAGE)
                .with_entity(target)
                .with_other(source)
                .with_amount(final_damage),
        );
        final_damage
    }

    /// Restore health, clamped to current max. Unknown ids are a no-op.
    pub fn heal(&mut self, entity: EntityId, amount: i64) {
        let Some((current, max)) = self.entity(entity).map(|e| (e.hp(self), e.max_hp(self)))
        else {
            return;
        };
        if let Some(e) = self.entities.get_mut(entity) {
            e.set_hp(current + amount, max);
        }
        self.touch();
    }

    // === Movement ===

    /// Walk an entity along a path of single steps. The path excludes the
    /// current position and ends at the destination. Returns `false` without
    /// side effects when the move is illegal.
    pub fn move_entity(&mut self, entity: EntityId, path: &[Vec3]) -> bool {
        let Some(destination) = path.last().copied() else {
            return false;
        };
        let legal = {
            let Some(e) = self.entities.get(entity) else {
                return false;
            };
            let mut from = e.position;
            let mut contiguous = true;
            for &step in path {
                if !self.board.contains(step) || from.chebyshev(step) != 1 {
                    contiguous = false;
                    break;
                }
                from = step;
            }
            contiguous
                && path.iter().all(|&p| self.entities.entity_at(p).is_none())
                && e.can_move(u32::try_from(path.len()).ok(), self)
        };
        if !legal {
            return false;
        }
        debug!(%entity, %destination, "move");

        let handle = self.fx.play_animation_until(entity, animations::RUN);
        let steps: Vec<TokenStep> = path
            .iter()
            .map(|&point| TokenStep {
                point,
                duration: config::MOVE_STEP_DURATION,
            })
            .collect();
        self.fx.move_entity(entity, &steps);
        self.fx.stop_animation(handle);

        self.emit(
            GameEvent::new(event_names::BEFORE_MOVE)
                .with_entity(entity)
                .with_point(destination),
        );
        if let Some(e) = self.entities.get_mut(entity) {
            e.position = destination;
        }
        self.touch();
        self.emit(
            GameEvent::new(event_names::AFTER_MOVE)
                .with_entity(entity)
                .with_point(destination),
        );
        // Counter increments strictly after the after-move broadcast, so
        // listeners re-checking legality see the pre-increment count.
        if let Some(e) = self.entities.get_mut(entity) {
            e.register_move();
        }
        self.flush();
        true
    }

    // === Turns ===

    /// Begin a player's turn: reset their entities' per-turn counters and
    /// announce the turn start.
    pub fn start_turn(&mut self, player: PlayerId) {
        self.current_player = player;
        self.turn += 1;
        self.touch();
        debug!(%player, turn = self.turn, "turn start");
        let ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|e| e.player_id() == player)
            .map(|e| e.id)
            .collect();
        for id in ids {
            if let Some(e) = self.entities.get_mut(id) {
                e.start_turn();
            }
        }
        self.emit(GameEvent::new(event_names::PLAYER_TURN_START).with_player(player));
        self.flush();
    }

    // === Modifiers ===

    /// Attach a modifier. If an equal-id modifier is already attached:
    /// stackable increments its count (no hook), non-stackable runs
    /// `on_reapply` on the existing instance. Otherwise the modifier joins
    /// the list and `on_applied` runs.
    pub fn add_modifier(&mut self, entity: EntityId, modifier: Modifier) -> Result<(), SessionError> {
        let player = self
            .entity(entity)
            .map(Entity::player_id)
            .ok_or(SessionError::UnknownEntity(entity))?;
        self.touch();

        let existing = self
            .entity(entity)
            .and_then(|e| e.get_modifier(&modifier.id))
            .map(|m| (m.stackable, m.stack_handle()));
        if let Some((stackable, stacks)) = existing {
            if stackable {
                stacks.increment();
                return Ok(());
            }
            let ctx = ModifierContext {
                entity,
                modifier_id: modifier.id.clone(),
                player,
                stacks,
            };
            self.run_mixin_hooks(&ctx, |mixin, session, ctx| mixin.on_reapply(session, ctx));
            return Ok(());
        }

        let ctx = ModifierContext {
            entity,
            modifier_id: modifier.id.clone(),
            player,
            stacks: modifier.stack_handle(),
        };
        if let Some(e) = self.entities.get_mut(entity) {
            e.modifiers.push(modifier);
        }
        self.run_mixin_hooks(&ctx, |mixin, session, ctx| mixin.on_applied(session, ctx));
        Ok(())
    }

    /// Detach a modifier. A stackable modifier with more than one stack only
    /// loses a stack (unless `ignore_stacks`); otherwise it leaves the list
    /// first and then its `on_removed` hooks run, so a hook never finds the
    /// modifier still attached.
    ///
    /// Unknown modifier ids are an error: they indicate bookkeeping
    /// corruption, not a normal game state.
    pub fn remove_modifier(
        &mut self,
        entity: EntityId,
        id: &str,
        ignore_stacks: bool,
    ) -> Result<(), SessionError> {
        let (index, player) = {
            let e = self
                .entities
                .get(entity)
                .ok_or(SessionError::UnknownEntity(entity))?;
            let index = e
                .modifiers
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| SessionError::UnknownModifier {
                    entity,
                    id: id.to_string(),
                })?;
            (index, e.player_id())
        };
        self.touch();

        let survives = self
            .entities
            .get(entity)
            .map(|e| &e.modifiers[index])
            .is_some_and(|m| m.stackable && m.stacks() > 1 && !ignore_stacks);
        if survives {
            if let Some(m) = self.entities.get(entity).map(|e| &e.modifiers[index]) {
                m.stack_handle().decrement();
            }
            return Ok(());
        }

        let Some(mut modifier) = self.entities.get_mut(entity).map(|e| e.modifiers.remove(index))
        else {
            return Ok(());
        };
        let ctx = ModifierContext {
            entity,
            modifier_id: modifier.id.clone(),
            player,
            stacks: modifier.stack_handle(),
        };
        for mixin in &mut modifier.mixins {
            mixin.on_removed(self, &ctx);
        }
        Ok(())
    }

    /// Run a hook over a live modifier's mixins. The mixin list is taken out
    /// of the modifier for the duration so hooks can borrow the session
    /// freely, then restored if the modifier is still attached. If a hook
    /// detached the modifier, the removal saw an empty mixin list, so the
    /// orphaned mixins get their `on_removed` teardown here.
    fn run_mixin_hooks(
        &mut self,
        ctx: &ModifierContext,
        hook: impl Fn(&mut dyn crate::modifier::ModifierMixin, &mut Session, &ModifierContext),
    ) {
        let Some(mut mixins) = self
            .entities
            .get_mut(ctx.entity)
            .and_then(|e| e.get_modifier_mut(&ctx.modifier_id))
            .map(|m| std::mem::take(&mut m.mixins))
        else {
            return;
        };
        for mixin in &mut mixins {
            hook(mixin.as_mut(), self, ctx);
        }
        if let Some(m) = self
            .entities
            .get_mut(ctx.entity)
            .and_then(|e| e.get_modifier_mut(&ctx.modifier_id))
        {
            m.mixins = mixins;
        } else {
            for mixin in &mut mixins {
                mixin.on_removed(self, ctx);
            }
        }
    }

    // === Interceptor registration ===

    /// Register a numeric interceptor on an entity's pipeline. Unknown ids
    /// are a no-op.
    pub fn add_stat_interceptor(
        &mut self,
        entity: EntityId,
        key: StatKey,
        func: StatInterceptor,
        priority: i32,
    ) {
        if let Some(e) = self.entities.get_mut(entity) {
            e.add_stat_interceptor(key, func, priority);
        }
        self.touch();
    }

    /// Deregister a numeric interceptor by identity.
    pub fn remove_stat_interceptor(
        &mut self,
        entity: EntityId,
        key: StatKey,
        func: &StatInterceptor,
    ) -> bool {
        let removed = self
            .entities
            .get_mut(entity)
            .is_some_and(|e| e.remove_stat_interceptor(key, func));
        self.touch();
        removed
    }

    /// Register a permission interceptor on an entity's pipeline.
    pub fn add_flag_interceptor(
        &mut self,
        entity: EntityId,
        key: FlagKey,
        func: FlagInterceptor,
        priority: i32,
    ) {
        if let Some(e) = self.entities.get_mut(entity) {
            e.add_flag_interceptor(key, func, priority);
        }
        self.touch();
    }

    /// Deregister a permission interceptor by identity.
    pub fn remove_flag_interceptor(
        &mut self,
        entity: EntityId,
        key: FlagKey,
        func: &FlagInterceptor,
    ) -> bool {
        let removed = self
            .entities
            .get_mut(entity)
            .is_some_and(|e| e.remove_flag_interceptor(key, func));
        self.touch();
        removed
    }

    // === Events ===

    /// Register a bus listener.
    pub fn subscribe(&mut self, pattern: EventPattern, listener: EventListener) -> SubscriptionId {
        self.bus.subscribe(pattern, listener)
    }

    /// Remove a bus subscription. Returns `true` if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Broadcast an event. Listeners are snapshotted before any runs, so a
    /// listener may mutate subscriptions, modifiers, or entities freely.
    pub fn emit(&mut self, event: GameEvent) {
        self.touch();
        trace!(name = %event.name, "emit");
        let listeners = self.bus.matching(&event.name);
        for listener in listeners {
            listener(self, &event);
        }
    }

    // === Scheduling ===

    /// Defer a step to the end of the current player command.
    pub fn schedule(&self, step: ScheduledStep) {
        self.queue.schedule(step);
    }

    /// Drain the action queue in FIFO order. Steps may schedule further
    /// steps; they run in the same drain.
    pub fn flush(&mut self) {
        while let Some(step) = self.queue.pop() {
            step(self);
        }
    }

    // === Pathfinding ===

    /// The movement distance map from an entity's position, cached until the
    /// next session mutation.
    pub fn get_distance_map(&mut self, entity: EntityId) -> Option<Rc<DistanceMap>> {
        let origin = self.entities.get(entity)?.position;
        self.distance_cache.sync(self.version);
        if let Some(map) = self.distance_cache.get(entity) {
            return Some(map);
        }
        let occupied: FxHashSet<Vec3> = self
            .entities
            .iter()
            .filter(|e| e.id != entity)
            .map(|e| e.position)
            .collect();
        let map = Rc::new(DistanceMap::compute(&self.board, origin, move |p| {
            occupied.contains(&p)
        }));
        self.distance_cache.insert(entity, map.clone());
        Some(map)
    }

    /// A concrete path for an entity to a destination, or `None` when
    /// unreachable.
    pub fn get_path_to(&mut self, entity: EntityId, destination: Vec3) -> Option<Vec<Vec3>> {
        self.get_distance_map(entity)?.path_to(destination)
    }

    /// Could this entity hit a point this turn, either from where it stands
    /// or after a legal move?
    pub fn can_reach_and_attack(&mut self, attacker: EntityId, target: Vec3) -> bool {
        let Some((position, reach, may_move)) = self.entity(attacker).map(|e| {
            (
                e.position,
                e.reach(self),
                e.movements_taken() < config::MAX_MOVEMENTS_PER_TURN,
            )
        }) else {
            return false;
        };
        if is_within_cells(position, target, config::MELEE_RANGE) {
            return true;
        }
        if !may_move {
            return false;
        }
        let Some(map) = self.get_distance_map(attacker) else {
            return false;
        };
        let reach = u32::try_from(reach.max(0)).unwrap_or(0);
        let reachable = map
            .within_reach(reach)
            .any(|cell| is_within_cells(cell, target, config::MELEE_RANGE));
        reachable
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("players", &self.players.len())
            .field("entities", &self.entities.len())
            .field("turn", &self.turn)
            .field("current_player", &self.current_player)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardBlueprint;
    use crate::fx::NullFx;

    fn test_session() -> Session {
        let mut registry = CardRegistry::new();
        registry.register(CardBlueprint::minion("footman", "Footman", 2, 2, 3));
        let mut session = Session::new(
            registry,
            Board::rectangular(9, 5),
            Box::new(NullFx::new()),
            7,
        );
        session.add_player("Alice");
        session.add_player("Bob");
        session
    }

    fn summon(session: &mut Session, player: PlayerId, at: Vec3) -> EntityId {
        let index = session.give_card(player, "footman").unwrap();
        session
            .play_card(player, index, at, &[])
            .unwrap()
            .expect("minion summons an entity")
    }

    #[test]
    fn test_summon_places_entity() {
        let mut session = test_session();
        let id = summon(&mut session, PlayerId::new(0), Vec3::new(2, 2, 0));

        assert_eq!(session.get_entity_at(Vec3::new(2, 2, 0)), Some(id));
        let entity = session.entity(id).unwrap();
        assert_eq!(entity.hp(&session), 3);
        assert_eq!(entity.attack(&session), 2);
    }

    #[test]
    fn test_summon_onto_occupied_cell_fails() {
        let mut session = test_session();
        summon(&mut session, PlayerId::new(0), Vec3::new(2, 2, 0));

        let index = session.give_card(PlayerId::new(1), "footman").unwrap();
        let result = session.play_card(PlayerId::new(1), index, Vec3::new(2, 2, 0), &[]);
        assert!(matches!(result, Err(SessionError::Occupied(_))));
    }

    #[test]
    fn test_unknown_modifier_removal_is_loud() {
        let mut session = test_session();
        let id = summon(&mut session, PlayerId::new(0), Vec3::new(2, 2, 0));

        let result = session.remove_modifier(id, "never_attached", false);
        assert!(matches!(
            result,
            Err(SessionError::UnknownModifier { .. })
        ));
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let mut session = test_session();
        let before = session.version();
        summon(&mut session, PlayerId::new(0), Vec3::new(2, 2, 0));
        assert!(session.version() > before);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut session = test_session();
        let id = summon(&mut session, PlayerId::new(0), Vec3::new(2, 2, 0));
        session.take_damage(id, 1, None);

        let serialized = session.serialize_entity(id).unwrap();
        assert_eq!(serialized.hp, Some(2));

        session.destroy(id);
        let restored = session.create_entity(serialized).unwrap();
        assert_eq!(session.entity(restored).unwrap().hp(&session), 2);
        assert_eq!(session.entity(restored).unwrap().attack(&session), 2);
    }
}
