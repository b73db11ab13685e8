//! # duelgrid
//!
//! A deterministic, turn-based combat engine for tactical card games:
//! entities on a 3-D grid whose stats flow through composable interceptor
//! pipelines, modifiers assembled from behavior mixins, an event bus that
//! tolerates reentrant mutation, and combat/movement resolution sequenced
//! against an abstract presentation layer.
//!
//! ## Design Principles
//!
//! 1. **Derived, never cached**: attack, max health, reach, and every
//!    permission are re-folded through their interceptor pipeline on each
//!    read. Cards change rules by registering interceptors, not by editing
//!    stats.
//!
//! 2. **Composition over hierarchy**: a modifier is a named list of mixins
//!    (opening gambit, dying wish, event trigger, interceptor), not a class
//!    tree.
//!
//! 3. **Explicit sequencing**: consequences that must not run inline go on
//!    a FIFO action queue; presentation synchronization is a synchronous
//!    trait call that returns when the cue completes. Ordering is testable
//!    without a renderer.
//!
//! 4. **Deterministic**: one seeded RNG, stable fold order, insertion-order
//!    iteration. The same command sequence from the same seed replays the
//!    same game.
//!
//! ## Modules
//!
//! - `core`: coordinates, entities, players, the session, RNG, constants
//! - `interceptor`: interceptor pipelines and reactive values
//! - `modifier`: modifier lifecycle and the mixin library
//! - `events`: session-wide event bus
//! - `board`: the playing field and pathfinding
//! - `cards`: card blueprints, instances, and the built-in catalog
//! - `scheduler`: the FIFO action queue
//! - `fx`: the presentation layer contract

pub mod board;
pub mod cards;
pub mod core;
pub mod events;
pub mod fx;
pub mod interceptor;
pub mod modifier;
pub mod scheduler;

// Re-export commonly used types
pub use crate::core::{
    is_within_cells, CardIndex, Entity, EntityId, GameRng, GameRngState, Player, PlayerId,
    Session, SessionError, Vec3,
};

pub use crate::board::{Board, DistanceCache, DistanceMap};

pub use crate::cards::{Card, CardBlueprint, CardKind, CardRegistry, Followup};

pub use crate::events::{
    event_names, EventBus, EventListener, EventPattern, GameEvent, SubscriptionId,
};

pub use crate::fx::{
    animations, AnimationHandle, AnimationOptions, FxCall, FxLog, FxSystem, NullFx, RecordingFx,
    TokenStep,
};

pub use crate::interceptor::{
    FlagContext, FlagInterceptor, FlagKey, Interceptable, InterceptorFn, ReactiveValue,
    StatContext, StatInterceptor, StatKey,
};

pub use crate::modifier::{
    dispel_at, DyingWishMixin, FlagInterceptorMixin, GameEventMixin, Modifier, ModifierContext,
    ModifierDuration, ModifierId, ModifierMixin, OpeningGambitMixin, StackCount,
    StatInterceptorMixin,
};

pub use crate::scheduler::{ActionQueue, ScheduledStep};
