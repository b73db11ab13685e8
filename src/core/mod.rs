//! Core engine types: coordinates, entities, players, the session, RNG,
//! tuning constants.
//!
//! The session is the root aggregate; everything else in this module is a
//! building block it owns.

pub mod config;
pub mod entity;
pub mod player;
pub mod point;
pub mod rng;
pub mod session;

pub use entity::{Entity, EntityId, EntitySystem, SerializedEntity};
pub use player::{CardIndex, Player, PlayerId, PlayerSystem};
pub use point::{is_within_cells, Vec3};
pub use rng::{GameRng, GameRngState};
pub use session::{Session, SessionError};
