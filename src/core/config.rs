//! Engine tuning constants.
//!
//! Base values that interceptor pipelines transform. Nothing reads these
//! except as the seed of a fold or as a blueprint default, so a card that
//! wants a different value registers an interceptor instead of editing them.

/// Base movement reach of a unit, in grid cells.
pub const UNIT_REACH: i64 = 2;

/// Melee attack radius, in cells (Chebyshev).
pub const MELEE_RANGE: i32 = 1;

/// Movements allowed per turn before interceptors.
pub const MAX_MOVEMENTS_PER_TURN: u32 = 1;

/// Attacks allowed per turn before interceptors.
pub const MAX_ATTACKS_PER_TURN: u32 = 1;

/// Default attack for general cards.
pub const GENERAL_DEFAULT_ATTACK: i64 = 2;

/// Default max health for general cards.
pub const GENERAL_DEFAULT_HP: i64 = 25;

/// Seconds per cell of token translation.
pub const MOVE_STEP_DURATION: f32 = 0.5;

/// Fraction of the attack animation at which the hit lands.
pub const ATTACK_IMPACT_FRAME: f32 = 0.75;
