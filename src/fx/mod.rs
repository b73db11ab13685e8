//! Presentation collaborator contract.
//!
//! The engine never renders anything, but combat is sequenced against
//! presentation timing: damage lands at a specific frame of the attack
//! animation, health mutates only after the hit animation, movement commits
//! after token translation. [`FxSystem`] is that boundary. Calls return when
//! the cue completes (the engine and the presentation layer interleave
//! cooperatively on one thread), and nothing a cue returns may affect
//! gameplay beyond its completion.
//!
//! [`NullFx`] completes everything instantly - the headless default.
//! [`RecordingFx`] additionally logs every call for sequencing assertions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::entity::EntityId;
use crate::core::point::Vec3;

/// Well-known animation cue names.
pub mod animations {
    pub const ATTACK: &str = "attack";
    pub const HIT: &str = "hit";
    pub const DEATH: &str = "death";
    pub const RUN: &str = "run";
}

/// Options for a one-shot animation cue.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnimationOptions {
    /// When set, the call returns at this fraction of the cue's timeline
    /// instead of at its end, letting the next simulation step overlap the
    /// tail of the visual effect.
    pub frame_percentage: Option<f32>,
}

impl AnimationOptions {
    /// Return at the given fraction of the animation timeline.
    #[must_use]
    pub fn until_frame(frame_percentage: f32) -> Self {
        Self {
            frame_percentage: Some(frame_percentage),
        }
    }
}

/// One leg of a token translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TokenStep {
    pub point: Vec3,
    pub duration: f32,
}

/// Handle to a looping cue started by [`FxSystem::play_animation_until`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationHandle(pub u64);

/// The presentation layer as seen from the simulation.
pub trait FxSystem {
    /// Play a one-shot cue; returns when it completes (or at
    /// `frame_percentage` if given).
    fn play_animation(&mut self, entity: EntityId, name: &str, options: AnimationOptions);

    /// Start a looping cue; it plays until [`FxSystem::stop_animation`].
    fn play_animation_until(&mut self, entity: EntityId, name: &str) -> AnimationHandle;

    /// Stop a looping cue.
    fn stop_animation(&mut self, handle: AnimationHandle);

    /// Translate an entity's token along a path; returns when it arrives.
    fn move_entity(&mut self, entity: EntityId, steps: &[TokenStep]);

    /// Fire-and-forget floating damage number.
    fn display_damage_indicator(&mut self, source: EntityId, target: EntityId, amount: i64);
}

/// Presentation layer that completes every cue instantly.
#[derive(Debug, Default)]
pub struct NullFx {
    next_handle: u64,
}

impl NullFx {
    /// Create a new no-op presentation layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FxSystem for NullFx {
    fn play_animation(&mut self, _entity: EntityId, _name: &str, _options: AnimationOptions) {}

    fn play_animation_until(&mut self, _entity: EntityId, _name: &str) -> AnimationHandle {
        self.next_handle += 1;
        AnimationHandle(self.next_handle)
    }

    fn stop_animation(&mut self, _handle: AnimationHandle) {}

    fn move_entity(&mut self, _entity: EntityId, _steps: &[TokenStep]) {}

    fn display_damage_indicator(&mut self, _source: EntityId, _target: EntityId, _amount: i64) {}
}

/// One recorded presentation call.
#[derive(Clone, Debug, PartialEq)]
pub enum FxCall {
    Animation {
        entity: EntityId,
        name: String,
        frame_percentage: Option<f32>,
    },
    LoopStart {
        entity: EntityId,
        name: String,
        handle: AnimationHandle,
    },
    LoopStop {
        handle: AnimationHandle,
    },
    Move {
        entity: EntityId,
        steps: Vec<TokenStep>,
    },
    DamageIndicator {
        source: EntityId,
        target: EntityId,
        amount: i64,
    },
}

/// Shared view of a [`RecordingFx`] call log.
///
/// The session takes ownership of the fx system, so tests keep this handle
/// to inspect the log afterwards.
#[derive(Clone, Debug, Default)]
pub struct FxLog(Rc<RefCell<Vec<FxCall>>>);

impl FxLog {
    /// Snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<FxCall> {
        self.0.borrow().clone()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Is the log empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, call: FxCall) {
        self.0.borrow_mut().push(call);
    }
}

/// Presentation layer that completes instantly and records every call.
#[derive(Debug, Default)]
pub struct RecordingFx {
    log: FxLog,
    next_handle: u64,
}

impl RecordingFx {
    /// Create a recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the call log; clones stay valid after the session takes
    /// ownership of the recorder.
    #[must_use]
    pub fn log(&self) -> FxLog {
        self.log.clone()
    }
}

impl FxSystem for RecordingFx {
    fn play_animation(&mut self, entity: EntityId, name: &str, options: AnimationOptions) {
        self.log.push(FxCall::Animation {
            entity,
            name: name.to_string(),
            frame_percentage: options.frame_percentage,
        });
    }

    fn play_animation_until(&mut self, entity: EntityId, name: &str) -> AnimationHandle {
        self.next_handle += 1;
        let handle = AnimationHandle(self.next_handle);
        self.log.push(FxCall::LoopStart {
            entity,
            name: name.to_string(),
            handle,
        });
        handle
    }

    fn stop_animation(&mut self, handle: AnimationHandle) {
        self.log.push(FxCall::LoopStop { handle });
    }

    fn move_entity(&mut self, entity: EntityId, steps: &[TokenStep]) {
        self.log.push(FxCall::Move {
            entity,
            steps: steps.to_vec(),
        });
    }

    fn display_damage_indicator(&mut self, source: EntityId, target: EntityId, amount: i64) {
        self.log.push(FxCall::DamageIndicator {
            source,
            target,
            amount,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_fx_logs_in_call_order() {
        let mut fx = RecordingFx::new();
        let log = fx.log();

        let handle = fx.play_animation_until(EntityId(1), animations::RUN);
        fx.move_entity(
            EntityId(1),
            &[TokenStep {
                point: Vec3::new(1, 0, 0),
                duration: 0.5,
            }],
        );
        fx.stop_animation(handle);
        fx.play_animation(EntityId(1), animations::HIT, AnimationOptions::default());

        let calls = log.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(calls[0], FxCall::LoopStart { .. }));
        assert!(matches!(calls[1], FxCall::Move { .. }));
        assert!(matches!(calls[2], FxCall::LoopStop { .. }));
        assert!(matches!(calls[3], FxCall::Animation { .. }));
    }

    #[test]
    fn test_null_fx_handles_are_distinct() {
        let mut fx = NullFx::new();
        let a = fx.play_animation_until(EntityId(1), animations::RUN);
        let b = fx.play_animation_until(EntityId(2), animations::RUN);
        assert_ne!(a, b);
    }
}
