//! Modifier lifecycle and mixin tests.
//!
//! Covers stacking semantics, lifecycle hook counts, dying-wish arming,
//! opening gambits with and without targets, turn-limited durations,
//! reentrant removal, and the catalog cards built from these pieces.

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use duelgrid::{
    DyingWishMixin, GameEvent, GameEventMixin, Modifier, ModifierContext, ModifierDuration,
    ModifierMixin, Session, SessionError, StatInterceptorMixin, StatKey, Vec3,
};

use common::{attack_of, hp_of, recorded_duel, summon, summon_with};

#[derive(Clone, Default)]
struct Counters {
    applied: Rc<Cell<u32>>,
    reapplied: Rc<Cell<u32>>,
    removed: Rc<Cell<u32>>,
}

struct CountingMixin(Counters);

impl ModifierMixin for CountingMixin {
    fn on_applied(&mut self, _session: &mut Session, _ctx: &ModifierContext) {
        self.0.applied.set(self.0.applied.get() + 1);
    }

    fn on_reapply(&mut self, _session: &mut Session, _ctx: &ModifierContext) {
        self.0.reapplied.set(self.0.reapplied.get() + 1);
    }

    fn on_removed(&mut self, _session: &mut Session, _ctx: &ModifierContext) {
        self.0.removed.set(self.0.removed.get() + 1);
    }
}

/// Detaches its own modifier from inside `on_applied`.
struct SelfPurgeMixin;

impl ModifierMixin for SelfPurgeMixin {
    fn on_applied(&mut self, session: &mut Session, ctx: &ModifierContext) {
        let _ = session.remove_modifier(ctx.entity, &ctx.modifier_id, true);
    }
}

/// Stacking +2 attack per stack, with hook counters.
fn war_paint(counters: Counters) -> Modifier {
    Modifier::new("war_paint")
        .stackable(true)
        .with_mixin(CountingMixin(counters))
        .with_mixin(StatInterceptorMixin::new(
            StatKey::Attack,
            0,
            ModifierDuration::Forever,
            |ctx| {
                let stacks = ctx.stacks.clone();
                Arc::new(move |attack, _| attack + 2 * i64::from(stacks.get()))
            },
        ))
}

/// Test stackable re-adds: one list entry, two stacks, one `on_applied`.
#[test]
fn test_stackable_modifier() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();

    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();
    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();

    let entity = duel.session.entity(footman).unwrap();
    assert_eq!(entity.modifiers.len(), 1);
    assert_eq!(entity.get_modifier("war_paint").unwrap().stacks(), 2);
    assert_eq!(counters.applied.get(), 1);
    assert_eq!(counters.reapplied.get(), 0);

    // The registered interceptor reads the live stack count
    assert_eq!(attack_of(&duel.session, footman), 2 + 4);
}

/// Test removal of a stacked modifier sheds one stack at a time.
#[test]
fn test_stacked_removal_decrements() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();

    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();
    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();

    duel.session.remove_modifier(footman, "war_paint", false).unwrap();
    let entity = duel.session.entity(footman).unwrap();
    assert!(entity.has_modifier("war_paint"));
    assert_eq!(entity.get_modifier("war_paint").unwrap().stacks(), 1);
    assert_eq!(counters.removed.get(), 0);
    assert_eq!(attack_of(&duel.session, footman), 2 + 2);

    duel.session.remove_modifier(footman, "war_paint", false).unwrap();
    assert!(!duel.session.entity(footman).unwrap().has_modifier("war_paint"));
    assert_eq!(counters.removed.get(), 1);
    assert_eq!(attack_of(&duel.session, footman), 2);
}

/// Test forced removal ignores the stack count.
#[test]
fn test_forced_removal_ignores_stacks() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();

    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();
    duel.session.add_modifier(footman, war_paint(counters.clone())).unwrap();

    duel.session.remove_modifier(footman, "war_paint", true).unwrap();
    assert!(!duel.session.entity(footman).unwrap().has_modifier("war_paint"));
    assert_eq!(counters.removed.get(), 1);
}

/// Test non-stackable re-adds run `on_reapply`, never a second `on_applied`.
#[test]
fn test_non_stackable_reapply() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();
    let badge =
        |c: Counters| Modifier::new("badge").with_mixin(CountingMixin(c));

    duel.session.add_modifier(footman, badge(counters.clone())).unwrap();
    duel.session.add_modifier(footman, badge(counters.clone())).unwrap();
    duel.session.add_modifier(footman, badge(counters.clone())).unwrap();

    assert_eq!(duel.session.entity(footman).unwrap().modifiers.len(), 1);
    assert_eq!(counters.applied.get(), 1);
    assert_eq!(counters.reapplied.get(), 2);
}

/// Test a dying wish fires exactly once under cumulative lethal damage.
#[test]
fn test_dying_wish_fires_once() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));

    let fired = Rc::new(Cell::new(0u32));
    let counter = fired.clone();
    duel.session
        .add_modifier(
            footman,
            Modifier::new("last_words").with_mixin(DyingWishMixin::new(move |_, _, _| {
                counter.set(counter.get() + 1);
            })),
        )
        .unwrap();

    // Two lethal hits in the same tick; destruction resolves on the drain
    duel.session.take_damage(footman, 10, None);
    duel.session.take_damage(footman, 10, None);
    duel.session.flush();

    assert!(duel.session.entity(footman).is_none());
    assert_eq!(fired.get(), 1);
}

/// Test a dying wish that never fires is unsubscribed at removal.
#[test]
fn test_dying_wish_unsubscribed_on_removal() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));

    let fired = Rc::new(Cell::new(0u32));
    let counter = fired.clone();
    duel.session
        .add_modifier(
            footman,
            Modifier::new("last_words").with_mixin(DyingWishMixin::new(move |_, _, _| {
                counter.set(counter.get() + 1);
            })),
        )
        .unwrap();
    duel.session.remove_modifier(footman, "last_words", true).unwrap();

    duel.session.take_damage(footman, 10, None);
    duel.session.flush();

    assert!(duel.session.entity(footman).is_none());
    assert_eq!(fired.get(), 0);
}

/// Test an opening gambit with zero chosen targets is a clean no-op.
#[test]
fn test_opening_gambit_without_targets() {
    let mut duel = recorded_duel();
    let mystic = summon(&mut duel.session, duel.p0, "healing_mystic", Vec3::new(4, 2, 0));
    assert_eq!(hp_of(&duel.session, mystic), 3);
}

/// Test the healing mystic's gambit restores its followup target.
#[test]
fn test_healing_mystic_heals_target() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    duel.session.take_damage(footman, 2, None);
    assert_eq!(hp_of(&duel.session, footman), 1);

    summon_with(
        &mut duel.session,
        duel.p0,
        "healing_mystic",
        Vec3::new(4, 3, 0),
        &[Vec3::new(4, 2, 0)],
    );
    assert_eq!(hp_of(&duel.session, footman), 3);
}

/// Test followup validation rejects illegal targets.
#[test]
fn test_invalid_followup_targets() {
    let mut duel = recorded_duel();
    let index = duel.session.give_card(duel.p0, "healing_mystic").unwrap();

    // Empty cell is not targetable
    let result =
        duel.session
            .play_card(duel.p0, index, Vec3::new(4, 2, 0), &[Vec3::new(6, 4, 0)]);
    assert!(matches!(result, Err(SessionError::InvalidFollowup)));

    // Too many targets
    let result = duel.session.play_card(
        duel.p0,
        index,
        Vec3::new(4, 2, 0),
        &[Vec3::new(0, 2, 0), Vec3::new(8, 2, 0)],
    );
    assert!(matches!(result, Err(SessionError::InvalidFollowup)));
}

/// Test Bloodtear Alchemist pings its target on summon.
#[test]
fn test_bloodtear_alchemist_ping() {
    let mut duel = recorded_duel();
    let squire = summon(&mut duel.session, duel.p1, "squire", Vec3::new(5, 2, 0));

    summon_with(
        &mut duel.session,
        duel.p0,
        "bloodtear_alchemist",
        Vec3::new(4, 2, 0),
        &[Vec3::new(5, 2, 0)],
    );
    assert_eq!(hp_of(&duel.session, squire), 2);
}

/// Test Araki Headhunter stacks +2 attack per friendly gambit summon.
#[test]
fn test_araki_headhunter_stacks() {
    let mut duel = recorded_duel();
    let araki = summon(&mut duel.session, duel.p0, "araki_headhunter", Vec3::new(3, 2, 0));
    assert_eq!(attack_of(&duel.session, araki), 1);

    summon(&mut duel.session, duel.p0, "healing_mystic", Vec3::new(2, 2, 0));
    assert_eq!(attack_of(&duel.session, araki), 3);

    summon_with(
        &mut duel.session,
        duel.p0,
        "bloodtear_alchemist",
        Vec3::new(2, 3, 0),
        &[],
    );
    assert_eq!(attack_of(&duel.session, araki), 5);

    // One buff entry carrying two stacks, not two entries
    let entity = duel.session.entity(araki).unwrap();
    assert_eq!(
        entity.get_modifier("araki_headhunter_buff").unwrap().stacks(),
        2
    );

    // An enemy gambit minion does not trigger it
    summon(&mut duel.session, duel.p1, "healing_mystic", Vec3::new(6, 2, 0));
    assert_eq!(attack_of(&duel.session, araki), 5);

    // A vanilla friendly minion does not either
    summon(&mut duel.session, duel.p0, "footman", Vec3::new(2, 1, 0));
    assert_eq!(attack_of(&duel.session, araki), 5);
}

/// Test Azure Horn Shaman's dying wish buffs nearby friendly minions.
#[test]
fn test_azure_horn_shaman_wish() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let enemy = summon(&mut duel.session, duel.p1, "squire", Vec3::new(5, 3, 0));
    let far_friend = summon(&mut duel.session, duel.p0, "squire", Vec3::new(0, 0, 0));
    let shaman = summon(&mut duel.session, duel.p0, "azure_horn_shaman", Vec3::new(5, 2, 0));

    duel.session.take_damage(shaman, 10, None);
    duel.session.flush();
    assert!(duel.session.entity(shaman).is_none());

    let footman_entity = duel.session.entity(footman).unwrap();
    assert_eq!(footman_entity.max_hp(&duel.session), 7);
    assert_eq!(footman_entity.hp(&duel.session), 7);

    // Enemies and distant friends are untouched
    assert_eq!(duel.session.entity(enemy).unwrap().max_hp(&duel.session), 3);
    assert_eq!(duel.session.entity(far_friend).unwrap().max_hp(&duel.session), 3);
}

/// Test Ephemeral Shroud strips a nearby cell's modifiers.
#[test]
fn test_ephemeral_shroud_dispel() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    duel.session
        .add_modifier(footman, war_paint(Counters::default()))
        .unwrap();
    assert_eq!(attack_of(&duel.session, footman), 4);

    summon_with(
        &mut duel.session,
        duel.p1,
        "ephemeral_shroud",
        Vec3::new(4, 3, 0),
        &[Vec3::new(4, 2, 0)],
    );

    let entity = duel.session.entity(footman).unwrap();
    assert!(entity.modifiers.is_empty());
    assert_eq!(attack_of(&duel.session, footman), 2);
}

/// Test a turn-limited buff expires at its owner's next turn start.
#[test]
fn test_turn_limited_duration() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));

    duel.session
        .add_modifier(
            footman,
            Modifier::new("battle_fury").with_mixin(StatInterceptorMixin::new(
                StatKey::Attack,
                0,
                ModifierDuration::Turns(1),
                |_| Arc::new(|attack, _| attack + 3),
            )),
        )
        .unwrap();
    assert_eq!(attack_of(&duel.session, footman), 5);

    // The opponent's turn start does not tick the countdown
    duel.session.start_turn(duel.p1);
    assert_eq!(attack_of(&duel.session, footman), 5);

    duel.session.start_turn(duel.p0);
    assert_eq!(attack_of(&duel.session, footman), 2);
    assert!(!duel.session.entity(footman).unwrap().has_modifier("battle_fury"));
}

/// Test a bus listener removing modifiers on the entity mid-event.
#[test]
fn test_reentrant_modifier_removal() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();

    duel.session
        .add_modifier(footman, war_paint(counters.clone()))
        .unwrap();
    duel.session
        .add_modifier(
            footman,
            Modifier::new("purge_ward").with_mixin(GameEventMixin::new(
                "ritual:purge",
                |session, _, ctx| {
                    let _ = session.remove_modifier(ctx.entity, "war_paint", true);
                    let _ = session.remove_modifier(ctx.entity, &ctx.modifier_id, true);
                },
            )),
        )
        .unwrap();

    duel.session.emit(GameEvent::new("ritual:purge"));

    let entity = duel.session.entity(footman).unwrap();
    assert!(entity.modifiers.is_empty());
    assert_eq!(counters.removed.get(), 1);
    assert_eq!(attack_of(&duel.session, footman), 2);

    // The purge ward's own subscription is gone; emitting again is inert
    duel.session.emit(GameEvent::new("ritual:purge"));
}

/// Test a mixin detaching its own modifier mid-apply still tears down the
/// mixins applied before it.
#[test]
fn test_self_removal_during_apply_tears_down() {
    let mut duel = recorded_duel();
    let footman = summon(&mut duel.session, duel.p0, "footman", Vec3::new(4, 2, 0));
    let counters = Counters::default();

    duel.session
        .add_modifier(
            footman,
            Modifier::new("flash_ritual")
                .with_mixin(CountingMixin(counters.clone()))
                .with_mixin(StatInterceptorMixin::new(
                    StatKey::Attack,
                    0,
                    ModifierDuration::Forever,
                    |_| Arc::new(|attack, _| attack + 5),
                ))
                .with_mixin(SelfPurgeMixin),
        )
        .unwrap();

    // The modifier is gone and the earlier mixins' work is undone: the stat
    // interceptor deregistered, every mixin saw `on_removed` once.
    assert!(!duel.session.entity(footman).unwrap().has_modifier("flash_ritual"));
    assert_eq!(attack_of(&duel.session, footman), 2);
    assert_eq!(counters.applied.get(), 1);
    assert_eq!(counters.removed.get(), 1);
}
