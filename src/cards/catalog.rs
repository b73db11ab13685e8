//! The built-in card set.
//!
//! A small neutral catalog exercising every behavior seam: opening gambits
//! with and without followup targeting, a stacking trigger, a dying wish, a
//! dispel, a spell. Card-specific modifiers live here next to their cards.

use std::sync::Arc;

use crate::cards::{keywords, CardBlueprint, CardKind, CardRegistry, Followup};
use crate::core::point::is_within_cells;
use crate::events::event_names;
use crate::interceptor::StatKey;
use crate::modifier::{
    dispel_at, DyingWishMixin, GameEventMixin, Modifier, ModifierDuration, OpeningGambitMixin,
    StatInterceptorMixin,
};

/// Register every built-in card.
pub fn register_all(registry: &mut CardRegistry) {
    registry.register(argeon_highmayne());
    registry.register(maehv_skinsolder());
    registry.register(healing_mystic());
    registry.register(bloodtear_alchemist());
    registry.register(araki_headhunter());
    registry.register(azure_horn_shaman());
    registry.register(primus_fist());
    registry.register(ephemeral_shroud());
    registry.register(void_pulse());
}

fn argeon_highmayne() -> CardBlueprint {
    CardBlueprint::general("argeon_highmayne", "Argeon Highmayne")
}

fn maehv_skinsolder() -> CardBlueprint {
    CardBlueprint::general("maehv_skinsolder", "Maehv Skinsolder")
}

fn healing_mystic() -> CardBlueprint {
    CardBlueprint::minion("healing_mystic", "Healing Mystic", 2, 2, 3)
        .describe("Opening Gambit: Restore 2 Health to anything.")
        .with_keyword(keywords::OPENING_GAMBIT)
        .with_followup(Followup::optional(|session, _source, target| {
            session.get_entity_at(target).is_some()
        }))
        .with_modifier(|| {
            Modifier::new("healing_mystic_gambit").with_mixin(OpeningGambitMixin::new(
                |session, ctx| {
                    for target in session.followup_targets_of(ctx.entity) {
                        if let Some(patient) = session.get_entity_at(target) {
                            session.heal(patient, 2);
                        }
                    }
                },
            ))
        })
}

fn bloodtear_alchemist() -> CardBlueprint {
    CardBlueprint::minion("bloodtear_alchemist", "Bloodtear Alchemist", 2, 2, 1)
        .describe("Opening Gambit: Deal 1 damage to another unit.")
        .with_keyword(keywords::OPENING_GAMBIT)
        .with_followup(Followup::optional(|session, _source, target| {
            session.get_entity_at(target).is_some()
        }))
        .with_modifier(|| {
            Modifier::new("bloodtear_alchemist_gambit").with_mixin(OpeningGambitMixin::new(
                |session, ctx| {
                    for target in session.followup_targets_of(ctx.entity) {
                        if let Some(victim) = session.get_entity_at(target) {
                            if victim != ctx.entity {
                                session.deal_damage(ctx.entity, victim, 1);
                            }
                        }
                    }
                },
            ))
        })
}

fn araki_headhunter() -> CardBlueprint {
    CardBlueprint::minion("araki_headhunter", "Araki Headhunter", 2, 1, 3)
        .describe("Whenever you summon a minion with Opening Gambit, gain +2 Attack.")
        .with_modifier(|| {
            Modifier::new("araki_headhunter_trigger").with_mixin(GameEventMixin::new(
                event_names::CREATED,
                |session, event, ctx| {
                    let Some(summoned) = event.entity else {
                        return;
                    };
                    if summoned == ctx.entity {
                        return;
                    }
                    let friendly = session
                        .entity(summoned)
                        .is_some_and(|e| e.player_id() == ctx.player);
                    let has_gambit = session.blueprint_of(summoned).is_some_and(|b| {
                        b.kind == CardKind::Minion && b.has_keyword(keywords::OPENING_GAMBIT)
                    });
                    if friendly && has_gambit {
                        let _ = session.add_modifier(ctx.entity, araki_headhunter_buff());
                    }
                },
            ))
        })
}

/// Stacking +2 attack. The interceptor reads the live stack count, so a
/// second application changes the fold without re-registering anything.
fn araki_headhunter_buff() -> Modifier {
    Modifier::new("araki_headhunter_buff")
        .stackable(true)
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

fn azure_horn_shaman() -> CardBlueprint {
    CardBlueprint::minion("azure_horn_shaman", "Azure Horn Shaman", 4, 1, 4)
        .describe("Dying Wish: Give +4 Health to friendly minions around it.")
        .with_keyword(keywords::DYING_WISH)
        .with_modifier(|| {
            Modifier::new("azure_horn_shaman_wish").with_mixin(DyingWishMixin::new(
                |session, event, ctx| {
                    // The wish resolves around where the shaman stood.
                    let Some(point) = event.point else {
                        return;
                    };
                    for ally in session.get_nearby_entities(point) {
                        let friendly = session
                            .entity(ally)
                            .is_some_and(|e| e.player_id() == ctx.player);
                        let minion = session
                            .blueprint_of(ally)
                            .is_some_and(|b| b.kind == CardKind::Minion);
                        if friendly && minion {
                            let _ = session.add_modifier(ally, azure_horn_shaman_buff());
                            session.heal(ally, 4);
                        }
                    }
                },
            ))
        })
}

fn azure_horn_shaman_buff() -> Modifier {
    Modifier::new("azure_horn_shaman_buff")
        .stackable(true)
        .with_mixin(StatInterceptorMixin::new(
            StatKey::MaxHp,
            0,
            ModifierDuration::Forever,
            |ctx| {
                let stacks = ctx.stacks.clone();
                Arc::new(move |max_hp, _| max_hp + 4 * i64::from(stacks.get()))
            },
        ))
}

fn primus_fist() -> CardBlueprint {
    CardBlueprint::minion("primus_fist", "Primus Fist", 2, 2, 3)
        .describe("Opening Gambit: Give nearby allied minions +1 Attack.")
        .with_keyword(keywords::OPENING_GAMBIT)
        .with_modifier(|| {
            Modifier::new("primus_fist_gambit").with_mixin(OpeningGambitMixin::new(
                |session, ctx| {
                    let Some(position) = session.entity(ctx.entity).map(|e| e.position) else {
                        return;
                    };
                    for ally in session.get_nearby_entities(position) {
                        let friendly = session
                            .entity(ally)
                            .is_some_and(|e| e.player_id() == ctx.player);
                        let minion = session
                            .blueprint_of(ally)
                            .is_some_and(|b| b.kind == CardKind::Minion);
                        if friendly && minion {
                            let _ = session.add_modifier(ally, primus_fist_buff());
                        }
                    }
                },
            ))
        })
}

fn primus_fist_buff() -> Modifier {
    Modifier::new("primus_fist_buff")
        .stackable(true)
        .with_mixin(StatInterceptorMixin::new(
            StatKey::Attack,
            0,
            ModifierDuration::Forever,
            |ctx| {
                let stacks = ctx.stacks.clone();
                Arc::new(move |attack, _| attack + i64::from(stacks.get()))
            },
        ))
}

fn ephemeral_shroud() -> CardBlueprint {
    CardBlueprint::minion("ephemeral_shroud", "Ephemeral Shroud", 2, 2, 2)
        .describe("Opening Gambit: Dispel 1 nearby space.")
        .with_keyword(keywords::OPENING_GAMBIT)
        .with_followup(Followup::optional(|session, source, target| {
            session.get_cell_at(target).is_some() && is_within_cells(source, target, 1)
        }))
        .with_modifier(|| {
            Modifier::new("ephemeral_shroud_gambit").with_mixin(OpeningGambitMixin::new(
                |session, ctx| {
                    for target in session.followup_targets_of(ctx.entity) {
                        dispel_at(session, target);
                    }
                },
            ))
        })
}

fn void_pulse() -> CardBlueprint {
    CardBlueprint::spell(
        "void_pulse",
        "Void Pulse",
        1,
        |session, player, _targets| {
            if let Some(enemy) = session.opponent_general(player) {
                session.take_damage(enemy, 2, None);
            }
            if let Some(own) = session.general_of(player) {
                session.heal(own, 3);
            }
        },
    )
    .describe("Deal 2 damage to the enemy general. Restore 3 Health to your general.")
}
