//! Shared fixtures for integration tests.
//!
//! Every duel gets the built-in catalog plus three plain test minions, a
//! standard 9x5 board, two players with generals on opposite columns, and a
//! recording presentation layer so sequencing can be asserted.

#![allow(dead_code)]

use duelgrid::{
    Board, Card, CardBlueprint, CardRegistry, EntityId, FxLog, PlayerId, RecordingFx, Session,
    Vec3,
};

/// Catalog plus vanilla minions with known statlines.
pub fn test_registry() -> CardRegistry {
    let mut registry = CardRegistry::with_catalog();
    registry.register(CardBlueprint::minion("footman", "Footman", 2, 2, 3));
    registry.register(CardBlueprint::minion("squire", "Squire", 1, 1, 3));
    registry.register(CardBlueprint::minion("pikeman", "Pikeman", 1, 1, 2));
    registry
}

pub struct Duel {
    pub session: Session,
    pub p0: PlayerId,
    pub p1: PlayerId,
    pub log: FxLog,
}

/// Two players with generals at (0,2) and (8,2), recording fx.
pub fn recorded_duel() -> Duel {
    let fx = RecordingFx::new();
    let log = fx.log();
    let mut session = Session::new(test_registry(), Board::rectangular(9, 5), Box::new(fx), 42);
    let p0 = session.add_player("Alice");
    let p1 = session.add_player("Bob");
    summon(&mut session, p0, "argeon_highmayne", Vec3::new(0, 2, 0));
    summon(&mut session, p1, "maehv_skinsolder", Vec3::new(8, 2, 0));
    Duel {
        session,
        p0,
        p1,
        log,
    }
}

/// Summon a unit card with no followup targets.
pub fn summon(session: &mut Session, player: PlayerId, blueprint: &str, at: Vec3) -> EntityId {
    summon_with(session, player, blueprint, at, &[])
}

/// Summon a unit card with followup targets.
pub fn summon_with(
    session: &mut Session,
    player: PlayerId,
    blueprint: &str,
    at: Vec3,
    targets: &[Vec3],
) -> EntityId {
    let index = session.give_card(player, blueprint).unwrap();
    session
        .play_card(player, index, at, targets)
        .unwrap()
        .expect("unit card summons an entity")
}

/// Hand a card over without playing it.
pub fn give(session: &mut Session, player: PlayerId, blueprint: &str) -> usize {
    session.give_card(player, blueprint).unwrap()
}

/// Current hp of an entity.
pub fn hp_of(session: &Session, id: EntityId) -> i64 {
    session.entity(id).expect("entity alive").hp(session)
}

/// Current attack of an entity.
pub fn attack_of(session: &Session, id: EntityId) -> i64 {
    session.entity(id).expect("entity alive").attack(session)
}

/// The blueprint id behind an entity.
pub fn blueprint_id_of(session: &Session, id: EntityId) -> String {
    session
        .card_of(id)
        .map(|c: &Card| c.blueprint_id.clone())
        .expect("entity has a card")
}
