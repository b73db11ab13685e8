//! Card blueprints and card instances.
//!
//! A [`CardBlueprint`] is the immutable definition of a card: base stats,
//! keywords, the modifiers it attaches when it hits the board, and optional
//! followup targeting. A [`Card`] is one owned instance in a player's list,
//! holding only per-instance state (the followup targets chosen at play
//! time). Entities resolve everything else through their card's blueprint at
//! read time, which is what keeps derived stats live.

pub mod catalog;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::config;
use crate::core::player::PlayerId;
use crate::core::point::Vec3;
use crate::core::session::Session;
use crate::modifier::Modifier;

/// Builds a fresh modifier instance each time the card is played.
pub type ModifierFactory = Rc<dyn Fn() -> Modifier>;

/// A spell's resolution. Receives the casting player and the chosen targets.
pub type SpellEffect = Rc<dyn Fn(&mut Session, PlayerId, &[Vec3])>;

/// Followup target legality: `(session, source position, candidate)`.
pub type TargetPredicate = Rc<dyn Fn(&Session, Vec3, Vec3) -> bool>;

/// What kind of card a blueprint is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    General,
    Minion,
    Spell,
}

/// Targeting requirement resolved at play time.
#[derive(Clone)]
pub struct Followup {
    pub min_targets: usize,
    pub max_targets: usize,
    pub is_targetable: TargetPredicate,
}

impl Followup {
    /// Exactly one mandatory target.
    pub fn single(is_targetable: impl Fn(&Session, Vec3, Vec3) -> bool + 'static) -> Self {
        Self {
            min_targets: 1,
            max_targets: 1,
            is_targetable: Rc::new(is_targetable),
        }
    }

    /// One optional target.
    pub fn optional(is_targetable: impl Fn(&Session, Vec3, Vec3) -> bool + 'static) -> Self {
        Self {
            min_targets: 0,
            max_targets: 1,
            is_targetable: Rc::new(is_targetable),
        }
    }
}

impl std::fmt::Debug for Followup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Followup")
            .field("min_targets", &self.min_targets)
            .field("max_targets", &self.max_targets)
            .finish()
    }
}

/// Immutable card definition.
pub struct CardBlueprint {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: CardKind,
    pub mana_cost: u32,
    pub attack: i64,
    pub max_hp: i64,
    pub keywords: Vec<String>,
    /// Modifiers attached to the summoned entity, in order.
    pub modifiers: Vec<ModifierFactory>,
    pub followup: Option<Followup>,
    /// Spell resolution; only meaningful for [`CardKind::Spell`].
    pub on_play: Option<SpellEffect>,
}

impl CardBlueprint {
    /// A minion blueprint with base stats and no behavior.
    pub fn minion(
        id: impl Into<String>,
        name: impl Into<String>,
        mana_cost: u32,
        attack: i64,
        max_hp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: CardKind::Minion,
            mana_cost,
            attack,
            max_hp,
            keywords: Vec::new(),
            modifiers: Vec::new(),
            followup: None,
            on_play: None,
        }
    }

    /// A general blueprint with the standard general statline.
    pub fn general(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: CardKind::General,
            mana_cost: 0,
            attack: config::GENERAL_DEFAULT_ATTACK,
            max_hp: config::GENERAL_DEFAULT_HP,
            keywords: Vec::new(),
            modifiers: Vec::new(),
            followup: None,
            on_play: None,
        }
    }

    /// A spell blueprint resolving through `on_play`.
    pub fn spell(
        id: impl Into<String>,
        name: impl Into<String>,
        mana_cost: u32,
        on_play: impl Fn(&mut Session, PlayerId, &[Vec3]) + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: CardKind::Spell,
            mana_cost,
            attack: 0,
            max_hp: 0,
            keywords: Vec::new(),
            modifiers: Vec::new(),
            followup: None,
            on_play: Some(Rc::new(on_play)),
        }
    }

    /// Set the rules text.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a keyword.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    /// Add a modifier attached on summon.
    #[must_use]
    pub fn with_modifier(mut self, factory: impl Fn() -> Modifier + 'static) -> Self {
        self.modifiers.push(Rc::new(factory));
        self
    }

    /// Require followup targeting.
    #[must_use]
    pub fn with_followup(mut self, followup: Followup) -> Self {
        self.followup = Some(followup);
        self
    }

    /// Does the card carry a keyword?
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

impl std::fmt::Debug for CardBlueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardBlueprint")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mana_cost", &self.mana_cost)
            .field("attack", &self.attack)
            .field("max_hp", &self.max_hp)
            .field("keywords", &self.keywords)
            .finish()
    }
}

/// Keywords referenced by engine-level card behavior.
pub mod keywords {
    pub const OPENING_GAMBIT: &str = "Opening Gambit";
    pub const DYING_WISH: &str = "Dying Wish";
}

/// All known blueprints, keyed by id.
#[derive(Default)]
pub struct CardRegistry {
    blueprints: FxHashMap<String, CardBlueprint>,
}

impl CardRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in catalog.
    #[must_use]
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        catalog::register_all(&mut registry);
        registry
    }

    /// Register a blueprint, replacing any existing one with the same id.
    pub fn register(&mut self, blueprint: CardBlueprint) {
        self.blueprints.insert(blueprint.id.clone(), blueprint);
    }

    /// Look up a blueprint by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CardBlueprint> {
        self.blueprints.get(id)
    }

    /// Number of registered blueprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    /// Is the registry empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}

impl std::fmt::Debug for CardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardRegistry")
            .field("blueprints", &self.blueprints.len())
            .finish()
    }
}

/// One card instance in a player's list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub blueprint_id: String,
    pub player_id: PlayerId,
    /// Targets chosen when the card was played.
    pub followup_targets: SmallVec<[Vec3; 2]>,
}

impl Card {
    /// A fresh, unplayed card instance.
    pub fn new(blueprint_id: impl Into<String>, player_id: PlayerId) -> Self {
        Self {
            blueprint_id: blueprint_id.into(),
            player_id,
            followup_targets: SmallVec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut registry = CardRegistry::new();
        registry.register(CardBlueprint::minion("footman", "Footman", 2, 2, 3));

        let blueprint = registry.get("footman").unwrap();
        assert_eq!(blueprint.kind, CardKind::Minion);
        assert_eq!(blueprint.attack, 2);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_general_statline() {
        let blueprint = CardBlueprint::general("argeon", "Argeon Highmayne");
        assert_eq!(blueprint.kind, CardKind::General);
        assert_eq!(blueprint.attack, config::GENERAL_DEFAULT_ATTACK);
        assert_eq!(blueprint.max_hp, config::GENERAL_DEFAULT_HP);
    }

    #[test]
    fn test_keywords() {
        let blueprint = CardBlueprint::minion("mystic", "Mystic", 2, 2, 3)
            .with_keyword(keywords::OPENING_GAMBIT);
        assert!(blueprint.has_keyword(keywords::OPENING_GAMBIT));
        assert!(!blueprint.has_keyword(keywords::DYING_WISH));
    }

    #[test]
    fn test_catalog_is_nonempty() {
        let registry = CardRegistry::with_catalog();
        assert!(registry.get("healing_mystic").is_some());
        assert!(registry.get("argeon_highmayne").is_some());
    }
}
