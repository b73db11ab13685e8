//! Session-wide event bus.
//!
//! Everything observable in the simulation is announced as a [`GameEvent`] on
//! one string-keyed bus: entity lifecycle, movement, the damage sequence, turn
//! starts, and any custom names cards invent. Listeners subscribe by exact
//! name or wildcard.
//!
//! ## Reentrancy
//!
//! Emission snapshots the matching listeners before invoking any of them, so
//! a listener may freely subscribe, unsubscribe, or add/remove modifiers -
//! including on the entity whose event is being handled - without corrupting
//! the iteration.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::entity::EntityId;
use crate::core::player::PlayerId;
use crate::core::point::Vec3;
use crate::core::session::Session;

/// Well-known event names emitted by the engine itself.
///
/// Cards and modifiers may emit additional names on the same bus.
pub mod event_names {
    pub const CREATED: &str = "created";
    pub const DESTROYED: &str = "destroyed";

    pub const BEFORE_MOVE: &str = "before-move";
    pub const AFTER_MOVE: &str = "after-move";

    pub const BEFORE_DEAL_DAMAGE: &str = "before_deal_damage";
    pub const AFTER_DEAL_DAMAGE: &str = "after_deal_damage";

    pub const BEFORE_TAKE_DAMAGE: &str = "before_take_damage";
    pub const AFTER_TAKE_DAMAGE: &str = "after_take_damage";

    pub const BEFORE_ATTACK: &str = "before_attack";
    pub const AFTER_ATTACK: &str = "after_attack";

    pub const PLAYER_TURN_START: &str = "player:turn_start";
}

/// An event with contextual data.
///
/// Payload shape is fixed per name: `entity` is the subject, `other` the
/// counterpart (attack target, damage source), `amount` the damage value,
/// `point` a board position where one is meaningful (e.g. where a destroyed
/// entity stood).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub name: String,
    pub entity: Option<EntityId>,
    pub other: Option<EntityId>,
    pub player: Option<PlayerId>,
    pub amount: Option<i64>,
    pub point: Option<Vec3>,
}

impl GameEvent {
    /// Create a new event with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: None,
            other: None,
            player: None,
            amount: None,
            point: None,
        }
    }

    /// Set the subject entity (builder pattern).
    #[must_use]
    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Set the counterpart entity (builder pattern).
    #[must_use]
    pub fn with_other(mut self, other: Option<EntityId>) -> Self {
        self.other = other;
        self
    }

    /// Set the associated player (builder pattern).
    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.player = Some(player);
        self
    }

    /// Set the amount (builder pattern).
    #[must_use]
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the board point (builder pattern).
    #[must_use]
    pub fn with_point(mut self, point: Vec3) -> Self {
        self.point = Some(point);
        self
    }
}

/// What names a subscription matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPattern {
    /// Match one event name exactly.
    Exact(String),
    /// Match every event.
    Any,
}

impl EventPattern {
    /// Build an exact-match pattern.
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    /// Does this pattern match the given event name?
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(n) => n == name,
            Self::Any => true,
        }
    }
}

/// Handle for removing a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A bus listener. Runs to completion during emission.
pub type EventListener = Rc<dyn Fn(&mut Session, &GameEvent)>;

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    listener: EventListener,
}

/// String-keyed subscription registry.
///
/// The bus itself only stores subscriptions; [`Session::emit`] drives
/// dispatch so listeners can receive `&mut Session`.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for events matching `pattern`.
    pub fn subscribe(&mut self, pattern: EventPattern, listener: EventListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            pattern,
            listener,
        });
        id
    }

    /// Remove a subscription. Returns `true` if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Snapshot the listeners matching an event name, in subscription order.
    #[must_use]
    pub fn matching(&self, name: &str) -> Vec<EventListener> {
        self.subscriptions
            .iter()
            .filter(|s| s.pattern.matches(name))
            .map(|s| s.listener.clone())
            .collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Is the bus empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(EventPattern::exact("created").matches("created"));
        assert!(!EventPattern::exact("created").matches("destroyed"));
        assert!(EventPattern::Any.matches("anything_at_all"));
    }

    #[test]
    fn test_subscribe_and_match() {
        let mut bus = EventBus::new();
        bus.subscribe(EventPattern::exact("created"), Rc::new(|_, _| {}));
        bus.subscribe(EventPattern::Any, Rc::new(|_, _| {}));

        assert_eq!(bus.matching("created").len(), 2);
        assert_eq!(bus.matching("destroyed").len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventPattern::Any, Rc::new(|_, _| {}));

        assert!(bus.unsubscribe(id));
        assert!(bus.is_empty());
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_snapshot_is_subscription_order() {
        let mut bus = EventBus::new();
        let a: EventListener = Rc::new(|_, _| {});
        let b: EventListener = Rc::new(|_, _| {});
        bus.subscribe(EventPattern::Any, a.clone());
        bus.subscribe(EventPattern::Any, b.clone());

        let matched = bus.matching("x");
        assert!(Rc::ptr_eq(&matched[0], &a));
        assert!(Rc::ptr_eq(&matched[1], &b));
    }

    #[test]
    fn test_event_builder() {
        let event = GameEvent::new(event_names::BEFORE_TAKE_DAMAGE)
            .with_entity(EntityId(4))
            .with_other(Some(EntityId(2)))
            .with_amount(3)
            .with_point(Vec3::new(1, 1, 0));

        assert_eq!(event.name, "before_take_damage");
        assert_eq!(event.entity, Some(EntityId(4)));
        assert_eq!(event.other, Some(EntityId(2)));
        assert_eq!(event.amount, Some(3));
    }

    #[test]
    fn test_event_serialization() {
        let event = GameEvent::new("custom:ritual").with_entity(EntityId(9));
        let json = serde_json::to_string(&event).unwrap();
        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
