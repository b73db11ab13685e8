//! Players and per-player card state.
//!
//! A duel has exactly two sides. Each player owns an ordered card list -
//! entities refer back to it by index - and tracks which entity is their
//! general once it hits the board.

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::core::entity::EntityId;

/// Index into a player's card list.
pub type CardIndex = usize;

/// Player identifier.
///
/// Player indices are 0-based: the first player is `PlayerId(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Create a new player ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw player index (0-based).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// One side of the duel.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Ordered card list; entities resolve their card by index into this.
    pub cards: Vec<Card>,
    /// The player's general entity, once summoned.
    pub general: Option<EntityId>,
}

impl Player {
    /// Create a player with an empty card list.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            cards: Vec::new(),
            general: None,
        }
    }

    /// Look up a card by index. Absent indices are a normal game state
    /// (nothing selected), not an error.
    #[must_use]
    pub fn card(&self, index: CardIndex) -> Option<&Card> {
        self.cards.get(index)
    }

    /// Mutable card lookup.
    pub fn card_mut(&mut self, index: CardIndex) -> Option<&mut Card> {
        self.cards.get_mut(index)
    }

    /// Append a card, returning its index.
    pub fn add_card(&mut self, card: Card) -> CardIndex {
        self.cards.push(card);
        self.cards.len() - 1
    }
}

/// Registry of the duel's players.
#[derive(Debug, Default)]
pub struct PlayerSystem {
    players: Vec<Player>,
}

impl PlayerSystem {
    /// Create an empty player registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player, returning their id.
    pub fn add_player(&mut self, name: impl Into<String>) -> PlayerId {
        let id = PlayerId::new(self.players.len() as u8);
        self.players.push(Player::new(id, name));
        id
    }

    /// Look up a player by id.
    #[must_use]
    pub fn get_player_by_id(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    /// Mutable player lookup.
    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    /// The other side of the duel.
    #[must_use]
    pub fn opponent_of(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id != id)
    }

    /// Number of players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Is the registry empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Iterate players in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Iterate players mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_basics() {
        let p0 = PlayerId::new(0);
        assert_eq!(p0.index(), 0);
        assert_eq!(format!("{}", p0), "Player 0");
    }

    #[test]
    fn test_add_and_lookup() {
        let mut players = PlayerSystem::new();
        let p0 = players.add_player("Alice");
        let p1 = players.add_player("Bob");

        assert_eq!(players.len(), 2);
        assert_eq!(players.get_player_by_id(p0).unwrap().name, "Alice");
        assert_eq!(players.get_player_by_id(p1).unwrap().name, "Bob");
        assert!(players.get_player_by_id(PlayerId::new(9)).is_none());
    }

    #[test]
    fn test_opponent_of() {
        let mut players = PlayerSystem::new();
        let p0 = players.add_player("Alice");
        let p1 = players.add_player("Bob");

        assert_eq!(players.opponent_of(p0).unwrap().id, p1);
        assert_eq!(players.opponent_of(p1).unwrap().id, p0);
    }

    #[test]
    fn test_card_indices() {
        let mut players = PlayerSystem::new();
        let p0 = players.add_player("Alice");
        let player = players.get_player_mut(p0).unwrap();

        let a = player.add_card(Card::new("footman", p0));
        let b = player.add_card(Card::new("squire", p0));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(player.card(a).unwrap().blueprint_id, "footman");
        assert!(player.card(99).is_none());
    }
}
