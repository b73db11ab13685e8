//! Movement reachability.
//!
//! A [`DistanceMap`] is a breadth-first flood from an entity's position over
//! the board's adjacency, stopping at occupied cells. Maps are pure functions
//! of board and entity state, so the session caches them in a
//! [`DistanceCache`] keyed by its version counter: any mutation bumps the
//! version and the next query recomputes.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::board::Board;
use crate::core::entity::EntityId;
use crate::core::point::Vec3;

/// Breadth-first distances from one origin.
#[derive(Clone, Debug)]
pub struct DistanceMap {
    origin: Vec3,
    costs: FxHashMap<Vec3, u32>,
    prev: FxHashMap<Vec3, Vec3>,
}

impl DistanceMap {
    /// Flood from `origin` over the board. Cells where `is_blocked` returns
    /// true are neither entered nor expanded; the origin itself is exempt.
    #[must_use]
    pub fn compute(board: &Board, origin: Vec3, is_blocked: impl Fn(Vec3) -> bool) -> Self {
        let mut costs = FxHashMap::default();
        let mut prev = FxHashMap::default();
        let mut frontier = VecDeque::new();

        costs.insert(origin, 0);
        frontier.push_back(origin);

        while let Some(current) = frontier.pop_front() {
            let next_cost = costs[&current] + 1;
            for neighbor in board.neighbor_destinations(current) {
                if costs.contains_key(&neighbor) || is_blocked(neighbor) {
                    continue;
                }
                costs.insert(neighbor, next_cost);
                prev.insert(neighbor, current);
                frontier.push_back(neighbor);
            }
        }

        Self {
            origin,
            costs,
            prev,
        }
    }

    /// The flood's origin.
    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Steps from the origin to a point, or `None` if unreachable.
    #[must_use]
    pub fn distance_to(&self, point: Vec3) -> Option<u32> {
        self.costs.get(&point).copied()
    }

    /// The path from the origin to a point, excluding the origin and
    /// including the destination. `None` if unreachable; an empty path if
    /// the destination is the origin.
    #[must_use]
    pub fn path_to(&self, point: Vec3) -> Option<Vec<Vec3>> {
        self.costs.get(&point)?;
        let mut path = Vec::new();
        let mut current = point;
        while current != self.origin {
            path.push(current);
            current = *self.prev.get(&current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Reachable points within `reach` steps, excluding the origin.
    pub fn within_reach(&self, reach: u32) -> impl Iterator<Item = Vec3> + '_ {
        self.costs
            .iter()
            .filter(move |&(point, &cost)| cost > 0 && cost <= reach && *point != self.origin)
            .map(|(&point, _)| point)
    }
}

/// Version-stamped cache of distance maps, one per entity.
#[derive(Debug, Default)]
pub struct DistanceCache {
    version: u64,
    maps: FxHashMap<EntityId, Rc<DistanceMap>>,
}

impl DistanceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached map if the session has mutated since they were
    /// computed.
    pub fn sync(&mut self, version: u64) {
        if self.version != version {
            self.version = version;
            self.maps.clear();
        }
    }

    /// The cached map for an entity, if still valid.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<Rc<DistanceMap>> {
        self.maps.get(&entity).cloned()
    }

    /// Cache a freshly computed map.
    pub fn insert(&mut self, entity: EntityId, map: Rc<DistanceMap>) {
        self.maps.insert(entity, map);
    }

    /// Number of cached maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Is the cache empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
