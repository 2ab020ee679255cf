//! Per-lake remaining-fish bookkeeping: draws, refills and resets.
//!
//! A lake's total remaining count is never observably zero. The draw that
//! empties a lake refills it in the same call and counts one clear.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{LakeCatalog, PoolConfig, PoolCounts};
use crate::constants::{
    LOG_DRAW, LOG_DRAW_EXHAUSTED, LOG_POOL_CLEAR, LOG_POOL_REFILL, LOG_POOL_RESET,
};

/// Live state of one lake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PoolState {
    pub remaining: BTreeMap<String, u32>,
    #[serde(default)]
    pub pools_cleared: u32,
    #[serde(default)]
    pub rare_caught: u32,
    /// Total fish drawn from this lake.
    #[serde(default)]
    pub fish_caught: u32,
}

impl PoolState {
    /// A freshly stocked lake with zeroed counters.
    #[must_use]
    pub fn full(config: &PoolConfig) -> Self {
        Self {
            remaining: config.full_counts(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn total_remaining(&self) -> u32 {
        self.remaining.values().sum()
    }

    #[must_use]
    pub fn remaining_of(&self, category_id: &str) -> u32 {
        self.remaining.get(category_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn rare_remaining(&self, config: &PoolConfig) -> u32 {
        config
            .categories
            .iter()
            .filter(|c| c.tier.is_rare())
            .map(|c| self.remaining_of(&c.id))
            .sum()
    }

    /// Current `(n, r)` totals for the estimator.
    #[must_use]
    pub fn counts(&self, config: &PoolConfig) -> PoolCounts {
        PoolCounts::new(self.total_remaining(), self.rare_remaining(config))
    }

    fn refill(&mut self, config: &PoolConfig) {
        self.remaining = config.full_counts();
    }

    fn zero_counters(&mut self) {
        self.pools_cleared = 0;
        self.rare_caught = 0;
        self.fish_caught = 0;
    }

    /// Bring a persisted state back within the configured shape: unknown
    /// categories are dropped, missing ones are restocked, counts are clamped
    /// to the full count and an empty lake is refilled.
    pub fn normalize(&mut self, config: &PoolConfig) {
        let mut remaining = BTreeMap::new();
        for category in &config.categories {
            let count = self
                .remaining
                .get(&category.id)
                .copied()
                .unwrap_or(category.full_count)
                .min(category.full_count);
            remaining.insert(category.id.clone(), count);
        }
        self.remaining = remaining;
        if self.total_remaining() == 0 {
            self.refill(config);
        }
    }
}

/// Scalar trackers that live beside the lakes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Trackers {
    #[serde(default)]
    pub broken_attempts: u32,
    /// Named running totals, e.g. gold earned so far.
    #[serde(default)]
    pub running_totals: BTreeMap<String, f64>,
}

impl Trackers {
    #[must_use]
    pub fn running_total(&self, name: &str) -> f64 {
        self.running_totals.get(name).copied().unwrap_or(0.0)
    }
}

/// Result of a single draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Caught { rare: bool, refilled: bool },
    /// The category has nothing left this cycle; state is unchanged.
    Exhausted,
    UnknownPool,
    UnknownCategory,
}

impl DrawOutcome {
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Caught { .. })
    }
}

/// Result of drawing a whole lake at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared { items: u32, rare: u32 },
    UnknownPool,
}

/// Every lake's live state plus the auxiliary trackers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Inventory {
    #[serde(default)]
    pub pools: BTreeMap<String, PoolState>,
    #[serde(default)]
    pub trackers: Trackers,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a lake's state without creating it. Lakes that were never touched
    /// read as full.
    #[must_use]
    pub fn pool(&self, catalog: &LakeCatalog, pool_id: &str) -> Option<PoolState> {
        let config = catalog.pool(pool_id)?;
        Some(
            self.pools
                .get(pool_id)
                .cloned()
                .unwrap_or_else(|| PoolState::full(config)),
        )
    }

    /// Mutable access, creating a full lake on first use.
    pub fn pool_mut(&mut self, catalog: &LakeCatalog, pool_id: &str) -> Option<&mut PoolState> {
        let config = catalog.pool(pool_id)?;
        Some(
            self.pools
                .entry(pool_id.to_string())
                .or_insert_with(|| PoolState::full(config)),
        )
    }

    /// Replace a lake's state wholesale (used by undo).
    pub fn restore_pool(&mut self, pool_id: &str, state: PoolState) {
        self.pools.insert(pool_id.to_string(), state);
    }

    /// Rare catches summed over every lake.
    #[must_use]
    pub fn total_rare_caught(&self) -> u32 {
        self.pools.values().map(|p| p.rare_caught).sum()
    }

    #[must_use]
    pub fn total_fish_caught(&self) -> u32 {
        self.pools.values().map(|p| p.fish_caught).sum()
    }

    /// Drop unknown lakes and normalize the rest against `catalog`.
    pub fn normalize(&mut self, catalog: &LakeCatalog) {
        self.pools.retain(|id, _| catalog.pool(id).is_some());
        for (id, state) in &mut self.pools {
            if let Some(config) = catalog.pool(id) {
                state.normalize(config);
            }
        }
    }

    /// Remove one fish of `category_id` from `pool_id`.
    pub fn draw(
        &mut self,
        catalog: &LakeCatalog,
        pool_id: &str,
        category_id: &str,
    ) -> DrawOutcome {
        let Some(config) = catalog.pool(pool_id) else {
            return DrawOutcome::UnknownPool;
        };
        if config.category(category_id).is_none() {
            return DrawOutcome::UnknownCategory;
        }
        let rare = config.is_rare(category_id);
        let state = self
            .pools
            .entry(pool_id.to_string())
            .or_insert_with(|| PoolState::full(config));

        let Some(slot) = state.remaining.get_mut(category_id).filter(|n| **n > 0) else {
            log::debug!("{LOG_DRAW_EXHAUSTED}: {pool_id}/{category_id}");
            return DrawOutcome::Exhausted;
        };
        *slot -= 1;
        state.fish_caught += 1;
        if rare {
            state.rare_caught += 1;
        }

        let refilled = state.total_remaining() == 0;
        if refilled {
            state.refill(config);
            state.pools_cleared += 1;
            log::debug!(
                "{LOG_POOL_REFILL}: {pool_id} cleared {} times",
                state.pools_cleared
            );
        }
        log::debug!("{LOG_DRAW}: {pool_id}/{category_id} rare={rare}");
        DrawOutcome::Caught { rare, refilled }
    }

    /// Treat everything still in `pool_id` as caught in one step, then refill.
    pub fn draw_whole_pool(&mut self, catalog: &LakeCatalog, pool_id: &str) -> ClearOutcome {
        let Some(config) = catalog.pool(pool_id) else {
            return ClearOutcome::UnknownPool;
        };
        let state = self
            .pools
            .entry(pool_id.to_string())
            .or_insert_with(|| PoolState::full(config));
        let PoolCounts { items, rare } = state.counts(config);
        state.fish_caught += items;
        state.rare_caught += rare;
        state.pools_cleared += 1;
        state.refill(config);
        log::debug!("{LOG_POOL_CLEAR}: {pool_id} items={items} rare={rare}");
        ClearOutcome::Cleared { items, rare }
    }

    /// Restock `pool_id`, keeping its counters. Returns false for unknown lakes.
    pub fn reset_pool(&mut self, catalog: &LakeCatalog, pool_id: &str) -> bool {
        let Some(config) = catalog.pool(pool_id) else {
            return false;
        };
        let state = self
            .pools
            .entry(pool_id.to_string())
            .or_insert_with(|| PoolState::full(config));
        state.refill(config);
        log::debug!("{LOG_POOL_RESET}: {pool_id} keep-counters");
        true
    }

    /// Restock `pool_id` and zero its counters.
    pub fn reset_pool_progress(&mut self, catalog: &LakeCatalog, pool_id: &str) -> bool {
        let Some(config) = catalog.pool(pool_id) else {
            return false;
        };
        let state = self
            .pools
            .entry(pool_id.to_string())
            .or_insert_with(|| PoolState::full(config));
        state.refill(config);
        state.zero_counters();
        log::debug!("{LOG_POOL_RESET}: {pool_id} zero-counters");
        true
    }

    /// Reset progress on every lake and zero the trackers.
    pub fn reset_all(&mut self, catalog: &LakeCatalog) {
        for id in catalog.pool_ids() {
            self.reset_pool_progress(catalog, id);
        }
        self.pools.retain(|id, _| catalog.pool(id).is_some());
        self.trackers = Trackers::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CategoryConfig, Tier};

    fn catalog() -> LakeCatalog {
        LakeCatalog {
            pools: vec![PoolConfig {
                id: "pond".into(),
                label: "Pond".into(),
                byproduct_rate: 1.0,
                categories: vec![
                    CategoryConfig {
                        id: "common".into(),
                        tier: Tier::Common,
                        full_count: 8,
                        weight: 1.0,
                    },
                    CategoryConfig {
                        id: "rare".into(),
                        tier: Tier::Rare,
                        full_count: 1,
                        weight: 5.0,
                    },
                ],
            }],
        }
    }

    #[test]
    fn emptying_a_pool_refills_and_counts_a_clear() {
        let catalog = catalog();
        let mut inv = Inventory::new();
        for _ in 0..8 {
            assert!(inv.draw(&catalog, "pond", "common").changed());
        }
        let outcome = inv.draw(&catalog, "pond", "rare");
        assert_eq!(
            outcome,
            DrawOutcome::Caught {
                rare: true,
                refilled: true
            }
        );
        let pond = inv.pool(&catalog, "pond").unwrap();
        assert_eq!(pond.pools_cleared, 1);
        assert_eq!(pond.rare_caught, 1);
        assert_eq!(pond.fish_caught, 9);
        assert_eq!(pond.remaining_of("common"), 8);
        assert_eq!(pond.remaining_of("rare"), 1);
    }

    #[test]
    fn drawing_exhausted_category_is_a_no_op() {
        let catalog = catalog();
        let mut inv = Inventory::new();
        inv.draw(&catalog, "pond", "rare");
        let before = inv.clone();
        assert_eq!(inv.draw(&catalog, "pond", "rare"), DrawOutcome::Exhausted);
        assert_eq!(inv, before);
        assert_eq!(inv.draw(&catalog, "lake", "rare"), DrawOutcome::UnknownPool);
        assert_eq!(inv.draw(&catalog, "pond", "eel"), DrawOutcome::UnknownCategory);
    }

    #[test]
    fn whole_pool_draw_counts_remaining_contents() {
        let catalog = catalog();
        let mut inv = Inventory::new();
        inv.draw(&catalog, "pond", "common");
        let outcome = inv.draw_whole_pool(&catalog, "pond");
        assert_eq!(outcome, ClearOutcome::Cleared { items: 8, rare: 1 });
        let pond = inv.pool(&catalog, "pond").unwrap();
        assert_eq!(pond.fish_caught, 9);
        assert_eq!(pond.rare_caught, 1);
        assert_eq!(pond.pools_cleared, 1);
        assert_eq!(pond.total_remaining(), 9);
    }

    #[test]
    fn reset_variants_differ_on_counters() {
        let catalog = catalog();
        let mut inv = Inventory::new();
        inv.draw_whole_pool(&catalog, "pond");
        inv.draw(&catalog, "pond", "common");

        assert!(inv.reset_pool(&catalog, "pond"));
        let pond = inv.pool(&catalog, "pond").unwrap();
        assert_eq!(pond.total_remaining(), 9);
        assert_eq!(pond.pools_cleared, 1);
        assert_eq!(pond.fish_caught, 10);

        assert!(inv.reset_pool_progress(&catalog, "pond"));
        let pond = inv.pool(&catalog, "pond").unwrap();
        assert_eq!(pond, PoolState::full(catalog.pool("pond").unwrap()));
        assert!(!inv.reset_pool(&catalog, "missing"));
    }

    #[test]
    fn reset_all_zeroes_trackers() {
        let catalog = catalog();
        let mut inv = Inventory::new();
        inv.trackers.broken_attempts = 4;
        inv.trackers.running_totals.insert("gold".into(), 120.0);
        inv.draw(&catalog, "pond", "rare");
        inv.reset_all(&catalog);
        assert_eq!(inv.trackers, Trackers::default());
        assert_eq!(inv.total_rare_caught(), 0);
    }

    #[test]
    fn normalize_clamps_and_restocks() {
        let catalog = catalog();
        let mut state = PoolState {
            remaining: BTreeMap::from([("common".into(), 99), ("ghost".into(), 3)]),
            ..PoolState::default()
        };
        state.normalize(catalog.pool("pond").unwrap());
        assert_eq!(state.remaining_of("common"), 8);
        assert_eq!(state.remaining_of("rare"), 1);
        assert!(!state.remaining.contains_key("ghost"));

        let mut drained = PoolState {
            remaining: BTreeMap::from([("common".into(), 0), ("rare".into(), 0)]),
            ..PoolState::default()
        };
        drained.normalize(catalog.pool("pond").unwrap());
        assert_eq!(drained.total_remaining(), 9);
    }
}
