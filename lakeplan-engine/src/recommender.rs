//! Lake recommendation: which lake to fish to reach the rare-catch goal most
//! cheaply, with a secondary pull towards lakes that pay more silver.
use serde::{Deserialize, Serialize};

use crate::catalog::{LakeCatalog, PoolCounts};
use crate::constants::{
    BEST_CASE_WEIGHT, QUICK_PICK_MAX_REMAINING, RECOMMEND_TIE_EPSILON, SILVER_BASELINE_MAX,
    SILVER_BASELINE_MIN, SILVER_WEIGHT_MAX, SILVER_WEIGHT_MIN, WORST_CASE_WEIGHT,
};
use crate::estimator::{DrawRange, Estimate, estimate_draws};
use crate::inventory::Inventory;
use crate::numbers::clamp_finite;

/// Tunables for lake scoring. Defaults mirror the engine constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default = "RecommenderConfig::default_tie_epsilon")]
    pub tie_epsilon: f64,
    #[serde(default = "RecommenderConfig::default_quick_pick_max_remaining")]
    pub quick_pick_max_remaining: u32,
    #[serde(default = "RecommenderConfig::default_worst_weight")]
    pub worst_weight: f64,
    #[serde(default = "RecommenderConfig::default_best_weight")]
    pub best_weight: f64,
    #[serde(default = "RecommenderConfig::default_silver_baseline_min")]
    pub silver_baseline_min: f64,
    #[serde(default = "RecommenderConfig::default_silver_baseline_max")]
    pub silver_baseline_max: f64,
    #[serde(default = "RecommenderConfig::default_silver_weight_min")]
    pub silver_weight_min: f64,
    #[serde(default = "RecommenderConfig::default_silver_weight_max")]
    pub silver_weight_max: f64,
}

impl RecommenderConfig {
    const fn default_tie_epsilon() -> f64 {
        RECOMMEND_TIE_EPSILON
    }

    const fn default_quick_pick_max_remaining() -> u32 {
        QUICK_PICK_MAX_REMAINING
    }

    const fn default_worst_weight() -> f64 {
        WORST_CASE_WEIGHT
    }

    const fn default_best_weight() -> f64 {
        BEST_CASE_WEIGHT
    }

    const fn default_silver_baseline_min() -> f64 {
        SILVER_BASELINE_MIN
    }

    const fn default_silver_baseline_max() -> f64 {
        SILVER_BASELINE_MAX
    }

    const fn default_silver_weight_min() -> f64 {
        SILVER_WEIGHT_MIN
    }

    const fn default_silver_weight_max() -> f64 {
        SILVER_WEIGHT_MAX
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: Self::default_tie_epsilon(),
            quick_pick_max_remaining: Self::default_quick_pick_max_remaining(),
            worst_weight: Self::default_worst_weight(),
            best_weight: Self::default_best_weight(),
            silver_baseline_min: Self::default_silver_baseline_min(),
            silver_baseline_max: Self::default_silver_baseline_max(),
            silver_weight_min: Self::default_silver_weight_min(),
            silver_weight_max: Self::default_silver_weight_max(),
        }
    }
}

/// Outstanding goal amounts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Shortfall {
    /// Rare fish still needed.
    pub rare: u32,
    /// Silver still needed.
    pub silver: f64,
    /// Full silver goal, the baseline for weighting `silver`.
    pub silver_target: f64,
}

/// Per-lake scoring detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolScore {
    pub pool_id: String,
    pub range: DrawRange,
    pub average_yield: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub pool_id: String,
    /// Follow-up lake after a quick pick.
    pub secondary_pool_id: Option<String>,
    pub estimate: DrawRange,
    pub quick_pick: bool,
}

/// Weight given to the silver objective.
#[must_use]
pub fn silver_weight(shortfall: &Shortfall, cfg: &RecommenderConfig) -> f64 {
    if shortfall.silver <= 0.0 {
        return 0.0;
    }
    let baseline = clamp_finite(
        shortfall.silver_target,
        cfg.silver_baseline_min,
        cfg.silver_baseline_max,
    );
    clamp_finite(
        shortfall.silver / baseline,
        cfg.silver_weight_min,
        cfg.silver_weight_max,
    )
}

fn current_counts(catalog: &LakeCatalog, inventory: &Inventory, pool_id: &str) -> PoolCounts {
    match (catalog.pool(pool_id), inventory.pool(catalog, pool_id)) {
        (Some(config), Some(state)) => state.counts(config),
        (Some(config), None) => config.full_shape(),
        _ => PoolCounts::default(),
    }
}

/// Score every reachable lake for `rare_target`, in catalog order.
#[must_use]
pub fn score_pools(
    catalog: &LakeCatalog,
    inventory: &Inventory,
    rare_target: u32,
    weight: f64,
    cfg: &RecommenderConfig,
) -> Vec<PoolScore> {
    let max_yield = catalog.max_average_yield();
    catalog
        .pools
        .iter()
        .filter_map(|config| {
            let current = current_counts(catalog, inventory, &config.id);
            let range = estimate_draws(current, config.full_shape(), rare_target)?.range()?;
            let average_yield = config.average_yield();
            let yield_share = if max_yield > 0.0 {
                average_yield / max_yield
            } else {
                0.0
            };
            let cost = range.expected
                + cfg.worst_weight * range.worst
                + cfg.best_weight * range.best;
            let score = cost - range.expected * yield_share * weight;
            Some(PoolScore {
                pool_id: config.id.clone(),
                range,
                average_yield,
                score,
            })
        })
        .collect()
}

fn pick_best<'a>(
    scores: impl Iterator<Item = &'a PoolScore>,
    cfg: &RecommenderConfig,
) -> Option<&'a PoolScore> {
    let mut best: Option<&PoolScore> = None;
    for candidate in scores {
        match best {
            Some(current) if candidate.score >= current.score - cfg.tie_epsilon => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Lake whose remaining contents are small and still hold a rare fish.
fn quick_pick(
    catalog: &LakeCatalog,
    inventory: &Inventory,
    cfg: &RecommenderConfig,
) -> Option<(String, DrawRange)> {
    catalog
        .pools
        .iter()
        .filter_map(|config| {
            let current = current_counts(catalog, inventory, &config.id);
            if current.rare == 0 || current.items > cfg.quick_pick_max_remaining {
                return None;
            }
            let range = estimate_draws(current, config.full_shape(), 1)?.range()?;
            Some((config.id.clone(), current.items, range))
        })
        .min_by_key(|(_, items, _)| *items)
        .map(|(id, _, range)| (id, range))
}

/// Recommend a lake for the outstanding goals, or `None` when no rare fish
/// are outstanding or no lake can produce one.
#[must_use]
pub fn recommend(
    catalog: &LakeCatalog,
    inventory: &Inventory,
    shortfall: &Shortfall,
    cfg: &RecommenderConfig,
) -> Option<Recommendation> {
    if shortfall.rare == 0 {
        return None;
    }
    let weight = silver_weight(shortfall, cfg);

    if let Some((quick_id, quick_range)) = quick_pick(catalog, inventory, cfg) {
        let rest = shortfall.rare - 1;
        if rest == 0 {
            return Some(Recommendation {
                pool_id: quick_id,
                secondary_pool_id: None,
                estimate: quick_range,
                quick_pick: true,
            });
        }
        let scores = score_pools(catalog, inventory, rest, weight, cfg);
        let follow = pick_best(scores.iter().filter(|s| s.pool_id != quick_id), cfg);
        if let Some(follow) = follow {
            return Some(Recommendation {
                pool_id: quick_id,
                secondary_pool_id: Some(follow.pool_id.clone()),
                estimate: quick_range + follow.range,
                quick_pick: true,
            });
        }
    }

    let scores = score_pools(catalog, inventory, shortfall.rare, weight, cfg);
    pick_best(scores.iter(), cfg).map(|best| Recommendation {
        pool_id: best.pool_id.clone(),
        secondary_pool_id: None,
        estimate: best.range,
        quick_pick: false,
    })
}

/// Convenience for the unreachable check used by callers that want to grey
/// out lakes without rare fish.
#[must_use]
pub fn is_reachable(catalog: &LakeCatalog, pool_id: &str) -> bool {
    catalog.pool(pool_id).is_some_and(|config| {
        !matches!(
            estimate_draws(config.full_shape(), config.full_shape(), 1),
            Some(Estimate::Unreachable) | None
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CategoryConfig, PoolConfig, Tier};

    fn lake(id: &str, common: u32, rare: u32, weight: f64) -> PoolConfig {
        PoolConfig {
            id: id.into(),
            label: id.into(),
            byproduct_rate: 1.0,
            categories: vec![
                CategoryConfig {
                    id: "common".into(),
                    tier: Tier::Common,
                    full_count: common,
                    weight,
                },
                CategoryConfig {
                    id: "rare".into(),
                    tier: Tier::Rare,
                    full_count: rare,
                    weight,
                },
            ],
        }
    }

    fn catalog() -> LakeCatalog {
        LakeCatalog {
            pools: vec![
                lake("big", 30, 1, 1.0),
                lake("rich", 12, 2, 1.0),
                lake("heavy", 14, 2, 3.0),
            ],
        }
    }

    #[test]
    fn nothing_outstanding_yields_none() {
        let rec = recommend(
            &catalog(),
            &Inventory::new(),
            &Shortfall::default(),
            &RecommenderConfig::default(),
        );
        assert!(rec.is_none());
    }

    #[test]
    fn picks_cheapest_pool_without_silver_goal() {
        let shortfall = Shortfall {
            rare: 2,
            ..Shortfall::default()
        };
        let rec = recommend(
            &catalog(),
            &Inventory::new(),
            &shortfall,
            &RecommenderConfig::default(),
        )
        .unwrap();
        assert_eq!(rec.pool_id, "rich");
        assert!(!rec.quick_pick);
    }

    #[test]
    fn silver_goal_pulls_towards_heavier_fish() {
        let shortfall = Shortfall {
            rare: 2,
            silver: 50_000.0,
            silver_target: 50_000.0,
        };
        let rec = recommend(
            &catalog(),
            &Inventory::new(),
            &shortfall,
            &RecommenderConfig::default(),
        )
        .unwrap();
        assert_eq!(rec.pool_id, "heavy");
    }

    #[test]
    fn silver_weight_is_clamped() {
        let cfg = RecommenderConfig::default();
        let tiny = Shortfall {
            rare: 1,
            silver: 1.0,
            silver_target: 10.0,
        };
        assert!((silver_weight(&tiny, &cfg) - SILVER_WEIGHT_MIN).abs() < 1e-9);
        let huge = Shortfall {
            rare: 1,
            silver: 5_000.0,
            silver_target: 10.0,
        };
        assert!((silver_weight(&huge, &cfg) - SILVER_WEIGHT_MAX).abs() < 1e-9);
        assert!(silver_weight(&Shortfall::default(), &cfg).abs() < f64::EPSILON);

        let narrow = RecommenderConfig {
            silver_weight_min: 0.5,
            silver_weight_max: 0.75,
            ..RecommenderConfig::default()
        };
        assert!((silver_weight(&tiny, &narrow) - 0.5).abs() < 1e-9);
        assert!((silver_weight(&huge, &narrow) - 0.75).abs() < 1e-9);
    }

    fn scored(pool_id: &str, score: f64) -> PoolScore {
        PoolScore {
            pool_id: pool_id.into(),
            range: DrawRange::default(),
            average_yield: 1.0,
            score,
        }
    }

    #[test]
    fn near_ties_keep_the_first_candidate() {
        let cfg = RecommenderConfig::default();
        let a = scored("a", 20.0);
        let b = scored("b", 20.0 - RECOMMEND_TIE_EPSILON / 2.0);
        let forward = [a.clone(), b.clone()];
        let backward = [b, a];
        assert_eq!(pick_best(forward.iter(), &cfg).map(|s| s.pool_id.as_str()), Some("a"));
        assert_eq!(pick_best(backward.iter(), &cfg).map(|s| s.pool_id.as_str()), Some("b"));
    }

    #[test]
    fn strictly_lower_score_wins_beyond_tolerance() {
        let cfg = RecommenderConfig::default();
        let a = scored("a", 20.0);
        let b = scored("b", 20.0 - RECOMMEND_TIE_EPSILON * 3.0);
        let forward = [a.clone(), b.clone()];
        let backward = [b, a];
        assert_eq!(pick_best(forward.iter(), &cfg).map(|s| s.pool_id.as_str()), Some("b"));
        assert_eq!(pick_best(backward.iter(), &cfg).map(|s| s.pool_id.as_str()), Some("b"));
        assert!(pick_best(std::iter::empty::<&PoolScore>(), &cfg).is_none());
    }

    #[test]
    fn selection_ignores_pool_order() {
        let shortfall = Shortfall {
            rare: 3,
            silver: 2_000.0,
            silver_target: 4_000.0,
        };
        let forward = catalog();
        let mut reversed = catalog();
        reversed.pools.reverse();
        let cfg = RecommenderConfig::default();
        let a = recommend(&forward, &Inventory::new(), &shortfall, &cfg).unwrap();
        let b = recommend(&reversed, &Inventory::new(), &shortfall, &cfg).unwrap();
        assert_eq!(a.pool_id, b.pool_id);
    }

    #[test]
    fn quick_pick_drains_small_pool_first() {
        let catalog = catalog();
        let mut inventory = Inventory::new();
        for _ in 0..25 {
            inventory.draw(&catalog, "big", "common");
        }
        let shortfall = Shortfall {
            rare: 3,
            ..Shortfall::default()
        };
        let rec = recommend(&catalog, &inventory, &shortfall, &RecommenderConfig::default())
            .unwrap();
        assert!(rec.quick_pick);
        assert_eq!(rec.pool_id, "big");
        assert_eq!(rec.secondary_pool_id.as_deref(), Some("rich"));

        let single = Shortfall {
            rare: 1,
            ..Shortfall::default()
        };
        let rec = recommend(&catalog, &inventory, &single, &RecommenderConfig::default())
            .unwrap();
        assert_eq!(rec.pool_id, "big");
        assert_eq!(rec.secondary_pool_id, None);
        assert!((rec.estimate.worst - 6.0).abs() < 1e-9);
    }

    #[test]
    fn reachability_follows_full_shape() {
        let mut catalog = catalog();
        catalog.pools.push(lake("barren", 10, 0, 1.0));
        assert!(is_reachable(&catalog, "rich"));
        assert!(!is_reachable(&catalog, "barren"));
        assert!(!is_reachable(&catalog, "missing"));
    }
}
