//! Monte Carlo draws used to check the closed-form estimates.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{LakeCatalog, PoolConfig};
use crate::inventory::{DrawOutcome, Inventory, PoolState};
use crate::numbers::count_to_f64;

/// Aggregate of many simulated runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimSummary {
    pub trials: u32,
    pub min: u32,
    pub max: u32,
    pub mean: f64,
}

fn pick_category<'a, R: Rng>(state: &'a PoolState, rng: &mut R) -> Option<&'a str> {
    let total = state.total_remaining();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (id, count) in &state.remaining {
        if roll < *count {
            return Some(id);
        }
        roll -= *count;
    }
    None
}

/// Draw uniformly from `start` (refilling as the lake empties) until
/// `target` rare fish are caught. `None` when a full lake holds no rare fish.
pub fn simulate_draws<R: Rng>(
    config: &PoolConfig,
    start: &PoolState,
    target: u32,
    rng: &mut R,
) -> Option<u32> {
    if target > 0 && config.full_shape().rare == 0 && start.rare_remaining(config) < target {
        return None;
    }
    let lakes = LakeCatalog {
        pools: vec![config.clone()],
    };
    let mut state = start.clone();
    if state.total_remaining() == 0 {
        state.remaining = config.full_counts();
    }
    let mut inventory = Inventory::new();
    inventory.restore_pool(&config.id, state);

    let mut draws = 0;
    let mut caught = 0;
    while caught < target {
        let state = inventory.pools.get(&config.id)?;
        let category = pick_category(state, rng)?.to_string();
        match inventory.draw(&lakes, &config.id, &category) {
            DrawOutcome::Caught { rare, .. } => {
                draws += 1;
                if rare {
                    caught += 1;
                }
            }
            _ => return None,
        }
    }
    Some(draws)
}

/// Run `trials` seeded simulations.
#[must_use]
pub fn run_monte_carlo(
    config: &PoolConfig,
    start: &PoolState,
    target: u32,
    trials: u32,
    seed: u64,
) -> Option<SimSummary> {
    if trials == 0 {
        return None;
    }
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut min = u32::MAX;
    let mut max = 0;
    let mut total = 0.0;
    for _ in 0..trials {
        let draws = simulate_draws(config, start, target, &mut rng)?;
        min = min.min(draws);
        max = max.max(draws);
        total += count_to_f64(draws);
    }
    Some(SimSummary {
        trials,
        min,
        max,
        mean: total / count_to_f64(trials),
    })
}
