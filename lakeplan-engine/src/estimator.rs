//! Closed-form draw-count estimates for catching `K` more rare fish.
//!
//! Fish are drawn without replacement from the current lake contents; a lake
//! that runs dry restocks to its full shape. The estimate composes the current
//! partial lake, any whole restocked cycles, and a final partial cycle.
use serde::{Deserialize, Serialize};
use std::ops::Add;

use crate::catalog::PoolCounts;
use crate::numbers::count_to_f64;

/// Best, expected and worst number of draws.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawRange {
    pub best: f64,
    pub expected: f64,
    pub worst: f64,
}

impl DrawRange {
    /// The same draw count in every case.
    #[must_use]
    pub const fn fixed(draws: f64) -> Self {
        Self {
            best: draws,
            expected: draws,
            worst: draws,
        }
    }
}

impl Add for DrawRange {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            best: self.best + rhs.best,
            expected: self.expected + rhs.expected,
            worst: self.worst + rhs.worst,
        }
    }
}

/// A reachable estimate plus how it was composed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawEstimate {
    pub range: DrawRange,
    /// Expected draws until the very next rare fish.
    pub expected_one: Option<f64>,
    /// Complete restocked cycles drawn between the current lake and the last one.
    pub full_pools_before: u32,
    /// Whether the target spills past the current lake contents.
    pub crosses_refill: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimate {
    Reachable(DrawEstimate),
    /// A full lake holds no rare fish, so no number of draws reaches the target.
    Unreachable,
}

impl Estimate {
    #[must_use]
    pub const fn range(&self) -> Option<DrawRange> {
        match self {
            Self::Reachable(estimate) => Some(estimate.range),
            Self::Unreachable => None,
        }
    }
}

/// Expected draws to the next rare fish from `n` items holding `r` rare.
/// `None` when `r == 0`.
#[must_use]
pub fn expected_one(items: u32, rare: u32) -> Option<f64> {
    (rare > 0).then(|| (count_to_f64(items) + 1.0) / (count_to_f64(rare) + 1.0))
}

/// Range for `k <= r` rare fish drawn from `n` items without restocking.
fn within_pool(items: u32, rare: u32, k: u32) -> DrawRange {
    let k_f = count_to_f64(k);
    DrawRange {
        best: k_f,
        expected: k_f * (count_to_f64(items) + 1.0) / (count_to_f64(rare) + 1.0),
        worst: count_to_f64(items.saturating_sub(rare)) + k_f,
    }
}

/// Estimate draws needed to catch `target` more rare fish.
///
/// `current` is what the lake holds now, `full` its restocked shape.
/// Returns `None` when nothing is outstanding.
#[must_use]
pub fn estimate_draws(current: PoolCounts, full: PoolCounts, target: u32) -> Option<Estimate> {
    if target == 0 {
        return None;
    }
    let current = if current.items == 0 { full } else { current };

    if target <= current.rare {
        return Some(Estimate::Reachable(DrawEstimate {
            range: within_pool(current.items, current.rare, target),
            expected_one: expected_one(current.items, current.rare),
            full_pools_before: 0,
            crosses_refill: false,
        }));
    }
    if full.rare == 0 {
        return Some(Estimate::Unreachable);
    }

    let beyond = target - current.rare;
    let full_pools_before = (beyond - 1) / full.rare;
    let leftover = beyond - full_pools_before * full.rare;

    let partial = DrawRange::fixed(count_to_f64(current.items));
    let cycles = DrawRange::fixed(count_to_f64(full_pools_before) * count_to_f64(full.items));
    let last = within_pool(full.items, full.rare, leftover);

    let next_rare = expected_one(current.items, current.rare).or_else(|| {
        expected_one(full.items, full.rare).map(|e| count_to_f64(current.items) + e)
    });

    Some(Estimate::Reachable(DrawEstimate {
        range: partial + cycles + last,
        expected_one: next_rare,
        full_pools_before,
        crosses_refill: true,
    }))
}
