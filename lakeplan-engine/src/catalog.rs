//! Static lake (pool) configuration
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::numbers::count_to_f64;

/// Rarity tier of a fish category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Common,
    Uncommon,
    /// The goal-tracked tier.
    Rare,
}

impl Tier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
        }
    }

    #[must_use]
    pub const fn is_rare(self) -> bool {
        matches!(self, Self::Rare)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fish category within a lake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: String,
    #[serde(default)]
    pub tier: Tier,
    /// Count of this category when the lake is completely full.
    pub full_count: u32,
    /// Average weight of one catch, converted to byproduct currency via the
    /// lake's `byproduct_rate`.
    #[serde(default)]
    pub weight: f64,
}

/// A lake and its full-pool shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Byproduct currency earned per unit of weight caught here.
    #[serde(default = "default_byproduct_rate")]
    pub byproduct_rate: f64,
    pub categories: Vec<CategoryConfig>,
}

const fn default_byproduct_rate() -> f64 {
    1.0
}

/// Item totals of a pool: `items` in total, of which `rare` are goal-tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolCounts {
    pub items: u32,
    pub rare: u32,
}

impl PoolCounts {
    #[must_use]
    pub const fn new(items: u32, rare: u32) -> Self {
        Self { items, rare }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn category(&self, category_id: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    /// Full per-category counts, the state a lake refills to.
    #[must_use]
    pub fn full_counts(&self) -> BTreeMap<String, u32> {
        self.categories
            .iter()
            .map(|c| (c.id.clone(), c.full_count))
            .collect()
    }

    /// Totals for a completely full lake.
    #[must_use]
    pub fn full_shape(&self) -> PoolCounts {
        self.categories.iter().fold(PoolCounts::default(), |acc, c| {
            PoolCounts {
                items: acc.items + c.full_count,
                rare: acc.rare + if c.tier.is_rare() { c.full_count } else { 0 },
            }
        })
    }

    #[must_use]
    pub fn is_rare(&self, category_id: &str) -> bool {
        self.category(category_id).is_some_and(|c| c.tier.is_rare())
    }

    /// Byproduct yield of one catch of `category_id`.
    #[must_use]
    pub fn yield_of(&self, category_id: &str) -> f64 {
        self.category(category_id)
            .map_or(0.0, |c| c.weight * self.byproduct_rate)
    }

    /// Average byproduct yield per draw, weighted over the full distribution.
    #[must_use]
    pub fn average_yield(&self) -> f64 {
        let total = self.full_shape().items;
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .categories
            .iter()
            .map(|c| count_to_f64(c.full_count) * c.weight)
            .sum();
        weighted * self.byproduct_rate / count_to_f64(total)
    }
}

/// Errors raised when lake configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("lake catalog contains no pools")]
    Empty,
    #[error("duplicate pool id '{0}'")]
    DuplicatePool(String),
    #[error("pool '{0}' has no categories")]
    NoCategories(String),
    #[error("pool '{pool}' lists category '{category}' more than once")]
    DuplicateCategory { pool: String, category: String },
    #[error("pool '{0}' holds no items when full")]
    EmptyPool(String),
    #[error("pool '{pool}' has invalid {field} {value}")]
    InvalidNumber {
        pool: String,
        field: &'static str,
        value: f64,
    },
}

/// All configured lakes, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LakeCatalog {
    pub pools: Vec<PoolConfig>,
}

impl LakeCatalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    #[must_use]
    pub fn pool(&self, pool_id: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.id == pool_id)
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = &str> {
        self.pools.iter().map(|p| p.id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Highest average byproduct yield across every lake.
    #[must_use]
    pub fn max_average_yield(&self) -> f64 {
        self.pools
            .iter()
            .map(PoolConfig::average_yield)
            .fold(0.0, f64::max)
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.pools.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::with_capacity(self.pools.len());
        for pool in &self.pools {
            if !seen.insert(pool.id.as_str()) {
                return Err(CatalogError::DuplicatePool(pool.id.clone()));
            }
            if pool.categories.is_empty() {
                return Err(CatalogError::NoCategories(pool.id.clone()));
            }
            if !pool.byproduct_rate.is_finite() || pool.byproduct_rate < 0.0 {
                return Err(CatalogError::InvalidNumber {
                    pool: pool.id.clone(),
                    field: "byproduct_rate",
                    value: pool.byproduct_rate,
                });
            }
            let mut categories = HashSet::with_capacity(pool.categories.len());
            for category in &pool.categories {
                if !categories.insert(category.id.as_str()) {
                    return Err(CatalogError::DuplicateCategory {
                        pool: pool.id.clone(),
                        category: category.id.clone(),
                    });
                }
                if !category.weight.is_finite() || category.weight < 0.0 {
                    return Err(CatalogError::InvalidNumber {
                        pool: pool.id.clone(),
                        field: "weight",
                        value: category.weight,
                    });
                }
            }
            if pool.full_shape().items == 0 {
                return Err(CatalogError::EmptyPool(pool.id.clone()));
            }
        }
        log::debug!("lake catalog validated: {} pools", self.pools.len());
        Ok(())
    }
}
