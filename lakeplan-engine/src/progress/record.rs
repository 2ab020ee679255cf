//! Per-entity progress records and their storage keys.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::constants::{FISHING_HISTORY_KEY_PREFIX, RECORD_KEY_SEPARATOR};
use crate::inventory::Inventory;
use crate::numbers::finite_or_zero;
use crate::route::RouteCursor;

/// Identity of one record. A new `version` is a separate record, never a
/// migration of the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressKey {
    pub entity_id: String,
    pub version: u32,
}

fn storage_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?P<entity>.+)::(?P<version>\d+)$").ok())
        .as_ref()
}

impl ProgressKey {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, version: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            version,
        }
    }

    /// Key of the record inside the progress root, `"{entityId}::{version}"`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}{RECORD_KEY_SEPARATOR}{}", self.entity_id, self.version)
    }

    /// Key of the fishing tool's undo log for this record.
    #[must_use]
    pub fn history_key(&self) -> String {
        format!(
            "{FISHING_HISTORY_KEY_PREFIX}{RECORD_KEY_SEPARATOR}{}",
            self.storage_key()
        )
    }

    /// Recover an identity from a storage key. The entity id may itself
    /// contain the separator; the version is the trailing number.
    #[must_use]
    pub fn parse(storage_key: &str) -> Option<Self> {
        let caps = storage_key_pattern()?.captures(storage_key.trim())?;
        let entity = caps.name("entity")?.as_str();
        let version = caps.name("version")?.as_str().parse().ok()?;
        (!entity.is_empty()).then(|| Self::new(entity, version))
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// User-entered goal amounts for the fishing tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoalInputs {
    #[serde(default)]
    pub legendary_target: u32,
    #[serde(default)]
    pub silver_target: f64,
    #[serde(default)]
    pub silver_have: f64,
    #[serde(default)]
    pub weight: f64,
}

impl GoalInputs {
    /// Copy with non-finite amounts replaced by zero.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            silver_target: finite_or_zero(self.silver_target),
            silver_have: finite_or_zero(self.silver_have),
            weight: finite_or_zero(self.weight),
            ..self
        }
    }
}

/// Everything the fishing calculator keeps for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FishingToolState {
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteCursor>,
    #[serde(default)]
    pub goals: GoalInputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub entity_id: String,
    pub version: u32,
    #[serde(default)]
    pub tasks: BTreeMap<String, bool>,
    /// Group id to task id to done.
    #[serde(default)]
    pub groups: BTreeMap<String, BTreeMap<String, bool>>,
    /// Item id to quantity bought.
    #[serde(default)]
    pub purchases: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fishing: Option<FishingToolState>,
}

impl ProgressRecord {
    #[must_use]
    pub fn empty(key: &ProgressKey) -> Self {
        Self {
            entity_id: key.entity_id.clone(),
            version: key.version,
            tasks: BTreeMap::new(),
            groups: BTreeMap::new(),
            purchases: BTreeMap::new(),
            fishing: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(self.entity_id.clone(), self.version)
    }

    #[must_use]
    pub fn task_done(&self, task_id: &str) -> bool {
        self.tasks.get(task_id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn with_task(mut self, task_id: &str, done: bool) -> Self {
        self.tasks.insert(task_id.to_string(), done);
        self
    }

    #[must_use]
    pub fn with_group_task(mut self, group_id: &str, task_id: &str, done: bool) -> Self {
        self.groups
            .entry(group_id.to_string())
            .or_default()
            .insert(task_id.to_string(), done);
        self
    }

    /// Zero quantities are removed rather than stored.
    #[must_use]
    pub fn with_purchase(mut self, item_id: &str, quantity: u32) -> Self {
        if quantity == 0 {
            self.purchases.remove(item_id);
        } else {
            self.purchases.insert(item_id.to_string(), quantity);
        }
        self
    }
}
