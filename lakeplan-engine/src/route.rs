//! Guided routes: ordered, goal-gated steps walked by a small state machine.
//!
//! Evaluation is split in two phases. [`RouteCursor::status`] produces a
//! structured [`StepStatus`]; turning it into text is the job of a
//! [`crate::format::StatusFormatter`].
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use thiserror::Error;

use crate::catalog::LakeCatalog;
use crate::constants::{LOG_ROUTE_ADVANCE, LOG_ROUTE_SWITCH_POOL};
use crate::inventory::Inventory;
use crate::numbers::count_to_f64;

/// Name of the running total used by `gold_target` goals that do not name one.
pub const DEFAULT_GOLD_TOTAL: &str = "gold";

pub type GoalList = SmallVec<[Goal; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    ManualConfirm,
    PoolsCleared,
    LegendaryCaught,
    GoldTarget,
    WeightAtLeast,
    RemainingFishAtMost,
}

impl GoalKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManualConfirm => "manual_confirm",
            Self::PoolsCleared => "pools_cleared",
            Self::LegendaryCaught => "legendary_caught",
            Self::GoldTarget => "gold_target",
            Self::WeightAtLeast => "weight_at_least",
            Self::RemainingFishAtMost => "remaining_fish_at_most",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalScope {
    #[default]
    Pool,
    Total,
}

/// A typed completion predicate attached to a route step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(rename = "type")]
    pub kind: GoalKind,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub scope: GoalScope,
    /// Warn when the live value exceeds this (over-catching).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// The step may be skipped once the live value reaches this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_broken_at: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_message: Option<String>,
    /// Running total read by `gold_target`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
}

impl Goal {
    #[must_use]
    pub fn new(kind: GoalKind, target: f64) -> Self {
        Self {
            kind,
            target,
            scope: GoalScope::Pool,
            max: None,
            skip_at: None,
            warn_broken_at: None,
            warn_message: None,
            total: None,
        }
    }

    #[must_use]
    pub const fn with_scope(mut self, scope: GoalScope) -> Self {
        self.scope = scope;
        self
    }
}

/// "Only do this step while the scoped rare count is below `value`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlyIfBelow {
    #[serde(default)]
    pub scope: GoalScope,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, rename = "goalAll", skip_serializing_if = "SmallVec::is_empty")]
    pub goal_all: GoalList,
    #[serde(default, rename = "goalAny", skip_serializing_if = "SmallVec::is_empty")]
    pub goal_any: GoalList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_below: Option<OnlyIfBelow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_broken_at: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_message: Option<String>,
}

impl RouteStep {
    /// The goals to evaluate and how to combine them. `goalAll` wins over
    /// `goalAny`, which wins over a bare `goal` (a one-element ALL).
    #[must_use]
    pub fn goal_set(&self) -> (Combinator, &[Goal]) {
        if !self.goal_all.is_empty() {
            (Combinator::All, self.goal_all.as_slice())
        } else if !self.goal_any.is_empty() {
            (Combinator::Any, self.goal_any.as_slice())
        } else if let Some(goal) = &self.goal {
            (Combinator::All, std::slice::from_ref(goal))
        } else {
            (Combinator::All, &[][..])
        }
    }
}

/// One named strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<RouteStep>,
}

impl RouteOption {
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteConfigError {
    #[error("route catalog contains no options")]
    Empty,
    #[error("duplicate route option '{0}'")]
    DuplicateOption(String),
    #[error("route option '{0}' has no steps")]
    NoSteps(String),
    #[error("step {index} of route '{option}' has no goals")]
    NoGoals { option: String, index: usize },
    #[error("step {index} of route '{option}' has invalid target {target}")]
    InvalidTarget {
        option: String,
        index: usize,
        target: f64,
    },
    #[error("step {index} of route '{option}' names unknown pool '{pool}'")]
    UnknownPool {
        option: String,
        index: usize,
        pool: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteCatalog {
    pub options: Vec<RouteOption>,
}

impl RouteCatalog {
    /// Parse route configuration and validate it against the known lakes.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str, lakes: &LakeCatalog) -> anyhow::Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate(lakes)?;
        Ok(catalog)
    }

    #[must_use]
    pub fn option(&self, option_id: &str) -> Option<&RouteOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self, lakes: &LakeCatalog) -> Result<(), RouteConfigError> {
        if self.options.is_empty() {
            return Err(RouteConfigError::Empty);
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                return Err(RouteConfigError::DuplicateOption(option.id.clone()));
            }
            if option.steps.is_empty() {
                return Err(RouteConfigError::NoSteps(option.id.clone()));
            }
            for (index, step) in option.steps.iter().enumerate() {
                let (_, goals) = step.goal_set();
                if goals.is_empty() {
                    return Err(RouteConfigError::NoGoals {
                        option: option.id.clone(),
                        index,
                    });
                }
                if let Some(goal) = goals
                    .iter()
                    .find(|g| !g.target.is_finite() || g.target < 0.0)
                {
                    return Err(RouteConfigError::InvalidTarget {
                        option: option.id.clone(),
                        index,
                        target: goal.target,
                    });
                }
                if let Some(pool) = step.pool.as_ref().filter(|p| lakes.pool(p).is_none()) {
                    return Err(RouteConfigError::UnknownPool {
                        option: option.id.clone(),
                        index,
                        pool: pool.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Live values the goals are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct RouteInputs<'a> {
    pub lakes: &'a LakeCatalog,
    pub inventory: &'a Inventory,
    pub active_pool: Option<&'a str>,
    /// User-entered weight for `weight_at_least`.
    pub weight: f64,
}

impl RouteInputs<'_> {
    fn rare_caught(&self, scope: GoalScope, pool: Option<&str>) -> u32 {
        match scope {
            GoalScope::Total => self.inventory.total_rare_caught(),
            GoalScope::Pool => pool
                .and_then(|id| self.inventory.pool(self.lakes, id))
                .map_or(0, |p| p.rare_caught),
        }
    }

    fn broken_attempts(&self) -> u32 {
        self.inventory.trackers.broken_attempts
    }
}

/// Problems surfaced alongside step progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteWarning {
    /// More rare fish caught than the goal allows for.
    OverMax { current: f64, max: f64 },
    BrokenAttempts {
        count: u32,
        threshold: u32,
        message: Option<String>,
    },
}

/// Structured result of evaluating one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub kind: GoalKind,
    pub completed: bool,
    pub current: f64,
    pub target: f64,
    /// The goal's skip threshold has been reached.
    pub skip: bool,
    pub warning: Option<RouteWarning>,
}

/// Structured result of evaluating the current step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    pub index: usize,
    pub action: String,
    pub pool: Option<String>,
    pub combinator: Combinator,
    pub goals: Vec<GoalProgress>,
    pub completed: bool,
    /// Completed by an "only if below" override rather than its goals.
    pub forced: bool,
    pub skippable: bool,
    /// The step wants a different lake than the active one.
    pub switch_to: Option<String>,
    pub warnings: Vec<RouteWarning>,
    pub terminal: bool,
}

impl StepStatus {
    /// Whether auto-advance may move past this step.
    #[must_use]
    pub const fn done(&self) -> bool {
        self.completed || self.skippable
    }
}

fn evaluate_goal(
    goal: &Goal,
    step_pool: Option<&str>,
    inputs: &RouteInputs<'_>,
) -> GoalProgress {
    let pool_state = step_pool.and_then(|id| inputs.inventory.pool(inputs.lakes, id));
    let (current, completed) = match goal.kind {
        GoalKind::ManualConfirm => (0.0, false),
        GoalKind::PoolsCleared => {
            let cleared = count_to_f64(pool_state.as_ref().map_or(0, |p| p.pools_cleared));
            (cleared, cleared >= goal.target)
        }
        GoalKind::LegendaryCaught => {
            let caught = count_to_f64(inputs.rare_caught(goal.scope, step_pool));
            (caught, caught >= goal.target)
        }
        GoalKind::GoldTarget => {
            let name = goal.total.as_deref().unwrap_or(DEFAULT_GOLD_TOTAL);
            let total = inputs.inventory.trackers.running_total(name);
            (total, total >= goal.target)
        }
        GoalKind::WeightAtLeast => (inputs.weight, inputs.weight >= goal.target),
        GoalKind::RemainingFishAtMost => match pool_state.as_ref() {
            Some(state) => {
                let remaining = count_to_f64(state.total_remaining());
                (remaining, remaining <= goal.target)
            }
            None => (0.0, false),
        },
    };

    let warning = match (goal.kind, goal.max) {
        (GoalKind::LegendaryCaught, Some(max)) if current > max => {
            Some(RouteWarning::OverMax { current, max })
        }
        _ => None,
    };

    GoalProgress {
        kind: goal.kind,
        completed,
        current,
        target: goal.target,
        skip: goal.skip_at.is_some_and(|at| current >= at),
        warning,
    }
}

fn broken_warning(
    threshold: Option<u32>,
    message: Option<&String>,
    count: u32,
) -> Option<RouteWarning> {
    let threshold = threshold?;
    (count >= threshold).then(|| RouteWarning::BrokenAttempts {
        count,
        threshold,
        message: message.cloned(),
    })
}

/// Evaluate `option.steps[index]` against `inputs`.
#[must_use]
pub fn evaluate_step(
    option: &RouteOption,
    index: usize,
    inputs: &RouteInputs<'_>,
) -> Option<StepStatus> {
    let step = option.steps.get(index)?;
    let step_pool = step.pool.as_deref().or(inputs.active_pool);
    let (combinator, goal_defs) = step.goal_set();
    let broken = inputs.broken_attempts();

    let mut warnings: Vec<RouteWarning> = Vec::new();
    warnings.extend(broken_warning(
        step.warn_broken_at,
        step.warn_message.as_ref(),
        broken,
    ));
    for goal in goal_defs {
        warnings.extend(broken_warning(
            goal.warn_broken_at,
            goal.warn_message.as_ref(),
            broken,
        ));
    }

    let forced = step
        .only_if_below
        .is_some_and(|gate| inputs.rare_caught(gate.scope, step_pool) >= gate.value);

    let (goals, completed) = if forced {
        (Vec::new(), true)
    } else {
        let goals: Vec<GoalProgress> = goal_defs
            .iter()
            .map(|g| evaluate_goal(g, step_pool, inputs))
            .collect();
        let completed = !goals.is_empty()
            && match combinator {
                Combinator::All => goals.iter().all(|g| g.completed),
                Combinator::Any => goals.iter().any(|g| g.completed),
            };
        (goals, completed)
    };
    warnings.extend(goals.iter().filter_map(|g| g.warning.clone()));

    let switch_to = step
        .pool
        .as_ref()
        .filter(|p| inputs.active_pool != Some(p.as_str()))
        .cloned();

    Some(StepStatus {
        index,
        action: step.action.clone(),
        pool: step.pool.clone(),
        combinator,
        skippable: goals.iter().any(|g| g.skip),
        goals,
        completed,
        forced,
        switch_to,
        warnings,
        terminal: index >= option.last_index(),
    })
}

/// Emitted when the cursor moves on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTransition {
    pub from: usize,
    pub to: usize,
    /// Lake the caller should make active.
    pub switch_pool: Option<String>,
}

/// Position within a route option. States are step indices; the last index
/// is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCursor {
    pub option_id: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default = "default_auto_advance")]
    pub auto_advance: bool,
    /// Completion seen on the previous sync; auto-advance fires on the edge.
    #[serde(default)]
    pub last_completed: bool,
}

const fn default_auto_advance() -> bool {
    true
}

impl RouteCursor {
    #[must_use]
    pub fn new(option_id: impl Into<String>) -> Self {
        Self {
            option_id: option_id.into(),
            index: 0,
            auto_advance: true,
            last_completed: false,
        }
    }

    /// Switch to another strategy, starting over with auto-advance on.
    pub fn select_option(&mut self, option_id: impl Into<String>) {
        *self = Self::new(option_id);
    }

    #[must_use]
    pub fn status(&self, option: &RouteOption, inputs: &RouteInputs<'_>) -> Option<StepStatus> {
        evaluate_step(option, self.index, inputs)
    }

    /// Step forward by one. No-op on the terminal step.
    pub fn advance(&mut self, option: &RouteOption) -> bool {
        if self.index >= option.last_index() {
            return false;
        }
        self.index += 1;
        self.last_completed = false;
        true
    }

    /// Step back by one and stop auto-advancing.
    pub fn back(&mut self) -> bool {
        self.auto_advance = false;
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.last_completed = false;
        true
    }

    /// Jump to `index`, clamped to the step range. Jumping backwards stops
    /// auto-advancing.
    pub fn goto(&mut self, option: &RouteOption, index: usize) {
        let target = index.min(option.last_index());
        if target < self.index {
            self.auto_advance = false;
        }
        if target != self.index {
            self.last_completed = false;
        }
        self.index = target;
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
    }

    /// Re-evaluate and, when auto-advance is on, move past steps whose
    /// completion (or skip condition) has just become true. Arriving at a step
    /// that is already done keeps moving.
    pub fn sync(
        &mut self,
        option: &RouteOption,
        inputs: &RouteInputs<'_>,
    ) -> Option<RouteTransition> {
        let from = self.index;
        let mut switch_pool: Option<String> = None;

        for _ in 0..option.steps.len() {
            let Some(status) = self.status(option, inputs) else {
                break;
            };
            let done = status.done();
            let fire = self.auto_advance && done && !self.last_completed && !status.terminal;
            self.last_completed = done;
            if !fire {
                break;
            }
            self.advance(option);
            log::debug!("{LOG_ROUTE_ADVANCE}: {} -> {}", status.index, self.index);
            if let Some(pool) = option.steps[self.index]
                .pool
                .as_ref()
                .filter(|p| inputs.lakes.pool(p).is_some())
            {
                switch_pool = Some(pool.clone());
            }
        }

        (self.index != from).then(|| {
            if let Some(pool) = &switch_pool {
                log::debug!("{LOG_ROUTE_SWITCH_POOL}: {pool}");
            }
            RouteTransition {
                from,
                to: self.index,
                switch_pool,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CategoryConfig, PoolConfig, Tier};
    use smallvec::smallvec;

    fn lakes() -> LakeCatalog {
        let pool = |id: &str| PoolConfig {
            id: id.into(),
            label: id.into(),
            byproduct_rate: 1.0,
            categories: vec![
                CategoryConfig {
                    id: "common".into(),
                    tier: Tier::Common,
                    full_count: 4,
                    weight: 1.0,
                },
                CategoryConfig {
                    id: "rare".into(),
                    tier: Tier::Rare,
                    full_count: 1,
                    weight: 2.0,
                },
            ],
        };
        LakeCatalog {
            pools: vec![pool("north"), pool("south")],
        }
    }

    fn step(pool: &str, goals: GoalList, any: bool) -> RouteStep {
        RouteStep {
            pool: Some(pool.into()),
            action: format!("fish {pool}"),
            goal: None,
            goal_all: if any { GoalList::new() } else { goals.clone() },
            goal_any: if any { goals } else { GoalList::new() },
            only_if_below: None,
            warn_broken_at: None,
            warn_message: None,
        }
    }

    fn option(steps: Vec<RouteStep>) -> RouteOption {
        RouteOption {
            id: "main".into(),
            name: "Main".into(),
            description: String::new(),
            steps,
        }
    }

    fn inputs<'a>(
        lakes: &'a LakeCatalog,
        inv: &'a Inventory,
        active: &'a str,
    ) -> RouteInputs<'a> {
        RouteInputs {
            lakes,
            inventory: inv,
            active_pool: Some(active),
            weight: 0.0,
        }
    }

    #[test]
    fn goal_all_and_goal_any_combine() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.draw_whole_pool(&lakes, "north");
        let cleared = Goal::new(GoalKind::PoolsCleared, 1.0);
        let weight = Goal::new(GoalKind::WeightAtLeast, 10.0);

        let all = option(vec![step("north", smallvec![cleared.clone(), weight.clone()], false)]);
        let any = option(vec![step("north", smallvec![cleared, weight], true)]);
        let live = inputs(&lakes, &inv, "north");

        assert!(!evaluate_step(&all, 0, &live).unwrap().completed);
        assert!(evaluate_step(&any, 0, &live).unwrap().completed);

        let heavy = RouteInputs { weight: 12.0, ..live };
        assert!(evaluate_step(&all, 0, &heavy).unwrap().completed);
    }

    #[test]
    fn manual_confirm_never_completes() {
        let lakes = lakes();
        let inv = Inventory::new();
        let route = option(vec![step(
            "north",
            smallvec![Goal::new(GoalKind::ManualConfirm, 0.0)],
            false,
        )]);
        let status = evaluate_step(&route, 0, &inputs(&lakes, &inv, "north")).unwrap();
        assert!(!status.completed);
        assert!(status.terminal);
    }

    #[test]
    fn legendary_scope_and_over_max_warning() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.draw(&lakes, "north", "rare");
        inv.draw(&lakes, "south", "rare");
        let mut total = Goal::new(GoalKind::LegendaryCaught, 2.0).with_scope(GoalScope::Total);
        total.max = Some(1.0);
        let pool_only = Goal::new(GoalKind::LegendaryCaught, 2.0);

        let route = option(vec![
            step("north", smallvec![total], false),
            step("north", smallvec![pool_only], false),
        ]);
        let live = inputs(&lakes, &inv, "north");
        let first = evaluate_step(&route, 0, &live).unwrap();
        assert!(first.completed);
        assert_eq!(
            first.warnings,
            vec![RouteWarning::OverMax {
                current: 2.0,
                max: 1.0
            }]
        );
        assert!(!evaluate_step(&route, 1, &live).unwrap().completed);
    }

    #[test]
    fn only_if_below_forces_completion() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.draw(&lakes, "north", "rare");
        let mut gated = step(
            "north",
            smallvec![Goal::new(GoalKind::ManualConfirm, 0.0)],
            false,
        );
        gated.only_if_below = Some(OnlyIfBelow {
            scope: GoalScope::Total,
            value: 1,
        });
        let route = option(vec![gated]);
        let status = evaluate_step(&route, 0, &inputs(&lakes, &inv, "north")).unwrap();
        assert!(status.completed);
        assert!(status.forced);
        assert!(status.goals.is_empty());
    }

    #[test]
    fn off_path_and_broken_threshold() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.trackers.broken_attempts = 3;
        let mut s = step(
            "south",
            smallvec![Goal::new(GoalKind::RemainingFishAtMost, 2.0)],
            false,
        );
        s.warn_broken_at = Some(3);
        let route = option(vec![s]);
        let status = evaluate_step(&route, 0, &inputs(&lakes, &inv, "north")).unwrap();
        assert_eq!(status.switch_to.as_deref(), Some("south"));
        assert!(!status.completed);
        assert_eq!(
            status.warnings,
            vec![RouteWarning::BrokenAttempts {
                count: 3,
                threshold: 3,
                message: None
            }]
        );
    }

    #[test]
    fn auto_advance_fires_on_completion_and_switches_pool() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        let route = option(vec![
            step(
                "north",
                smallvec![Goal::new(GoalKind::PoolsCleared, 1.0)],
                false,
            ),
            step(
                "south",
                smallvec![Goal::new(GoalKind::PoolsCleared, 1.0)],
                false,
            ),
        ]);
        let mut cursor = RouteCursor::new("main");
        assert_eq!(cursor.sync(&route, &inputs(&lakes, &inv, "north")), None);

        inv.draw_whole_pool(&lakes, "north");
        let transition = cursor.sync(&route, &inputs(&lakes, &inv, "north")).unwrap();
        assert_eq!(transition.from, 0);
        assert_eq!(transition.to, 1);
        assert_eq!(transition.switch_pool.as_deref(), Some("south"));

        // terminal step: completion does not advance further
        inv.draw_whole_pool(&lakes, "south");
        assert_eq!(cursor.sync(&route, &inputs(&lakes, &inv, "south")), None);
        assert_eq!(cursor.index, 1);
        assert!(!cursor.advance(&route));
    }

    #[test]
    fn going_back_disables_auto_advance() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.draw_whole_pool(&lakes, "north");
        let route = option(vec![
            step(
                "north",
                smallvec![Goal::new(GoalKind::PoolsCleared, 1.0)],
                false,
            ),
            step(
                "north",
                smallvec![Goal::new(GoalKind::ManualConfirm, 0.0)],
                false,
            ),
        ]);
        let mut cursor = RouteCursor::new("main");
        cursor.goto(&route, 7);
        assert_eq!(cursor.index, 1);
        assert!(cursor.auto_advance);
        assert!(cursor.back());
        assert!(!cursor.auto_advance);
        assert_eq!(cursor.sync(&route, &inputs(&lakes, &inv, "north")), None);
        assert_eq!(cursor.index, 0);

        cursor.select_option("main");
        assert!(cursor.auto_advance);
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn skip_threshold_advances() {
        let lakes = lakes();
        let mut inv = Inventory::new();
        inv.trackers.running_totals.insert("gold".into(), 600.0);
        let mut gold = Goal::new(GoalKind::GoldTarget, 1_000.0);
        gold.skip_at = Some(500.0);
        let route = option(vec![
            step("north", smallvec![gold], false),
            step(
                "north",
                smallvec![Goal::new(GoalKind::ManualConfirm, 0.0)],
                false,
            ),
        ]);
        let mut cursor = RouteCursor::new("main");
        let status = cursor.status(&route, &inputs(&lakes, &inv, "north")).unwrap();
        assert!(!status.completed);
        assert!(status.skippable);
        let transition = cursor.sync(&route, &inputs(&lakes, &inv, "north")).unwrap();
        assert_eq!(transition.to, 1);
        assert_eq!(transition.switch_pool.as_deref(), Some("north"));
    }

    #[test]
    fn step_json_accepts_goal_keys() {
        let json = r#"{"options":[{"id":"a","steps":[
            {"pool":"north","action":"clear","goal":{"type":"pools_cleared","target":2}},
            {"action":"both","goalAny":[{"type":"weight_at_least","target":5},{"type":"gold_target","target":10,"total":"coins"}]}
        ]}]}"#;
        let routes = RouteCatalog::from_json(json, &lakes()).unwrap();
        let option = routes.option("a").unwrap();
        assert_eq!(option.steps[0].goal_set().0, Combinator::All);
        assert_eq!(option.steps[1].goal_set().0, Combinator::Any);
        assert_eq!(option.steps[1].goal_set().1.len(), 2);

        let bad = r#"{"options":[{"id":"a","steps":[{"pool":"west","action":"x","goal":{"type":"manual_confirm"}}]}]}"#;
        assert!(RouteCatalog::from_json(bad, &lakes()).is_err());
    }
}
