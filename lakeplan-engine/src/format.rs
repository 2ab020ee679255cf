//! Display strings for route status
use crate::constants::{
    BROKEN_WARNING_KEY, DEFAULT_BROKEN_WARNING, FORCED_COMPLETE_KEY, FORCED_COMPLETE_LABEL,
    GOAL_KEY_PREFIX, OVER_MAX_KEY, SWITCH_POOL_KEY,
};
use crate::route::{Combinator, GoalKind, GoalProgress, RouteWarning, StepStatus};

/// Turns structured route status into text. Swap the implementation to
/// localize or restyle without touching goal evaluation.
pub trait StatusFormatter {
    fn goal_label(&self, goal: &GoalProgress) -> String;

    fn warning_label(&self, warning: &RouteWarning) -> String;

    fn switch_label(&self, pool_id: &str) -> String;

    fn forced_label(&self) -> String;

    /// One line per concern: the action, the switch directive, goal progress
    /// (or the forced-completion label) and then warnings.
    fn step_lines(&self, status: &StepStatus) -> Vec<String> {
        let mut lines = vec![status.action.clone()];
        if let Some(pool) = &status.switch_to {
            lines.push(self.switch_label(pool));
        }
        if status.forced {
            lines.push(self.forced_label());
        } else {
            let joiner = match status.combinator {
                Combinator::All => " and ",
                Combinator::Any => " or ",
            };
            let goals: Vec<String> = status.goals.iter().map(|g| self.goal_label(g)).collect();
            if !goals.is_empty() {
                lines.push(goals.join(joiner));
            }
        }
        lines.extend(status.warnings.iter().map(|w| self.warning_label(w)));
        lines
    }
}

/// Plain English labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

fn mark(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

impl StatusFormatter for PlainFormatter {
    fn goal_label(&self, goal: &GoalProgress) -> String {
        let m = mark(goal.completed);
        let (current, target) = (goal.current, goal.target);
        match goal.kind {
            GoalKind::ManualConfirm => format!("{m} confirm when done"),
            GoalKind::PoolsCleared => format!("{m} {current:.0}/{target:.0} pools cleared"),
            GoalKind::LegendaryCaught => format!("{m} {current:.0}/{target:.0} legendary caught"),
            GoalKind::GoldTarget => format!("{m} {current:.0}/{target:.0} gold"),
            GoalKind::WeightAtLeast => format!("{m} weight {current:.1}/{target:.1}"),
            GoalKind::RemainingFishAtMost => {
                format!("{m} {current:.0} fish left (at most {target:.0})")
            }
        }
    }

    fn warning_label(&self, warning: &RouteWarning) -> String {
        match warning {
            RouteWarning::OverMax { current, max } => {
                format!("! {current:.0} caught, more than the {max:.0} this step needs")
            }
            RouteWarning::BrokenAttempts {
                count,
                threshold,
                message,
            } => match message {
                Some(text) => format!("! {text}"),
                None => format!("! {DEFAULT_BROKEN_WARNING} ({count}/{threshold})"),
            },
        }
    }

    fn switch_label(&self, pool_id: &str) -> String {
        format!("-> switch to {pool_id}")
    }

    fn forced_label(&self) -> String {
        format!("[x] {FORCED_COMPLETE_LABEL}")
    }
}

/// Emits message keys followed by their arguments, for hosts that look the
/// text up in their own translation tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFormatter;

const fn goal_key(kind: GoalKind) -> &'static str {
    match kind {
        GoalKind::ManualConfirm => "manual-confirm",
        GoalKind::PoolsCleared => "pools-cleared",
        GoalKind::LegendaryCaught => "legendary-caught",
        GoalKind::GoldTarget => "gold-target",
        GoalKind::WeightAtLeast => "weight-at-least",
        GoalKind::RemainingFishAtMost => "remaining-fish-at-most",
    }
}

impl StatusFormatter for KeyFormatter {
    fn goal_label(&self, goal: &GoalProgress) -> String {
        format!(
            "{GOAL_KEY_PREFIX}.{} current={} target={} done={}",
            goal_key(goal.kind),
            goal.current,
            goal.target,
            goal.completed
        )
    }

    fn warning_label(&self, warning: &RouteWarning) -> String {
        match warning {
            RouteWarning::OverMax { current, max } => {
                format!("{OVER_MAX_KEY} current={current} max={max}")
            }
            RouteWarning::BrokenAttempts {
                count,
                threshold,
                message,
            } => match message {
                Some(text) => text.clone(),
                None => format!("{BROKEN_WARNING_KEY} count={count} threshold={threshold}"),
            },
        }
    }

    fn switch_label(&self, pool_id: &str) -> String {
        format!("{SWITCH_POOL_KEY} pool={pool_id}")
    }

    fn forced_label(&self) -> String {
        FORCED_COMPLETE_KEY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> StepStatus {
        StepStatus {
            index: 0,
            action: "Clear the north lake".into(),
            pool: Some("north".into()),
            combinator: Combinator::Any,
            goals: vec![
                GoalProgress {
                    kind: GoalKind::PoolsCleared,
                    completed: false,
                    current: 1.0,
                    target: 3.0,
                    skip: false,
                    warning: None,
                },
                GoalProgress {
                    kind: GoalKind::WeightAtLeast,
                    completed: true,
                    current: 12.5,
                    target: 10.0,
                    skip: false,
                    warning: None,
                },
            ],
            completed: true,
            forced: false,
            skippable: false,
            switch_to: Some("north".into()),
            warnings: vec![RouteWarning::BrokenAttempts {
                count: 4,
                threshold: 3,
                message: Some("rods are breaking".into()),
            }],
            terminal: false,
        }
    }

    #[test]
    fn plain_lines_cover_every_concern() {
        let lines = PlainFormatter.step_lines(&status());
        assert_eq!(
            lines,
            vec![
                "Clear the north lake".to_string(),
                "-> switch to north".to_string(),
                "[ ] 1/3 pools cleared or [x] weight 12.5/10.0".to_string(),
                "! rods are breaking".to_string(),
            ]
        );
    }

    #[test]
    fn forced_steps_hide_goal_progress() {
        let mut forced = status();
        forced.forced = true;
        forced.switch_to = None;
        forced.warnings.clear();
        let lines = PlainFormatter.step_lines(&forced);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "[x] already satisfied, skip ahead");
    }

    #[test]
    fn plain_default_warning_reads_as_text() {
        let mut st = status();
        st.warnings = vec![RouteWarning::BrokenAttempts {
            count: 5,
            threshold: 3,
            message: None,
        }];
        let lines = PlainFormatter.step_lines(&st);
        assert_eq!(lines.last().unwrap(), "! lines keep breaking (5/3)");
        assert!(lines.iter().all(|line| !line.contains("route.")));
    }

    #[test]
    fn key_formatter_emits_message_keys() {
        let mut st = status();
        st.warnings = vec![RouteWarning::BrokenAttempts {
            count: 5,
            threshold: 3,
            message: None,
        }];
        let lines = KeyFormatter.step_lines(&st);
        assert_eq!(lines[1], "route.step.switch-pool pool=north");
        assert!(lines[2].starts_with("route.goal.pools-cleared current=1 target=3 done=false"));
        assert_eq!(lines[3], "route.warn.broken-attempts count=5 threshold=3");

        st.forced = true;
        assert!(KeyFormatter.step_lines(&st).contains(&FORCED_COMPLETE_KEY.to_string()));
    }
}
