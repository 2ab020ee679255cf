use anyhow::{Context, Result, bail, ensure};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::rc::Rc;

use super::{ScenarioCtx, TestScenario};
use lakeplan_engine::{
    ByteStore, ClearOutcome, Clock, DrawOutcome, Estimate, FishingSession, GoalInputs, GoalKind,
    Inventory, LakeCatalog, MemoryByteStore, PlannerEngine, PoolConfig, PoolState, ProgressKey,
    ProgressStore, Recommendation, RecommenderConfig, RouteCatalog, Shortfall, TickingClock,
    Trackers, UndoOutcome, estimate_draws, is_reachable, recommend, run_monte_carlo, score_pools,
    silver_weight,
};

const EPS: f64 = 1e-9;
const SIMULATION_TRIALS: u32 = 2_000;
const INVENTORY_STEPS: usize = 300;
/// Stays below the persisted history window so a reopened session can
/// still undo every step.
const UNDO_STEPS: usize = 40;
const ROUTE_TURN_LIMIT: usize = 5_000;
const ROUTE_STALL_LIMIT: usize = 400;

pub fn catalog_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "estimator-bounds",
            "Estimator Range Ordering",
            estimator_bounds_expectation,
        ),
        TestScenario::new(
            "estimator-vs-simulation",
            "Estimator Against Monte Carlo Draws",
            estimator_simulation_expectation,
        ),
        TestScenario::new(
            "inventory-invariants",
            "Inventory Bookkeeping Invariants",
            inventory_invariants_expectation,
        ),
        TestScenario::new(
            "undo-roundtrip",
            "Undo Restores Every Logged Change",
            undo_roundtrip_expectation,
        ),
        TestScenario::new(
            "recommender-ordering",
            "Recommendation Independent of Lake Order",
            recommender_ordering_expectation,
        ),
        TestScenario::new(
            "route-walkthrough",
            "Guided Route Walkthrough",
            route_walkthrough_expectation,
        ),
        TestScenario::new(
            "export-roundtrip",
            "Export Code Roundtrip",
            export_roundtrip_expectation,
        ),
    ]
}

fn seeded(ctx: &ScenarioCtx<'_>) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(ctx.seed)
}

fn pick_pool<'a, R: Rng>(lakes: &'a LakeCatalog, rng: &mut R) -> Result<&'a PoolConfig> {
    lakes.pools.choose(rng).context("lake catalog is empty")
}

/// A partially fished lake with at least one fish left.
fn random_state<R: Rng>(config: &PoolConfig, rng: &mut R) -> PoolState {
    let mut state = PoolState::full(config);
    for category in &config.categories {
        state
            .remaining
            .insert(category.id.clone(), rng.gen_range(0..=category.full_count));
    }
    if state.total_remaining() == 0 {
        state = PoolState::full(config);
    }
    state
}

/// Category of the next fish, weighted by what is left in the lake.
fn weighted_category<R: Rng>(state: &PoolState, rng: &mut R) -> Option<String> {
    let total = state.total_remaining();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (id, count) in &state.remaining {
        if roll < *count {
            return Some(id.clone());
        }
        roll -= *count;
    }
    None
}

fn ensure_bounded(lakes: &LakeCatalog, inventory: &Inventory, step: usize) -> Result<()> {
    for config in &lakes.pools {
        let state = inventory
            .pool(lakes, &config.id)
            .with_context(|| format!("missing lake {}", config.id))?;
        let total = state.total_remaining();
        ensure!(total > 0, "step {step}: {} observed empty", config.id);
        ensure!(
            total <= config.full_shape().items,
            "step {step}: {} holds {total} fish, more than a full lake",
            config.id
        );
        for category in &config.categories {
            ensure!(
                state.remaining_of(&category.id) <= category.full_count,
                "step {step}: {}/{} above its full count",
                config.id,
                category.id
            );
        }
    }
    let summed: u32 = inventory.pools.values().map(|p| p.rare_caught).sum();
    ensure!(
        inventory.total_rare_caught() == summed,
        "step {step}: rare total {} disagrees with per-lake sum {summed}",
        inventory.total_rare_caught()
    );
    Ok(())
}

fn estimator_bounds_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    for config in &ctx.assets.lakes.pools {
        let state = random_state(config, &mut rng);
        let current = state.counts(config);
        let full = config.full_shape();
        let target = rng.gen_range(1..=6);

        ensure!(
            estimate_draws(current, full, 0).is_none(),
            "{}: a zero target should need no estimate",
            config.id
        );
        let estimate = estimate_draws(current, full, target)
            .with_context(|| format!("{}: no estimate for {target} rare", config.id))?;
        match estimate {
            Estimate::Unreachable => ensure!(
                full.rare == 0 && current.rare < target,
                "{}: reported unreachable with {} rare left and {} per full lake",
                config.id,
                current.rare,
                full.rare
            ),
            Estimate::Reachable(found) => {
                let range = found.range;
                ensure!(
                    range.best <= range.expected + EPS && range.expected <= range.worst + EPS,
                    "{}: range out of order {range:?}",
                    config.id
                );
                ensure!(
                    range.best + EPS >= f64::from(target),
                    "{}: best case {} below the {target} rare wanted",
                    config.id,
                    range.best
                );
                ensure!(
                    found.crosses_refill == (target > current.rare),
                    "{}: refill crossing misreported for {target} of {} rare",
                    config.id,
                    current.rare
                );
                if found.crosses_refill {
                    ensure!(
                        range.best + EPS >= f64::from(current.items),
                        "{}: crossing a refill must empty the {} fish left first",
                        config.id,
                        current.items
                    );
                }
                if let Some(Estimate::Reachable(next)) = estimate_draws(current, full, target + 1)
                {
                    ensure!(
                        next.range.expected + EPS >= range.expected,
                        "{}: one more rare fish lowered the expected draws",
                        config.id
                    );
                }
            }
        }
    }
    Ok(())
}

fn estimator_simulation_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let lakes = &ctx.assets.lakes;
    for config in lakes.pools.iter().filter(|c| c.full_shape().rare > 0) {
        let start = random_state(config, &mut rng);
        let target = rng.gen_range(1..=3);
        let Some(Estimate::Reachable(estimate)) =
            estimate_draws(start.counts(config), config.full_shape(), target)
        else {
            bail!("{}: expected a reachable estimate", config.id);
        };
        let range = estimate.range;
        let summary = run_monte_carlo(config, &start, target, SIMULATION_TRIALS, rng.next_u64())
            .with_context(|| format!("{}: simulation never reached {target} rare", config.id))?;

        if ctx.verbose {
            println!(
                "     {} target {target}: expected {:.2} simulated {:.2} (min {} max {})",
                config.id, range.expected, summary.mean, summary.min, summary.max
            );
        }

        let tolerance = (range.expected * 0.06).max(1.0);
        ensure!(
            (summary.mean - range.expected).abs() <= tolerance,
            "{}: simulated mean {:.2} strays from expected {:.2} by more than {tolerance:.2}",
            config.id,
            summary.mean,
            range.expected
        );
        ensure!(
            f64::from(summary.min) + EPS >= range.best,
            "{}: a run needed {} draws, below the best case {}",
            config.id,
            summary.min,
            range.best
        );
        ensure!(
            f64::from(summary.max) <= range.worst + EPS,
            "{}: a run needed {} draws, above the worst case {}",
            config.id,
            summary.max,
            range.worst
        );
    }
    Ok(())
}

fn inventory_invariants_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let lakes = &ctx.assets.lakes;
    let mut inventory = Inventory::new();

    for step in 0..INVENTORY_STEPS {
        let config = pick_pool(lakes, &mut rng)?;
        let full = config.full_shape();
        let before = inventory
            .pool(lakes, &config.id)
            .with_context(|| format!("missing lake {}", config.id))?;

        match rng.gen_range(0..24) {
            0 => {
                let outcome = inventory.draw_whole_pool(lakes, &config.id);
                let expected = ClearOutcome::Cleared {
                    items: before.total_remaining(),
                    rare: before.rare_remaining(config),
                };
                ensure!(
                    outcome == expected,
                    "step {step}: clearing {} gave {outcome:?}, expected {expected:?}",
                    config.id
                );
                let after = inventory.pool(lakes, &config.id).unwrap_or_default();
                ensure!(
                    after.pools_cleared == before.pools_cleared + 1
                        && after.total_remaining() == full.items,
                    "step {step}: {} was not restocked after clearing",
                    config.id
                );
            }
            1 => {
                inventory.reset_pool(lakes, &config.id);
                let after = inventory.pool(lakes, &config.id).unwrap_or_default();
                ensure!(
                    after.remaining == config.full_counts()
                        && after.pools_cleared == before.pools_cleared
                        && after.rare_caught == before.rare_caught,
                    "step {step}: restocking {} touched its counters",
                    config.id
                );
            }
            2 => {
                inventory.reset_pool_progress(lakes, &config.id);
                let after = inventory.pool(lakes, &config.id).unwrap_or_default();
                ensure!(
                    after == PoolState::full(config),
                    "step {step}: {} kept progress after a progress reset",
                    config.id
                );
            }
            _ => {
                let category = config
                    .categories
                    .choose(&mut rng)
                    .with_context(|| format!("{} has no categories", config.id))?;
                let outcome = inventory.draw(lakes, &config.id, &category.id);
                let after = inventory.pool(lakes, &config.id).unwrap_or_default();
                match outcome {
                    DrawOutcome::Exhausted => ensure!(
                        after == before,
                        "step {step}: exhausted draw changed {}",
                        config.id
                    ),
                    DrawOutcome::Caught { rare, refilled } => {
                        ensure!(
                            rare == category.tier.is_rare(),
                            "step {step}: {} misreported its tier",
                            category.id
                        );
                        ensure!(
                            after.fish_caught == before.fish_caught + 1,
                            "step {step}: fish counter did not move"
                        );
                        ensure!(
                            refilled == (before.total_remaining() == 1),
                            "step {step}: refill reported {refilled} with {} fish left",
                            before.total_remaining()
                        );
                        if refilled {
                            ensure!(
                                after.pools_cleared == before.pools_cleared + 1
                                    && after.remaining == config.full_counts(),
                                "step {step}: emptied {} did not restock",
                                config.id
                            );
                        } else {
                            ensure!(
                                after.remaining_of(&category.id) + 1
                                    == before.remaining_of(&category.id),
                                "step {step}: {} count did not drop by one",
                                category.id
                            );
                        }
                    }
                    other => bail!("step {step}: unexpected draw outcome {other:?}"),
                }
            }
        }
        ensure_bounded(lakes, &inventory, step)?;
    }
    Ok(())
}

type SessionView = (Vec<PoolState>, Trackers);

/// Every lake as the user would see it, plus the trackers.
fn session_view<S: ByteStore, C: Clock>(session: &FishingSession<'_, S, C>) -> SessionView {
    let pools = session
        .lakes()
        .pool_ids()
        .filter_map(|id| session.pool(id))
        .collect();
    (pools, session.inventory().trackers.clone())
}

/// Apply one random logged operation, returning a label for failure reports.
fn random_mutation<S: ByteStore, C: Clock, R: Rng>(
    session: &mut FishingSession<'_, S, C>,
    lakes: &LakeCatalog,
    rng: &mut R,
) -> Result<String> {
    let config = pick_pool(lakes, rng)?;
    let label = match rng.gen_range(0..20) {
        0 => {
            session.draw_whole_pool(&config.id)?;
            format!("clear {}", config.id)
        }
        1 => {
            session.reset_pool(&config.id)?;
            format!("restock {}", config.id)
        }
        2 => {
            session.reset_pool_progress(&config.id)?;
            format!("reset {}", config.id)
        }
        3 => {
            session.reset_all()?;
            "reset all".to_string()
        }
        4 => {
            let delta = rng.gen_range(-2..=3);
            session.bump_broken_attempts(delta)?;
            format!("broken attempts {delta:+}")
        }
        5 => {
            let gold = f64::from(rng.gen_range(0..900_u32));
            session.set_running_total("gold", gold)?;
            format!("gold = {gold}")
        }
        _ => {
            let category = config
                .categories
                .choose(rng)
                .with_context(|| format!("{} has no categories", config.id))?;
            let outcome = session.draw(&config.id, &category.id)?;
            format!("draw {}/{} ({outcome:?})", config.id, category.id)
        }
    };
    Ok(label)
}

fn undo_roundtrip_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let assets = ctx.assets;
    let key = ProgressKey::new("qa-angler", 1);
    let mut store = ProgressStore::open(MemoryByteStore::new())?;

    let mut snapshots: Vec<(String, SessionView)> = Vec::new();
    let final_view = {
        let mut session = FishingSession::open_with_clock(
            &mut store,
            key.clone(),
            Rc::clone(&assets.lakes),
            Rc::clone(&assets.routes),
            TickingClock::starting_at(0),
        )?;
        for step in 0..UNDO_STEPS {
            let before = session_view(&session);
            let logged = session.history().len();
            let label = random_mutation(&mut session, &assets.lakes, &mut rng)?;
            if session.history().len() > logged {
                snapshots.push((label, before));
            } else {
                ensure!(
                    session_view(&session) == before,
                    "step {step}: '{label}' changed progress without an undo entry"
                );
            }
        }
        session_view(&session)
    };

    let mut session = FishingSession::open_with_clock(
        &mut store,
        key,
        Rc::clone(&assets.lakes),
        Rc::clone(&assets.routes),
        TickingClock::starting_at(1_000),
    )?;
    ensure!(
        session_view(&session) == final_view,
        "reopened session differs from the saved one"
    );
    ensure!(
        session.history().len() == snapshots.len(),
        "reopened session has {} undo entries, expected {}",
        session.history().len(),
        snapshots.len()
    );

    while let Some((label, expected)) = snapshots.pop() {
        let outcome = session.undo()?;
        ensure!(
            matches!(outcome, UndoOutcome::Restored { .. }),
            "undo of '{label}' found nothing to restore"
        );
        ensure!(
            session_view(&session) == expected,
            "undo of '{label}' did not restore the prior state"
        );
    }
    ensure!(
        session.undo()? == UndoOutcome::Empty,
        "undo log should be empty after undoing every step"
    );
    Ok(())
}

fn remaining_items(lakes: &LakeCatalog, inventory: &Inventory, pool_id: &str) -> Option<u32> {
    inventory
        .pool(lakes, pool_id)
        .map(|state| state.total_remaining())
}

/// Two picks are equivalent when they are the same lake or only differ by a
/// tie the recommender is allowed to break either way.
fn ensure_equivalent(
    lakes: &LakeCatalog,
    inventory: &Inventory,
    shortfall: &Shortfall,
    cfg: &RecommenderConfig,
    a: &Recommendation,
    b: &Recommendation,
) -> Result<()> {
    if a.pool_id == b.pool_id {
        return Ok(());
    }
    ensure!(
        a.quick_pick == b.quick_pick,
        "{} and {} disagree on quick pick",
        a.pool_id,
        b.pool_id
    );
    if a.quick_pick {
        let left = remaining_items(lakes, inventory, &a.pool_id);
        let right = remaining_items(lakes, inventory, &b.pool_id);
        ensure!(
            left == right,
            "quick picks {} ({left:?} left) and {} ({right:?} left) are not tied",
            a.pool_id,
            b.pool_id
        );
        return Ok(());
    }
    let scores = score_pools(
        lakes,
        inventory,
        shortfall.rare,
        silver_weight(shortfall, cfg),
        cfg,
    );
    let score_of = |id: &str| {
        scores
            .iter()
            .find(|s| s.pool_id == id)
            .map(|s| s.score)
            .with_context(|| format!("{id} was recommended but not scored"))
    };
    let (left, right) = (score_of(&a.pool_id)?, score_of(&b.pool_id)?);
    ensure!(
        (left - right).abs() <= cfg.tie_epsilon + EPS,
        "{} scored {left:.4} but {} scored {right:.4}",
        a.pool_id,
        b.pool_id
    );
    Ok(())
}

fn recommender_ordering_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let lakes = ctx.assets.lakes.as_ref();
    let cfg = RecommenderConfig::default();

    let mut inventory = Inventory::new();
    for _ in 0..rng.gen_range(0..120) {
        let config = pick_pool(lakes, &mut rng)?;
        let state = inventory.pool(lakes, &config.id).unwrap_or_default();
        if let Some(category) = weighted_category(&state, &mut rng) {
            inventory.draw(lakes, &config.id, &category);
        }
    }

    let silver_target = f64::from(rng.gen_range(0..20_000_u32));
    let shortfall = Shortfall {
        rare: rng.gen_range(0..=5),
        silver: silver_target * rng.gen_range(0.0..=1.0),
        silver_target,
    };
    let baseline = recommend(lakes, &inventory, &shortfall, &cfg);
    if shortfall.rare == 0 {
        ensure!(
            baseline.is_none(),
            "nothing outstanding but got a recommendation"
        );
        return Ok(());
    }

    if let Some(pick) = &baseline {
        ensure!(
            is_reachable(lakes, &pick.pool_id),
            "recommended {} cannot produce rare fish",
            pick.pool_id
        );
        let range = pick.estimate;
        ensure!(
            range.best <= range.expected + EPS && range.expected <= range.worst + EPS,
            "recommended range out of order {range:?}"
        );
        if let Some(secondary) = &pick.secondary_pool_id {
            ensure!(
                pick.quick_pick && secondary != &pick.pool_id,
                "follow-up lake {secondary} without a distinct quick pick"
            );
        }
    }

    let mut reversed = lakes.clone();
    reversed.pools.reverse();
    let mut rotated = lakes.clone();
    rotated
        .pools
        .rotate_left(rng.gen_range(0..lakes.pools.len().max(1)));
    let mut shuffled = lakes.clone();
    shuffled.pools.shuffle(&mut rng);

    for (label, permuted) in [
        ("reversed", reversed),
        ("rotated", rotated),
        ("shuffled", shuffled),
    ] {
        let pick = recommend(&permuted, &inventory, &shortfall, &cfg);
        match (&baseline, &pick) {
            (None, None) => {}
            (Some(a), Some(b)) => ensure_equivalent(lakes, &inventory, &shortfall, &cfg, a, b)
                .with_context(|| format!("{label} catalog, {shortfall:?}"))?,
            _ => bail!("{label} catalog changed whether anything is recommended"),
        }
    }
    Ok(())
}

/// Satisfy the step's non-fishing goals by hand. Returns whether the step
/// needs a manual confirmation.
fn satisfy_side_goals<S: ByteStore, C: Clock>(
    session: &mut FishingSession<'_, S, C>,
    option_index: usize,
    step_index: usize,
    routes: &RouteCatalog,
) -> Result<bool> {
    let step = routes
        .options
        .get(option_index)
        .and_then(|option| option.steps.get(step_index))
        .context("route step vanished")?;
    let (_, goals) = step.goal_set();
    let mut manual = false;
    for goal in goals {
        match goal.kind {
            GoalKind::GoldTarget => {
                let name = goal.total.as_deref().unwrap_or("gold");
                if session.inventory().trackers.running_total(name) < goal.target {
                    session.set_running_total(name, goal.target)?;
                }
            }
            GoalKind::WeightAtLeast if session.state().goals.weight < goal.target => {
                let goals = GoalInputs {
                    weight: goal.target,
                    ..session.state().goals
                };
                session.set_goals(goals)?;
            }
            GoalKind::ManualConfirm => manual = true,
            _ => {}
        }
    }
    Ok(manual)
}

fn route_walkthrough_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let assets = ctx.assets;

    for (option_index, option) in assets.routes.options.iter().enumerate() {
        let mut store = ProgressStore::open(MemoryByteStore::new())?;
        let mut session = FishingSession::open_with_clock(
            &mut store,
            ProgressKey::new("qa-route", 1),
            Rc::clone(&assets.lakes),
            Rc::clone(&assets.routes),
            TickingClock::starting_at(0),
        )?;
        ensure!(
            session.select_route(&option.id)?,
            "route option {} not selectable",
            option.id
        );

        let mut last_index = 0;
        let mut stalled = 0;
        let mut finished = false;
        for turn in 0..ROUTE_TURN_LIMIT {
            let index = session.route_cursor().context("route cursor missing")?.index;
            ensure!(
                index >= last_index,
                "{}: turn {turn} moved back from step {last_index} to {index}",
                option.id
            );
            ensure!(
                index <= option.last_index(),
                "{}: step {index} past the end",
                option.id
            );
            if index != last_index {
                stalled = 0;
            }
            last_index = index;

            let status = session.route_status().context("route status missing")?;
            if status.terminal {
                finished = true;
                break;
            }
            if let Some(pool) = &status.switch_to {
                bail!(
                    "{}: step {index} still asks to switch to {pool} after following the route",
                    option.id
                );
            }
            if stalled >= ROUTE_STALL_LIMIT {
                session.route_advance()?;
                continue;
            }
            stalled += 1;

            if satisfy_side_goals(&mut session, option_index, index, &assets.routes)? {
                session.route_advance()?;
                continue;
            }
            match status.pool.as_deref() {
                Some(pool_id) => {
                    let state = session.pool(pool_id).unwrap_or_default();
                    if let Some(category) = weighted_category(&state, &mut rng) {
                        session.draw(pool_id, &category)?;
                    }
                }
                None => {
                    session.sync()?;
                    let moved = session.route_cursor().is_some_and(|c| c.index != index);
                    if !moved {
                        session.route_advance()?;
                    }
                }
            }
        }
        ensure!(
            finished,
            "{}: never reached the final step (stuck on {last_index})",
            option.id
        );

        if option.last_index() > 0 {
            ensure!(session.route_back()?, "{}: could not step back", option.id);
            let cursor = session.route_cursor().context("route cursor missing")?;
            ensure!(
                cursor.index + 1 == option.last_index() && !cursor.auto_advance,
                "{}: stepping back left {cursor:?}",
                option.id
            );
        }
        session.route_goto(usize::MAX)?;
        let cursor = session.route_cursor().context("route cursor missing")?;
        ensure!(
            cursor.index == option.last_index(),
            "{}: goto past the end landed on {}",
            option.id,
            cursor.index
        );
    }
    Ok(())
}

fn export_roundtrip_expectation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut rng = seeded(ctx);
    let assets = ctx.assets;
    let mut source = PlannerEngine::new(assets.loader.clone(), MemoryByteStore::new())?;

    let keys: Vec<ProgressKey> = (1..=rng.gen_range(1..=3_u32))
        .map(|version| ProgressKey::new("qa-angler", version))
        .collect();
    let mut views = Vec::with_capacity(keys.len());
    for key in &keys {
        let mut session = source.open_session_with_clock(key.clone(), TickingClock::starting_at(0))?;
        for _ in 0..rng.gen_range(1..40) {
            random_mutation(&mut session, &assets.lakes, &mut rng)?;
        }
        session.set_goals(GoalInputs {
            legendary_target: rng.gen_range(0..8),
            silver_target: f64::from(rng.gen_range(0..5_000_u32)),
            silver_have: f64::from(rng.gen_range(0..500_u32)),
            weight: f64::from(rng.gen_range(0..60_u32)),
        })?;
        views.push(session_view(&session));
    }
    let weekly = ProgressKey::new("qa-weekly", 1);
    source.store_mut().set_task(&weekly, "license", true)?;
    source
        .store_mut()
        .set_group_task(&weekly, "bounties", "eel", rng.gen_bool(0.5))?;
    source
        .store_mut()
        .set_purchase(&weekly, "bait", rng.gen_range(1..20))?;
    let code = source.export()?;

    let mut target = PlannerEngine::new(assets.loader.clone(), MemoryByteStore::new())?;
    target
        .store_mut()
        .set_task(&ProgressKey::new("qa-stale", 1), "old", true)?;
    let summary = target.import(&code)?;
    ensure!(
        summary.skipped.is_empty(),
        "import skipped {:?}",
        summary.skipped
    );
    ensure!(
        summary.imported == keys.len() + 1,
        "imported {} records, expected {}",
        summary.imported,
        keys.len() + 1
    );
    ensure!(
        target.store().root() == source.store().root(),
        "imported progress differs from the exported progress"
    );

    for (key, expected) in keys.iter().zip(&views) {
        let session = target.open_session(key.clone())?;
        ensure!(
            &session_view(&session) == expected,
            "{key}: imported lakes differ"
        );
        ensure!(
            session.history().is_empty(),
            "{key}: undo log survived the import"
        );
    }

    let before = target.store().root().clone();
    let cut = rng.gen_range(1..code.len().max(2));
    let truncated = &code[..cut.min(code.len())];
    match target.import(truncated) {
        Ok(_) => bail!("truncated export code was accepted"),
        Err(err) => ensure!(
            target.store().root() == &before,
            "rejected import ({err}) changed stored progress"
        ),
    }
    Ok(())
}
