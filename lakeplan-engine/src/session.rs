//! Fishing calculator session bound to one progress record.
//!
//! Every mutation is recorded in the undo log, then the record and the
//! newest history entries are written back before the call returns.
use std::rc::Rc;

use crate::catalog::LakeCatalog;
use crate::constants::{LOG_FULL_RESET, LOG_ROUTE_SWITCH_POOL};
use crate::estimator::{Estimate, estimate_draws};
use crate::history::{Clock, History, HistoryEntry, SystemClock, UndoOutcome};
use crate::inventory::{ClearOutcome, DrawOutcome, Inventory, PoolState};
use crate::numbers::finite_or_zero;
use crate::progress::{
    ByteStore, FishingToolState, GoalInputs, ProgressKey, ProgressStore, StoreError,
};
use crate::recommender::{Recommendation, RecommenderConfig, Shortfall, recommend};
use crate::route::{
    RouteCatalog, RouteCursor, RouteInputs, RouteOption, RouteTransition, StepStatus,
};

pub struct FishingSession<'s, S: ByteStore, C: Clock = SystemClock> {
    store: &'s mut ProgressStore<S>,
    key: ProgressKey,
    lakes: Rc<LakeCatalog>,
    routes: Rc<RouteCatalog>,
    recommender: RecommenderConfig,
    clock: C,
    state: FishingToolState,
    history: History,
}

impl<'s, S: ByteStore> FishingSession<'s, S> {
    /// Open the record at `key` with wall-clock timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the record or its undo log cannot be read or the
    /// record cannot be created.
    pub fn open(
        store: &'s mut ProgressStore<S>,
        key: ProgressKey,
        lakes: Rc<LakeCatalog>,
        routes: Rc<RouteCatalog>,
    ) -> Result<Self, StoreError> {
        Self::open_with_clock(store, key, lakes, routes, SystemClock)
    }
}

impl<'s, S: ByteStore, C: Clock> FishingSession<'s, S, C> {
    /// # Errors
    ///
    /// Returns an error if the record or its undo log cannot be read or the
    /// record cannot be created.
    pub fn open_with_clock(
        store: &'s mut ProgressStore<S>,
        key: ProgressKey,
        lakes: Rc<LakeCatalog>,
        routes: Rc<RouteCatalog>,
        clock: C,
    ) -> Result<Self, StoreError> {
        let record = store.get(&key)?;
        let history = store.load_history(&key)?;
        let mut state = record.fishing.unwrap_or_default();
        state.inventory.normalize(&lakes);
        if state
            .active_pool
            .as_deref()
            .is_some_and(|id| lakes.pool(id).is_none())
        {
            state.active_pool = None;
        }
        let known_route = state
            .route
            .as_ref()
            .is_some_and(|cursor| routes.option(&cursor.option_id).is_some());
        if !known_route {
            state.route = routes.options.first().map(|o| RouteCursor::new(o.id.clone()));
        }
        if let Some(cursor) = state.route.as_mut()
            && let Some(option) = routes.option(&cursor.option_id)
        {
            cursor.index = cursor.index.min(option.last_index());
        }
        Ok(Self {
            store,
            key,
            lakes,
            routes,
            recommender: RecommenderConfig::default(),
            clock,
            state,
            history,
        })
    }

    #[must_use]
    pub fn with_recommender(mut self, config: RecommenderConfig) -> Self {
        self.recommender = config;
        self
    }

    #[must_use]
    pub const fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub const fn state(&self) -> &FishingToolState {
        &self.state
    }

    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.state.inventory
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn lakes(&self) -> &LakeCatalog {
        &self.lakes
    }

    /// Live state of a lake; untouched lakes read as full.
    #[must_use]
    pub fn pool(&self, pool_id: &str) -> Option<PoolState> {
        self.state.inventory.pool(&self.lakes, pool_id)
    }

    #[must_use]
    pub fn active_pool(&self) -> Option<&str> {
        self.state.active_pool.as_deref()
    }

    /// Newest-first activity for display.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&HistoryEntry> {
        self.history.recent(limit)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let state = self.state.clone();
        self.store.upsert(&self.key, move |mut record| {
            record.fishing = Some(state);
            record
        })?;
        self.store.save_history(&self.key, &self.history)
    }

    /// Record, sync the route and persist.
    fn commit(&mut self, entry: HistoryEntry) -> Result<(), StoreError> {
        self.history.push(entry);
        self.sync_route();
        self.persist()
    }

    fn snapshot(&self, pool_id: &str) -> Option<PoolState> {
        self.state.inventory.pool(&self.lakes, pool_id)
    }

    // Inventory ---------------------------------------------------------

    /// Catch one fish. Exhausted categories and unknown ids change nothing
    /// and leave no history.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn draw(&mut self, pool_id: &str, category_id: &str) -> Result<DrawOutcome, StoreError> {
        let Some(before) = self.snapshot(pool_id) else {
            return Ok(DrawOutcome::UnknownPool);
        };
        let outcome = self
            .state
            .inventory
            .draw(&self.lakes, pool_id, category_id);
        if outcome.changed() {
            self.commit(HistoryEntry::Draw {
                pool_id: pool_id.to_string(),
                category_id: category_id.to_string(),
                before,
                at: self.clock.now_millis(),
            })?;
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn draw_whole_pool(&mut self, pool_id: &str) -> Result<ClearOutcome, StoreError> {
        let Some(before) = self.snapshot(pool_id) else {
            return Ok(ClearOutcome::UnknownPool);
        };
        let outcome = self.state.inventory.draw_whole_pool(&self.lakes, pool_id);
        self.commit(HistoryEntry::PoolClear {
            pool_id: pool_id.to_string(),
            before,
            at: self.clock.now_millis(),
        })?;
        Ok(outcome)
    }

    /// Restock a lake, keeping its counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn reset_pool(&mut self, pool_id: &str) -> Result<bool, StoreError> {
        self.reset(pool_id, false)
    }

    /// Restock a lake and zero its counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn reset_pool_progress(&mut self, pool_id: &str) -> Result<bool, StoreError> {
        self.reset(pool_id, true)
    }

    fn reset(&mut self, pool_id: &str, zero_counters: bool) -> Result<bool, StoreError> {
        let Some(before) = self.snapshot(pool_id) else {
            return Ok(false);
        };
        if zero_counters {
            self.state.inventory.reset_pool_progress(&self.lakes, pool_id);
        } else {
            self.state.inventory.reset_pool(&self.lakes, pool_id);
        }
        self.commit(HistoryEntry::PoolReset {
            pool_id: pool_id.to_string(),
            zeroed_counters: zero_counters,
            before,
            at: self.clock.now_millis(),
        })?;
        Ok(true)
    }

    /// Reset every lake and tracker. Undo restores the lakes, the trackers
    /// and the undo log as it was before the reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn reset_all(&mut self) -> Result<(), StoreError> {
        let entry = HistoryEntry::FullReset {
            pools: self.state.inventory.pools.clone(),
            trackers: self.state.inventory.trackers.clone(),
            prior_history: self.history.take_for_full_reset(),
            at: self.clock.now_millis(),
        };
        self.state.inventory.reset_all(&self.lakes);
        log::debug!("{LOG_FULL_RESET}: {}", self.key);
        self.commit(entry)
    }

    /// Add `delta` (possibly negative) to the broken-attempts tracker,
    /// saturating at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn bump_broken_attempts(&mut self, delta: i32) -> Result<u32, StoreError> {
        let before = self.state.inventory.trackers.clone();
        let trackers = &mut self.state.inventory.trackers;
        trackers.broken_attempts = trackers.broken_attempts.saturating_add_signed(delta);
        let count = trackers.broken_attempts;
        self.commit(HistoryEntry::TrackerUpdate {
            before,
            at: self.clock.now_millis(),
        })?;
        Ok(count)
    }

    /// Non-finite values are stored as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn set_running_total(&mut self, name: &str, value: f64) -> Result<(), StoreError> {
        let before = self.state.inventory.trackers.clone();
        self.state
            .inventory
            .trackers
            .running_totals
            .insert(name.to_string(), finite_or_zero(value));
        self.commit(HistoryEntry::TrackerUpdate {
            before,
            at: self.clock.now_millis(),
        })
    }

    /// Revert the newest logged change.
    ///
    /// # Errors
    ///
    /// Returns an error if the restored record cannot be persisted.
    pub fn undo(&mut self) -> Result<UndoOutcome, StoreError> {
        let outcome = self.history.undo(&mut self.state.inventory);
        if outcome != UndoOutcome::Empty {
            self.sync_route();
            self.persist()?;
        }
        Ok(outcome)
    }

    // Goals and planning --------------------------------------------------

    /// Non-finite amounts are stored as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn set_goals(&mut self, goals: GoalInputs) -> Result<(), StoreError> {
        self.state.goals = goals.sanitized();
        self.sync_route();
        self.persist()
    }

    /// Choose the lake being fished. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn set_active_pool(&mut self, pool_id: Option<&str>) -> Result<bool, StoreError> {
        if pool_id.is_some_and(|id| self.lakes.pool(id).is_none()) {
            return Ok(false);
        }
        self.state.active_pool = pool_id.map(str::to_string);
        self.sync_route();
        self.persist()?;
        Ok(true)
    }

    /// Outstanding amounts derived from the goal inputs and live counters.
    #[must_use]
    pub fn shortfall(&self) -> Shortfall {
        let goals = &self.state.goals;
        Shortfall {
            rare: goals
                .legendary_target
                .saturating_sub(self.state.inventory.total_rare_caught()),
            silver: (goals.silver_target - goals.silver_have).max(0.0),
            silver_target: goals.silver_target,
        }
    }

    /// Draws needed to catch `target` more rare fish from `pool_id`.
    #[must_use]
    pub fn estimate(&self, pool_id: &str, target: u32) -> Option<Estimate> {
        let config = self.lakes.pool(pool_id)?;
        let current = self.snapshot(pool_id)?.counts(config);
        estimate_draws(current, config.full_shape(), target)
    }

    #[must_use]
    pub fn recommendation(&self) -> Option<Recommendation> {
        recommend(
            &self.lakes,
            &self.state.inventory,
            &self.shortfall(),
            &self.recommender,
        )
    }

    // Guided route ---------------------------------------------------------

    fn inputs(&self) -> RouteInputs<'_> {
        RouteInputs {
            lakes: &self.lakes,
            inventory: &self.state.inventory,
            active_pool: self.state.active_pool.as_deref(),
            weight: self.state.goals.weight,
        }
    }

    #[must_use]
    pub fn route_option(&self) -> Option<&RouteOption> {
        let cursor = self.state.route.as_ref()?;
        self.routes.option(&cursor.option_id)
    }

    #[must_use]
    pub fn route_cursor(&self) -> Option<&RouteCursor> {
        self.state.route.as_ref()
    }

    #[must_use]
    pub fn route_status(&self) -> Option<StepStatus> {
        let cursor = self.state.route.as_ref()?;
        let option = self.routes.option(&cursor.option_id)?;
        cursor.status(option, &self.inputs())
    }

    /// Auto-advance past newly completed steps, following the route onto the
    /// lake its new step names.
    fn sync_route(&mut self) -> Option<RouteTransition> {
        let routes = Rc::clone(&self.routes);
        let inputs = RouteInputs {
            lakes: &self.lakes,
            inventory: &self.state.inventory,
            active_pool: self.state.active_pool.as_deref(),
            weight: self.state.goals.weight,
        };
        let cursor = self.state.route.as_mut()?;
        let option = routes.option(&cursor.option_id)?;
        let transition = cursor.sync(option, &inputs)?;
        if let Some(pool) = &transition.switch_pool {
            self.state.active_pool = Some(pool.clone());
        }
        Some(transition)
    }

    /// Make the current step's lake active after a manual move.
    fn follow_step_pool(&mut self) {
        let Some(cursor) = self.state.route.as_ref() else {
            return;
        };
        let pool = self
            .routes
            .option(&cursor.option_id)
            .and_then(|option| option.steps.get(cursor.index))
            .and_then(|step| step.pool.clone())
            .filter(|pool| self.lakes.pool(pool).is_some());
        if let Some(pool) = pool {
            log::debug!("{LOG_ROUTE_SWITCH_POOL}: {pool}");
            self.state.active_pool = Some(pool);
        }
    }

    /// Apply `mv` to the cursor and persist. Returns whether it moved.
    fn move_cursor<F>(&mut self, mv: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut RouteCursor, &RouteOption) -> bool,
    {
        let routes = Rc::clone(&self.routes);
        let Some(cursor) = self.state.route.as_mut() else {
            return Ok(false);
        };
        let Some(option) = routes.option(&cursor.option_id) else {
            return Ok(false);
        };
        let moved = mv(cursor, option);
        if moved {
            self.follow_step_pool();
        }
        self.persist()?;
        Ok(moved)
    }

    /// Switch strategy. Starts at the first step with auto-advance on.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn select_route(&mut self, option_id: &str) -> Result<bool, StoreError> {
        if self.routes.option(option_id).is_none() {
            return Ok(false);
        }
        self.state.route = Some(RouteCursor::new(option_id));
        self.follow_step_pool();
        self.persist()?;
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn route_advance(&mut self) -> Result<bool, StoreError> {
        self.move_cursor(RouteCursor::advance)
    }

    /// Step back; also turns auto-advance off.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn route_back(&mut self) -> Result<bool, StoreError> {
        self.move_cursor(|cursor, _| cursor.back())
    }

    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn route_goto(&mut self, index: usize) -> Result<bool, StoreError> {
        self.move_cursor(|cursor, option| {
            let from = cursor.index;
            cursor.goto(option, index);
            cursor.index != from
        })
    }

    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn set_auto_advance(&mut self, enabled: bool) -> Result<(), StoreError> {
        if let Some(cursor) = self.state.route.as_mut() {
            cursor.set_auto_advance(enabled);
        }
        self.persist()
    }

    /// Re-evaluate the route and persist when it moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be persisted.
    pub fn sync(&mut self) -> Result<Option<RouteTransition>, StoreError> {
        let transition = self.sync_route();
        if transition.is_some() {
            self.persist()?;
        }
        Ok(transition)
    }
}
