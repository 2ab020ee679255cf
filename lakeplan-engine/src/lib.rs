//! Lakeplan Planning Engine
//!
//! Platform-agnostic core of the lakeplan fishing calculator: lake inventory
//! bookkeeping, draw-count estimates, lake recommendations, guided routes,
//! undo history and versioned progress persistence with export codes.
//! This crate has no UI or platform-specific dependencies.

pub mod bus;
pub mod catalog;
pub mod constants;
pub mod content;
pub mod estimator;
pub mod format;
pub mod history;
pub mod inventory;
pub mod numbers;
pub mod progress;
pub mod recommender;
pub mod route;
pub mod session;
pub mod sim;

// Re-export commonly used types
pub use bus::{ChangeBus, ChangeEvent, SubscriptionId};
pub use catalog::{CatalogError, CategoryConfig, LakeCatalog, PoolConfig, PoolCounts, Tier};
pub use content::{BundledContent, ContentCache, ContentError, ContentLoader};
#[cfg(feature = "async")]
pub use content::{AsyncContentCache, AsyncContentLoader};
pub use estimator::{DrawEstimate, DrawRange, Estimate, estimate_draws, expected_one};
pub use format::{KeyFormatter, PlainFormatter, StatusFormatter};
pub use history::{
    Clock, History, HistoryEntry, HistoryKind, SystemClock, TickingClock, Timestamp, UndoOutcome,
};
pub use inventory::{ClearOutcome, DrawOutcome, Inventory, PoolState, Trackers};
pub use progress::{
    ByteStore, ExportPayload, FishingToolState, GoalInputs, ImportError, ImportSummary,
    MemoryByteStore, ProgressKey, ProgressRecord, ProgressRoot, ProgressStore, StoreError,
};
pub use recommender::{
    PoolScore, Recommendation, RecommenderConfig, Shortfall, is_reachable, recommend,
    score_pools, silver_weight,
};
pub use route::{
    Combinator, Goal, GoalKind, GoalProgress, GoalScope, OnlyIfBelow, RouteCatalog,
    RouteConfigError, RouteCursor, RouteInputs, RouteOption, RouteStep, RouteTransition,
    RouteWarning, StepStatus, evaluate_step,
};
pub use session::FishingSession;
pub use sim::{SimSummary, run_monte_carlo, simulate_draws};

/// Planner facade owning the content cache and the progress store.
pub struct PlannerEngine<L, S>
where
    L: ContentLoader,
    S: ByteStore,
{
    content: ContentCache<L>,
    store: ProgressStore<S>,
}

impl<L, S> PlannerEngine<L, S>
where
    L: ContentLoader,
    S: ByteStore,
{
    /// Create an engine over the provided content loader and byte store.
    ///
    /// # Errors
    ///
    /// Returns an error if stored progress cannot be read.
    pub fn new(loader: L, backend: S) -> Result<Self, StoreError> {
        Ok(Self {
            content: ContentCache::new(loader),
            store: ProgressStore::open(backend)?,
        })
    }

    pub const fn content(&mut self) -> &mut ContentCache<L> {
        &mut self.content
    }

    #[must_use]
    pub const fn store(&self) -> &ProgressStore<S> {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut ProgressStore<S> {
        &mut self.store
    }

    /// Drop cached content so the next session loads it again.
    pub fn reload_content(&mut self) {
        self.content.reload();
    }

    /// Open the fishing tool for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the record cannot be
    /// read.
    pub fn open_session(&mut self, key: ProgressKey) -> anyhow::Result<FishingSession<'_, S>> {
        self.open_session_with_clock(key, SystemClock)
    }

    /// Like [`Self::open_session`] with a caller-supplied clock.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the record cannot be
    /// read.
    pub fn open_session_with_clock<C: Clock>(
        &mut self,
        key: ProgressKey,
        clock: C,
    ) -> anyhow::Result<FishingSession<'_, S, C>> {
        let lakes = self.content.lakes()?;
        let routes = self.content.routes()?;
        Ok(FishingSession::open_with_clock(
            &mut self.store,
            key,
            lakes,
            routes,
            clock,
        )?)
    }

    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn export(&self) -> Result<String, StoreError> {
        self.store.export()
    }

    /// # Errors
    ///
    /// Returns an error if the code is rejected; stored progress is unchanged.
    pub fn import(&mut self, code: &str) -> Result<ImportSummary, ImportError> {
        self.store.import(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl ContentLoader for FixtureLoader {
        type Error = Infallible;

        fn load_text(&self, resource: &str) -> Result<String, Self::Error> {
            Ok(BundledContent.load_text(resource).unwrap())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("content server unreachable")]
    struct Unreachable;

    struct OfflineLoader;

    impl ContentLoader for OfflineLoader {
        type Error = Unreachable;

        fn load_text(&self, _resource: &str) -> Result<String, Self::Error> {
            Err(Unreachable)
        }
    }

    #[test]
    fn engine_opens_sessions_and_roundtrips_progress() {
        let backend = MemoryByteStore::new();
        let mut engine = PlannerEngine::new(FixtureLoader, backend.clone()).unwrap();
        let key = ProgressKey::new("hero", 1);
        {
            let mut session = engine
                .open_session_with_clock(key.clone(), TickingClock::starting_at(1))
                .unwrap();
            session.draw("willow-pond", "minnow").unwrap();
            session.set_running_total("gold", 40.0).unwrap();
        }
        let code = engine.export().unwrap();

        let mut other = PlannerEngine::new(FixtureLoader, MemoryByteStore::new()).unwrap();
        let summary = other.import(&code).unwrap();
        assert_eq!(summary.imported, 1);
        let session = other.open_session(key).unwrap();
        assert_eq!(session.pool("willow-pond").unwrap().fish_caught, 1);
        assert!((session.inventory().trackers.running_total("gold") - 40.0).abs() < 1e-9);
        assert!(session.history().is_empty());
    }

    #[test]
    fn content_failures_surface_as_errors() {
        let mut engine = PlannerEngine::new(OfflineLoader, MemoryByteStore::new()).unwrap();
        let err = engine
            .open_session(ProgressKey::new("hero", 1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("content server unreachable"));
        assert!(engine.store().records().next().is_none());
    }
}
