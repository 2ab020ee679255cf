//! Centralized tuning constants and stable keys for the planning engine.
//!
//! The recommender thresholds are empirical. They are kept here as named
//! values so that changing them is a reviewed code change rather than a silent
//! edit to a content file.

// Recommender tuning --------------------------------------------------------
/// Score difference below which two pools are considered tied.
pub const RECOMMEND_TIE_EPSILON: f64 = 0.01;
/// A pool qualifies for the quick pick when this many items or fewer remain.
pub const QUICK_PICK_MAX_REMAINING: u32 = 10;
pub const WORST_CASE_WEIGHT: f64 = 0.5;
pub const BEST_CASE_WEIGHT: f64 = 0.25;
pub const SILVER_WEIGHT_MIN: f64 = 0.25;
pub const SILVER_WEIGHT_MAX: f64 = 1.0;
pub const SILVER_BASELINE_MIN: f64 = 1_000.0;
pub const SILVER_BASELINE_MAX: f64 = 100_000.0;

// History retention ---------------------------------------------------------
pub const HISTORY_MEMORY_LIMIT: usize = 100;
pub const HISTORY_PERSIST_LIMIT: usize = 50;
/// Full resets nested deeper than this lose their own prior log.
pub const HISTORY_NEST_DEPTH: usize = 16;

// Persistence ---------------------------------------------------------------
pub const EXPORT_SCHEMA_VERSION: u32 = 1;
pub const PROGRESS_ROOT_KEY: &str = "lakeplan.progress";
pub const FISHING_HISTORY_KEY_PREFIX: &str = "lakeplan.tool.fishing.history";
pub const RECORD_KEY_SEPARATOR: &str = "::";

// Route defaults ------------------------------------------------------------
pub const DEFAULT_BROKEN_WARNING: &str = "lines keep breaking";
pub const FORCED_COMPLETE_LABEL: &str = "already satisfied, skip ahead";

// Message keys for localizing formatters -------------------------------------
pub const GOAL_KEY_PREFIX: &str = "route.goal";
pub const BROKEN_WARNING_KEY: &str = "route.warn.broken-attempts";
pub const OVER_MAX_KEY: &str = "route.warn.over-max";
pub const FORCED_COMPLETE_KEY: &str = "route.step.already-satisfied";
pub const SWITCH_POOL_KEY: &str = "route.step.switch-pool";

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_DRAW: &str = "log.inventory.draw";
pub(crate) const LOG_DRAW_EXHAUSTED: &str = "log.inventory.draw-exhausted";
pub(crate) const LOG_POOL_REFILL: &str = "log.inventory.refill";
pub(crate) const LOG_POOL_CLEAR: &str = "log.inventory.clear";
pub(crate) const LOG_POOL_RESET: &str = "log.inventory.reset";
pub(crate) const LOG_FULL_RESET: &str = "log.inventory.full-reset";
pub(crate) const LOG_UNDO: &str = "log.history.undo";
pub(crate) const LOG_UNDO_EMPTY: &str = "log.history.undo-empty";
pub(crate) const LOG_HISTORY_DISCARD: &str = "log.history.discard";
pub(crate) const LOG_ROUTE_ADVANCE: &str = "log.route.advance";
pub(crate) const LOG_ROUTE_SWITCH_POOL: &str = "log.route.switch-pool";
pub(crate) const LOG_STORE_WRITE: &str = "log.store.write";
pub(crate) const LOG_STORE_EXPORT: &str = "log.store.export";
pub(crate) const LOG_STORE_IMPORT: &str = "log.store.import";
pub(crate) const LOG_STORE_IMPORT_SKIP: &str = "log.store.import-skip";
pub(crate) const LOG_CONTENT_LOAD: &str = "log.content.load";
pub(crate) const LOG_CONTENT_FAILED: &str = "log.content.failed";
