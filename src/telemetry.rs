//! Telemetry metric name constants.
//!
//! Centralised metric names for heimdall decisions. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops. Emission never fails,
//! so telemetry can never affect the request path.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `heimdall_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `use_case`: caller-declared use case (e.g. "medical_summary")
//! - `model`: model key from the access configuration
//! - `tier`: cache tier: "hot" or "warm"

/// Total cache hits.
///
/// Labels: `use_case`, `tier` ("hot" | "warm").
pub const CACHE_HITS_TOTAL: &str = "heimdall_cache_hits_total";

/// Total cache misses (including lookups for disabled use cases).
///
/// Labels: `use_case`.
pub const CACHE_MISSES_TOTAL: &str = "heimdall_cache_misses_total";

/// Total cache tier failures absorbed as misses or skipped writes.
///
/// Labels: `tier`, `operation` ("get" | "set").
pub const CACHE_ERRORS_TOTAL: &str = "heimdall_cache_errors_total";

/// Total model selections.
///
/// Labels: `model`, `use_case`, `role` ("primary" | "fallback").
pub const MODEL_SELECTIONS_TOTAL: &str = "heimdall_model_selections_total";

/// Total rate-limit rejections.
///
/// Labels: `model`.
pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "heimdall_rate_limit_rejections_total";

/// Total health probes issued (cache misses of the health cache).
///
/// Labels: `model`, `status` ("healthy" | "unhealthy").
pub const HEALTH_CHECKS_TOTAL: &str = "heimdall_health_checks_total";

/// Total times the hardcoded default configuration was served.
///
/// Labels: `source` ("access_config" | "ab_tests").
pub const CONFIG_FALLBACKS_TOTAL: &str = "heimdall_config_fallbacks_total";

/// Total A/B arm assignments.
///
/// Labels: `family`, `arm` ("control" | "test").
pub const AB_ASSIGNMENTS_TOTAL: &str = "heimdall_ab_assignments_total";
