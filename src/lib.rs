//! Heimdall - request-time decision plane for hosted LLM inference
//!
//! For every inference request Heimdall decides which model and version to
//! call, which parameters apply, whether rate limits and health permit the
//! call, and whether a cached response can be returned instead. It never
//! calls models itself; invocation goes through a [`ModelInvoker`]
//! collaborator and configuration through a [`ConfigSource`].
//!
//! The gateway prefers degraded availability over hard failure: stale or
//! default configuration, a skipped cache, or a fallback model. The only
//! caller-visible failures are an unroutable request and
//! [`HeimdallError::NoAvailableModel`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heimdall::{Environment, Heimdall, HttpConfigSource, ResolutionRequest};
//!
//! #[tokio::main]
//! async fn main() -> heimdall::Result<()> {
//!     let plane = Heimdall::builder()
//!         .config_source(Arc::new(HttpConfigSource::new("http://config.internal")?))
//!         .environment(Environment::Production)
//!         .build()?;
//!
//!     let resolution = plane
//!         .resolve(
//!             &ResolutionRequest::new("medical_summary", "claude")
//!                 .profile("balanced")
//!                 .user_id("user-42"),
//!         )
//!         .await?;
//!
//!     println!("{} @ {}", resolution.model_id, resolution.model_version);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod params;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod version;
pub mod versioning;

// Re-export main types at crate root
pub use error::{HeimdallError, Result};
pub use gateway::{
    DecisionPlane, HandledRequest, Heimdall, HeimdallBuilder, InvocationResponse, ModelInvoker,
};
pub use version::{PKG_VERSION, version_string};

pub use cache::{
    CacheKey, CacheLookup, CacheManager, CachePolicies, CachePolicy, CacheRequest, CacheTier,
    CachedResponse, FileTier, MemoryTier, TierKind,
};
pub use config::{ConfigSnapshot, ConfigSource, ConfigStore, HttpConfigSource, InMemoryConfigSource};
pub use endpoint::{EndpointSelector, HealthProbe, HealthTracker, ModelSelection, RateLimiter};
pub use params::{Environment, ParameterCatalog, ParameterSelector};
pub use versioning::{ResolvedVersion, VersionManager};

pub use types::{
    AbTest, AbTestStatus, AccessConfig, ModelConfig, ModelEndpoint, Params, RateLimit,
    Resolution, ResolutionRequest, SelectionRule, TrafficSplit, VersionRecord, VersionSource,
};
