//! Public types for the Heimdall API.

mod access;
mod experiment;
mod model;
mod request;

pub use access::{AccessConfig, DEFAULT_RULE, ModelEndpoint, RateLimit, SelectionRule};
pub use experiment::{
    AbTest, AbTestStatus, Arm, STABLE_CHANNEL, TrafficSplit, VERSION_RETENTION_DAYS,
    VersionRecord,
};
pub use model::ModelConfig;
pub use request::{Params, Resolution, ResolutionRequest, VersionSource};
