//! HTTP surface for the decision plane.
//!
//! This module provides:
//! - The axum router and handlers (`service`)
//! - Configuration types (`config`)
//!
//! Every failure is returned as a `{error, message}` envelope where `error`
//! is the stable [`HeimdallError::kind`](crate::HeimdallError::kind) name.
//! Malformed requests are `400`; everything else that reaches the caller
//! (no available model, missing selection rule) is `500`.

pub mod config;
pub mod service;

pub use service::{AppState, router};
