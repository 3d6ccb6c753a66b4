//! # API Shared
//!
//! Wire types shared by the clinq REST API and CLI.
//!
//! Contains:
//! - Request/response bodies for query, health and data-source endpoints (`wire` module)
//! - The liveness `HealthService`
//!
//! Every type derives `serde` and `utoipa::ToSchema` so the same definitions drive JSON bodies
//! and the OpenAPI document.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
