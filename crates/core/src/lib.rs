//! # clinq Core
//!
//! Query execution for the clinical query service.
//!
//! This crate turns an interpreted query into records:
//! - [`filter`]: the Filter Specification and the search semantics every repository shares
//! - [`repositories`]: the `ResourceRepository` capability and its mock and external FHIR variants
//! - [`controller`]: the process-wide active data source and its toggle
//! - [`executor`]: the text-to-bundle pipeline
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and
//! `clinq-cli`. Wire types come from `api-shared`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod executor;
pub mod filter;
pub mod mock_data;
pub mod repositories;

pub use config::CoreConfig;
pub use controller::{ActiveRepository, DataSourceController, RepositoryMode};
pub use error::{QueryError, QueryResult};
pub use executor::{QueryExecutor, QueryOutcome};
pub use filter::{FilterSpecification, SearchContext, SearchPlan};
pub use mock_data::MockDataset;
pub use repositories::external::ExternalServiceRepository;
pub use repositories::mock::MockRepository;
pub use repositories::{RepositoryHealth, ResourceRepository};
