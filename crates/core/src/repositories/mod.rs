//! Clinical-record repositories.
//!
//! Every variant implements [`ResourceRepository`] with the semantics of
//! [`SearchPlan`](crate::filter::SearchPlan):
//! - [`mock::MockRepository`] evaluates plans in memory against a read-only dataset;
//! - [`external::ExternalServiceRepository`] translates plans into FHIR REST searches.
//!
//! A new backing store is a new variant; the executor only sees the trait.

pub mod external;
pub mod mock;
pub mod search;

use crate::filter::FilterSpecification;
use crate::QueryResult;
use api_shared::SourceHealthRes;
use async_trait::async_trait;
use fhir::ClinicalRecord;

/// Reachability of a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryHealth {
    pub ok: bool,
    pub label: &'static str,
    pub source_url: Option<String>,
    /// Cause of an unhealthy status.
    pub detail: Option<String>,
}

impl From<RepositoryHealth> for SourceHealthRes {
    fn from(health: RepositoryHealth) -> Self {
        SourceHealthRes {
            ok: health.ok,
            data_source: health.label.to_string(),
            source_url: health.source_url,
            detail: health.detail,
        }
    }
}

/// Record lookup capability shared by all repository variants.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Variant label reported to callers.
    fn label(&self) -> &'static str;

    /// Records matching `spec`, in repository order, at most the effective limit.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::RepositoryUnavailable`](crate::QueryError::RepositoryUnavailable)
    /// if the backing store cannot serve the request.
    async fn query(&self, spec: &FilterSpecification) -> QueryResult<Vec<ClinicalRecord>>;

    async fn health_check(&self) -> RepositoryHealth;
}
