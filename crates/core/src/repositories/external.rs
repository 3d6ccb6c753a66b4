use super::search::{patient_params, resource_params, SearchParams};
use super::{RepositoryHealth, ResourceRepository};
use crate::constants::{EXTERNAL_REPOSITORY_LABEL, FHIR_JSON_MEDIA_TYPE, MAX_SUBJECT_PATIENTS};
use crate::filter::{FilterSpecification, SearchContext, SearchPlan};
use crate::{QueryError, QueryResult};
use async_trait::async_trait;
use fhir::{Bundle, ClinicalRecord, ResourceType};
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Repository backed by a remote FHIR R4 server.
///
/// Every failure to obtain a well-formed search response (timeout, refused connection,
/// non-success status, unparseable body) is reported as
/// [`QueryError::RepositoryUnavailable`].
#[derive(Clone, Debug)]
pub struct ExternalServiceRepository {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    ctx: SearchContext,
}

impl ExternalServiceRepository {
    /// Creates a client for the FHIR server at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server base, e.g. `https://hapi.fhir.org/baseR4`; a trailing `/` is dropped.
    /// * `timeout` - Bound on each request, connect time included.
    /// * `ctx` - Vocabulary, reference date and page cap.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration, ctx: SearchContext) -> QueryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(QueryError::HttpClient)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            ctx,
        })
    }

    /// Base URL without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Executes `plan`, resolving subject patients first when a non-patient search has
    /// subject criteria.
    pub async fn search(&self, plan: &SearchPlan) -> QueryResult<Vec<ClinicalRecord>> {
        let Some(resource) = plan.resource else {
            return Ok(Vec::new());
        };

        let mut records = if resource == ResourceType::Patient {
            self.fetch(resource, &patient_params(plan, plan.limit)).await?
        } else if plan.has_subject_criteria() {
            let subjects: Vec<String> = self
                .fetch(
                    ResourceType::Patient,
                    &patient_params(plan, MAX_SUBJECT_PATIENTS),
                )
                .await?
                .iter()
                .map(|p| p.id().to_string())
                .collect();
            if subjects.is_empty() {
                return Ok(Vec::new());
            }
            self.fetch(resource, &resource_params(plan, resource, Some(&subjects)))
                .await?
        } else {
            self.fetch(resource, &resource_params(plan, resource, None))
                .await?
        };

        records.truncate(plan.limit);
        Ok(records)
    }

    async fn fetch(
        &self,
        resource: ResourceType,
        params: &SearchParams,
    ) -> QueryResult<Vec<ClinicalRecord>> {
        let url = format!("{}/{}", self.base_url, resource);
        tracing::debug!(%url, ?params, "external FHIR search");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, FHIR_JSON_MEDIA_TYPE)
            .query(params)
            .send()
            .await
            .map_err(|e| self.unavailable(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.report(format!("{url} returned HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.unavailable(&url, e))?;

        Bundle::parse_records(&body, Some(resource))
            .map_err(|e| self.report(format!("malformed response from {url}: {e}")))
    }

    fn unavailable(&self, url: &str, err: reqwest::Error) -> QueryError {
        let cause = if err.is_timeout() {
            format!(
                "request to {url} timed out after {} ms",
                self.timeout.as_millis()
            )
        } else if err.is_connect() {
            format!("could not connect to {url}")
        } else {
            format!("request to {url} failed: {err}")
        };
        self.report(cause)
    }

    fn report(&self, cause: String) -> QueryError {
        tracing::warn!(%cause, "external FHIR repository unavailable");
        QueryError::RepositoryUnavailable(cause)
    }
}

#[async_trait]
impl ResourceRepository for ExternalServiceRepository {
    fn label(&self) -> &'static str {
        EXTERNAL_REPOSITORY_LABEL
    }

    async fn query(&self, spec: &FilterSpecification) -> QueryResult<Vec<ClinicalRecord>> {
        let plan = SearchPlan::build(spec, &self.ctx);
        self.search(&plan).await
    }

    async fn health_check(&self) -> RepositoryHealth {
        let url = format!("{}/metadata", self.base_url);
        let detail = match self
            .client
            .get(&url)
            .header(ACCEPT, FHIR_JSON_MEDIA_TYPE)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => None,
            Ok(response) => Some(format!("{url} returned HTTP {}", response.status())),
            Err(err) => Some(match self.unavailable(&url, err) {
                QueryError::RepositoryUnavailable(cause) => cause,
                other => other.to_string(),
            }),
        };

        RepositoryHealth {
            ok: detail.is_none(),
            label: EXTERNAL_REPOSITORY_LABEL,
            source_url: Some(self.base_url.clone()),
            detail,
        }
    }
}
