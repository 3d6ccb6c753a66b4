//! JSON bodies exchanged with clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Free-text query request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueryReq {
    pub query: String,
}

/// Inclusive age range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgeRangeRes {
    pub min: u32,
    pub max: u32,
}

/// Age constraint as reported in the analysis trace, e.g. `{"min": 50}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgeFilterRes {
    Exact(u32),
    Min(u32),
    Max(u32),
    Range(AgeRangeRes),
}

/// Entities extracted from a query. Absent entities are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntitiesRes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_filter: Option<AgeFilterRes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_limit: Option<u32>,
}

/// How a query was interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRes {
    pub original_query: String,
    pub intent: String,
    pub entities: EntitiesRes,
}

/// Query response: the analysis trace alongside the FHIR `Bundle` it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryRes {
    pub analysis: AnalysisRes,

    /// FHIR `Bundle` of type `searchset`.
    #[schema(value_type = Object)]
    pub results: serde_json::Value,

    /// Repository that served the query.
    pub data_source: String,
}

/// Reachability of the active repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceHealthRes {
    pub ok: bool,
    pub data_source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Data-source toggle request. `target` is a mode token such as `mock` or `hapi`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DataSourceReq {
    pub target: String,
}

/// Active data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DataSourceRes {
    /// `mock` or `external_service`.
    pub mode: String,
    /// `MockRepository` or `ExternalServiceRepository`.
    pub data_source: String,
}

/// Error body: the failure kind and a human-readable cause.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub kind: String,
    pub message: String,
}
