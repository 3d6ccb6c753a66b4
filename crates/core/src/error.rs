use clinq_nlp::{AnalysisError, VocabularyError};

/// Failures of query interpretation, repository access and service setup.
///
/// An unknown intent is not an error: it executes to an empty bundle.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("invalid data source '{0}': expected mock or hapi")]
    InvalidDataSource(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),

    #[error(
        "failed to read mock dataset {path}: {source}",
        path = path.display()
    )]
    DatasetRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl QueryError {
    /// Taxonomy name reported to callers alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Analysis(_) => "AnalysisError",
            QueryError::RepositoryUnavailable(_) => "RepositoryUnavailable",
            QueryError::InvalidDataSource(_) => "InvalidDataSource",
            QueryError::InvalidConfig(_) => "InvalidConfig",
            QueryError::Vocabulary(_) => "VocabularyError",
            QueryError::Fhir(_) => "FhirError",
            QueryError::DatasetRead { .. } => "DatasetReadError",
            QueryError::HttpClient(_) => "HttpClientError",
        }
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_name_the_taxonomy() {
        let analysis = QueryError::from(AnalysisError::InputTooLong { length: 9, max: 3 });
        assert_eq!(analysis.kind(), "AnalysisError");
        assert!(analysis.to_string().contains("maximum is 3"));

        let unavailable = QueryError::RepositoryUnavailable("timed out".into());
        assert_eq!(unavailable.kind(), "RepositoryUnavailable");
        assert_eq!(unavailable.to_string(), "repository unavailable: timed out");

        assert_eq!(
            QueryError::InvalidDataSource("sql".into()).kind(),
            "InvalidDataSource"
        );
    }
}
