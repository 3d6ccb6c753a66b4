//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services, so
//! nothing reads process-wide environment variables during request handling.

use crate::constants::{
    env, DEFAULT_FHIR_BASE_URL, DEFAULT_FHIR_TIMEOUT_MS, DEFAULT_MAX_RESULTS, DEFAULT_MOCK_SEED,
};
use crate::controller::RepositoryMode;
use crate::{QueryError, QueryResult};
use chrono::NaiveDate;
use clinq_nlp::DEFAULT_MAX_QUERY_LENGTH;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    default_mode: RepositoryMode,
    fhir_base_url: String,
    fhir_timeout: Duration,
    max_query_length: usize,
    max_results: usize,
    mock_seed: u64,
    mock_dataset: Option<PathBuf>,
    vocabulary_path: Option<PathBuf>,
    reference_date: Option<NaiveDate>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_mode: RepositoryMode::Mock,
            fhir_base_url: DEFAULT_FHIR_BASE_URL.to_string(),
            fhir_timeout: Duration::from_millis(DEFAULT_FHIR_TIMEOUT_MS),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_results: DEFAULT_MAX_RESULTS,
            mock_seed: DEFAULT_MOCK_SEED,
            mock_dataset: None,
            vocabulary_path: None,
            reference_date: None,
        }
    }
}

impl CoreConfig {
    /// Resolve configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidConfig`] or [`QueryError::InvalidDataSource`] if a variable
    /// is set to a value that does not parse.
    pub fn from_env() -> QueryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from a key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> QueryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let default_mode = get(env::FHIR_SERVER_TYPE)
            .map(|v| v.parse::<RepositoryMode>())
            .transpose()?
            .unwrap_or(defaults.default_mode);

        let fhir_base_url = get(env::FHIR_BASE_URL).unwrap_or(defaults.fhir_base_url);

        let fhir_timeout = match get(env::FHIR_TIMEOUT_MS) {
            Some(v) => Duration::from_millis(parse_positive(env::FHIR_TIMEOUT_MS, &v)?),
            None => defaults.fhir_timeout,
        };

        let max_query_length = match get(env::MAX_QUERY_LENGTH) {
            Some(v) => parse_positive(env::MAX_QUERY_LENGTH, &v)? as usize,
            None => defaults.max_query_length,
        };

        let max_results = match get(env::MAX_RESULTS) {
            Some(v) => parse_positive(env::MAX_RESULTS, &v)? as usize,
            None => defaults.max_results,
        };

        let mock_seed = match get(env::MOCK_SEED) {
            Some(v) => v.parse::<u64>().map_err(|e| {
                QueryError::InvalidConfig(format!("{} must be an unsigned integer: {e}", env::MOCK_SEED))
            })?,
            None => defaults.mock_seed,
        };

        let reference_date = get(env::REFERENCE_DATE)
            .map(|v| {
                NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|e| {
                    QueryError::InvalidConfig(format!(
                        "{} must be a YYYY-MM-DD date: {e}",
                        env::REFERENCE_DATE
                    ))
                })
            })
            .transpose()?;

        Self::new(
            default_mode,
            fhir_base_url,
            fhir_timeout,
            max_query_length,
            max_results,
        )
        .map(|cfg| {
            cfg.with_mock_seed(mock_seed)
                .with_mock_dataset(get(env::MOCK_DATASET).map(PathBuf::from))
                .with_vocabulary_path(get(env::VOCABULARY).map(PathBuf::from))
                .with_reference_date(reference_date)
        })
    }

    /// Create a new `CoreConfig`.
    ///
    /// The base URL is trimmed and loses any trailing `/`. Seed, dataset, vocabulary and
    /// reference date take their defaults; set them with the `with_*` builders.
    ///
    /// # Arguments
    ///
    /// * `default_mode` - Data source active when the process starts.
    /// * `fhir_base_url` - Base URL of the external FHIR server.
    /// * `fhir_timeout` - Timeout for each external request.
    /// * `max_query_length` - Analyzer input cap, in characters.
    /// * `max_results` - Page cap for both repository variants.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidConfig`] if:
    /// - `fhir_base_url` is not an `http` or `https` URL,
    /// - `fhir_timeout`, `max_query_length` or `max_results` is zero.
    pub fn new(
        default_mode: RepositoryMode,
        fhir_base_url: String,
        fhir_timeout: Duration,
        max_query_length: usize,
        max_results: usize,
    ) -> QueryResult<Self> {
        let fhir_base_url = fhir_base_url.trim().trim_end_matches('/').to_string();
        if !(fhir_base_url.starts_with("http://") || fhir_base_url.starts_with("https://")) {
            return Err(QueryError::InvalidConfig(format!(
                "FHIR base URL must start with http:// or https://, got '{fhir_base_url}'"
            )));
        }
        if fhir_timeout.is_zero() {
            return Err(QueryError::InvalidConfig(
                "FHIR timeout must be greater than zero".into(),
            ));
        }
        if max_query_length == 0 || max_results == 0 {
            return Err(QueryError::InvalidConfig(
                "max query length and max results must be greater than zero".into(),
            ));
        }

        Ok(Self {
            default_mode,
            fhir_base_url,
            fhir_timeout,
            max_query_length,
            max_results,
            ..Self::default()
        })
    }

    /// Seed for the generated mock vital signs.
    pub fn with_mock_seed(mut self, seed: u64) -> Self {
        self.mock_seed = seed;
        self
    }

    /// Load mock records from a FHIR collection bundle file instead of the embedded dataset.
    pub fn with_mock_dataset(mut self, path: Option<PathBuf>) -> Self {
        self.mock_dataset = path;
        self
    }

    /// Load the query vocabulary from a YAML file instead of the embedded one.
    pub fn with_vocabulary_path(mut self, path: Option<PathBuf>) -> Self {
        self.vocabulary_path = path;
        self
    }

    /// Fix "today" for age arithmetic instead of reading the clock per query.
    pub fn with_reference_date(mut self, date: Option<NaiveDate>) -> Self {
        self.reference_date = date;
        self
    }

    pub fn default_mode(&self) -> RepositoryMode {
        self.default_mode
    }

    pub fn fhir_base_url(&self) -> &str {
        &self.fhir_base_url
    }

    pub fn fhir_timeout(&self) -> Duration {
        self.fhir_timeout
    }

    pub fn max_query_length(&self) -> usize {
        self.max_query_length
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn mock_seed(&self) -> u64 {
        self.mock_seed
    }

    pub fn mock_dataset(&self) -> Option<&Path> {
        self.mock_dataset.as_deref()
    }

    pub fn vocabulary_path(&self) -> Option<&Path> {
        self.vocabulary_path.as_deref()
    }

    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.reference_date
    }
}

fn parse_positive(key: &str, value: &str) -> QueryResult<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(QueryError::InvalidConfig(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = CoreConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(cfg.default_mode(), RepositoryMode::Mock);
        assert_eq!(cfg.fhir_base_url(), "https://hapi.fhir.org/baseR4");
        assert_eq!(cfg.fhir_timeout(), Duration::from_millis(10_000));
        assert_eq!(cfg.max_query_length(), 500);
        assert_eq!(cfg.max_results(), 50);
        assert_eq!(cfg.mock_seed(), 42);
        assert!(cfg.mock_dataset().is_none());
        assert!(cfg.reference_date().is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            ("FHIR_SERVER_TYPE", "HAPI"),
            ("FHIR_BASE_URL", "http://localhost:8080/fhir/"),
            ("FHIR_TIMEOUT_MS", "250"),
            ("CLINQ_MAX_RESULTS", "7"),
            ("CLINQ_MOCK_SEED", "9"),
            ("CLINQ_VOCABULARY", "/etc/clinq/vocabulary.yaml"),
            ("CLINQ_REFERENCE_DATE", "2024-06-01"),
        ]))
        .expect("overrides");
        assert_eq!(cfg.default_mode(), RepositoryMode::ExternalService);
        assert_eq!(cfg.fhir_base_url(), "http://localhost:8080/fhir");
        assert_eq!(cfg.fhir_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.max_results(), 7);
        assert_eq!(cfg.mock_seed(), 9);
        assert_eq!(
            cfg.vocabulary_path(),
            Some(Path::new("/etc/clinq/vocabulary.yaml"))
        );
        assert_eq!(cfg.reference_date(), NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn blank_values_take_defaults() {
        let cfg = CoreConfig::from_lookup(lookup(&[("FHIR_TIMEOUT_MS", "  ")])).expect("blank");
        assert_eq!(cfg.fhir_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn rejects_invalid_values() {
        for pairs in [
            [("FHIR_TIMEOUT_MS", "0")],
            [("CLINQ_MAX_RESULTS", "-3")],
            [("FHIR_BASE_URL", "ftp://example")],
            [("CLINQ_REFERENCE_DATE", "01/06/2024")],
        ] {
            let err = CoreConfig::from_lookup(lookup(&pairs)).expect_err("invalid value");
            assert!(matches!(err, QueryError::InvalidConfig(_)), "{pairs:?}");
        }

        let err = CoreConfig::from_lookup(lookup(&[("FHIR_SERVER_TYPE", "sqlite")]))
            .expect_err("unknown mode");
        assert!(matches!(err, QueryError::InvalidDataSource(_)));
    }
}
