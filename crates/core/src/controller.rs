//! Process-wide data-source selection.
//!
//! The controller owns one instance of each repository variant and the active
//! [`RepositoryMode`]. The mode is the only mutable state shared between requests; it sits
//! behind an `RwLock` so a reader never observes a half-applied toggle. Executions take a
//! [`ActiveRepository`] snapshot when they start and keep it, so a toggle never affects an
//! execution already in flight.

use crate::constants::{EXTERNAL_REPOSITORY_LABEL, MOCK_REPOSITORY_LABEL};
use crate::repositories::{RepositoryHealth, ResourceRepository};
use crate::{QueryError, QueryResult};
use api_shared::DataSourceRes;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Which repository variant serves queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepositoryMode {
    Mock,
    ExternalService,
}

impl RepositoryMode {
    /// Token reported by the data-source endpoint: `mock` or `external_service`.
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryMode::Mock => "mock",
            RepositoryMode::ExternalService => "external_service",
        }
    }

    /// Label of the repository variant serving this mode.
    pub fn label(self) -> &'static str {
        match self {
            RepositoryMode::Mock => MOCK_REPOSITORY_LABEL,
            RepositoryMode::ExternalService => EXTERNAL_REPOSITORY_LABEL,
        }
    }
}

impl fmt::Display for RepositoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a mode token: `mock`, or `hapi`/`external`/`external_service` for the remote
/// server. Case-insensitive; `-` is read as `_`.
impl FromStr for RepositoryMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase().replace('-', "_");
        match token.as_str() {
            "mock" => Ok(RepositoryMode::Mock),
            "hapi" | "external" | "external_service" | "externalservice" => {
                Ok(RepositoryMode::ExternalService)
            }
            _ => Err(QueryError::InvalidDataSource(s.trim().to_string())),
        }
    }
}

impl From<RepositoryMode> for DataSourceRes {
    fn from(mode: RepositoryMode) -> Self {
        DataSourceRes {
            mode: mode.as_str().to_string(),
            data_source: mode.label().to_string(),
        }
    }
}

/// The repository an execution runs against, fixed when the execution starts.
#[derive(Clone)]
pub struct ActiveRepository {
    pub mode: RepositoryMode,
    pub repository: Arc<dyn ResourceRepository>,
}

/// Holds both repository variants and the active mode.
pub struct DataSourceController {
    mode: RwLock<RepositoryMode>,
    mock: Arc<dyn ResourceRepository>,
    external: Arc<dyn ResourceRepository>,
}

impl fmt::Debug for DataSourceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceController")
            .field("mode", &self.current())
            .finish_non_exhaustive()
    }
}

impl DataSourceController {
    /// Creates a controller over both repository variants.
    ///
    /// # Arguments
    ///
    /// * `initial` - Mode active until the first toggle.
    /// * `mock` - The in-memory variant.
    /// * `external` - The remote FHIR variant.
    pub fn new(
        initial: RepositoryMode,
        mock: Arc<dyn ResourceRepository>,
        external: Arc<dyn ResourceRepository>,
    ) -> Self {
        Self {
            mode: RwLock::new(initial),
            mock,
            external,
        }
    }

    /// The active mode.
    pub fn current(&self) -> RepositoryMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches every subsequent execution to `target`. Returns the resulting mode.
    pub fn toggle(&self, target: RepositoryMode) -> RepositoryMode {
        let mut mode = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        if *mode != target {
            tracing::info!(from = %*mode, to = %target, "data source toggled");
        }
        *mode = target;
        target
    }

    /// Toggles to the mode named by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidDataSource`] for an unrecognised token; the mode is left
    /// unchanged.
    pub fn toggle_token(&self, token: &str) -> QueryResult<RepositoryMode> {
        let target = token.parse::<RepositoryMode>()?;
        Ok(self.toggle(target))
    }

    /// The active mode and its repository, read under one lock.
    ///
    /// # Returns
    ///
    /// An [`ActiveRepository`] that later toggles do not change.
    pub fn snapshot(&self) -> ActiveRepository {
        let mode = self.current();
        ActiveRepository {
            mode,
            repository: self.repository(mode),
        }
    }

    /// Repository serving `mode`, whether or not it is active.
    pub fn repository(&self, mode: RepositoryMode) -> Arc<dyn ResourceRepository> {
        match mode {
            RepositoryMode::Mock => Arc::clone(&self.mock),
            RepositoryMode::ExternalService => Arc::clone(&self.external),
        }
    }

    /// Health of the active repository.
    pub async fn health(&self) -> RepositoryHealth {
        self.snapshot().repository.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpecification;
    use async_trait::async_trait;
    use fhir::ClinicalRecord;

    struct Fixed(&'static str);

    #[async_trait]
    impl ResourceRepository for Fixed {
        fn label(&self) -> &'static str {
            self.0
        }

        async fn query(&self, _spec: &FilterSpecification) -> QueryResult<Vec<ClinicalRecord>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> RepositoryHealth {
            RepositoryHealth {
                ok: true,
                label: self.0,
                source_url: None,
                detail: None,
            }
        }
    }

    fn controller() -> DataSourceController {
        DataSourceController::new(
            RepositoryMode::Mock,
            Arc::new(Fixed("MockRepository")),
            Arc::new(Fixed("ExternalServiceRepository")),
        )
    }

    #[test]
    fn parses_tokens() {
        for token in ["mock", "MOCK", " Mock "] {
            assert_eq!(token.parse::<RepositoryMode>().ok(), Some(RepositoryMode::Mock));
        }
        for token in ["hapi", "external", "external-service", "ExternalService"] {
            assert_eq!(
                token.parse::<RepositoryMode>().ok(),
                Some(RepositoryMode::ExternalService),
                "{token}"
            );
        }
        assert!(matches!(
            "sqlite".parse::<RepositoryMode>(),
            Err(QueryError::InvalidDataSource(_))
        ));
    }

    #[test]
    fn toggle_round_trip() {
        let controller = controller();
        assert_eq!(controller.current(), RepositoryMode::Mock);

        assert_eq!(
            controller.toggle(RepositoryMode::ExternalService),
            RepositoryMode::ExternalService
        );
        assert_eq!(controller.snapshot().repository.label(), "ExternalServiceRepository");

        controller.toggle(RepositoryMode::Mock);
        assert_eq!(controller.current(), RepositoryMode::Mock);
        assert_eq!(controller.snapshot().repository.label(), "MockRepository");
    }

    #[test]
    fn invalid_token_leaves_mode_unchanged() {
        let controller = controller();
        controller.toggle(RepositoryMode::ExternalService);
        let err = controller.toggle_token("postgres").expect_err("invalid token");
        assert_eq!(err.kind(), "InvalidDataSource");
        assert_eq!(controller.current(), RepositoryMode::ExternalService);
    }

    #[test]
    fn snapshot_survives_toggle() {
        let controller = controller();
        let before = controller.snapshot();
        controller.toggle(RepositoryMode::ExternalService);
        assert_eq!(before.mode, RepositoryMode::Mock);
        assert_eq!(before.repository.label(), "MockRepository");
    }

    #[test]
    fn concurrent_toggles_are_never_torn() {
        let controller = Arc::new(controller());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || {
                    for n in 0..200 {
                        let target = if (i + n) % 2 == 0 {
                            RepositoryMode::Mock
                        } else {
                            RepositoryMode::ExternalService
                        };
                        controller.toggle(target);
                        let snapshot = controller.snapshot();
                        assert_eq!(snapshot.repository.label(), snapshot.mode.label());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer thread");
        }
    }

    #[test]
    fn data_source_response_shape() {
        let res = DataSourceRes::from(RepositoryMode::ExternalService);
        assert_eq!(res.mode, "external_service");
        assert_eq!(res.data_source, "ExternalServiceRepository");
    }
}
