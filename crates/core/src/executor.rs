//! Query execution: text in, analysis trace and FHIR bundle out.
//!
//! `execute` runs the whole pipeline: tokenise, classify, extract, build the
//! [`FilterSpecification`], snapshot the active repository and wrap the matched records in a
//! `searchset` bundle. The specification is returned alongside the bundle so callers can see
//! why a result set looks the way it does.

use crate::config::CoreConfig;
use crate::controller::{DataSourceController, RepositoryMode};
use crate::filter::{FilterSpecification, SearchContext};
use crate::mock_data::MockDataset;
use crate::repositories::external::ExternalServiceRepository;
use crate::repositories::mock::MockRepository;
use crate::QueryResult;
use api_shared::{AgeFilterRes, AgeRangeRes, AnalysisRes, EntitiesRes, QueryRes};
use clinq_nlp::{AgeFilter, EntityExtractor, IntentClassifier, LexicalAnalyzer, Vocabulary};
use fhir::Bundle;
use std::sync::Arc;

/// Result of one execution.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub query: String,
    pub specification: FilterSpecification,
    pub bundle: Bundle,
    /// Mode the execution ran against.
    pub mode: RepositoryMode,
}

impl QueryOutcome {
    /// Analysis trace of this execution.
    pub fn analysis(&self) -> AnalysisRes {
        analysis_res(&self.query, &self.specification)
    }

    /// Response body for the query endpoint and CLI.
    ///
    /// # Returns
    ///
    /// The analysis trace, the bundle as JSON and the label of the repository that served it.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Fhir`](crate::QueryError::Fhir) if the bundle cannot be rendered as
    /// JSON.
    pub fn to_response(&self) -> QueryResult<QueryRes> {
        let results = serde_json::to_value(&self.bundle).map_err(fhir::FhirError::from)?;
        Ok(QueryRes {
            analysis: self.analysis(),
            results,
            data_source: self.mode.label().to_string(),
        })
    }
}

/// Interprets queries and runs them against the active repository.
#[derive(Debug)]
pub struct QueryExecutor {
    analyzer: LexicalAnalyzer,
    classifier: IntentClassifier,
    extractor: EntityExtractor,
    controller: Arc<DataSourceController>,
}

impl QueryExecutor {
    /// Creates an executor from its parts.
    ///
    /// # Arguments
    ///
    /// * `analyzer` - Tokeniser with the configured length cap.
    /// * `vocabulary` - Vocabulary shared by the classifier and extractor.
    /// * `controller` - Data-source controller consulted on every execution.
    pub fn new(
        analyzer: LexicalAnalyzer,
        vocabulary: Arc<Vocabulary>,
        controller: Arc<DataSourceController>,
    ) -> Self {
        Self {
            analyzer,
            classifier: IntentClassifier::new(Arc::clone(&vocabulary)),
            extractor: EntityExtractor::new(vocabulary),
            controller,
        }
    }

    /// Builds the vocabulary, both repository variants and the controller from `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`](crate::QueryError) if the vocabulary or mock dataset cannot be
    /// loaded, or the HTTP client cannot be built.
    pub fn from_config(cfg: &CoreConfig) -> QueryResult<Self> {
        let analyzer = LexicalAnalyzer::new(cfg.max_query_length());
        let vocabulary = Arc::new(match cfg.vocabulary_path() {
            Some(path) => Vocabulary::from_path(path, &analyzer)?,
            None => Vocabulary::embedded(&analyzer)?,
        });

        let ctx = SearchContext::new(
            Arc::clone(&vocabulary),
            cfg.reference_date(),
            cfg.max_results(),
        );
        let dataset = MockDataset::load(cfg.mock_dataset(), cfg.mock_seed(), ctx.today())?;
        let mock = MockRepository::new(Arc::new(dataset), ctx.clone());
        let external =
            ExternalServiceRepository::new(cfg.fhir_base_url(), cfg.fhir_timeout(), ctx)?;

        let controller = Arc::new(DataSourceController::new(
            cfg.default_mode(),
            Arc::new(mock),
            Arc::new(external),
        ));

        tracing::info!(
            mode = %cfg.default_mode(),
            fhir_base_url = cfg.fhir_base_url(),
            conditions = vocabulary.conditions().len(),
            "query executor ready"
        );

        Ok(Self::new(analyzer, vocabulary, controller))
    }

    /// The data-source controller, for toggles and health checks.
    pub fn controller(&self) -> &Arc<DataSourceController> {
        &self.controller
    }

    /// Tokenise, classify and extract. No repository access.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Analysis`](crate::QueryError::Analysis) if the query is too long.
    pub fn interpret(&self, query: &str) -> QueryResult<FilterSpecification> {
        let tokens = self.analyzer.analyze(query)?;
        let intent = self.classifier.classify(&tokens);
        let entities = self.extractor.extract(&tokens);
        tracing::debug!(
            tokens = tokens.len(),
            %intent,
            entities = ?entities,
            "query interpreted"
        );
        Ok(FilterSpecification::new(intent, entities))
    }

    /// Analysis trace for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Analysis`](crate::QueryError::Analysis) if the query is too long.
    pub fn analyze(&self, query: &str) -> QueryResult<AnalysisRes> {
        let spec = self.interpret(query)?;
        Ok(analysis_res(query, &spec))
    }

    /// Interprets `query` and runs it against the repository active at dispatch time.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Analysis`](crate::QueryError::Analysis) for rejected input and
    /// [`QueryError::RepositoryUnavailable`](crate::QueryError::RepositoryUnavailable) when
    /// the repository cannot serve the request. No bundle is produced on failure.
    pub async fn execute(&self, query: &str) -> QueryResult<QueryOutcome> {
        let specification = self.interpret(query)?;
        let active = self.controller.snapshot();

        let records = active.repository.query(&specification).await?;
        let bundle = Bundle::searchset(records);

        tracing::info!(
            intent = %specification.intent(),
            data_source = active.repository.label(),
            total = bundle.total,
            "query executed"
        );

        Ok(QueryOutcome {
            query: query.to_string(),
            specification,
            bundle,
            mode: active.mode,
        })
    }
}

impl From<&FilterSpecification> for EntitiesRes {
    fn from(spec: &FilterSpecification) -> Self {
        let entities = spec.entities();
        EntitiesRes {
            age_filter: entities.age_filter.map(age_filter_res),
            gender: entities.gender.map(|g| g.as_str().to_string()),
            conditions: entities.conditions.iter().cloned().collect(),
            result_limit: entities.result_limit.map(|n| n.get()),
        }
    }
}

fn age_filter_res(filter: AgeFilter) -> AgeFilterRes {
    match filter {
        AgeFilter::Exact(n) => AgeFilterRes::Exact(n),
        AgeFilter::Min(n) => AgeFilterRes::Min(n),
        AgeFilter::Max(n) => AgeFilterRes::Max(n),
        AgeFilter::Range(r) => AgeFilterRes::Range(AgeRangeRes {
            min: r.min(),
            max: r.max(),
        }),
    }
}

/// Analysis trace of a specification.
pub fn analysis_res(query: &str, spec: &FilterSpecification) -> AnalysisRes {
    AnalysisRes {
        original_query: query.to_string(),
        intent: spec.intent().as_str().to_string(),
        entities: EntitiesRes::from(spec),
    }
}
