use super::{RepositoryHealth, ResourceRepository};
use crate::constants::MOCK_REPOSITORY_LABEL;
use crate::filter::{FilterSpecification, SearchContext, SearchPlan};
use crate::mock_data::MockDataset;
use crate::QueryResult;
use async_trait::async_trait;
use fhir::{ClinicalRecord, ResourceType, VITAL_SIGNS_CATEGORY};
use std::collections::HashSet;
use std::sync::Arc;

/// In-memory repository over a read-only [`MockDataset`].
#[derive(Clone, Debug)]
pub struct MockRepository {
    dataset: Arc<MockDataset>,
    ctx: SearchContext,
}

impl MockRepository {
    /// Creates a repository over a loaded dataset.
    ///
    /// # Arguments
    ///
    /// * `dataset` - Records to search; never modified.
    /// * `ctx` - Vocabulary, reference date and page cap.
    pub fn new(dataset: Arc<MockDataset>, ctx: SearchContext) -> Self {
        Self { dataset, ctx }
    }

    pub fn dataset(&self) -> &MockDataset {
        &self.dataset
    }

    /// Evaluates `plan` against the dataset. Records keep dataset order.
    pub fn search(&self, plan: &SearchPlan) -> Vec<ClinicalRecord> {
        let Some(resource) = plan.resource else {
            return Vec::new();
        };

        let subjects = plan
            .has_subject_criteria()
            .then(|| self.matching_subjects(plan));

        self.dataset
            .all_records()
            .filter(|record| record.resource_type() == resource)
            .filter(|record| match record {
                ClinicalRecord::Observation(o) => o.has_category(VITAL_SIGNS_CATEGORY),
                _ => true,
            })
            .filter(|record| plan.matches_record_code(record))
            .filter(|record| match &subjects {
                Some(ids) => record.subject_id().is_some_and(|id| ids.contains(id)),
                None => true,
            })
            .take(plan.limit)
            .cloned()
            .collect()
    }

    /// Ids of patients satisfying the plan's subject criteria.
    fn matching_subjects(&self, plan: &SearchPlan) -> HashSet<&str> {
        let with_condition: Option<HashSet<&str>> =
            (!plan.subject_condition_codes.is_empty()).then(|| {
                self.dataset
                    .all_records()
                    .filter_map(|record| match record {
                        ClinicalRecord::Condition(c)
                            if c.has_any_code(&plan.subject_condition_codes) =>
                        {
                            c.subject_id()
                        }
                        _ => None,
                    })
                    .collect()
            });

        self.dataset
            .patients
            .iter()
            .filter(|p| plan.matches_demographics(p))
            .filter(|p| {
                with_condition
                    .as_ref()
                    .map_or(true, |ids| ids.contains(p.id.as_str()))
            })
            .map(|p| p.id.as_str())
            .collect()
    }
}

#[async_trait]
impl ResourceRepository for MockRepository {
    fn label(&self) -> &'static str {
        MOCK_REPOSITORY_LABEL
    }

    async fn query(&self, spec: &FilterSpecification) -> QueryResult<Vec<ClinicalRecord>> {
        let plan = SearchPlan::build(spec, &self.ctx);
        let records = self.search(&plan);
        tracing::debug!(
            resource = ?plan.resource.map(ResourceType::as_str),
            matched = records.len(),
            "mock search"
        );
        Ok(records)
    }

    async fn health_check(&self) -> RepositoryHealth {
        RepositoryHealth {
            ok: true,
            label: MOCK_REPOSITORY_LABEL,
            source_url: None,
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinq_nlp::{AgeFilter, EntitySet, Gender, Intent, LexicalAnalyzer, Vocabulary};
    use std::num::NonZeroU32;

    fn repository(max_results: usize) -> MockRepository {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
        let vocabulary = Vocabulary::embedded(&LexicalAnalyzer::default()).expect("vocabulary");
        let ctx = SearchContext::new(Arc::new(vocabulary), Some(today), max_results);
        let dataset = MockDataset::load(None, 42, today).expect("dataset");
        MockRepository::new(Arc::new(dataset), ctx)
    }

    fn ids(repo: &MockRepository, intent: Intent, entities: EntitySet) -> Vec<String> {
        let spec = FilterSpecification::new(intent, entities);
        let plan = SearchPlan::build(&spec, &repo.ctx);
        repo.search(&plan)
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    fn with_conditions(names: &[&str]) -> EntitySet {
        EntitySet {
            conditions: names.iter().map(|n| n.to_string()).collect(),
            ..EntitySet::default()
        }
    }

    #[test]
    fn all_patients_without_criteria() {
        let repo = repository(50);
        assert_eq!(
            ids(&repo, Intent::PatientSearch, EntitySet::default()),
            vec!["P001", "P002", "P003", "P004", "P005", "P006"]
        );
    }

    #[test]
    fn age_min_is_strict() {
        let repo = repository(50);
        let entities = EntitySet {
            age_filter: Some(AgeFilter::Min(50)),
            ..EntitySet::default()
        };
        // P004 born 1965-05-12 is 59, P005 born 1955-09-20 is 68.
        assert_eq!(
            ids(&repo, Intent::PatientSearch, entities),
            vec!["P004", "P005"]
        );
    }

    #[test]
    fn diabetic_patients() {
        let repo = repository(50);
        assert_eq!(
            ids(&repo, Intent::PatientSearch, with_conditions(&["diabetes"])),
            vec!["P002", "P004"]
        );

        let mut entities = with_conditions(&["diabetes"]);
        entities.age_filter = Some(AgeFilter::Min(50));
        assert_eq!(ids(&repo, Intent::PatientSearch, entities), vec!["P004"]);
    }

    #[test]
    fn condition_search_filters_record_codes() {
        let repo = repository(50);
        assert_eq!(
            ids(&repo, Intent::ConditionSearch, with_conditions(&["hypertension"])),
            vec!["C001", "C004"]
        );

        let mut entities = with_conditions(&["hypertension"]);
        entities.gender = Some(Gender::Male);
        entities.age_filter = Some(AgeFilter::Min(60));
        assert_eq!(ids(&repo, Intent::ConditionSearch, entities), vec!["C004"]);
    }

    #[test]
    fn medication_search_restricts_subject() {
        let repo = repository(50);
        assert_eq!(
            ids(&repo, Intent::MedicationSearch, EntitySet::default()),
            vec!["M001", "M002"]
        );
        assert_eq!(
            ids(&repo, Intent::MedicationSearch, with_conditions(&["diabetes"])),
            vec!["M002"]
        );
    }

    #[test]
    fn observation_search_by_gender() {
        let repo = repository(50);
        let entities = EntitySet {
            gender: Some(Gender::Female),
            ..EntitySet::default()
        };
        let found = ids(&repo, Intent::ObservationSearch, entities);
        assert_eq!(found.len(), 15);
    }

    #[test]
    fn result_limit_and_max_results_truncate() {
        let repo = repository(50);
        let entities = EntitySet {
            result_limit: NonZeroU32::new(2),
            ..EntitySet::default()
        };
        assert_eq!(
            ids(&repo, Intent::PatientSearch, entities),
            vec!["P001", "P002"]
        );

        let capped = repository(3);
        assert_eq!(
            ids(&capped, Intent::ObservationSearch, EntitySet::default()).len(),
            3
        );
    }

    #[test]
    fn unknown_intent_is_empty() {
        let repo = repository(50);
        assert!(ids(&repo, Intent::Unknown, EntitySet::default()).is_empty());
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let health = repository(50).health_check().await;
        assert!(health.ok);
        assert_eq!(health.label, "MockRepository");
        assert!(health.source_url.is_none());
    }
}
