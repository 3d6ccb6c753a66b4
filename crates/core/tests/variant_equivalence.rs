//! The external repository, pointed at an in-process FHIR server that serves the mock dataset,
//! must return exactly what the mock repository returns for the same specification.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use clinq_core::{
    ExternalServiceRepository, FilterSpecification, MockDataset, MockRepository,
    ResourceRepository, SearchContext,
};
use clinq_nlp::{AgeFilter, EntitySet, Gender, Intent, LexicalAnalyzer, Vocabulary};
use fhir::{Bundle, ClinicalRecord, ResourceType};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
}

fn context() -> SearchContext {
    let vocabulary = Vocabulary::embedded(&LexicalAnalyzer::default()).expect("vocabulary");
    SearchContext::new(Arc::new(vocabulary), Some(today()), 50)
}

/// Minimal FHIR search over the dataset: the parameters the external repository emits.
async fn search(
    State(dataset): State<Arc<MockDataset>>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Bundle>, StatusCode> {
    let resource: ResourceType = resource.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let mut count = usize::MAX;
    let mut records: Vec<ClinicalRecord> = dataset
        .all_records()
        .filter(|r| r.resource_type() == resource)
        .cloned()
        .collect();

    for (name, value) in &params {
        let values: Vec<&str> = value.split(',').collect();
        match name.as_str() {
            "_count" => count = value.parse().map_err(|_| StatusCode::BAD_REQUEST)?,
            "birthdate" => {
                let (prefix, raw) = value.split_at(2);
                let bound = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| StatusCode::BAD_REQUEST)?;
                records.retain(|r| match r {
                    ClinicalRecord::Patient(p) => p.birth_date().is_some_and(|b| match prefix {
                        "le" => b <= bound,
                        "lt" => b < bound,
                        "ge" => b >= bound,
                        "gt" => b > bound,
                        _ => false,
                    }),
                    _ => false,
                });
            }
            "gender" => records.retain(|r| match r {
                ClinicalRecord::Patient(p) => p.gender.map(|g| g.as_str()) == Some(value.as_str()),
                _ => false,
            }),
            "_has:Condition:patient:code" => {
                let subjects: Vec<String> = dataset
                    .all_records()
                    .filter_map(|r| match r {
                        ClinicalRecord::Condition(c) if c.has_any_code(&values) => {
                            c.subject_id().map(str::to_string)
                        }
                        _ => None,
                    })
                    .collect();
                records.retain(|r| subjects.iter().any(|s| s == r.id()));
            }
            "code" => records.retain(|r| match r {
                ClinicalRecord::Condition(c) => c.has_any_code(&values),
                _ => false,
            }),
            "category" => records.retain(|r| match r {
                ClinicalRecord::Observation(o) => values.iter().any(|v| o.has_category(v)),
                _ => false,
            }),
            "subject" => records.retain(|r| {
                r.subject_id()
                    .is_some_and(|id| values.iter().any(|v| *v == format!("Patient/{id}")))
            }),
            _ => return Err(StatusCode::BAD_REQUEST),
        }
    }

    records.truncate(count);
    Ok(Json(Bundle::searchset(records)))
}

async fn fake_fhir_server(dataset: Arc<MockDataset>) -> String {
    let app = Router::new()
        .route("/:resource", get(search))
        .with_state(dataset);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn entity_sets() -> Vec<EntitySet> {
    let conditions = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
    vec![
        EntitySet::default(),
        EntitySet {
            age_filter: Some(AgeFilter::Min(50)),
            ..EntitySet::default()
        },
        EntitySet {
            age_filter: Some(AgeFilter::Max(40)),
            ..EntitySet::default()
        },
        EntitySet {
            age_filter: Some(AgeFilter::Exact(45)),
            ..EntitySet::default()
        },
        EntitySet {
            age_filter: Some(AgeFilter::range(30, 45)),
            ..EntitySet::default()
        },
        EntitySet {
            gender: Some(Gender::Female),
            ..EntitySet::default()
        },
        EntitySet {
            conditions: conditions(&["diabetes"]),
            ..EntitySet::default()
        },
        EntitySet {
            conditions: conditions(&["hypertension", "asthma"]),
            gender: Some(Gender::Male),
            ..EntitySet::default()
        },
        EntitySet {
            conditions: conditions(&["diabetes"]),
            age_filter: Some(AgeFilter::Min(50)),
            ..EntitySet::default()
        },
        EntitySet {
            conditions: conditions(&["copd"]),
            ..EntitySet::default()
        },
        EntitySet {
            age_filter: Some(AgeFilter::Max(1)),
            ..EntitySet::default()
        },
        EntitySet {
            result_limit: NonZeroU32::new(2),
            ..EntitySet::default()
        },
    ]
}

#[tokio::test]
async fn mock_and_external_return_identical_records() {
    let dataset = Arc::new(MockDataset::load(None, 42, today()).expect("dataset"));
    let base = fake_fhir_server(Arc::clone(&dataset)).await;

    let mock = MockRepository::new(Arc::clone(&dataset), context());
    let external = ExternalServiceRepository::new(&base, Duration::from_secs(5), context())
        .expect("client");

    let intents = Intent::RANKED.into_iter().chain([Intent::Unknown]);
    for intent in intents {
        for entities in entity_sets() {
            let spec = FilterSpecification::new(intent, entities);
            let from_mock = mock.query(&spec).await.expect("mock query");
            let from_external = external.query(&spec).await.expect("external query");
            assert_eq!(from_mock, from_external, "{spec:?}");
        }
    }
}

#[tokio::test]
async fn equivalence_covers_non_empty_results() {
    let dataset = Arc::new(MockDataset::load(None, 42, today()).expect("dataset"));
    let base = fake_fhir_server(Arc::clone(&dataset)).await;
    let external = ExternalServiceRepository::new(&base, Duration::from_secs(5), context())
        .expect("client");

    let spec = FilterSpecification::new(
        Intent::ObservationSearch,
        EntitySet {
            conditions: ["hypertension".to_string()].into_iter().collect(),
            ..EntitySet::default()
        },
    );
    let records = external.query(&spec).await.expect("external query");
    assert_eq!(records.len(), 10);
    assert!(records
        .iter()
        .all(|r| matches!(r.subject_id(), Some("P001") | Some("P005"))));
}
