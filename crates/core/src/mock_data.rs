//! Mock clinical dataset.
//!
//! Patients, conditions and medication requests come from a FHIR collection bundle (embedded,
//! or a file named by configuration). Blood-pressure readings are generated per patient from a
//! seeded RNG, so the same seed and reference date always produce the same dataset.

use crate::constants::{MOCK_VITALS_INTERVAL_DAYS, MOCK_VITALS_PER_PATIENT};
use crate::{QueryError, QueryResult};
use chrono::{Duration, NaiveDate};
use fhir::{
    Bundle, ClinicalRecord, CodeableConcept, Coding, ObservationComponent, ObservationRecord,
    PatientRecord, Quantity, Reference, LOINC_SYSTEM, VITAL_SIGNS_CATEGORY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Dataset shipped with the crate.
pub const EMBEDDED_DATASET: &str = include_str!("../data/mock_bundle.json");

const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// Read-only records grouped by resource type, each group in dataset order.
#[derive(Clone, Debug, Default)]
pub struct MockDataset {
    pub patients: Vec<PatientRecord>,
    pub records: Vec<ClinicalRecord>,
}

impl MockDataset {
    /// Builds the dataset from `source` (or the embedded bundle) plus generated vitals.
    ///
    /// # Arguments
    ///
    /// * `source` - Path to a FHIR collection bundle; `None` uses the embedded dataset.
    /// * `seed` - Seed for the generated blood-pressure readings.
    /// * `today` - Date of the most recent generated reading.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the file cannot be read or is not a bundle of supported
    /// records.
    pub fn load(source: Option<&Path>, seed: u64, today: NaiveDate) -> QueryResult<Self> {
        let text = match source {
            Some(path) => std::fs::read_to_string(path).map_err(|source| {
                QueryError::DatasetRead {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            None => EMBEDDED_DATASET.to_string(),
        };
        let records = Bundle::parse_records(&text, None)?;
        Ok(Self::from_records(records, seed, today))
    }

    /// Groups `records` and appends generated vitals for every patient.
    pub fn from_records(records: Vec<ClinicalRecord>, seed: u64, today: NaiveDate) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut dataset = MockDataset::default();

        for record in records {
            if let ClinicalRecord::Patient(p) = &record {
                dataset.patients.push(p.clone());
            }
            dataset.records.push(record);
        }

        let mut next_id = 1;
        for patient in &dataset.patients {
            for week in 0..MOCK_VITALS_PER_PATIENT {
                let effective = today - Duration::days(MOCK_VITALS_INTERVAL_DAYS * week as i64);
                let reading = blood_pressure(
                    format!("O{next_id:03}"),
                    patient,
                    effective,
                    rng.gen_range(110..=140),
                    rng.gen_range(70..=90),
                );
                dataset.records.push(ClinicalRecord::Observation(reading));
                next_id += 1;
            }
        }

        tracing::debug!(
            patients = dataset.patients.len(),
            records = dataset.records.len(),
            seed,
            "mock dataset loaded"
        );
        dataset
    }

    /// Patient by logical id.
    pub fn patient(&self, id: &str) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.id == id)
    }

    /// Every record of every type, in dataset order.
    pub fn all_records(&self) -> impl Iterator<Item = &ClinicalRecord> {
        self.records.iter()
    }
}

fn blood_pressure(
    id: String,
    patient: &PatientRecord,
    effective: NaiveDate,
    systolic: u32,
    diastolic: u32,
) -> ObservationRecord {
    let component = |code: &str, display: &str, value: u32| ObservationComponent {
        code: CodeableConcept::from_coding(Coding::new(LOINC_SYSTEM, code, display)),
        value_quantity: Some(Quantity::ucum(f64::from(value), "mm[Hg]")),
    };

    ObservationRecord {
        id,
        status: Some("final".into()),
        category: vec![CodeableConcept::from_coding(Coding::new(
            OBSERVATION_CATEGORY_SYSTEM,
            VITAL_SIGNS_CATEGORY,
            "Vital Signs",
        ))],
        code: Some(CodeableConcept::from_coding(Coding::new(
            LOINC_SYSTEM,
            "85354-9",
            "Blood pressure panel",
        ))),
        subject: Some(Reference::patient(
            &patient.id,
            patient.display_name().as_deref(),
        )),
        effective_date_time: Some(effective.format("%Y-%m-%d").to_string()),
        value_quantity: None,
        component: vec![
            component("8480-6", "Systolic blood pressure", systolic),
            component("8462-4", "Diastolic blood pressure", diastolic),
        ],
    }
}
