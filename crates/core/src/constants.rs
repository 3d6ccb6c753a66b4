//! Constants used throughout the clinq core crate.

/// Default external FHIR base URL.
pub const DEFAULT_FHIR_BASE_URL: &str = "https://hapi.fhir.org/baseR4";

/// Default timeout for external FHIR requests, in milliseconds.
pub const DEFAULT_FHIR_TIMEOUT_MS: u64 = 10_000;

/// Default cap on records returned by one query.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default seed for generated mock vital signs.
pub const DEFAULT_MOCK_SEED: u64 = 42;

/// Patients resolved by the first step of a two-step external search.
pub const MAX_SUBJECT_PATIENTS: usize = 200;

/// Label of the mock repository variant.
pub const MOCK_REPOSITORY_LABEL: &str = "MockRepository";

/// Label of the external FHIR repository variant.
pub const EXTERNAL_REPOSITORY_LABEL: &str = "ExternalServiceRepository";

/// FHIR JSON media type sent as `Accept` to external servers.
pub const FHIR_JSON_MEDIA_TYPE: &str = "application/fhir+json";

/// Generated blood-pressure readings per mock patient.
pub const MOCK_VITALS_PER_PATIENT: usize = 5;

/// Days between generated readings.
pub const MOCK_VITALS_INTERVAL_DAYS: i64 = 7;

pub mod env {
    pub const FHIR_SERVER_TYPE: &str = "FHIR_SERVER_TYPE";
    pub const FHIR_BASE_URL: &str = "FHIR_BASE_URL";
    pub const FHIR_TIMEOUT_MS: &str = "FHIR_TIMEOUT_MS";
    pub const MAX_QUERY_LENGTH: &str = "CLINQ_MAX_QUERY_LENGTH";
    pub const MAX_RESULTS: &str = "CLINQ_MAX_RESULTS";
    pub const MOCK_SEED: &str = "CLINQ_MOCK_SEED";
    pub const MOCK_DATASET: &str = "CLINQ_MOCK_DATASET";
    pub const VOCABULARY: &str = "CLINQ_VOCABULARY";
    pub const REFERENCE_DATE: &str = "CLINQ_REFERENCE_DATE";
}
