//! FHIR wire/boundary support for the clinical query service.
//!
//! This crate provides **wire models** and **parse/render helpers** for the FHIR R4 resources the
//! query pipeline hands back to callers:
//! - `Patient`, `Condition`, `MedicationRequest` and `Observation` records
//! - the `Bundle` container (`searchset` results and `collection` datasets)
//!
//! This crate focuses on:
//! - FHIR JSON alignment (the shapes a FHIR REST server returns)
//! - tolerant parsing of remote search responses with path-aware errors
//! - small accessors (subject ids, codings, dates) used by repository filtering
//!
//! It deliberately knows nothing about queries, intents or repositories.

pub mod bundle;
pub mod condition;
pub mod datatypes;
pub mod medication;
pub mod observation;
pub mod patient;
pub mod resource;

// Re-export facades
pub use bundle::{Bundle, BundleEntry, BundleType};
pub use resource::{ClinicalRecord, ResourceType};

// Re-export public record types
pub use condition::ConditionRecord;
pub use datatypes::{
    AdministrativeGender, CodeableConcept, Coding, HumanName, Quantity, Reference, LOINC_SYSTEM,
    SNOMED_SYSTEM,
};
pub use medication::{Dosage, MedicationRecord};
pub use observation::{ObservationComponent, ObservationRecord, VITAL_SIGNS_CATEGORY};
pub use patient::PatientRecord;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
