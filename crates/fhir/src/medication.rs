//! FHIR-aligned medication request record.

use crate::datatypes::{CodeableConcept, Reference};
use serde::{Deserialize, Serialize};

/// Free-text dosage instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dosage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Minimal FHIR `MedicationRequest` resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_codeable_concept: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dosage_instruction: Vec<Dosage>,
}

impl MedicationRecord {
    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().and_then(Reference::patient_id)
    }

    /// Medication name as displayed to users.
    pub fn medication_display(&self) -> Option<&str> {
        self.medication_codeable_concept
            .as_ref()
            .and_then(CodeableConcept::display)
    }
}
