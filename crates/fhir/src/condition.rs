//! FHIR-aligned condition (problem/diagnosis) record.

use crate::datatypes::{CodeableConcept, Reference};
use serde::{Deserialize, Serialize};

/// Minimal FHIR `Condition` resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset_date_time: Option<String>,
}

impl ConditionRecord {
    /// True if the condition is coded with any of `codes`.
    pub fn has_any_code<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        self.code.as_ref().is_some_and(|c| c.has_any_code(codes))
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().and_then(Reference::patient_id)
    }
}
