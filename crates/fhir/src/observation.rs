//! FHIR-aligned observation record (vital signs).

use crate::datatypes::{CodeableConcept, Quantity, Reference};
use serde::{Deserialize, Serialize};

/// Observation category code for vital signs.
pub const VITAL_SIGNS_CATEGORY: &str = "vital-signs";

/// One component of a multi-part observation (for example systolic/diastolic).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    pub code: CodeableConcept,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
}

/// Minimal FHIR `Observation` resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<ObservationComponent>,
}

impl ObservationRecord {
    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().and_then(Reference::patient_id)
    }

    /// True if any category coding carries `code`.
    pub fn has_category(&self, code: &str) -> bool {
        self.category.iter().any(|c| c.has_any_code(&[code]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blood_pressure_with_components() {
        let json = r#"{
            "id": "O001",
            "status": "final",
            "category": [{"coding": [{"code": "vital-signs"}]}],
            "code": {"text": "Blood pressure panel"},
            "subject": {"reference": "Patient/P001"},
            "effectiveDateTime": "2024-05-27",
            "component": [
                {"code": {"text": "Systolic"}, "valueQuantity": {"value": 128, "unit": "mm[Hg]"}},
                {"code": {"text": "Diastolic"}, "valueQuantity": {"value": 82, "unit": "mm[Hg]"}}
            ]
        }"#;
        let obs: ObservationRecord = serde_json::from_str(json).expect("parse observation");
        assert!(obs.has_category(VITAL_SIGNS_CATEGORY));
        assert_eq!(obs.subject_id(), Some("P001"));
        assert_eq!(obs.component.len(), 2);
        assert_eq!(
            obs.component[0].value_quantity.as_ref().and_then(|q| q.value),
            Some(128.0)
        );
    }

    #[test]
    fn laboratory_observation_is_not_vital_sign() {
        let json = r#"{"id": "L1", "category": [{"coding": [{"code": "laboratory"}]}]}"#;
        let obs: ObservationRecord = serde_json::from_str(json).expect("parse observation");
        assert!(!obs.has_category(VITAL_SIGNS_CATEGORY));
    }
}
