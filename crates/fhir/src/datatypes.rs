//! FHIR general-purpose data types shared by the record models.
//!
//! Only the elements the query service reads or renders are modelled. Unknown elements in
//! remote payloads are ignored rather than rejected, since public FHIR servers routinely carry
//! extensions and narrative we have no use for.

use serde::{Deserialize, Serialize};

/// SNOMED CT code system URI.
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";

/// LOINC code system URI.
pub const LOINC_SYSTEM: &str = "http://loinc.org";

/// A single code from a terminology.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: Some(system.to_string()),
            code: Some(code.to_string()),
            display: Some(display.to_string()),
        }
    }
}

/// A concept expressed as zero or more codings plus optional free text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Build a concept holding a single coding, using the display as text.
    pub fn from_coding(coding: Coding) -> Self {
        let text = coding.display.clone();
        Self {
            coding: vec![coding],
            text,
        }
    }

    /// Build a text-only concept.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            coding: vec![],
            text: Some(text.into()),
        }
    }

    /// Returns true if any coding carries one of `codes`.
    pub fn has_any_code<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        self.coding.iter().any(|c| {
            c.code
                .as_deref()
                .is_some_and(|code| codes.iter().any(|wanted| wanted.as_ref() == code))
        })
    }

    /// Best human-readable label: text, then the first coding display, then the first code.
    pub fn display(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.coding.iter().find_map(|c| c.display.as_deref()))
            .or_else(|| self.coding.iter().find_map(|c| c.code.as_deref()))
    }
}

/// A literal reference to another resource (`Patient/P001`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    /// Reference to a patient by logical id.
    pub fn patient(id: &str, display: Option<&str>) -> Self {
        Self {
            reference: Some(format!("Patient/{id}")),
            display: display.map(str::to_string),
        }
    }

    /// Logical id of the referenced patient, if this reference points at a patient.
    ///
    /// Accepts relative (`Patient/123`), absolute (`https://host/fhir/Patient/123`) and
    /// versioned (`Patient/123/_history/2`) forms.
    pub fn patient_id(&self) -> Option<&str> {
        let reference = self.reference.as_deref()?;
        let reference = match reference.find("/_history/") {
            Some(pos) => &reference[..pos],
            None => reference,
        };
        let mut parts = reference.rsplitn(2, '/');
        let id = parts.next()?;
        let resource_type = parts.next()?.rsplit('/').next()?;
        (resource_type == "Patient" && !id.is_empty()).then_some(id)
    }
}

/// A measured amount.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    /// UCUM quantity whose unit and code are the same symbol.
    pub fn ucum(value: f64, unit: &str) -> Self {
        Self {
            value: Some(value),
            unit: Some(unit.to_string()),
            system: Some("http://unitsofmeasure.org".to_string()),
            code: Some(unit.to_string()),
        }
    }
}

/// A person's name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
}

impl HumanName {
    /// Display form: `text` if present, otherwise given names followed by the family name.
    pub fn display(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        self.given
            .iter()
            .map(String::as_str)
            .chain(self.family.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// FHIR administrative gender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
}

impl AdministrativeGender {
    /// FHIR token value, also used as the `gender` search parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            AdministrativeGender::Male => "male",
            AdministrativeGender::Female => "female",
            AdministrativeGender::Other => "other",
            AdministrativeGender::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_id_handles_reference_forms() {
        let cases = [
            ("Patient/P001", Some("P001")),
            ("https://hapi.fhir.org/baseR4/Patient/123", Some("123")),
            ("Patient/123/_history/4", Some("123")),
            ("Group/7", None),
            ("P001", None),
        ];
        for (raw, expected) in cases {
            let reference = Reference {
                reference: Some(raw.to_string()),
                display: None,
            };
            assert_eq!(reference.patient_id(), expected, "reference {raw}");
        }
    }

    #[test]
    fn concept_matches_any_code() {
        let concept = CodeableConcept::from_coding(Coding::new(
            SNOMED_SYSTEM,
            "73211009",
            "Diabetes mellitus",
        ));
        assert!(concept.has_any_code(&["44054006", "73211009"]));
        assert!(!concept.has_any_code(&["38341003"]));
        assert_eq!(concept.display(), Some("Diabetes mellitus"));
    }

    #[test]
    fn human_name_display_prefers_text() {
        let name = HumanName {
            use_type: Some("official".into()),
            text: None,
            family: Some("Williams".into()),
            given: vec!["Mary".into(), "Jane".into()],
        };
        assert_eq!(name.display(), "Mary Jane Williams");

        let named = HumanName {
            text: Some("Dr M. Williams".into()),
            ..name
        };
        assert_eq!(named.display(), "Dr M. Williams");
    }

    #[test]
    fn gender_uses_fhir_tokens() {
        let parsed: AdministrativeGender = serde_json::from_str("\"female\"").expect("parse");
        assert_eq!(parsed, AdministrativeGender::Female);
        assert_eq!(AdministrativeGender::Other.as_str(), "other");
        assert!(serde_json::from_str::<AdministrativeGender>("\"F\"").is_err());
    }
}
