//! The polymorphic clinical record and its resource-type discriminator.
//!
//! Rendering uses serde's internally tagged representation so every record serialises as a
//! plain FHIR resource with `resourceType` first. Parsing goes through
//! [`ClinicalRecord::from_value`], which dispatches on `resourceType` itself so that
//! `serde_path_to_error` can report the failing field inside the concrete resource.

use crate::condition::ConditionRecord;
use crate::medication::MedicationRecord;
use crate::observation::ObservationRecord;
use crate::patient::PatientRecord;
use crate::{FhirError, FhirResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The FHIR resource types a clinical record can be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Patient,
    Condition,
    MedicationRequest,
    Observation,
}

impl ResourceType {
    /// FHIR resource type name, also the REST endpoint path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Condition => "Condition",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Observation => "Observation",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = FhirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceType::Patient),
            "Condition" => Ok(ResourceType::Condition),
            "MedicationRequest" => Ok(ResourceType::MedicationRequest),
            "Observation" => Ok(ResourceType::Observation),
            other => Err(FhirError::InvalidInput(format!(
                "unsupported resourceType '{other}'"
            ))),
        }
    }
}

/// A clinical record of any supported resource type.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "resourceType")]
pub enum ClinicalRecord {
    Patient(PatientRecord),
    Condition(ConditionRecord),
    MedicationRequest(MedicationRecord),
    Observation(ObservationRecord),
}

impl ClinicalRecord {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ClinicalRecord::Patient(_) => ResourceType::Patient,
            ClinicalRecord::Condition(_) => ResourceType::Condition,
            ClinicalRecord::MedicationRequest(_) => ResourceType::MedicationRequest,
            ClinicalRecord::Observation(_) => ResourceType::Observation,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ClinicalRecord::Patient(p) => &p.id,
            ClinicalRecord::Condition(c) => &c.id,
            ClinicalRecord::MedicationRequest(m) => &m.id,
            ClinicalRecord::Observation(o) => &o.id,
        }
    }

    /// Logical id of the patient this record is about. A patient is its own subject.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            ClinicalRecord::Patient(p) => Some(&p.id),
            ClinicalRecord::Condition(c) => c.subject_id(),
            ClinicalRecord::MedicationRequest(m) => m.subject_id(),
            ClinicalRecord::Observation(o) => o.subject_id(),
        }
    }

    /// Parse a single FHIR resource from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - `resourceType` is missing or not one of the supported types,
    /// - any modelled field has an unexpected type (the message carries the field path).
    pub fn from_value(value: serde_json::Value) -> FhirResult<Self> {
        let resource_type = value
            .get("resourceType")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| FhirError::InvalidInput("resource has no resourceType".into()))?
            .parse::<ResourceType>()?;

        Ok(match resource_type {
            ResourceType::Patient => ClinicalRecord::Patient(parse_resource(value, resource_type)?),
            ResourceType::Condition => {
                ClinicalRecord::Condition(parse_resource(value, resource_type)?)
            }
            ResourceType::MedicationRequest => {
                ClinicalRecord::MedicationRequest(parse_resource(value, resource_type)?)
            }
            ResourceType::Observation => {
                ClinicalRecord::Observation(parse_resource(value, resource_type)?)
            }
        })
    }
}

impl<'de> Deserialize<'de> for ClinicalRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        ClinicalRecord::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn parse_resource<T: DeserializeOwned>(
    value: serde_json::Value,
    resource_type: ResourceType,
) -> FhirResult<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!("{resource_type} schema mismatch at {path}: {source}"))
    })
}
