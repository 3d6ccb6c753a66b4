//! FHIR-aligned patient record.
//!
//! Represents the demographic slice of a `Patient` resource the query service filters and
//! renders: identity, names, administrative gender and birth date.
//!
//! Notes:
//! - `birthDate` is kept as the raw FHIR date string. FHIR allows partial dates (`1985`,
//!   `1985-03`); those have no exact age and [`PatientRecord::birth_date`] returns `None` for them.

use crate::datatypes::{AdministrativeGender, HumanName};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Minimal FHIR `Patient` resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<AdministrativeGender>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl PatientRecord {
    /// Full calendar birth date, if the record carries one.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.birth_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }

    /// Display name taken from the first recorded name.
    pub fn display_name(&self) -> Option<String> {
        self.name.first().map(HumanName::display)
    }
}
