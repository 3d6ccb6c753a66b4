//! FHIR `Bundle` container.
//!
//! Two directions are supported:
//! - **render**: [`Bundle::searchset`] wraps matched records into the result bundle returned to
//!   callers (`total` always equals the number of entries; there is no paging).
//! - **parse**: [`Bundle::parse_records`] reads a bundle produced elsewhere (a FHIR server's
//!   search response or a dataset file) and returns its clinical records.
//!
//! Parsing is tolerant of the noise real servers add (extra elements, `OperationOutcome`
//! warnings carried as `search.mode = outcome` entries) but strict about the records
//! themselves: an entry that claims to be a record and does not parse fails the whole bundle.

use crate::resource::{ClinicalRecord, ResourceType};
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// Bundle purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Searchset,
    Collection,
}

/// One entry of a bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: ClinicalRecord,
}

/// A FHIR `Bundle` of clinical records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    pub total: usize,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// Wrap search results into a `searchset` bundle.
    pub fn searchset(records: Vec<ClinicalRecord>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: BundleType::Searchset,
            total: records.len(),
            entry: records
                .into_iter()
                .map(|resource| BundleEntry { resource })
                .collect(),
        }
    }

    /// Records in entry order.
    pub fn records(&self) -> impl Iterator<Item = &ClinicalRecord> {
        self.entry.iter().map(|e| &e.resource)
    }

    /// Parse the clinical records out of a bundle's JSON text.
    ///
    /// # Arguments
    ///
    /// * `json_text` - JSON text expected to represent a FHIR `Bundle`.
    /// * `expected` - If set, every record must be of this resource type.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not a JSON object with `resourceType: "Bundle"`,
    /// - an entry has no `resource`,
    /// - a resource fails to parse as a supported record,
    /// - a record's type differs from `expected`.
    pub fn parse_records(
        json_text: &str,
        expected: Option<ResourceType>,
    ) -> FhirResult<Vec<ClinicalRecord>> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire = match serde_path_to_error::deserialize::<_, RawBundleWire>(&mut deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                return Err(FhirError::Translation(format!(
                    "Bundle schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                wire.resource_type
            )));
        }

        let mut records = Vec::with_capacity(wire.entry.len());
        for (index, entry) in wire.entry.into_iter().enumerate() {
            if entry.search.as_ref().and_then(|s| s.mode.as_deref()) == Some("outcome") {
                continue;
            }

            let resource = entry.resource.ok_or_else(|| {
                FhirError::Translation(format!("Bundle entry {index} has no resource"))
            })?;

            if resource.get("resourceType").and_then(serde_json::Value::as_str)
                == Some("OperationOutcome")
            {
                continue;
            }

            let record = ClinicalRecord::from_value(resource).map_err(|e| {
                FhirError::Translation(format!("Bundle entry {index}: {e}"))
            })?;

            if let Some(expected) = expected {
                if record.resource_type() != expected {
                    return Err(FhirError::Translation(format!(
                        "Bundle entry {index}: expected {expected}, got {}",
                        record.resource_type()
                    )));
                }
            }

            records.push(record);
        }

        Ok(records)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Loose wire view of a bundle: resources stay as raw JSON until each one is dispatched.
#[derive(Deserialize)]
struct RawBundleWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    entry: Vec<RawEntryWire>,
}

#[derive(Deserialize)]
struct RawEntryWire {
    #[serde(default)]
    resource: Option<serde_json::Value>,

    #[serde(default)]
    search: Option<RawSearchWire>,
}

#[derive(Deserialize)]
struct RawSearchWire {
    #[serde(default)]
    mode: Option<String>,
}
