//! Translation of search plans into FHIR REST search parameters.

use crate::filter::SearchPlan;
use fhir::{ResourceType, VITAL_SIGNS_CATEGORY};

/// Reverse-chained parameter: patients having a `Condition` with one of the given codes.
pub const HAS_CONDITION_CODE: &str = "_has:Condition:patient:code";

/// Ordered `name=value` pairs; repeated names are AND-ed by FHIR servers.
pub type SearchParams = Vec<(String, String)>;

/// Parameters for a `Patient` search applying all subject criteria to the patient itself.
pub fn patient_params(plan: &SearchPlan, count: usize) -> SearchParams {
    let mut params = SearchParams::new();
    if let Some(bounds) = plan.birth_date_bounds() {
        for value in bounds.search_values() {
            params.push(("birthdate".into(), value));
        }
    }
    if let Some(gender) = plan.gender {
        params.push(("gender".into(), gender.as_str().into()));
    }
    if !plan.subject_condition_codes.is_empty() {
        params.push((
            HAS_CONDITION_CODE.into(),
            plan.subject_condition_codes.join(","),
        ));
    }
    params.push(("_count".into(), count.to_string()));
    params
}

/// Parameters for a non-patient search. `subjects` are the patient ids resolved by a prior
/// `Patient` search.
pub fn resource_params(
    plan: &SearchPlan,
    resource: ResourceType,
    subjects: Option<&[String]>,
) -> SearchParams {
    let mut params = SearchParams::new();
    if resource == ResourceType::Observation {
        params.push(("category".into(), VITAL_SIGNS_CATEGORY.into()));
    }
    if !plan.record_codes.is_empty() {
        params.push(("code".into(), plan.record_codes.join(",")));
    }
    if let Some(ids) = subjects {
        let refs: Vec<String> = ids.iter().map(|id| format!("Patient/{id}")).collect();
        params.push(("subject".into(), refs.join(",")));
    }
    params.push(("_count".into(), plan.limit.to_string()));
    params
}
