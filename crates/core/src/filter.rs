//! Filter specifications and the search semantics shared by every repository variant.
//!
//! A [`FilterSpecification`] is what interpretation produces: an intent plus the extracted
//! entities. Repositories never read it field by field. They build a [`SearchPlan`], which
//! resolves condition names to codes, fixes "today" for age arithmetic and applies the result
//! cap. The plan is the single definition of what a query matches:
//!
//! - **subject criteria** restrict the patient a record is about: age, gender and, except for
//!   condition searches, the requested conditions (the patient must have at least one
//!   `Condition` whose code belongs to a requested condition);
//! - **record codes** (condition searches only) restrict the `Condition` record itself.
//!
//! Age is evaluated two ways that agree by construction: [`age_on`] for in-memory predicates
//! and [`BirthDateBounds`] for remote `birthdate` search parameters.

use chrono::{Datelike, NaiveDate};
use clinq_nlp::{AgeFilter, EntitySet, Gender, Intent, Vocabulary};
use fhir::{ClinicalRecord, PatientRecord, ResourceType};
use std::sync::Arc;

/// Canonical, immutable representation of an interpreted query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterSpecification {
    intent: Intent,
    entities: EntitySet,
}

impl FilterSpecification {
    /// Creates a specification from a classified intent and its extracted entities.
    ///
    /// # Arguments
    ///
    /// * `intent` - Intent chosen by the classifier.
    /// * `entities` - Entity set produced by the extractor.
    pub fn new(intent: Intent, entities: EntitySet) -> Self {
        Self { intent, entities }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// Result cap: the query's own limit if it is lower than `max_results`.
    ///
    /// # Returns
    ///
    /// `max_results` when the query names no limit, otherwise the smaller of the two.
    pub fn effective_limit(&self, max_results: usize) -> usize {
        match self.entities.result_limit {
            Some(limit) => (limit.get() as usize).min(max_results),
            None => max_results,
        }
    }
}

/// FHIR resource searched for an intent. `Unknown` searches nothing.
pub fn resource_for(intent: Intent) -> Option<ResourceType> {
    match intent {
        Intent::PatientSearch => Some(ResourceType::Patient),
        Intent::ConditionSearch => Some(ResourceType::Condition),
        Intent::MedicationSearch => Some(ResourceType::MedicationRequest),
        Intent::ObservationSearch => Some(ResourceType::Observation),
        Intent::Unknown => None,
    }
}

/// What repositories need besides the specification itself.
#[derive(Clone, Debug)]
pub struct SearchContext {
    vocabulary: Arc<Vocabulary>,
    reference_date: Option<NaiveDate>,
    max_results: usize,
}

impl SearchContext {
    /// Creates a search context.
    ///
    /// # Arguments
    ///
    /// * `vocabulary` - Vocabulary used to turn condition names into codes.
    /// * `reference_date` - Fixed "today" for age arithmetic; `None` reads the UTC clock.
    /// * `max_results` - Page cap applied to every query.
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        reference_date: Option<NaiveDate>,
        max_results: usize,
    ) -> Self {
        Self {
            vocabulary,
            reference_date,
            max_results,
        }
    }

    /// The configured reference date, or the current UTC date.
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Executable form of a specification, shared by every repository variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPlan {
    /// `None` for an unknown intent.
    pub resource: Option<ResourceType>,
    pub age: Option<AgeFilter>,
    pub gender: Option<Gender>,
    /// Codes of which the subject must have at least one `Condition`.
    pub subject_condition_codes: Vec<String>,
    /// Codes of which a `Condition` record must carry at least one.
    pub record_codes: Vec<String>,
    pub limit: usize,
    pub today: NaiveDate,
}

impl SearchPlan {
    /// Resolves a specification against the context.
    ///
    /// Condition names become the codes of their vocabulary concepts. For a `Condition`
    /// search the codes filter the records themselves; for every other search they constrain
    /// the subject patient.
    ///
    /// # Returns
    ///
    /// A plan with `resource` set to `None` for an unknown intent.
    pub fn build(spec: &FilterSpecification, ctx: &SearchContext) -> Self {
        let entities = spec.entities();
        let resource = resource_for(spec.intent());

        let mut codes: Vec<String> = Vec::new();
        for name in &entities.conditions {
            match ctx.vocabulary().condition(name) {
                Some(concept) => {
                    for code in &concept.codes {
                        if !codes.contains(code) {
                            codes.push(code.clone());
                        }
                    }
                }
                None => tracing::debug!(condition = %name, "condition has no vocabulary codes"),
            }
        }

        let (subject_condition_codes, record_codes) = match resource {
            Some(ResourceType::Condition) => (Vec::new(), codes),
            _ => (codes, Vec::new()),
        };

        Self {
            resource,
            age: entities.age_filter,
            gender: entities.gender,
            subject_condition_codes,
            record_codes,
            limit: spec.effective_limit(ctx.max_results()),
            today: ctx.today(),
        }
    }

    /// True if any criterion restricts the patient a record is about.
    pub fn has_subject_criteria(&self) -> bool {
        self.age.is_some() || self.gender.is_some() || !self.subject_condition_codes.is_empty()
    }

    /// Age and gender criteria against a patient's demographics.
    ///
    /// A patient without a birth date never satisfies an age filter.
    pub fn matches_demographics(&self, patient: &PatientRecord) -> bool {
        if let Some(filter) = self.age {
            let age = patient.birth_date().and_then(|b| age_on(b, self.today));
            if !age.is_some_and(|a| filter.matches(a)) {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if patient.gender.map(|g| g.as_str()) != Some(gender.as_str()) {
                return false;
            }
        }
        true
    }

    /// Condition-code criterion against one record's own code.
    pub fn matches_record_code(&self, record: &ClinicalRecord) -> bool {
        if self.record_codes.is_empty() {
            return true;
        }
        match record {
            ClinicalRecord::Condition(c) => c.has_any_code(&self.record_codes),
            _ => false,
        }
    }

    /// `birthdate` bounds equivalent to the age filter.
    pub fn birth_date_bounds(&self) -> Option<BirthDateBounds> {
        self.age
            .map(|filter| BirthDateBounds::from_age_filter(filter, self.today))
    }
}

/// Whole years between `birth` and `today`, or `None` for a birth date in the future.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// `today` moved back `years` calendar years. 29 February lands on 28 February.
fn years_before(today: NaiveDate, years: u32) -> NaiveDate {
    let year = i64::from(today.year()) - i64::from(years);
    let Ok(year) = i32::try_from(year) else {
        return NaiveDate::MIN;
    };
    NaiveDate::from_ymd_opt(year, today.month(), today.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, today.month(), 28))
        .unwrap_or(NaiveDate::MIN)
}

/// Birth-date interval matching an age filter: `gt < birthDate <= le`.
///
/// Derived from `age >= k  <=>  birthDate <= today - k years`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BirthDateBounds {
    /// Latest birth date that still matches (inclusive).
    pub le: Option<NaiveDate>,
    /// Birth dates must be strictly after this date.
    pub gt: Option<NaiveDate>,
}

impl BirthDateBounds {
    /// Bounds equivalent to `filter` on `today`.
    pub fn from_age_filter(filter: AgeFilter, today: NaiveDate) -> Self {
        let at_least = |k: u32| years_before(today, k);
        match filter {
            AgeFilter::Min(n) => Self {
                le: Some(at_least(n.saturating_add(1))),
                gt: None,
            },
            AgeFilter::Max(n) => Self {
                le: None,
                gt: Some(at_least(n)),
            },
            AgeFilter::Exact(n) => Self {
                le: Some(at_least(n)),
                gt: Some(at_least(n.saturating_add(1))),
            },
            AgeFilter::Range(r) => Self {
                le: Some(at_least(r.min())),
                gt: Some(at_least(r.max().saturating_add(1))),
            },
        }
    }

    /// True if `birth` lies inside the interval.
    pub fn contains(&self, birth: NaiveDate) -> bool {
        self.le.map_or(true, |le| birth <= le) && self.gt.map_or(true, |gt| birth > gt)
    }

    /// FHIR `birthdate` search values, e.g. `le1974-06-01`.
    pub fn search_values(&self) -> Vec<String> {
        let mut values = Vec::new();
        if let Some(le) = self.le {
            values.push(format!("le{}", le.format("%Y-%m-%d")));
        }
        if let Some(gt) = self.gt {
            values.push(format!("gt{}", gt.format("%Y-%m-%d")));
        }
        values
    }
}
