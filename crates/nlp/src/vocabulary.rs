//! Declarative vocabulary tables: intent keywords, gender words, condition synonyms and the cue
//! phrases used by age and result-limit extraction.
//!
//! The tables are YAML (see `vocabulary.yaml` at the crate root, embedded into the binary) and
//! are loaded once at startup. Loading parses a strict wire schema, validates it, and compiles
//! it into lookup maps keyed by lemma so that classification and extraction are plain table
//! lookups.

use crate::entities::Gender;
use crate::intent::Intent;
use crate::lexer::{phrase_words, LexicalAnalyzer};
use crate::VocabularyError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// The vocabulary shipped with the crate.
pub const EMBEDDED_VOCABULARY: &str = include_str!("../vocabulary.yaml");

/// Longest condition synonym, in words.
pub const MAX_SYNONYM_WORDS: usize = 3;

/// A condition the extractor can recognise, with the codes repositories filter on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionConcept {
    /// Normalised condition name reported in entity sets.
    pub name: String,
    pub display: String,
    pub system: String,
    pub codes: Vec<String>,
}

/// Cue phrases for age extraction, as lower-cased word sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgeCues {
    pub min: Vec<Vec<String>>,
    pub max: Vec<Vec<String>>,
    pub exact_prefix: Vec<Vec<String>>,
    pub exact_suffix: Vec<Vec<String>>,
    pub range_start: Vec<Vec<String>>,
    pub range_join: Vec<Vec<String>>,
    pub fillers: HashSet<String>,
}

/// Compiled vocabulary tables.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    intents: Vec<(Intent, HashSet<String>)>,
    genders: HashMap<String, Gender>,
    conditions: Vec<ConditionConcept>,
    synonyms: HashMap<Vec<String>, usize>,
    age_cues: AgeCues,
    limit_cues: HashSet<String>,
}

impl Vocabulary {
    /// Loads the vocabulary embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError`] if the embedded tables are invalid.
    pub fn embedded(analyzer: &LexicalAnalyzer) -> Result<Self, VocabularyError> {
        Self::from_yaml_str(EMBEDDED_VOCABULARY, analyzer)
    }

    /// Loads a vocabulary from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError`] if the file cannot be read or its tables are invalid.
    pub fn from_path(path: &Path, analyzer: &LexicalAnalyzer) -> Result<Self, VocabularyError> {
        let text = std::fs::read_to_string(path).map_err(|source| VocabularyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, analyzer)
    }

    /// Parses, validates and compiles vocabulary YAML.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError`] if:
    /// - the YAML does not match the schema (the message carries the failing path),
    /// - any keyword list, condition name, code list or synonym is empty,
    /// - a synonym is longer than [`MAX_SYNONYM_WORDS`] words,
    /// - two conditions share a condition name or a synonym.
    pub fn from_yaml_str(yaml_text: &str, analyzer: &LexicalAnalyzer) -> Result<Self, VocabularyError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, VocabularyWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(VocabularyError::Parse(format!(
                    "schema mismatch at {path}: {source}"
                )));
            }
        };

        compile(wire, analyzer)
    }

    /// Keyword lemmas for `intent`, in scoring order. `Unknown` has none.
    pub fn intent_keywords(&self) -> impl Iterator<Item = (Intent, &HashSet<String>)> {
        self.intents.iter().map(|(intent, words)| (*intent, words))
    }

    /// True if `lemma` is a keyword of any intent.
    pub fn is_intent_keyword(&self, lemma: &str) -> bool {
        self.intents.iter().any(|(_, words)| words.contains(lemma))
    }

    /// Gender for a token, matched on its lower-cased text or its lemma.
    pub fn gender(&self, norm: &str, lemma: &str) -> Option<Gender> {
        self.genders
            .get(norm)
            .or_else(|| self.genders.get(lemma))
            .copied()
    }

    /// Condition whose synonym is exactly this lemma sequence.
    pub fn match_condition<S: AsRef<str>>(&self, lemmas: &[S]) -> Option<&ConditionConcept> {
        let key: Vec<String> = lemmas.iter().map(|l| l.as_ref().to_string()).collect();
        self.synonyms.get(&key).map(|&idx| &self.conditions[idx])
    }

    /// Condition by normalised name.
    pub fn condition(&self, name: &str) -> Option<&ConditionConcept> {
        self.conditions.iter().find(|c| c.name == name)
    }

    pub fn conditions(&self) -> &[ConditionConcept] {
        &self.conditions
    }

    pub fn age_cues(&self) -> &AgeCues {
        &self.age_cues
    }

    pub fn is_limit_cue(&self, norm: &str) -> bool {
        self.limit_cues.contains(norm)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabularyWire {
    intents: IntentsWire,
    genders: GendersWire,
    conditions: Vec<ConditionWire>,
    age_cues: AgeCuesWire,
    #[serde(default)]
    limit_cues: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentsWire {
    patient_search: Vec<String>,
    condition_search: Vec<String>,
    medication_search: Vec<String>,
    observation_search: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GendersWire {
    male: Vec<String>,
    female: Vec<String>,
    #[serde(default)]
    other: Vec<String>,
    #[serde(default)]
    unknown: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionWire {
    name: String,
    display: String,
    system: String,
    codes: Vec<String>,
    synonyms: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgeCuesWire {
    min: Vec<String>,
    max: Vec<String>,
    #[serde(default)]
    exact_prefix: Vec<String>,
    #[serde(default)]
    exact_suffix: Vec<String>,
    #[serde(default)]
    range_start: Vec<String>,
    #[serde(default)]
    range_join: Vec<String>,
    #[serde(default)]
    fillers: Vec<String>,
}

// ============================================================================
// Compilation (internal)
// ============================================================================

fn compile(wire: VocabularyWire, analyzer: &LexicalAnalyzer) -> Result<Vocabulary, VocabularyError> {
    let intent_lists = [
        (Intent::PatientSearch, wire.intents.patient_search),
        (Intent::ConditionSearch, wire.intents.condition_search),
        (Intent::MedicationSearch, wire.intents.medication_search),
        (Intent::ObservationSearch, wire.intents.observation_search),
    ];
    let mut intents = Vec::with_capacity(intent_lists.len());
    for (intent, words) in intent_lists {
        let lemmas = lemma_set(&words, analyzer);
        if lemmas.is_empty() {
            return Err(VocabularyError::Invalid(format!(
                "intent {intent} has no keywords"
            )));
        }
        intents.push((intent, lemmas));
    }

    let mut genders = HashMap::new();
    for (gender, words) in [
        (Gender::Male, wire.genders.male),
        (Gender::Female, wire.genders.female),
        (Gender::Other, wire.genders.other),
        (Gender::Unknown, wire.genders.unknown),
    ] {
        for word in words.iter().filter(|w| !w.trim().is_empty()) {
            for key in [word.trim().to_lowercase(), analyzer.lemmatize(word.trim())] {
                if let Some(existing) = genders.insert(key.clone(), gender) {
                    if existing != gender {
                        return Err(VocabularyError::Invalid(format!(
                            "gender word '{word}' maps to both {existing} and {gender}"
                        )));
                    }
                }
            }
        }
    }

    let mut conditions = Vec::with_capacity(wire.conditions.len());
    let mut synonyms: HashMap<Vec<String>, usize> = HashMap::new();
    for (idx, condition) in wire.conditions.into_iter().enumerate() {
        let name = condition.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(VocabularyError::Invalid(format!(
                "condition {idx} has an empty name"
            )));
        }
        if conditions.iter().any(|c: &ConditionConcept| c.name == name) {
            return Err(VocabularyError::Invalid(format!(
                "condition '{name}' is declared twice"
            )));
        }
        let codes: Vec<String> = condition
            .codes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if codes.is_empty() {
            return Err(VocabularyError::Invalid(format!(
                "condition '{name}' has no codes"
            )));
        }
        if condition.synonyms.is_empty() {
            return Err(VocabularyError::Invalid(format!(
                "condition '{name}' has no synonyms"
            )));
        }

        for synonym in &condition.synonyms {
            let lemmas = analyzer.lemmatize_phrase(synonym);
            if lemmas.is_empty() || lemmas.len() > MAX_SYNONYM_WORDS {
                return Err(VocabularyError::Invalid(format!(
                    "synonym '{synonym}' of '{name}' must have 1 to {MAX_SYNONYM_WORDS} words"
                )));
            }
            if let Some(&other) = synonyms.get(&lemmas) {
                if other != conditions.len() {
                    return Err(VocabularyError::Invalid(format!(
                        "synonym '{synonym}' of '{name}' is already used by '{}'",
                        conditions[other].name
                    )));
                }
            }
            synonyms.insert(lemmas, conditions.len());
        }

        conditions.push(ConditionConcept {
            name,
            display: condition.display,
            system: condition.system,
            codes,
        });
    }

    let cues = wire.age_cues;
    if cues.min.is_empty() || cues.max.is_empty() {
        return Err(VocabularyError::Invalid(
            "age_cues.min and age_cues.max must not be empty".into(),
        ));
    }
    if !cues.range_start.is_empty() && cues.range_join.is_empty() {
        return Err(VocabularyError::Invalid(
            "age_cues.range_join is required when range_start is set".into(),
        ));
    }
    let age_cues = AgeCues {
        min: phrases(&cues.min),
        max: phrases(&cues.max),
        exact_prefix: phrases(&cues.exact_prefix),
        exact_suffix: phrases(&cues.exact_suffix),
        range_start: phrases(&cues.range_start),
        range_join: phrases(&cues.range_join),
        fillers: cues
            .fillers
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect(),
    };

    let limit_cues = wire
        .limit_cues
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    Ok(Vocabulary {
        intents,
        genders,
        conditions,
        synonyms,
        age_cues,
        limit_cues,
    })
}

fn lemma_set(words: &[String], analyzer: &LexicalAnalyzer) -> HashSet<String> {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| analyzer.lemmatize(w))
        .collect()
}

/// Cue phrases as word sequences, longest first so longer cues win at the same position.
fn phrases(raw: &[String]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = raw
        .iter()
        .map(|p| phrase_words(p))
        .filter(|words| !words.is_empty())
        .collect();
    out.sort_by(|a, b| b.len().cmp(&a.len()));
    out
}
