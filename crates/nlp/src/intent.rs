//! Keyword-scoring intent classification.

use crate::lexer::NormalizedToken;
use crate::vocabulary::{Vocabulary, MAX_SYNONYM_WORDS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What a query is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PatientSearch,
    ConditionSearch,
    MedicationSearch,
    ObservationSearch,
    Unknown,
}

impl Intent {
    /// Scored intents in tie-break order.
    pub const RANKED: [Intent; 4] = [
        Intent::PatientSearch,
        Intent::ConditionSearch,
        Intent::MedicationSearch,
        Intent::ObservationSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PatientSearch => "patient_search",
            Intent::ConditionSearch => "condition_search",
            Intent::MedicationSearch => "medication_search",
            Intent::ObservationSearch => "observation_search",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores token lemmas against per-intent keyword tables.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    vocabulary: Arc<Vocabulary>,
}

impl IntentClassifier {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    /// Count of keyword lemmas per intent, in tie-break order.
    ///
    /// Words inside a multi-word condition name ("chronic kidney disease") belong to that name
    /// and do not vote.
    pub fn scores(&self, tokens: &[NormalizedToken]) -> Vec<(Intent, usize)> {
        let in_condition_name = self.condition_name_mask(tokens);
        self.vocabulary
            .intent_keywords()
            .map(|(intent, words)| {
                let hits = tokens
                    .iter()
                    .zip(&in_condition_name)
                    .filter(|(t, masked)| !**masked && words.contains(&t.lemma))
                    .count();
                (intent, hits)
            })
            .collect()
    }

    /// Highest-scoring intent. Ties go to the intent listed first in [`Intent::RANKED`];
    /// no keyword at all is [`Intent::Unknown`].
    pub fn classify(&self, tokens: &[NormalizedToken]) -> Intent {
        let mut best = (Intent::Unknown, 0);
        for (intent, score) in self.scores(tokens) {
            if score > best.1 {
                best = (intent, score);
            }
        }
        best.0
    }

    fn condition_name_mask(&self, tokens: &[NormalizedToken]) -> Vec<bool> {
        let lemmas: Vec<&str> = tokens.iter().map(|t| t.lemma.as_str()).collect();
        let mut mask = vec![false; tokens.len()];

        let mut i = 0;
        while i < lemmas.len() {
            let longest = MAX_SYNONYM_WORDS.min(lemmas.len() - i);
            let hit = (2..=longest)
                .rev()
                .find(|&n| self.vocabulary.match_condition(&lemmas[i..i + n]).is_some());
            match hit {
                Some(n) => {
                    mask[i..i + n].fill(true);
                    i += n;
                }
                None => i += 1,
            }
        }
        mask
    }
}
