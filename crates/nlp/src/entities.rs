//! Entity extraction: age constraint, gender, conditions and result limit.
//!
//! Each pass reads the token sequence on its own and tolerates the others finding nothing.
//! Cue words, gender words and condition synonyms come from the [`Vocabulary`]; this module
//! only decides how tokens line up against them.

use crate::lexer::{NormalizedToken, PartOfSpeech};
use crate::vocabulary::Vocabulary;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Longest condition synonym, in tokens.
const MAX_NGRAM: usize = crate::vocabulary::MAX_SYNONYM_WORDS;

/// How far past a number the limit pass looks for the noun it counts ("5 diabetic patients").
const LIMIT_LOOKAHEAD: usize = 3;

/// Verbs that introduce a requested count ("show 5 patients", "list me 3 readings").
const DISPLAY_VERBS: &[&str] = &[
    "show", "list", "find", "get", "display", "give", "fetch", "retrieve", "return", "see",
];

/// Inclusive age range with `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AgeRange {
    min: u32,
    max: u32,
}

impl AgeRange {
    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

/// Age constraint, in whole years.
///
/// `Min` and `Max` are strict (`over 50` excludes 50); `Range` is inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeFilter {
    Exact(u32),
    Min(u32),
    Max(u32),
    Range(AgeRange),
}

impl AgeFilter {
    /// Range between two bounds given in either order.
    pub fn range(a: u32, b: u32) -> Self {
        AgeFilter::Range(AgeRange {
            min: a.min(b),
            max: a.max(b),
        })
    }

    pub fn matches(&self, age: u32) -> bool {
        match *self {
            AgeFilter::Exact(n) => age == n,
            AgeFilter::Min(n) => age > n,
            AgeFilter::Max(n) => age < n,
            AgeFilter::Range(r) => r.min <= age && age <= r.max,
        }
    }
}

/// Administrative gender requested by a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured constraints found in a query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_filter: Option<AgeFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    /// Normalised condition names.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub conditions: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_limit: Option<NonZeroU32>,
}

impl EntitySet {
    pub fn is_empty(&self) -> bool {
        self.age_filter.is_none()
            && self.gender.is_none()
            && self.conditions.is_empty()
            && self.result_limit.is_none()
    }
}

/// Runs the extraction passes against a shared vocabulary.
#[derive(Clone, Debug)]
pub struct EntityExtractor {
    vocabulary: Arc<Vocabulary>,
}

impl EntityExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn extract(&self, tokens: &[NormalizedToken]) -> EntitySet {
        let age = self.age(tokens);
        let (conditions, condition_tokens) = self.conditions(tokens);

        let mut claimed: HashSet<usize> = condition_tokens;
        if let Some(found) = &age {
            claimed.extend(found.tokens.clone());
        }

        EntitySet {
            age_filter: age.map(|found| found.filter),
            gender: self.gender(tokens),
            conditions,
            result_limit: self.result_limit(tokens, &claimed),
        }
    }

    /// First age cue in left-to-right order. Later cues are logged and ignored.
    fn age(&self, tokens: &[NormalizedToken]) -> Option<AgeMatch> {
        let mut first: Option<AgeMatch> = None;
        let mut i = 0;
        while i < tokens.len() {
            match self.age_at(tokens, i) {
                Some(found) => {
                    let next = found.tokens.end;
                    match &first {
                        None => first = Some(found),
                        Some(kept) => tracing::debug!(
                            kept = ?kept.filter,
                            ignored = ?found.filter,
                            "ignoring additional age cue"
                        ),
                    }
                    i = next;
                }
                None => i += 1,
            }
        }
        first
    }

    fn age_at(&self, tokens: &[NormalizedToken], i: usize) -> Option<AgeMatch> {
        let cues = self.vocabulary.age_cues();

        for start in &cues.range_start {
            let Some(j) = match_phrase(tokens, i, start) else {
                continue;
            };
            let j = self.skip_fillers(tokens, j);
            let Some(low) = number_at(tokens, j) else {
                continue;
            };
            for join in &cues.range_join {
                if let Some(k) = match_phrase(tokens, j + 1, join) {
                    if let Some(high) = number_at(tokens, k) {
                        return Some(AgeMatch {
                            filter: AgeFilter::range(low, high),
                            tokens: i..k + 1,
                        });
                    }
                }
            }
        }

        let prefixed: [(&Vec<Vec<String>>, fn(u32) -> AgeFilter); 3] = [
            (&cues.min, AgeFilter::Min),
            (&cues.max, AgeFilter::Max),
            (&cues.exact_prefix, AgeFilter::Exact),
        ];
        for (phrases, make) in prefixed {
            for phrase in phrases {
                let Some(j) = match_phrase(tokens, i, phrase) else {
                    continue;
                };
                let j = self.skip_fillers(tokens, j);
                if let Some(n) = number_at(tokens, j) {
                    return Some(AgeMatch {
                        filter: make(n),
                        tokens: i..j + 1,
                    });
                }
            }
        }

        let n = number_at(tokens, i)?;
        cues.exact_suffix.iter().find_map(|suffix| {
            match_phrase(tokens, i + 1, suffix).map(|end| AgeMatch {
                filter: AgeFilter::Exact(n),
                tokens: i..end,
            })
        })
    }

    fn skip_fillers(&self, tokens: &[NormalizedToken], mut i: usize) -> usize {
        let fillers = &self.vocabulary.age_cues().fillers;
        while tokens
            .get(i)
            .is_some_and(|t| fillers.contains(&t.norm))
        {
            i += 1;
        }
        i
    }

    fn gender(&self, tokens: &[NormalizedToken]) -> Option<Gender> {
        tokens
            .iter()
            .find_map(|t| self.vocabulary.gender(&t.norm, &t.lemma))
    }

    /// Longest-first lemma n-gram matching. Returns the names and the token indices consumed.
    fn conditions(&self, tokens: &[NormalizedToken]) -> (BTreeSet<String>, HashSet<usize>) {
        let lemmas: Vec<&str> = tokens.iter().map(|t| t.lemma.as_str()).collect();
        let mut names = BTreeSet::new();
        let mut used = HashSet::new();

        let mut i = 0;
        while i < lemmas.len() {
            let longest = MAX_NGRAM.min(lemmas.len() - i);
            let hit = (1..=longest).rev().find_map(|n| {
                self.vocabulary
                    .match_condition(&lemmas[i..i + n])
                    .map(|concept| (concept.name.clone(), n))
            });
            match hit {
                Some((name, n)) => {
                    names.insert(name);
                    used.extend(i..i + n);
                    i += n;
                }
                None => i += 1,
            }
        }

        (names, used)
    }

    /// A positive number after a limit cue ("top 10"), or one that opens the request and counts
    /// an intent noun ("show 5 diabetic patients", "5 patients"). A count inside the criteria
    /// ("patients with 2 conditions") is not a limit. Numbers claimed by other passes never
    /// qualify.
    fn result_limit(
        &self,
        tokens: &[NormalizedToken],
        claimed: &HashSet<usize>,
    ) -> Option<NonZeroU32> {
        tokens.iter().enumerate().find_map(|(idx, token)| {
            if claimed.contains(&idx) {
                return None;
            }
            let n = NonZeroU32::new(token.number()?)?;

            let after_cue = idx
                .checked_sub(1)
                .and_then(|prev| tokens.get(prev))
                .is_some_and(|prev| self.vocabulary.is_limit_cue(&prev.norm));

            let opens_request = tokens[..idx]
                .iter()
                .rev()
                .find(|t| !matches!(t.pos, PartOfSpeech::Pronoun | PartOfSpeech::Determiner))
                .map_or(true, |t| DISPLAY_VERBS.contains(&t.norm.as_str()));

            let counts_noun = opens_request
                && tokens
                    .iter()
                    .skip(idx + 1)
                    .take(LIMIT_LOOKAHEAD)
                    .take_while(|t| {
                        !matches!(t.pos, PartOfSpeech::Number | PartOfSpeech::Adposition)
                    })
                    .any(|t| self.vocabulary.is_intent_keyword(&t.lemma));

            (after_cue || counts_noun).then_some(n)
        })
    }
}

struct AgeMatch {
    filter: AgeFilter,
    /// Token indices the cue covers.
    tokens: std::ops::Range<usize>,
}

/// Index just past `phrase` if the tokens at `start` spell it out.
fn match_phrase(tokens: &[NormalizedToken], start: usize, phrase: &[String]) -> Option<usize> {
    let end = start + phrase.len();
    let window = tokens.get(start..end)?;
    window
        .iter()
        .zip(phrase)
        .all(|(t, word)| &t.norm == word)
        .then_some(end)
}

fn number_at(tokens: &[NormalizedToken], i: usize) -> Option<u32> {
    tokens.get(i)?.number()
}
