//! Lexical analysis of free-text queries.
//!
//! The analyzer wraps the Snowball English stemmer (`rust-stemmers`) and a small closed-class
//! word table. It splits text into alphanumeric runs, lower-cases them, derives a lemma and
//! assigns a coarse part-of-speech tag.
//!
//! The lemma is an irregular-form lookup (`women` -> `woman`) falling back to the Snowball stem,
//! so `patient`/`patients` collapse to the same lemma while `diabetic` keeps its own. Vocabulary
//! tables are run through [`LexicalAnalyzer::lemmatize`] when they are loaded, which keeps table
//! lookups and query tokens in the same normal form.

use crate::AnalysisError;
use rust_stemmers::{Algorithm, Stemmer};
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Default maximum query length, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 500;

const IRREGULAR_LEMMAS: &[(&str, &str)] = &[
    ("women", "woman"),
    ("men", "man"),
    ("people", "person"),
    ("children", "child"),
    ("ladies", "lady"),
    // Adjectival condition forms stay apart from the disease noun so that naming a disease
    // does not read as asking for conditions.
    ("diabetic", "diabetic"),
    ("diabetics", "diabetic"),
    ("hypertensive", "hypertensive"),
    ("hypertensives", "hypertensive"),
    ("asthmatic", "asthmatic"),
    ("asthmatics", "asthmatic"),
    ("obese", "obese"),
    ("depressed", "depressed"),
];

const ADPOSITIONS: &[&str] = &[
    "over", "under", "above", "below", "between", "than", "of", "in", "on", "at", "with",
    "without", "for", "from", "to", "by", "about", "after", "before", "since", "into",
];
const CONJUNCTIONS: &[&str] = &["and", "or", "but", "nor"];
const DETERMINERS: &[&str] = &[
    "a", "an", "the", "all", "any", "some", "every", "each", "this", "that", "these", "those",
    "no",
];
const PRONOUNS: &[&str] = &[
    "i", "me", "my", "we", "us", "our", "you", "your", "they", "them", "their", "he", "him",
    "his", "she", "her", "it", "its", "who", "whom", "whose", "which", "what",
];
const VERBS: &[&str] = &[
    "show", "list", "find", "get", "display", "give", "fetch", "search", "retrieve", "return",
    "have", "has", "had", "is", "are", "was", "were", "be", "been", "take", "taking", "diagnosed",
    "prescribed", "want", "need", "see", "look",
];
const ADJECTIVES: &[&str] = &[
    "old", "older", "young", "younger", "high", "low", "elderly", "chronic", "acute", "male",
    "female", "obese",
];
const ADJECTIVE_SUFFIXES: &[&str] = &["ic", "ive", "ous", "ful", "less", "able", "ible", "ary"];

/// Coarse part-of-speech tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adposition,
    Conjunction,
    Determiner,
    Pronoun,
    Number,
    Other,
}

/// One token of a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedToken {
    /// Token exactly as written.
    pub text: String,
    /// Lower-cased text.
    pub norm: String,
    /// Lemma used for vocabulary matching.
    pub lemma: String,
    pub pos: PartOfSpeech,
    /// Byte range of the token in the original query.
    pub span: Range<usize>,
}

impl NormalizedToken {
    /// Numeric value of a number token that fits in `u32`.
    pub fn number(&self) -> Option<u32> {
        if self.pos != PartOfSpeech::Number {
            return None;
        }
        self.norm.parse().ok()
    }
}

/// Tokeniser, lemmatiser and tagger for query text.
pub struct LexicalAnalyzer {
    stemmer: Stemmer,
    max_length: usize,
}

impl fmt::Debug for LexicalAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexicalAnalyzer")
            .field("algorithm", &"snowball-english")
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl Default for LexicalAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_LENGTH)
    }
}

impl LexicalAnalyzer {
    /// Creates an analyzer that rejects inputs longer than `max_length` characters.
    pub fn new(max_length: usize) -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Splits `text` into normalised tokens.
    ///
    /// Empty or whitespace-only input yields an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InputTooLong`] if `text` exceeds the configured maximum length.
    pub fn analyze(&self, text: &str) -> Result<Vec<NormalizedToken>, AnalysisError> {
        let length = text.chars().count();
        if length > self.max_length {
            return Err(AnalysisError::InputTooLong {
                length,
                max: self.max_length,
            });
        }

        Ok(split_words(text)
            .into_iter()
            .map(|span| {
                let raw = &text[span.clone()];
                let norm = raw.to_lowercase();
                let lemma = self.lemma_of(&norm);
                let pos = tag(&norm);
                NormalizedToken {
                    text: raw.to_string(),
                    norm,
                    lemma,
                    pos,
                    span,
                }
            })
            .collect())
    }

    /// Lemma of a single word, in the same normal form as [`NormalizedToken::lemma`].
    pub fn lemmatize(&self, word: &str) -> String {
        self.lemma_of(&word.to_lowercase())
    }

    /// Lemmas of every word in `phrase`, split the same way queries are.
    pub fn lemmatize_phrase(&self, phrase: &str) -> Vec<String> {
        split_words(phrase)
            .into_iter()
            .map(|span| self.lemmatize(&phrase[span]))
            .collect()
    }

    fn lemma_of(&self, norm: &str) -> String {
        if let Some((_, lemma)) = IRREGULAR_LEMMAS.iter().find(|(word, _)| *word == norm) {
            return (*lemma).to_string();
        }
        if norm.chars().all(|c| c.is_ascii_digit()) {
            return norm.to_string();
        }
        self.stemmer.stem(norm).into_owned()
    }
}

/// Lower-cased words of `phrase`, split the same way queries are.
pub fn phrase_words(phrase: &str) -> Vec<String> {
    split_words(phrase)
        .into_iter()
        .map(|span| phrase[span].to_lowercase())
        .collect()
}

/// Byte spans of the maximal alphanumeric runs in `text`.
fn split_words(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if c.is_alphanumeric() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            spans.push(s..idx);
        }
    }
    if let Some(s) = start {
        spans.push(s..text.len());
    }

    spans
}

fn tag(norm: &str) -> PartOfSpeech {
    if norm.chars().all(|c| c.is_ascii_digit()) {
        return PartOfSpeech::Number;
    }
    if ADPOSITIONS.contains(&norm) {
        return PartOfSpeech::Adposition;
    }
    if CONJUNCTIONS.contains(&norm) {
        return PartOfSpeech::Conjunction;
    }
    if DETERMINERS.contains(&norm) {
        return PartOfSpeech::Determiner;
    }
    if PRONOUNS.contains(&norm) {
        return PartOfSpeech::Pronoun;
    }
    if VERBS.contains(&norm) {
        return PartOfSpeech::Verb;
    }
    if ADJECTIVES.contains(&norm)
        || (norm.len() > 4 && ADJECTIVE_SUFFIXES.iter().any(|s| norm.ends_with(s)))
    {
        return PartOfSpeech::Adjective;
    }
    if norm.chars().all(char::is_alphabetic) {
        PartOfSpeech::Noun
    } else {
        PartOfSpeech::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_yield_no_tokens() {
        let analyzer = LexicalAnalyzer::default();
        assert!(analyzer.analyze("").expect("analyze").is_empty());
        assert!(analyzer.analyze("   \t\n ").expect("analyze").is_empty());
        assert!(analyzer.analyze("?!,.").expect("analyze").is_empty());
    }

    #[test]
    fn rejects_oversized_input() {
        let analyzer = LexicalAnalyzer::new(10);
        let err = analyzer.analyze("show all patients").expect_err("too long");
        match err {
            AnalysisError::InputTooLong { length, max } => {
                assert_eq!(length, 17);
                assert_eq!(max, 10);
            }
        }
        assert!(analyzer.analyze("patients").is_ok());
    }

    #[test]
    fn length_is_counted_in_characters() {
        let analyzer = LexicalAnalyzer::new(3);
        assert!(analyzer.analyze("äöü").is_ok());
    }

    #[test]
    fn spans_point_into_original_text() {
        let analyzer = LexicalAnalyzer::default();
        let text = "Show diabetic Patients, over 50!";
        let tokens = analyzer.analyze(text).expect("analyze");
        let words: Vec<_> = tokens.iter().map(|t| &text[t.span.clone()]).collect();
        assert_eq!(words, vec!["Show", "diabetic", "Patients", "over", "50"]);
        assert_eq!(tokens[2].norm, "patients");
        assert_eq!(tokens[2].text, "Patients");
    }

    #[test]
    fn lemmas_collapse_inflections() {
        let analyzer = LexicalAnalyzer::default();
        assert_eq!(analyzer.lemmatize("patients"), analyzer.lemmatize("patient"));
        assert_eq!(analyzer.lemmatize("Diabetics"), analyzer.lemmatize("diabetic"));
        assert_eq!(analyzer.lemmatize("women"), "woman");
        assert_eq!(analyzer.lemmatize("50"), "50");
    }

    #[test]
    fn adjectival_condition_forms_keep_their_own_lemma() {
        let analyzer = LexicalAnalyzer::default();
        for (adjective, noun) in [
            ("diabetic", "diabetes"),
            ("hypertensive", "hypertension"),
            ("obese", "obesity"),
            ("depressed", "depression"),
        ] {
            assert_ne!(
                analyzer.lemmatize(adjective),
                analyzer.lemmatize(noun),
                "{adjective}"
            );
        }
    }

    #[test]
    fn tags_numbers_and_closed_classes() {
        let analyzer = LexicalAnalyzer::default();
        let tokens = analyzer
            .analyze("show all diabetic patients over 50 and under 70")
            .expect("analyze");
        let tags: Vec<_> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(
            tags,
            vec![
                PartOfSpeech::Verb,
                PartOfSpeech::Determiner,
                PartOfSpeech::Adjective,
                PartOfSpeech::Noun,
                PartOfSpeech::Adposition,
                PartOfSpeech::Number,
                PartOfSpeech::Conjunction,
                PartOfSpeech::Adposition,
                PartOfSpeech::Number,
            ]
        );
        assert_eq!(tokens[5].number(), Some(50));
        assert_eq!(tokens[3].number(), None);
    }

    #[test]
    fn huge_numbers_are_not_numeric_values() {
        let analyzer = LexicalAnalyzer::default();
        let tokens = analyzer.analyze("over 99999999999").expect("analyze");
        assert_eq!(tokens[1].pos, PartOfSpeech::Number);
        assert_eq!(tokens[1].number(), None);
    }

    #[test]
    fn punctuation_splits_tokens() {
        let analyzer = LexicalAnalyzer::default();
        let tokens = analyzer.analyze("ages 30-45").expect("analyze");
        let norms: Vec<_> = tokens.iter().map(|t| t.norm.as_str()).collect();
        assert_eq!(norms, vec!["ages", "30", "45"]);
    }

    #[test]
    fn phrase_lemmas_match_token_lemmas() {
        let analyzer = LexicalAnalyzer::default();
        let from_phrase = analyzer.lemmatize_phrase("High blood pressure");
        let from_query: Vec<_> = analyzer
            .analyze("high blood pressure")
            .expect("analyze")
            .into_iter()
            .map(|t| t.lemma)
            .collect();
        assert_eq!(from_phrase, from_query);
        assert_eq!(phrase_words("Older  than"), vec!["older", "than"]);
    }
}
