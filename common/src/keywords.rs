//! Keyword matching against posting text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vocabulary used when none is configured.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "reptile",
    "amphibian",
    "herp",
    "turtle",
    "toad",
    "frog",
    "seal",
    "island",
    "whale",
    "cetacean",
    "tortoise",
    "spatial ecology",
    "predator",
    "tropical",
    "hawaii",
    "bear",
    "lion",
    "snake",
    "lizard",
    "alligator",
    "crocodile",
    "chainsaw",
];

/// How a keyword must appear in the text to count as a hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Plain containment: "island" hits "islander".
    #[default]
    Substring,
    /// Occurrence must sit between non-alphanumeric characters or the
    /// text edges: "island" hits "island," but not "islander".
    WholeWord,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "whole-word" | "whole_word" | "word" => Ok(Self::WholeWord),
            other => Err(format!(
                "unknown match mode {other:?} (expected \"substring\" or \"whole-word\")"
            )),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring => f.write_str("substring"),
            Self::WholeWord => f.write_str("whole-word"),
        }
    }
}

/// Result of [`match_keywords`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordMatch {
    pub matched: bool,
    /// Keywords that hit, in vocabulary order. Duplicated keywords hit
    /// twice.
    pub hits: Vec<String>,
}

/// Case-insensitive test of every keyword against `text`.
pub fn match_keywords<S: AsRef<str>>(text: &str, keywords: &[S], mode: MatchMode) -> KeywordMatch {
    if text.trim().is_empty() {
        return KeywordMatch::default();
    }

    let haystack = text.to_lowercase();
    let hits: Vec<String> = keywords
        .iter()
        .map(AsRef::as_ref)
        .filter(|keyword| {
            let needle = keyword.trim().to_lowercase();
            !needle.is_empty() && contains(&haystack, &needle, mode)
        })
        .map(str::to_string)
        .collect();

    KeywordMatch {
        matched: !hits.is_empty(),
        hits,
    }
}

fn contains(haystack: &str, needle: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Substring => haystack.contains(needle),
        MatchMode::WholeWord => haystack.match_indices(needle).any(|(start, _)| {
            let end = start + needle.len();
            let before = haystack[..start].chars().next_back();
            let after = haystack[end..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        }),
    }
}
