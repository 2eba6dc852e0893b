use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::InvalidPosting;
use crate::keywords::KeywordMatch;

/// Stored description length, in characters.
pub const DESCRIPTION_LIMIT: usize = 1000;

/// Marker appended to any truncated text.
pub const TRUNCATION_MARKER: &str = "...";

/// Placeholder used when a listing carries no link.
pub const UNKNOWN_URL: &str = "No URL Found";

const MIN_TITLE_CHARS: usize = 3;
const MAX_ID_CHARS: usize = 200;

/// Unvalidated listing as handed over by a job collector.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RawPosting {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Full text of the listing element, used for date detection.
    #[serde(default)]
    pub text: String,
}

impl RawPosting {
    pub fn new(title: impl Into<String>, url: Option<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url,
            text: text.into(),
        }
    }
}

/// A listing that passed validation and the keyword filter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub matched_keywords: Vec<String>,
    pub scraped_at: DateTime<Local>,
}

/// Title/url/description triple before keyword filtering.
///
/// Splitting validation from matching lets the pipeline run the keyword
/// matcher on the already-truncated description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
}

impl Candidate {
    pub fn from_raw(raw: &RawPosting) -> Result<Self, InvalidPosting> {
        let title = raw.title.trim();
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(InvalidPosting::TitleTooShort(title.to_string()));
        }

        let url = raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(UNKNOWN_URL)
            .to_string();

        let description = truncate(&collapse_whitespace(&raw.text), DESCRIPTION_LIMIT);

        Ok(Self {
            id: posting_id(title, &url),
            title: title.to_string(),
            url,
            description,
        })
    }

    /// Text the keyword matcher runs against.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Promote to a [`Posting`]. Refuses a non-match so that no posting
    /// past the filter stage has an empty keyword list.
    pub fn into_posting(
        self,
        matched: KeywordMatch,
        scraped_at: DateTime<Local>,
    ) -> Result<Posting, InvalidPosting> {
        if !matched.matched || matched.hits.is_empty() {
            return Err(InvalidPosting::NoKeywordMatch);
        }

        Ok(Posting {
            id: self.id,
            title: self.title,
            url: self.url,
            description: self.description,
            matched_keywords: matched.hits,
            scraped_at,
        })
    }
}

/// Stable identifier for a listing: `{title}_{url}` with spaces and
/// slashes replaced by underscores, capped at 200 characters.
pub fn posting_id(title: &str, url: &str) -> String {
    format!("{}_{}", title, url)
        .chars()
        .map(|c| if c == ' ' || c == '/' { '_' } else { c })
        .take(MAX_ID_CHARS)
        .collect()
}

/// Cut `text` to `limit` characters and append [`TRUNCATION_MARKER`] when
/// anything was dropped.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}{}", &text[..end], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
