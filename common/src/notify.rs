//! Digest rendering and the notifier seam.

use chrono::{DateTime, Local};

use crate::error::NotifyError;
use crate::posting::{Posting, truncate};

/// Description length shown in a digest, independent of the stored
/// description length.
pub const DISPLAY_DESCRIPTION_LIMIT: usize = 300;

/// Delivers one batch of new postings.
///
/// Implementations must treat an empty batch as a successful no-op and
/// must report every delivery failure; the pipeline only marks postings
/// as seen after `Ok(())`.
pub trait Notifier {
    fn notify(&self, postings: &[Posting]) -> Result<(), NotifyError>;
}

/// Settings that shape a digest.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    /// Job board name shown in the subject and heading
    pub board_name: String,
    /// Full vocabulary, listed in the footer
    pub keywords: Vec<String>,
}

/// Rendered notification for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

pub fn render_digest(
    postings: &[Posting],
    options: &DigestOptions,
    now: DateTime<Local>,
) -> Digest {
    let count = postings.len();
    let subject = format!(
        "{} Job Alert - {} New Jobs Found ({})",
        options.board_name,
        count,
        now.format("%Y-%m-%d")
    );

    Digest {
        subject,
        text_body: render_text(postings, options),
        html_body: render_html(postings, options),
    }
}

fn render_text(postings: &[Posting], options: &DigestOptions) -> String {
    let mut body = format!(
        "{} Job Alert\n\nFound {} new job(s) matching your keywords:\n",
        options.board_name,
        postings.len()
    );

    for (i, posting) in postings.iter().enumerate() {
        body.push_str(&format!(
            "\n{}. {}\n   {}\n   {}\n   Matching keywords: {}\n   Scraped: {}\n",
            i + 1,
            posting.title,
            posting.url,
            truncate(&posting.description, DISPLAY_DESCRIPTION_LIMIT),
            posting.matched_keywords.join(", "),
            posting.scraped_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }

    body.push_str(&format!(
        "\nThis is an automated job alert. Keywords: {}\n",
        options.keywords.join(", ")
    ));
    body
}

fn render_html(postings: &[Posting], options: &DigestOptions) -> String {
    let mut html = String::from(
        r#"<html>
<head>
<style>
  body { font-family: Arial, sans-serif; margin: 20px; }
  .job { border: 1px solid #ddd; padding: 15px; margin: 10px 0; border-radius: 5px; }
  .title { color: #500000; font-size: 18px; font-weight: bold; margin-bottom: 10px; }
  .url { color: #0066cc; text-decoration: none; }
  .description { margin-top: 10px; color: #333; }
  .date { color: #666; font-size: 12px; }
  .keywords { background-color: #f0f0f0; padding: 5px; margin-top: 10px; font-size: 12px; }
</style>
</head>
<body>
"#,
    );

    html.push_str(&format!(
        "<h2>{} Job Alert</h2>\n<p>Found {} new job(s) matching your keywords:</p>\n",
        escape_html(&options.board_name),
        postings.len()
    ));

    for posting in postings {
        html.push_str(&format!(
            r#"<div class="job">
  <div class="title">{title}</div>
  <div><a href="{url}" class="url">View Job Posting</a></div>
  <div class="description">{description}</div>
  <div class="keywords"><strong>Matching keywords:</strong> {keywords}</div>
  <div class="date">Scraped: {scraped}</div>
</div>
"#,
            title = escape_html(&posting.title),
            url = escape_html(&posting.url),
            description = escape_html(&truncate(&posting.description, DISPLAY_DESCRIPTION_LIMIT)),
            keywords = escape_html(&posting.matched_keywords.join(", ")),
            scraped = posting.scraped_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }

    html.push_str(&format!(
        "<p><em>This is an automated job alert. Keywords: {}</em></p>\n</body>\n</html>\n",
        escape_html(&options.keywords.join(", "))
    ));
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
