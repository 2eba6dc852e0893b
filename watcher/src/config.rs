//! Command-line flags and email settings.
//!
//! Flags fall back to `JOBWATCH_*` environment variables; email settings
//! come only from the environment (a `.env` file is honored).

use std::env;
use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use common::{ConfigurationError, DEFAULT_KEYWORDS, MatchMode};
use lettre::message::Mailbox;

pub const DEFAULT_LISTING_URL: &str =
    "https://jobs.rwfm.tamu.edu/search/?PageSize=50&PageNum={page}#results";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Watch a job board and email new postings that match a keyword list.
#[derive(Debug, Parser)]
#[command(name = "job-watcher", version)]
pub struct Cli {
    /// Listing page URL; `{page}` is replaced by 1, 2, ... up to --max-pages
    #[arg(long, env = "JOBWATCH_LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// CSS selector matching one posting element on the listing page
    #[arg(long, env = "JOBWATCH_ITEM_SELECTOR", default_value = "div[class*='job']")]
    pub item_selector: String,

    #[arg(long, env = "JOBWATCH_MAX_PAGES", default_value_t = 10)]
    pub max_pages: u32,

    /// Postings older than this many days are ignored
    #[arg(long, env = "JOBWATCH_WINDOW_DAYS", default_value_t = 7)]
    pub window_days: u32,

    /// JSON file holding the ids of postings already emailed
    #[arg(long, env = "JOBWATCH_SEEN_FILE", default_value = "sent_jobs.json")]
    pub seen_file: PathBuf,

    /// `substring` or `whole-word`
    #[arg(long, env = "JOBWATCH_MATCH_MODE", default_value = "substring")]
    pub match_mode: MatchMode,

    /// Comma-separated keyword list (defaults to the built-in vocabulary)
    #[arg(long, env = "JOBWATCH_KEYWORDS", value_delimiter = ',')]
    pub keywords: Vec<String>,

    #[arg(long, env = "JOBWATCH_BOARD_NAME", default_value = "TAMU")]
    pub board_name: String,

    /// Read raw postings from a JSON file instead of fetching the board
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl Cli {
    /// Configured keywords, trimmed, or the default vocabulary when none
    /// are left.
    pub fn keywords(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if configured.is_empty() {
            DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
        } else {
            configured
        }
    }
}

/// SMTP delivery settings.
#[derive(Clone)]
pub struct EmailConfig {
    pub from: Mailbox,
    pub password: String,
    pub to: Mailbox,
    pub smtp_server: String,
    pub smtp_port: u16,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("from", &self.from.to_string())
            .field("password", &"<redacted>")
            .field("to", &self.to.to_string())
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl EmailConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load through `lookup`; blank values count as missing.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let from = get("FROM_EMAIL");
        let password = get("EMAIL_PASSWORD");
        let to = get("TO_EMAIL");

        let missing: Vec<String> = [
            ("FROM_EMAIL", from.is_none()),
            ("EMAIL_PASSWORD", password.is_none()),
            ("TO_EMAIL", to.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_string())
        .collect();

        let (Some(from), Some(password), Some(to)) = (from, password, to) else {
            return Err(ConfigurationError::Missing(missing));
        };

        let smtp_port = match get("SMTP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigurationError::Invalid {
                name: "SMTP_PORT".to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            from: parse_mailbox("FROM_EMAIL", &from)?,
            password,
            to: parse_mailbox("TO_EMAIL", &to)?,
            smtp_server: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
            smtp_port,
        })
    }
}

fn parse_mailbox(name: &str, value: &str) -> Result<Mailbox, ConfigurationError> {
    value.parse().map_err(|e: lettre::address::AddressError| ConfigurationError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_keyword_list() {
        let cli = Cli::try_parse_from(["job-watcher", "--keywords", "herp, turtle,,"]).unwrap();
        assert_eq!(cli.keywords(), vec!["herp", "turtle"]);
    }

    #[test]
    fn test_cli_rejects_unknown_match_mode() {
        assert!(Cli::try_parse_from(["job-watcher", "--match-mode", "fuzzy"]).is_err());
        let cli = Cli::try_parse_from(["job-watcher", "--match-mode", "whole-word"]).unwrap();
        assert_eq!(cli.match_mode, MatchMode::WholeWord);
    }

    #[test]
    fn test_email_config_defaults() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("FROM_EMAIL", "watcher@example.com"),
            ("EMAIL_PASSWORD", "app-password"),
            ("TO_EMAIL", "me@example.com"),
            ("SMTP_PORT", "  "),
        ]))
        .unwrap();

        assert_eq!(config.smtp_server, DEFAULT_SMTP_SERVER);
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.to.email.to_string(), "me@example.com");
        assert!(!format!("{config:?}").contains("app-password"));
    }

    #[test]
    fn test_email_config_reports_every_missing_variable() {
        let err = EmailConfig::from_lookup(lookup(&[
            ("FROM_EMAIL", "watcher@example.com"),
            ("TO_EMAIL", " "),
        ]))
        .unwrap_err();

        match err {
            ConfigurationError::Missing(names) => {
                assert_eq!(names, vec!["EMAIL_PASSWORD", "TO_EMAIL"]);
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_email_config_rejects_bad_port_and_address() {
        let base = [
            ("FROM_EMAIL", "watcher@example.com"),
            ("EMAIL_PASSWORD", "pw"),
            ("TO_EMAIL", "me@example.com"),
        ];

        let mut bad_port = base.to_vec();
        bad_port.push(("SMTP_PORT", "smtp"));
        assert!(matches!(
            EmailConfig::from_lookup(lookup(&bad_port)),
            Err(ConfigurationError::Invalid { name, .. }) if name == "SMTP_PORT"
        ));

        let mut bad_from = base.to_vec();
        bad_from[0] = ("FROM_EMAIL", "not an address");
        assert!(matches!(
            EmailConfig::from_lookup(lookup(&bad_from)),
            Err(ConfigurationError::Invalid { name, .. }) if name == "FROM_EMAIL"
        ));
    }
}
