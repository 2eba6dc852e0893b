//! Job collectors: the paginated listing page and a JSON file of raw
//! postings.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use common::{CollectionError, ConfigurationError, JobCollector, RawPosting};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

const PAGE_PLACEHOLDER: &str = "{page}";
const FALLBACK_TITLE_CHARS: usize = 100;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches listing pages and pulls one raw posting out of every element
/// matching the configured selector.
pub struct HttpCollector {
    client: reqwest::blocking::Client,
    pages: Vec<Url>,
    item_selector: Selector,
    heading_selector: Selector,
    link_selector: Selector,
}

impl HttpCollector {
    /// `listing_url` may contain `{page}`; it is then expanded to pages
    /// `1..=max_pages`. Everything is validated here, before any request.
    pub fn new(
        listing_url: &str,
        item_selector: &str,
        max_pages: u32,
    ) -> Result<Self, ConfigurationError> {
        let pages = page_urls(listing_url, max_pages)?;

        let item_selector =
            Selector::parse(item_selector).map_err(|e| ConfigurationError::Invalid {
                name: "JOBWATCH_ITEM_SELECTOR".to_string(),
                reason: e.to_string(),
            })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                name: "HTTP client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            pages,
            item_selector,
            heading_selector: static_selector("h1, h2, h3, h4")?,
            link_selector: static_selector("a[href]")?,
        })
    }

    fn fetch(&self, url: &Url) -> Result<String, CollectionError> {
        let http_err = |e: reqwest::Error| CollectionError::Http {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self.client.get(url.clone()).send().map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(http_err)
    }

    /// Raw postings on one page. Elements without a usable title are
    /// skipped on their own.
    pub fn parse_page(&self, html: &str, page_url: &Url) -> Vec<RawPosting> {
        let document = Html::parse_document(html);

        document
            .select(&self.item_selector)
            .filter_map(|element| {
                let posting = self.parse_element(element, page_url);
                if posting.is_none() {
                    warn!(page = %page_url, "Skipping listing element without a title");
                }
                posting
            })
            .collect()
    }

    fn parse_element(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawPosting> {
        let text = element_text(element);

        let title = element
            .select(&self.heading_selector)
            .chain(element.select(&self.link_selector))
            .map(element_text)
            .find(|t| !t.is_empty())
            .or_else(|| {
                text.lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(|line| line.chars().take(FALLBACK_TITLE_CHARS).collect())
            })?;

        let href = match element.value().name() {
            "a" => element.value().attr("href"),
            _ => element
                .select(&self.link_selector)
                .next()
                .and_then(|link| link.value().attr("href")),
        };
        let url = href
            .and_then(|href| page_url.join(href).ok())
            .map(|u| u.to_string());

        debug!(title = %title, url = ?url, "Found listing");
        Some(RawPosting { title, url, text })
    }
}

impl JobCollector for HttpCollector {
    fn collect(&self) -> Result<Vec<RawPosting>, CollectionError> {
        let mut postings = Vec::new();

        for (i, page_url) in self.pages.iter().enumerate() {
            info!(url = %page_url, "Fetching jobs");

            let html = match self.fetch(page_url) {
                Ok(html) => html,
                Err(e) if i == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Page fetch failed, stopping pagination");
                    break;
                }
            };

            let page = self.parse_page(&html, page_url);
            if page.is_empty() {
                info!(page = i + 1, "No jobs found on page, stopping pagination");
                break;
            }

            info!(page = i + 1, count = page.len(), "Processed page");
            postings.extend(page);
        }

        Ok(postings)
    }
}

/// Reads a JSON array of raw postings, as written by an earlier scrape.
pub struct FileCollector {
    path: PathBuf,
}

impl FileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JobCollector for FileCollector {
    fn collect(&self) -> Result<Vec<RawPosting>, CollectionError> {
        let content = fs::read_to_string(&self.path).map_err(|source| CollectionError::Io {
            path: self.path.clone(),
            source,
        })?;

        let items: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| CollectionError::Parse(e.to_string()))?;

        let postings = items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<RawPosting>(item) {
                Ok(posting) => Some(posting),
                Err(e) => {
                    warn!(index = i, error = %e, "Skipping malformed posting");
                    None
                }
            })
            .collect();

        Ok(postings)
    }
}

fn page_urls(listing_url: &str, max_pages: u32) -> Result<Vec<Url>, ConfigurationError> {
    let parse = |raw: &str| {
        Url::parse(raw).map_err(|e| ConfigurationError::Invalid {
            name: "JOBWATCH_LISTING_URL".to_string(),
            reason: e.to_string(),
        })
    };

    if !listing_url.contains(PAGE_PLACEHOLDER) {
        return Ok(vec![parse(listing_url)?]);
    }

    (1..=max_pages.max(1))
        .map(|page| parse(&listing_url.replace(PAGE_PLACEHOLDER, &page.to_string())))
        .collect()
}

fn static_selector(css: &str) -> Result<Selector, ConfigurationError> {
    Selector::parse(css).map_err(|e| ConfigurationError::Invalid {
        name: css.to_string(),
        reason: e.to_string(),
    })
}

/// Element text with each text node trimmed; block-ish breaks become
/// newlines so the first line can stand in for a title.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
