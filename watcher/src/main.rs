//! Job board watcher
//!
//! Fetches the configured listing page, keeps postings that are recent and
//! match the keyword list, and emails the ones not sent before.
//! Meant to be run once per schedule tick (cron, CI schedule).

mod collector;
mod config;
mod mailer;

use anyhow::{Context, Result};
use clap::Parser;
use common::{DigestOptions, JobCollector, Pipeline, PipelineConfig, SeenStore};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::collector::{FileCollector, HttpCollector};
use crate::config::{Cli, EmailConfig};
use crate::mailer::SmtpNotifier;

fn main() -> Result<()> {
    // Load .env file if present, before flags read their env fallbacks
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let email = EmailConfig::from_env().map_err(|e| {
        error!(error = %e, "Set FROM_EMAIL, EMAIL_PASSWORD and TO_EMAIL (e.g. as CI secrets)");
        e
    })?;
    info!(
        from = %email.from,
        to = %email.to,
        smtp = %format!("{}:{}", email.smtp_server, email.smtp_port),
        "Email configuration loaded"
    );

    let keywords = cli.keywords();
    let notifier = SmtpNotifier::new(
        &email,
        DigestOptions {
            board_name: cli.board_name.clone(),
            keywords: keywords.clone(),
        },
    )?;

    let collector: Box<dyn JobCollector> = match &cli.input {
        Some(path) => {
            info!(path = %path.display(), "Reading raw postings from file");
            Box::new(FileCollector::new(path))
        }
        None => Box::new(HttpCollector::new(
            &cli.listing_url,
            &cli.item_selector,
            cli.max_pages,
        )?),
    };

    let mut store = SeenStore::open(&cli.seen_file)
        .with_context(|| format!("Failed to open seen-set {}", cli.seen_file.display()))?;

    let pipeline = Pipeline::new(PipelineConfig {
        keywords,
        match_mode: cli.match_mode,
        window_days: cli.window_days,
    });

    info!(
        window_days = cli.window_days,
        match_mode = %cli.match_mode,
        known = store.len(),
        "Starting job scrape"
    );
    let summary = pipeline
        .run(collector.as_ref(), &notifier, &mut store)
        .context("Job scrape failed")?;

    info!(
        collected = summary.collected,
        stale = summary.stale,
        invalid = summary.invalid,
        unmatched = summary.unmatched,
        already_seen = summary.already_seen,
        notified = summary.notified,
        "Job scrape completed"
    );
    Ok(())
}
