//! SMTP delivery of job digests.

use std::time::Duration;

use chrono::Local;
use common::{ConfigurationError, DigestOptions, Notifier, NotifyError, Posting, render_digest};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::EmailConfig;

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
    digest: DigestOptions,
}

impl SmtpNotifier {
    /// Builds the transport without connecting; the connection is opened
    /// per digest.
    pub fn new(config: &EmailConfig, digest: DigestOptions) -> Result<Self, ConfigurationError> {
        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.smtp_server)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_server)
        }
        .map_err(|e| ConfigurationError::Invalid {
            name: "SMTP_SERVER".to_string(),
            reason: e.to_string(),
        })?;

        let credentials = Credentials::new(config.from.email.to_string(), config.password.clone());
        let transport = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self::with_transport(transport, config.from.clone(), config.to.clone(), digest))
    }

    pub fn with_transport(
        transport: SmtpTransport,
        from: Mailbox,
        to: Mailbox,
        digest: DigestOptions,
    ) -> Self {
        Self {
            transport,
            from,
            to,
            digest,
        }
    }

    fn build_message(&self, postings: &[Posting]) -> Result<Message, NotifyError> {
        let digest = render_digest(postings, &self.digest, Local::now());

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(digest.subject)
            .multipart(MultiPart::alternative_plain_html(digest.text_body, digest.html_body))
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, postings: &[Posting]) -> Result<(), NotifyError> {
        if postings.is_empty() {
            info!("No new jobs to send");
            return Ok(());
        }

        let message = self.build_message(postings)?;
        info!(to = %self.to, count = postings.len(), "Sending job digest");

        self.transport
            .send(&message)
            .map_err(|e| NotifyError::Transport(Box::new(e)))?;

        info!(count = postings.len(), "Email sent successfully");
        Ok(())
    }
}
