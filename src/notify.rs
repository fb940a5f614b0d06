//! Report delivery.
//!
//! A [`Notifier`] sends one [`EmailReport`]. SMTP and the SendGrid HTTP API
//! are interchangeable transports chosen by configuration.

pub mod report;
pub mod sendgrid;
pub mod smtp;

#[cfg(test)]
pub(crate) mod test_utils;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::MailConfig;
use crate::error::DeliveryError;

pub use report::{analysis_section, text_to_html, EmailReport};
pub use sendgrid::SendGridNotifier;
pub use smtp::SmtpNotifier;

/// Upper bound for one delivery attempt.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Future returned by [`Notifier`] methods.
pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Sends reports to commit authors.
pub trait Notifier: Send + Sync {
    /// Delivers one report.
    fn deliver<'a>(&'a self, report: &'a EmailReport) -> DeliveryFuture<'a>;

    /// Checks that the transport is reachable.
    fn verify(&self) -> DeliveryFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    /// Transport name for logs.
    fn name(&self) -> &'static str;
}

/// Builds the configured transport.
pub fn create_notifier(config: &MailConfig, timeout: Duration) -> Result<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match config {
        MailConfig::Smtp(smtp) => Box::new(
            SmtpNotifier::new(smtp, timeout).context("Failed to configure SMTP transport")?,
        ),
        MailConfig::SendGrid(sendgrid) => Box::new(
            SendGridNotifier::new(sendgrid, timeout)
                .context("Failed to configure SendGrid transport")?,
        ),
    };
    tracing::info!(transport = notifier.name(), "Mail transport ready");
    Ok(notifier)
}
