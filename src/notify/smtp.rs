//! SMTP transport.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{DeliveryFuture, EmailReport, Notifier};
use crate::config::SmtpConfig;
use crate::error::DeliveryError;

/// Port that speaks TLS from the first byte; every other port uses STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Delivers reports through an authenticated SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpNotifier {
    /// Configures the relay. No connection is made until the first delivery.
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&config.from)?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from,
            host: config.host.clone(),
        })
    }

    /// Renders a report as a MIME message: text and HTML alternatives
    /// followed by one part per attachment.
    pub fn build_message(&self, report: &EmailReport) -> Result<Message, DeliveryError> {
        let to = parse_mailbox(&report.to)?;

        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            report.body_text.clone(),
            report.body_html.clone(),
        ));
        for attachment in &report.attachments {
            let content_type = ContentType::parse(&attachment.media_type)
                .map_err(|e| DeliveryError::Build(e.to_string()))?;
            body = body.singlepart(
                MailAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(report.subject.clone())
            .multipart(body)
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl Notifier for SmtpNotifier {
    fn deliver<'a>(&'a self, report: &'a EmailReport) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let message = self.build_message(report)?;
            debug!(
                to = %report.to,
                attachments = report.attachments.len(),
                "Sending report over SMTP"
            );
            let response = self
                .transport
                .send(message)
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;
            info!(to = %report.to, code = %response.code(), "Report delivered");
            Ok(())
        })
    }

    fn verify(&self) -> DeliveryFuture<'_> {
        Box::pin(async move {
            match self.transport.test_connection().await {
                Ok(true) => Ok(()),
                Ok(false) => Err(DeliveryError::Transport(format!(
                    "SMTP relay {} did not accept the connection",
                    self.host
                ))),
                Err(e) => Err(DeliveryError::Transport(e.to_string())),
            }
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
