//! SendGrid v3 mail API transport.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{DeliveryFuture, EmailReport, Notifier};
use crate::config::SendGridConfig;
use crate::error::DeliveryError;

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MailAttachment<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    media_type: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct MailAttachment<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    media_type: &'a str,
    disposition: &'static str,
}

/// Delivers reports through the SendGrid HTTP API.
pub struct SendGridNotifier {
    client: Client,
    api_key: String,
    sender: String,
    endpoint: String,
}

impl SendGridNotifier {
    /// Creates a notifier posting to `{base_url}/v3/mail/send`.
    pub fn new(config: &SendGridConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
            endpoint: format!("{}/v3/mail/send", config.base_url.trim_end_matches('/')),
        })
    }

    fn payload<'a>(&'a self, report: &'a EmailReport) -> MailSend<'a> {
        MailSend {
            personalizations: vec![Personalization {
                to: vec![Address { email: &report.to }],
            }],
            from: Address {
                email: &self.sender,
            },
            subject: &report.subject,
            content: vec![
                Content {
                    media_type: "text/plain",
                    value: &report.body_text,
                },
                Content {
                    media_type: "text/html",
                    value: &report.body_html,
                },
            ],
            attachments: report
                .attachments
                .iter()
                .map(|a| MailAttachment {
                    content: a.base64_content(),
                    filename: &a.filename,
                    media_type: &a.media_type,
                    disposition: "attachment",
                })
                .collect(),
        }
    }
}

impl Notifier for SendGridNotifier {
    fn deliver<'a>(&'a self, report: &'a EmailReport) -> DeliveryFuture<'a> {
        Box::pin(async move {
            if !report.to.contains('@') {
                return Err(DeliveryError::InvalidAddress {
                    address: report.to.clone(),
                    reason: "missing '@'".to_string(),
                });
            }

            debug!(
                to = %report.to,
                attachments = report.attachments.len(),
                "Sending report via SendGrid"
            );
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&self.payload(report))
                .send()
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DeliveryError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            info!(to = %report.to, status = status.as_u16(), "Report delivered");
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
