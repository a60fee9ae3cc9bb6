//! HTTP mail delivery.

use async_trait::async_trait;
use serde::Serialize;

use rental_core::{EmailMessage, MailError, Mailer, TemplateData};

use crate::config::MailerConfig;
use crate::error::Error;
use crate::rest::{check, map_http};

/// Body posted to the mail endpoint.
#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    html: String,
    template: &'a str,
    data: &'a TemplateData,
}

/// Mailer posting rendered messages to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    /// Build a mailer from configuration.
    pub fn new(config: MailerConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    async fn post(&self, message: &EmailMessage) -> Result<(), Error> {
        let body = OutgoingMail {
            from: &self.config.sender,
            to: &message.recipient,
            subject: message.rendered_subject(),
            html: message.rendered_html(),
            template: &message.template_name,
            data: &message.template_data,
        };

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_http)?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.recipient.trim().is_empty() {
            return Err(MailError::MissingRecipient);
        }

        self.post(message).await?;
        tracing::debug!(
            recipient = %message.recipient,
            template = %message.template_name,
            "email delivered to mail endpoint"
        );
        Ok(())
    }
}
