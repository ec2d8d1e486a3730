// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::config::{env_opt, env_or};
use crate::services::template::TextTemplate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Configuration for the newsletter mailer.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_email: String,
    pub from_name: String,
    /// Public origin used to build unsubscribe links.
    pub public_base_url: String,
}

impl EmailConfig {
    /// Load SMTP configuration. Returns `None` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(smtp_host) = env_opt("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: env_or("SMTP_PORT", 587)?,
            smtp_username: env_opt("SMTP_USERNAME"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            smtp_tls: env_or("SMTP_TLS", true)?,
            from_email: env_opt("SMTP_FROM_EMAIL")
                .context("SMTP_FROM_EMAIL must be set when SMTP_HOST is set")?,
            from_name: env_opt("SMTP_FROM_NAME").unwrap_or_else(|| "Site Admin".to_string()),
            public_base_url: env_opt("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        }))
    }
}

const NEWSLETTER_TEMPLATE: TextTemplate =
    TextTemplate::new(include_str!("../../templates/emails/newsletter.txt"));

/// Render a newsletter body with its footer.
pub fn render_newsletter(body: &str, site: &str, unsubscribe_link: &str) -> String {
    NEWSLETTER_TEMPLATE.render(&[
        ("body", body),
        ("site", site),
        ("unsubscribe_link", unsubscribe_link),
    ])
}

/// Delivers one newsletter copy to one subscriber.
#[async_trait]
pub trait NewsletterSender: Send + Sync {
    /// `unsubscribe_token` is the raw token for the recipient's personal link.
    async fn send_newsletter(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
        site: &str,
        unsubscribe_token: &str,
    ) -> Result<()>;
}

/// SMTP mailer for newsletters.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let builder = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .context("Failed to create SMTP relay")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let transport = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => builder
                .credentials(Credentials::new(user.clone(), password.clone()))
                .build(),
            _ => builder.build(),
        };

        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .context("Invalid from email address")?;

        Ok(Self {
            transport,
            from_mailbox,
            config,
        })
    }

    pub fn unsubscribe_link(&self, site: &str, token: &str) -> String {
        unsubscribe_link(&self.config.public_base_url, site, token)
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to_mailbox: Mailbox = to.parse().context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to_mailbox)
            .subject(subject)
            .body(body.to_string())
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }
}

#[async_trait]
impl NewsletterSender for EmailService {
    async fn send_newsletter(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
        site: &str,
        unsubscribe_token: &str,
    ) -> Result<()> {
        let link = self.unsubscribe_link(site, unsubscribe_token);
        let text = render_newsletter(body, site, &link);
        self.send_email(to_email, subject, &text).await
    }
}

fn unsubscribe_link(base_url: &str, site: &str, token: &str) -> String {
    format!("{base_url}/api/subscriptions/unsubscribe/{token}?site={site}")
}
