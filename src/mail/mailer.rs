//! Mailer trait and SMTPS implementation.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use snafu::prelude::*;
use std::env;
use tracing::info;

use super::Email;
use crate::error::{
    AttachmentTypeSnafu, BuildMessageSnafu, InvalidAddressSnafu, InvalidPortSnafu, MailError,
    MissingCredentialSnafu, SmtpAuthSnafu, SmtpConnectSnafu, TransmitSnafu,
};

/// Async email sending seam.
///
/// The dispatch loop is generic over this trait so it can be exercised with
/// a recording mock in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email on the open session.
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// SMTP credentials and endpoint, sourced from the process environment.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SmtpConfig {
    /// Read `EMAIL_USER`, `EMAIL_PASS`, `EMAIL_HOST`, and `EMAIL_PORT`
    /// (default 465) from the environment, loading `.env` first if present.
    ///
    /// Any missing required value is fatal before a connection is opened.
    pub fn from_env() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let username = require_env("EMAIL_USER")?;
        let password = require_env("EMAIL_PASS")?;
        let host = require_env("EMAIL_HOST")?;
        let port = match env::var("EMAIL_PORT") {
            Ok(value) => value
                .parse()
                .context(InvalidPortSnafu { value: value.clone() })?,
            Err(_) => 465,
        };

        Ok(Self {
            host,
            port,
            username,
            password,
        })
    }
}

fn require_env(name: &str) -> Result<String, MailError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => MissingCredentialSnafu { name }.fail(),
    }
}

/// SMTPS-based mailer using lettre, authenticated once for the whole run.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Open and verify the transport session.
    ///
    /// `relay` uses implicit TLS (SMTPS); the connection test exercises
    /// authentication so bad credentials fail here, before any send.
    pub async fn connect(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.username.parse().context(InvalidAddressSnafu {
            address: config.username.clone(),
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context(SmtpConnectSnafu {
                host: config.host.clone(),
            })?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let authenticated = transport
            .test_connection()
            .await
            .context(SmtpConnectSnafu {
                host: config.host.clone(),
            })?;
        ensure!(
            authenticated,
            SmtpAuthSnafu {
                host: config.host.clone()
            }
        );

        info!("Connected to SMTP server {}:{}", config.host, config.port);
        Ok(Self { transport, from })
    }
}

/// Assemble the lettre message: alternative plain/HTML bodies wrapped in a
/// mixed multipart with the binary attachments.
pub(crate) fn build_message(from: &Mailbox, email: &Email) -> Result<Message, MailError> {
    let to = Mailbox::new(
        Some(email.to_name.clone()),
        email.to_email.parse().context(InvalidAddressSnafu {
            address: email.to_email.clone(),
        })?,
    );

    let mut parts = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
        email.text.clone(),
        email.html.clone(),
    ));
    for attachment in &email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .ok()
            .context(AttachmentTypeSnafu {
                mime: attachment.content_type.clone(),
            })?;
        parts = parts.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.bytes.clone(), content_type),
        );
    }

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone())
        .multipart(parts)
        .context(BuildMessageSnafu)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;
        self.transport.send(message).await.context(TransmitSnafu)?;
        Ok(())
    }
}
