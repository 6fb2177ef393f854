//! Email Sender — submits the generated email over authenticated SMTP.
//!
//! Transport: STARTTLS relay (smtp.gmail.com:587 unless overridden), one
//! connection per send, closed once the message is accepted.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_SUBJECT: &str = "AI-Powered Dev Services Inquiry";

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("relay rejected the message: {0}")]
    Rejected(String),
}

/// Constructed at send time from the session's email and the sender's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Login for the mail relay. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        message: &EmailMessage,
        credentials: &SmtpCredentials,
    ) -> Result<(), SendError>;
}

pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(
        &self,
        message: &EmailMessage,
        credentials: &SmtpCredentials,
    ) -> Result<(), SendError> {
        let email = build_message(message)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .build();

        let response = transport.send(email).await?;
        if !response.is_positive() {
            return Err(SendError::Rejected(response.code().to_string()));
        }
        info!("Email to {} accepted by {}:{}", message.to, self.host, self.port);
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| SendError::Address {
            address: address.to_string(),
            source,
        })
}

/// From/To/Subject headers over a multipart body holding one plain-text part.
pub fn build_message(message: &EmailMessage) -> Result<Message, SendError> {
    let email = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .to(parse_mailbox(&message.to)?)
        .subject(message.subject.as_str())
        .multipart(
            MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(message.body.clone()),
            ),
        )?;
    Ok(email)
}
