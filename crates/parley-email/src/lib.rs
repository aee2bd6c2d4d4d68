// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email channel adapter for the Parley conversation engine.
//!
//! Messages are built with `lettre` and handed to a [`Mailer`]. The shipped
//! mailer is an async SMTP transport; STARTTLS on submission ports,
//! implicit TLS on 465, plaintext only for loopback relays.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use parley_config::model::EmailConfig;
use parley_core::traits::{ChannelAdapter, PluginAdapter};
use parley_core::types::{DeliveryChannel, HealthStatus, MessageId, OutboundMessage};
use parley_core::ParleyError;

/// Delivers a built message.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn deliver(&self, message: Message) -> Result<(), ParleyError>;

    /// Whether the relay accepts connections.
    async fn probe(&self) -> Result<bool, ParleyError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, host: &str, timeout: Duration) -> Result<Self, ParleyError> {
        let builder = if matches!(host, "localhost" | "127.0.0.1" | "::1") {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(smtp_err)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(smtp_err)?
        };
        let mut builder = builder.port(config.smtp_port).timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: Message) -> Result<(), ParleyError> {
        let response = self.transport.send(message).await.map_err(smtp_err)?;
        debug!(code = %response.code(), "smtp relay accepted message");
        Ok(())
    }

    async fn probe(&self) -> Result<bool, ParleyError> {
        self.transport.test_connection().await.map_err(smtp_err)
    }
}

fn smtp_err(e: lettre::transport::smtp::Error) -> ParleyError {
    ParleyError::Channel {
        message: format!("smtp error: {e}"),
        source: Some(Box::new(e)),
    }
}

pub struct EmailChannel<M = SmtpMailer> {
    name: String,
    mailer: M,
    from: Mailbox,
    default_subject: String,
}

impl<M: Mailer> EmailChannel<M> {
    pub fn new(mailer: M, from: Mailbox, default_subject: impl Into<String>) -> Self {
        Self {
            name: "email-smtp".to_string(),
            mailer,
            from,
            default_subject: default_subject.into(),
        }
    }

    fn build(&self, msg: &OutboundMessage, message_id: &str) -> Result<Message, ParleyError> {
        let to: Mailbox = msg.recipient.parse().map_err(|e| {
            ParleyError::InvalidInput(format!("invalid email recipient `{}`: {e}", msg.recipient))
        })?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(msg.subject.as_deref().unwrap_or(&self.default_subject))
            .message_id(Some(message_id.to_string()))
            .header(ContentType::TEXT_PLAIN)
            .body(msg.body.clone())
            .map_err(|e| ParleyError::Channel {
                message: format!("failed to build email: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

impl EmailChannel<SmtpMailer> {
    /// `None` when no relay host or sender address is configured.
    pub fn from_config(
        config: &EmailConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, ParleyError> {
        let (Some(host), Some(address)) = (&config.smtp_host, &config.from_address) else {
            debug!("smtp host or sender not configured, email disabled");
            return Ok(None);
        };
        let from = Mailbox::new(
            Some(config.from_name.clone()),
            address
                .parse()
                .map_err(|e| ParleyError::Config(format!("invalid email.from_address: {e}")))?,
        );
        let mailer = SmtpMailer::new(config, host, timeout)?;
        info!(host = %host, port = config.smtp_port, "email relay configured");
        Ok(Some(Self::new(mailer, from, config.from_name.clone())))
    }
}

#[async_trait]
impl<M: Mailer> PluginAdapter for EmailChannel<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        if self.mailer.probe().await? {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("smtp relay refused connection".to_string()))
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl<M: Mailer> ChannelAdapter for EmailChannel<M> {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Email
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let domain = self.from.email.domain();
        let message_id = format!("<{}@{domain}>", uuid::Uuid::new_v4());
        let email = self.build(&msg, &message_id)?;
        self.mailer.deliver(email).await?;
        debug!(message_id = %message_id, "email sent");
        Ok(MessageId(message_id))
    }
}
