use std::env;

use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use obliga_core::types::EmailMessage;

/// Errors produced by the mail transport layer.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required SMTP setting: {0}")]
    MissingConfig(&'static str),
    #[error("invalid SMTP setting {setting}: {detail}")]
    InvalidConfig {
        setting: &'static str,
        detail: String,
    },
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp transport error: {0}")]
    Transport(String),
}

/// Connection security towards the SMTP relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    StartTls,
    Tls,
    None,
}

/// Outbound SMTP settings resolved from environment variables.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls: TlsMode,
}

impl MailerConfig {
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASSWORD`,
    /// `SMTP_FROM` and `SMTP_TLS` from the environment.
    pub fn from_env() -> Result<Self, MailError> {
        let host = env::var("SMTP_HOST").map_err(|_| MailError::MissingConfig("SMTP_HOST"))?;
        let from = env::var("SMTP_FROM").map_err(|_| MailError::MissingConfig("SMTP_FROM"))?;

        let port = match env::var("SMTP_PORT") {
            Ok(raw) => raw.parse().map_err(|err| MailError::InvalidConfig {
                setting: "SMTP_PORT",
                detail: format!("{err}"),
            })?,
            Err(_) => 587,
        };

        let tls = match env::var("SMTP_TLS").as_deref() {
            Ok("starttls") | Err(_) => TlsMode::StartTls,
            Ok("tls") => TlsMode::Tls,
            Ok("none") => TlsMode::None,
            Ok(other) => {
                return Err(MailError::InvalidConfig {
                    setting: "SMTP_TLS",
                    detail: format!("expected 'starttls', 'tls' or 'none', got '{other}'"),
                })
            }
        };

        Ok(Self {
            host,
            port,
            username: env::var("SMTP_USER").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from,
            tls,
        })
    }
}

/// Seam between the dispatcher and the concrete mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one message to the given recipient list.
    async fn send(&self, message: &EmailMessage, recipients: &[String]) -> Result<(), MailError>;
}

/// SMTP-backed mailer using lettre's async transport.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport from the provided configuration.
    pub fn new(config: &MailerConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let mut builder = match config.tls {
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|err| MailError::Transport(err.to_string()))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|err| MailError::Transport(err.to_string()))?,
            TlsMode::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };
        builder = builder.port(config.port);

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Assembles the lettre message for the given recipients.
    pub fn build_mail(
        from: &Mailbox,
        message: &EmailMessage,
        recipients: &[String],
    ) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(from.clone())
            .subject(&message.subject);

        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|_| MailError::InvalidAddress(recipient.clone()))?;
            builder = builder.to(mailbox);
        }

        builder
            .body(message.body.clone())
            .map_err(|err| MailError::Build(err.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage, recipients: &[String]) -> Result<(), MailError> {
        let mail = Self::build_mail(&self.from, message, recipients)?;
        self.transport
            .send(mail)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        info!(
            stage = "mailer",
            recipients = recipients.len(),
            subject = %message.subject,
            "notification email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    fn clear_env() {
        for key in [
            "SMTP_HOST",
            "SMTP_PORT",
            "SMTP_USER",
            "SMTP_PASSWORD",
            "SMTP_FROM",
            "SMTP_TLS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_requires_host_and_from() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        let err = MailerConfig::from_env().expect_err("missing host should error");
        assert!(matches!(err, MailError::MissingConfig("SMTP_HOST")));

        env::set_var("SMTP_HOST", "smtp.example.com");
        let err = MailerConfig::from_env().expect_err("missing from should error");
        assert!(matches!(err, MailError::MissingConfig("SMTP_FROM")));

        clear_env();
    }

    #[test]
    fn config_defaults_port_and_tls() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("SMTP_HOST", "smtp.example.com");
        env::set_var("SMTP_FROM", "noreply@example.com");

        let config = MailerConfig::from_env().expect("config should load");
        assert_eq!(config.port, 587);
        assert_eq!(config.tls, TlsMode::StartTls);

        clear_env();
    }

    #[test]
    fn config_rejects_unknown_tls_mode() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("SMTP_HOST", "smtp.example.com");
        env::set_var("SMTP_FROM", "noreply@example.com");
        env::set_var("SMTP_TLS", "opportunistic");

        let err = MailerConfig::from_env().expect_err("unknown tls should error");
        assert!(matches!(
            err,
            MailError::InvalidConfig {
                setting: "SMTP_TLS",
                ..
            }
        ));

        clear_env();
    }

    #[test]
    fn build_mail_addresses_every_recipient() {
        let from: Mailbox = "noreply@example.com".parse().expect("from");
        let message = EmailMessage {
            subject: "Legal Obligation Expiration Notice".to_string(),
            body: "body".to_string(),
        };
        let recipients = vec!["a@x.com".to_string(), "b@y.com".to_string()];

        let mail = SmtpMailer::build_mail(&from, &message, &recipients).expect("build");
        let headers = format!("{:?}", mail.headers());
        assert!(headers.contains("a@x.com"));
        assert!(headers.contains("b@y.com"));
    }

    #[test]
    fn build_mail_rejects_malformed_recipient() {
        let from: Mailbox = "noreply@example.com".parse().expect("from");
        let message = EmailMessage {
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        let recipients = vec!["not an address".to_string()];

        let err = SmtpMailer::build_mail(&from, &message, &recipients).unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }
}
