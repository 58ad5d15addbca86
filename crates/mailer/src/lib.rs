pub mod smtp;

pub use smtp::{MailError, Mailer, MailerConfig, SmtpMailer, TlsMode};
