use chrono::{DateTime, Days, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{EmailMessage, Frequency, ScheduledJob};

/// Subject line used for every expiration notice.
pub const NOTIFY_SUBJECT: &str = "Legal Obligation Expiration Notice";

/// Hour of day (UTC) at which notifications fire.
const NOTIFY_HOUR: u32 = 9;

/// Raw template fields as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    pub name: String,
    pub description: Option<String>,
    pub due_month: String,
    pub notice_period: i64,
    pub responsible_emails: String,
    pub frequency: String,
    pub requires_quote: bool,
}

/// Template fields that passed validation, with the notification instant
/// already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTemplate {
    pub name: String,
    pub description: Option<String>,
    pub due_month: NaiveDate,
    pub notice_period: u32,
    pub responsible_emails: String,
    pub recipients: Vec<String>,
    pub frequency: Frequency,
    pub requires_quote: bool,
    pub notify_at: DateTime<Utc>,
}

/// Validation failures, each tied to the request field that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("dueMonth is not a valid calendar date: {0}")]
    InvalidDueMonth(String),
    #[error("noticePeriod must be a non-negative number of days (got {0})")]
    NegativeNoticePeriod(i64),
    #[error("noticePeriod of {0} days falls outside the supported calendar range")]
    NoticePeriodOutOfRange(i64),
    #[error("responsibleEmails must contain at least one address")]
    NoRecipients,
    #[error("responsibleEmails contains an invalid address: {0}")]
    InvalidRecipient(String),
    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),
}

impl ValidationError {
    /// Name of the offending request field, reported in error payloads.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::InvalidDueMonth(_) => "dueMonth",
            Self::NegativeNoticePeriod(_) | Self::NoticePeriodOutOfRange(_) => "noticePeriod",
            Self::NoRecipients | Self::InvalidRecipient(_) => "responsibleEmails",
            Self::UnknownFrequency(_) => "frequency",
        }
    }
}

/// Validates a raw draft, producing the template fields and the computed
/// notification instant. No side effects; nothing is persisted here.
pub fn validate(draft: &TemplateDraft) -> Result<ValidTemplate, ValidationError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let due_month = NaiveDate::parse_from_str(draft.due_month.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDueMonth(draft.due_month.clone()))?;

    if draft.notice_period < 0 {
        return Err(ValidationError::NegativeNoticePeriod(draft.notice_period));
    }
    let notice_period = u32::try_from(draft.notice_period)
        .map_err(|_| ValidationError::NoticePeriodOutOfRange(draft.notice_period))?;

    let recipients = parse_recipients(&draft.responsible_emails);
    if recipients.is_empty() {
        return Err(ValidationError::NoRecipients);
    }
    if let Some(bad) = recipients.iter().find(|entry| !is_valid_email(entry)) {
        return Err(ValidationError::InvalidRecipient(bad.clone()));
    }

    let frequency = draft
        .frequency
        .parse::<Frequency>()
        .map_err(|_| ValidationError::UnknownFrequency(draft.frequency.clone()))?;

    let notify_at = notify_instant(due_month, notice_period)
        .ok_or(ValidationError::NoticePeriodOutOfRange(draft.notice_period))?;

    Ok(ValidTemplate {
        name: name.to_string(),
        description: draft.description.clone(),
        due_month,
        notice_period,
        responsible_emails: draft.responsible_emails.clone(),
        recipients,
        frequency,
        requires_quote: draft.requires_quote,
        notify_at,
    })
}

/// Splits a comma-separated address field into trimmed entries.
///
/// Order is preserved and duplicates are kept; empty entries are dropped.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Minimal syntactic address check: one `@` with non-empty sides.
pub fn is_valid_email(entry: &str) -> bool {
    match entry.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

/// Computes the instant at which the notification fires:
/// `due_month - notice_period` days, at 09:00:00 UTC.
///
/// A past instant is a valid result; the dispatcher fires it on its next
/// tick instead of dropping it.
pub fn notify_instant(due_month: NaiveDate, notice_period: u32) -> Option<DateTime<Utc>> {
    let date = due_month.checked_sub_days(Days::new(u64::from(notice_period)))?;
    let naive = date.and_hms_opt(NOTIFY_HOUR, 0, 0)?;
    Some(naive.and_utc())
}

/// Produces one notification job for the given template identity.
///
/// Every call yields an independent job with a fresh id; there is no
/// deduplication across calls.
pub fn schedule(
    template_id: &str,
    template_name: &str,
    recipients: &[String],
    fire_at: DateTime<Utc>,
) -> ScheduledJob {
    ScheduledJob {
        id: Uuid::new_v4().to_string(),
        template_id: template_id.to_string(),
        template_name: template_name.to_string(),
        recipients: recipients.to_vec(),
        fire_at,
    }
}

/// Builds the fixed-format expiration notice for a template.
pub fn build_message(template_name: &str) -> EmailMessage {
    EmailMessage {
        subject: NOTIFY_SUBJECT.to_string(),
        body: format!(
            "The legal obligation expiration date is approaching. You need to prepare.\n\nTemplate: {template_name}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> TemplateDraft {
        TemplateDraft {
            name: "Fire Safety Inspection".to_string(),
            description: None,
            due_month: "2025-12-31".to_string(),
            notice_period: 14,
            responsible_emails: "a@x.com, b@y.com".to_string(),
            frequency: "annual".to_string(),
            requires_quote: false,
        }
    }

    #[test]
    fn notify_instant_subtracts_notice_period_at_nine_utc() {
        let due = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let at = notify_instant(due, 14).expect("instant");
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap());
    }

    #[test]
    fn notify_instant_three_day_notice() {
        let due = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let at = notify_instant(due, 3).expect("instant");
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 10, 12, 9, 0, 0).unwrap());
    }

    #[test]
    fn zero_notice_period_fires_on_the_due_date() {
        let due = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let at = notify_instant(due, 0).expect("instant");
        assert_eq!(at.date_naive(), due);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn notify_instant_never_lands_after_the_due_date() {
        let due = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        for notice in [0u32, 1, 30, 365] {
            let at = notify_instant(due, notice).expect("instant");
            assert!(at.date_naive() <= due);
        }
    }

    #[test]
    fn recipients_are_trimmed_in_order_without_dedup() {
        assert_eq!(
            parse_recipients("a@x.com, b@y.com"),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
        assert_eq!(
            parse_recipients(" b@y.com ,a@x.com,  b@y.com"),
            vec![
                "b@y.com".to_string(),
                "a@x.com".to_string(),
                "b@y.com".to_string()
            ]
        );
    }

    #[test]
    fn blank_recipient_field_parses_to_nothing() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients("   ").is_empty());
        assert!(parse_recipients(" , ,,").is_empty());
    }

    #[test]
    fn validate_accepts_a_complete_draft() {
        let valid = validate(&draft()).expect("valid draft");
        assert_eq!(valid.notice_period, 14);
        assert_eq!(valid.recipients.len(), 2);
        assert_eq!(
            valid.notify_at,
            Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut input = draft();
        input.name = "   ".to_string();
        let err = validate(&input).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn validate_rejects_unparseable_due_month() {
        let mut input = draft();
        input.due_month = "December 2025".to_string();
        let err = validate(&input).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDueMonth(_)));
        assert_eq!(err.field(), "dueMonth");
    }

    #[test]
    fn validate_rejects_negative_notice_period() {
        let mut input = draft();
        input.notice_period = -1;
        let err = validate(&input).unwrap_err();
        assert_eq!(err, ValidationError::NegativeNoticePeriod(-1));
        assert_eq!(err.field(), "noticePeriod");
    }

    #[test]
    fn validate_rejects_empty_recipient_field() {
        for raw in ["", "   ", " , ,"] {
            let mut input = draft();
            input.responsible_emails = raw.to_string();
            let err = validate(&input).unwrap_err();
            assert_eq!(err, ValidationError::NoRecipients);
            assert_eq!(err.field(), "responsibleEmails");
        }
    }

    #[test]
    fn validate_rejects_malformed_address() {
        let mut input = draft();
        input.responsible_emails = "a@x.com, not-an-address".to_string();
        let err = validate(&input).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidRecipient("not-an-address".to_string())
        );
    }

    #[test]
    fn validate_rejects_unknown_frequency() {
        let mut input = draft();
        input.frequency = "fortnightly".to_string();
        let err = validate(&input).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownFrequency(_)));
        assert_eq!(err.field(), "frequency");
    }

    #[test]
    fn schedule_twice_produces_independent_jobs() {
        let valid = validate(&draft()).expect("valid draft");
        let first = schedule("t-1", &valid.name, &valid.recipients, valid.notify_at);
        let second = schedule("t-1", &valid.name, &valid.recipients, valid.notify_at);
        assert_ne!(first.id, second.id);
        assert_eq!(first.fire_at, second.fire_at);
        assert_eq!(first.recipients, second.recipients);
    }

    #[test]
    fn message_body_interpolates_template_name_exactly() {
        let message = build_message("Fire Safety Inspection");
        assert_eq!(message.subject, "Legal Obligation Expiration Notice");
        assert_eq!(
            message.body,
            "The legal obligation expiration date is approaching. You need to prepare.\n\nTemplate: Fire Safety Inspection"
        );
    }

    #[test]
    fn email_syntax_check_requires_both_sides() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a.x.com"));
        assert!(!is_valid_email("a@b@c"));
    }
}
