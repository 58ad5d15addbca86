use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A legal compliance obligation with a deadline and a notification lead time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalTemplate {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_month: NaiveDate,
    pub notice_period: u32,
    /// Raw comma-separated address field as submitted by the caller.
    pub responsible_emails: String,
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    pub requires_quote: bool,
    /// Inactive templates are retained but hidden from listings.
    pub active: bool,
    pub status: TemplateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recurrence tag attached to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Annual,
    Biannual,
    Semiannual,
    Quarterly,
    Monthly,
    Biennial,
    Triennial,
    Quinquennial,
    OneTime,
}

impl Frequency {
    /// Returns the canonical database representation for the frequency.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Biannual => "biannual",
            Self::Semiannual => "semiannual",
            Self::Quarterly => "quarterly",
            Self::Monthly => "monthly",
            Self::Biennial => "biennial",
            Self::Triennial => "triennial",
            Self::Quinquennial => "quinquennial",
            Self::OneTime => "one_time",
        }
    }
}

impl FromStr for Frequency {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "annual" => Ok(Self::Annual),
            "biannual" => Ok(Self::Biannual),
            "semiannual" => Ok(Self::Semiannual),
            "quarterly" => Ok(Self::Quarterly),
            "monthly" => Ok(Self::Monthly),
            "biennial" => Ok(Self::Biennial),
            "triennial" => Ok(Self::Triennial),
            "quinquennial" => Ok(Self::Quinquennial),
            "one_time" => Ok(Self::OneTime),
            _ => Err(()),
        }
    }
}

/// Completion state tracked on a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Pending,
    Completed,
    Overdue,
}

impl TemplateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }

    /// Status as seen by callers: an uncompleted template whose deadline has
    /// passed reads as overdue, regardless of what is stored.
    pub fn as_of(self, due_month: NaiveDate, today: NaiveDate) -> TemplateStatus {
        if self != Self::Completed && due_month < today {
            Self::Overdue
        } else {
            self
        }
    }
}

impl FromStr for TemplateStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "overdue" => Ok(Self::Overdue),
            _ => Err(()),
        }
    }
}

/// A deferred email delivery bound to a specific future instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub template_id: String,
    pub template_name: String,
    pub recipients: Vec<String>,
    pub fire_at: DateTime<Utc>,
}

/// Lifecycle of a scheduled job inside the job store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Returns the canonical database representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        JobStatus::from_str(&value).map_err(|_| D::Error::custom("unknown job status"))
    }
}

/// Plain-text message handed to the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

/// One entry in a template's completion history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: String,
    pub template_id: String,
    pub completion_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Building classification attached to library entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    Residential,
    Commercial,
    Mixed,
    Industrial,
}

impl BuildingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Mixed => "mixed",
            Self::Industrial => "industrial",
        }
    }
}

impl FromStr for BuildingType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "residential" => Ok(Self::Residential),
            "commercial" => Ok(Self::Commercial),
            "mixed" => Ok(Self::Mixed),
            "industrial" => Ok(Self::Industrial),
            _ => Err(()),
        }
    }
}

/// Master-list obligation that templates can be activated from.
///
/// Entries are keyed by a unique name; `usage_count` tracks how many
/// templates have been created from the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_type: Option<BuildingType>,
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    pub requires_quote: bool,
    pub notice_period: u32,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_round_trips_through_db_repr() {
        for freq in [
            Frequency::Annual,
            Frequency::Quarterly,
            Frequency::Quinquennial,
            Frequency::OneTime,
        ] {
            assert_eq!(freq.as_str().parse::<Frequency>(), Ok(freq));
        }
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        assert!("fortnightly".parse::<Frequency>().is_err());
    }

    #[test]
    fn job_status_serializes_as_lowercase_string() {
        let json = serde_json::to_string(&JobStatus::Pending).expect("serialize");
        assert_eq!(json, "\"pending\"");
    }

    #[test]
    fn pending_template_past_its_deadline_reads_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(
            TemplateStatus::Pending.as_of(due, later),
            TemplateStatus::Overdue
        );
    }

    #[test]
    fn completed_template_never_reads_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(
            TemplateStatus::Completed.as_of(due, later),
            TemplateStatus::Completed
        );
    }

    #[test]
    fn status_unchanged_while_deadline_ahead() {
        let due = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        for today in [due, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()] {
            assert_eq!(
                TemplateStatus::Pending.as_of(due, today),
                TemplateStatus::Pending
            );
        }
    }
}
