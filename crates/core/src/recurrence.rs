use chrono::{Months, NaiveDate};

use crate::types::Frequency;

/// Calendar interval, in months, between occurrences of a recurring template.
fn interval_months(frequency: Frequency) -> Option<u32> {
    match frequency {
        Frequency::Monthly => Some(1),
        Frequency::Quarterly => Some(3),
        Frequency::Biannual | Frequency::Semiannual => Some(6),
        Frequency::Annual => Some(12),
        Frequency::Biennial => Some(24),
        Frequency::Triennial => Some(36),
        Frequency::Quinquennial => Some(60),
        Frequency::OneTime => None,
    }
}

/// Computes the next due date after a completion.
///
/// The day of month is preserved where the target month allows it; chrono
/// clamps to the last day otherwise (Jan 31 + 1 month = Feb 28/29).
/// `one_time` templates have no next occurrence.
pub fn next_due_date(frequency: Frequency, completion_date: NaiveDate) -> Option<NaiveDate> {
    let months = interval_months(frequency)?;
    completion_date.checked_add_months(Months::new(months))
}
