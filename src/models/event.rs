use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::google_calendar::{CalendarEvent, ReminderOverride};

/// A locally cached calendar entry. The provider's event is the source of
/// truth; this record mirrors it so upcoming-event views can be served
/// without a provider round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub user_id: i64,
    pub google_event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub calendar_id: Option<String>,
    pub all_day: bool,
    pub reminders: Option<Vec<ReminderOverride>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub user_id: i64,
    pub google_event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub calendar_id: Option<String>,
    pub all_day: bool,
    pub reminders: Option<Vec<ReminderOverride>>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub reminders: Option<Vec<ReminderOverride>>,
}

impl NewEvent {
    /// Builds a local mirror record from an event the provider just
    /// returned. `None` when either timestamp cannot be interpreted.
    pub fn from_created(user_id: i64, event: &CalendarEvent, tz: Tz) -> Option<Self> {
        let start_time = parse_event_stamp(event.start.as_deref()?, tz)?;
        let end_time = parse_event_stamp(event.end.as_deref()?, tz)?;

        Some(NewEvent {
            user_id,
            google_event_id: event.id.clone(),
            title: event.title.clone().unwrap_or_default(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time,
            end_time,
            calendar_id: Some(event.calendar_id.clone()),
            all_day: event.all_day,
            reminders: event.reminders.clone(),
        })
    }
}

/// Normalized event stamps are either RFC 3339 timestamps or bare
/// `YYYY-MM-DD` dates; dates resolve to local midnight.
pub fn parse_event_stamp(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
