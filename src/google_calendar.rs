use anyhow::{anyhow, Context};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use urlencoding::encode;

use crate::google_auth;
use crate::AppState;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Outcome of a read against the provider. Reads back views where "nothing
/// to show" is an acceptable degraded state, so callers decide whether a
/// `Degraded` result renders as empty or as unavailable.
#[derive(Debug)]
pub enum Listing<T> {
    Ok(Vec<T>),
    Degraded { reason: String },
}

impl<T> Listing<T> {
    /// The HTTP contract for reads: degraded results render as empty.
    pub fn into_items_or_empty(self) -> Vec<T> {
        match self {
            Listing::Ok(items) => items,
            Listing::Degraded { reason } => {
                warn!("Degrading calendar read to an empty result: {}", reason);
                Vec::new()
            }
        }
    }
}

/// Provider start/end: date-only for all-day events, timestamp plus
/// timezone label for timed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn all_day(date: &str) -> Self {
        EventTime {
            date: Some(date.to_string()),
            date_time: None,
            time_zone: None,
        }
    }

    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        EventTime {
            date: None,
            date_time: Some(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
            time_zone: Some(tz.name().to_string()),
        }
    }

    pub fn timed(date: &str, time: &str, tz: Tz) -> Result<Self, anyhow::Error> {
        Ok(EventTime::from_instant(local_instant(date, time, tz)?, tz))
    }
}

/// `YYYY-MM-DD` + `HH:MM` in the calendar timezone, as an absolute instant.
pub fn local_instant(date: &str, time: &str, tz: Tz) -> Result<DateTime<Utc>, anyhow::Error> {
    let naive = NaiveDateTime::parse_from_str(
        &format!("{}T{}:00", date, time),
        "%Y-%m-%dT%H:%M:%S",
    )
    .with_context(|| format!("invalid date/time: {} {}", date, time))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .with_context(|| format!("time does not exist in {}: {} {}", tz.name(), date, time))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    pub use_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<ReminderOverride>>,
}

impl EventReminders {
    pub fn provider_default() -> Self {
        EventReminders {
            use_default: true,
            overrides: None,
        }
    }

    pub fn popup(minutes: i64) -> Self {
        EventReminders {
            use_default: false,
            overrides: Some(vec![ReminderOverride {
                method: "popup".to_string(),
                minutes,
            }]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub primary: bool,
    pub selected: bool,
}

/// Normalized application event shape, independent of the provider wire
/// format. `start`/`end` are RFC 3339 timestamps for timed events and bare
/// dates for all-day ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Option<String>,
    pub calendar_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub reminders: Option<Vec<ReminderOverride>>,
}

/// Body for an event insert, already in provider terms.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(rename = "summary")]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub reminders: EventReminders,
}

/// Partial update; only supplied fields are written over the current
/// provider event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub reminders: Option<EventReminders>,
}

// Provider wire shapes.

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    background_color: Option<String>,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    selected: bool,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    reminders: Option<EventReminders>,
}

/// Lists the calendars the user subscribes to; degrades instead of failing.
pub async fn list_calendars(state: &AppState, user_id: i64) -> Listing<CalendarSummary> {
    let access_token = match google_auth::valid_access_token(state, user_id).await {
        Ok(token) => token,
        Err(e) => {
            warn!("Calendar access unavailable for user {}: {}", user_id, e);
            return Listing::Degraded {
                reason: e.to_string(),
            };
        }
    };

    match fetch_calendar_list(state, &access_token).await {
        Ok(entries) => Listing::Ok(
            entries
                .into_iter()
                .map(|entry| CalendarSummary {
                    id: entry.id,
                    name: entry.summary,
                    description: entry.description,
                    color: entry.background_color,
                    primary: entry.primary,
                    selected: entry.selected,
                })
                .collect(),
        ),
        Err(e) => {
            error!("Failed to list calendars for user {}: {:?}", user_id, e);
            Listing::Degraded {
                reason: e.to_string(),
            }
        }
    }
}

/// Aggregates events across every selected calendar inside
/// `[time_min, time_max)`. Bounds default to the start of the current month
/// through the last day of the following month, in the calendar timezone.
pub async fn list_events(
    state: &AppState,
    user_id: i64,
    time_min: Option<String>,
    time_max: Option<String>,
) -> Listing<CalendarEvent> {
    let access_token = match google_auth::valid_access_token(state, user_id).await {
        Ok(token) => token,
        Err(e) => {
            warn!("Calendar access unavailable for user {}: {}", user_id, e);
            return Listing::Degraded {
                reason: e.to_string(),
            };
        }
    };

    let tz = state.config.calendar_timezone;
    let (default_min, default_max) = default_time_window(tz);
    let time_min = resolve_bound(time_min, default_min);
    let time_max = resolve_bound(time_max, default_max);

    let calendars = match fetch_calendar_list(state, &access_token).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list calendars for user {}: {:?}", user_id, e);
            return Listing::Degraded {
                reason: e.to_string(),
            };
        }
    };

    let mut all_events = Vec::new();
    for calendar in calendars.into_iter().filter(|calendar| calendar.selected) {
        let Some(calendar_id) = calendar.id else {
            continue;
        };

        match fetch_events(state, &access_token, &calendar_id, &time_min, &time_max).await {
            Ok(items) => all_events.extend(items.into_iter().map(|event| {
                normalize_event(event, &calendar_id, calendar.background_color.clone())
            })),
            Err(e) => {
                error!(
                    "Failed to list events on calendar {} for user {}: {:?}",
                    calendar_id, user_id, e
                );
                return Listing::Degraded {
                    reason: e.to_string(),
                };
            }
        }
    }

    Listing::Ok(all_events)
}

/// Inserts an event. Unlike the list operations, failures here must be
/// visible to the caller.
pub async fn create_event(
    state: &AppState,
    user_id: i64,
    calendar_id: &str,
    payload: &EventPayload,
) -> Result<CalendarEvent, anyhow::Error> {
    let access_token = google_auth::valid_access_token(state, user_id)
        .await
        .map_err(|e| anyhow!("calendar client unavailable: {}", e))?;

    let response = state
        .http_client
        .post(events_url(state, calendar_id))
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&access_token)
        .json(payload)
        .send()
        .await?;
    let response = into_success(response, "event insert").await?;

    let event: GoogleEvent = response.json().await?;
    Ok(normalize_event(event, calendar_id, None))
}

/// Fetches the current provider event, merges the supplied fields over it,
/// and writes the result back.
pub async fn update_event(
    state: &AppState,
    user_id: i64,
    calendar_id: &str,
    event_id: &str,
    changes: &EventChanges,
) -> Result<CalendarEvent, anyhow::Error> {
    let access_token = google_auth::valid_access_token(state, user_id)
        .await
        .map_err(|e| anyhow!("calendar client unavailable: {}", e))?;

    let url = event_url(state, calendar_id, event_id);

    let response = state
        .http_client
        .get(&url)
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&access_token)
        .send()
        .await?;
    let response = into_success(response, "event get").await?;
    let mut current: Value = response.json().await?;

    if let Some(title) = &changes.title {
        current["summary"] = Value::String(title.clone());
    }
    if let Some(description) = &changes.description {
        current["description"] = Value::String(description.clone());
    }
    if let Some(location) = &changes.location {
        current["location"] = Value::String(location.clone());
    }
    if let Some(start) = &changes.start {
        current["start"] = serde_json::to_value(start)?;
    }
    if let Some(end) = &changes.end {
        current["end"] = serde_json::to_value(end)?;
    }
    if let Some(reminders) = &changes.reminders {
        current["reminders"] = serde_json::to_value(reminders)?;
    }

    let response = state
        .http_client
        .put(&url)
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&access_token)
        .json(&current)
        .send()
        .await?;
    let response = into_success(response, "event update").await?;

    let event: GoogleEvent = response.json().await?;
    Ok(normalize_event(event, calendar_id, None))
}

/// Deletes an event; provider errors (including unknown ids) propagate.
pub async fn delete_event(
    state: &AppState,
    user_id: i64,
    calendar_id: &str,
    event_id: &str,
) -> Result<(), anyhow::Error> {
    let access_token = google_auth::valid_access_token(state, user_id)
        .await
        .map_err(|e| anyhow!("calendar client unavailable: {}", e))?;

    let response = state
        .http_client
        .delete(event_url(state, calendar_id, event_id))
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&access_token)
        .send()
        .await?;
    into_success(response, "event delete").await?;
    Ok(())
}

fn events_url(state: &AppState, calendar_id: &str) -> String {
    format!(
        "{}/calendar/v3/calendars/{}/events",
        state.config.google_api_base,
        encode(calendar_id)
    )
}

fn event_url(state: &AppState, calendar_id: &str, event_id: &str) -> String {
    format!(
        "{}/calendar/v3/calendars/{}/events/{}",
        state.config.google_api_base,
        encode(calendar_id),
        encode(event_id)
    )
}

async fn fetch_calendar_list(
    state: &AppState,
    access_token: &str,
) -> Result<Vec<CalendarListEntry>, anyhow::Error> {
    let response = state
        .http_client
        .get(format!(
            "{}/calendar/v3/users/me/calendarList",
            state.config.google_api_base
        ))
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(access_token)
        .send()
        .await?;
    let response = into_success(response, "calendarList").await?;

    let list: CalendarListResponse = response.json().await?;
    Ok(list.items)
}

async fn fetch_events(
    state: &AppState,
    access_token: &str,
    calendar_id: &str,
    time_min: &str,
    time_max: &str,
) -> Result<Vec<GoogleEvent>, anyhow::Error> {
    let response = state
        .http_client
        .get(events_url(state, calendar_id))
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(access_token)
        .query(&[
            ("timeMin", time_min),
            ("timeMax", time_max),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ])
        .send()
        .await?;
    let response = into_success(response, "event list").await?;

    let events: EventsResponse = response.json().await?;
    Ok(events.items)
}

async fn into_success(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read response body".to_string());
    error!(
        "Google Calendar {} returned {}: {}",
        operation, status, error_body
    );
    Err(anyhow!("calendar provider returned {} for {}", status, operation))
}

fn normalize_event(event: GoogleEvent, calendar_id: &str, color: Option<String>) -> CalendarEvent {
    let all_day = event
        .start
        .as_ref()
        .map(|start| start.date.is_some())
        .unwrap_or(false);

    CalendarEvent {
        id: event.id,
        calendar_id: calendar_id.to_string(),
        title: event.summary,
        description: event.description,
        location: event.location,
        start: event.start.and_then(|start| start.date.or(start.date_time)),
        end: event.end.and_then(|end| end.date.or(end.date_time)),
        all_day,
        color,
        reminders: event.reminders.and_then(|reminders| reminders.overrides),
    }
}

/// First instant of the current month through the last day of the
/// following month.
fn default_time_window(tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = Utc::now().with_timezone(&tz).date_naive();
    let min_date = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);

    let (next_year, next_month) = if today.month() >= 11 {
        (today.year() + 1, today.month() - 10)
    } else {
        (today.year(), today.month() + 2)
    };
    let max_date = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|first| first - Duration::days(1))
        .unwrap_or(min_date + Duration::days(60));

    (local_midnight(tz, min_date), local_midnight(tz, max_date))
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn resolve_bound(raw: Option<String>, default: DateTime<Utc>) -> String {
    match raw {
        Some(value) => match DateTime::parse_from_rfc3339(&value) {
            Ok(parsed) => parsed
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            Err(_) => {
                warn!("Ignoring unparseable time bound {:?}", value);
                default.to_rfc3339_opts(SecondsFormat::Secs, true)
            }
        },
        None => default.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}
