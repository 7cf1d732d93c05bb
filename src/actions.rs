use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::google_calendar::{self, CalendarEvent, EventPayload, EventReminders, EventTime};
use crate::openai::ClassifiedIntent;
use crate::prompts::Prompts;
use crate::AppState;

const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 10;
const REMINDER_WINDOW_MINUTES: i64 = 30;

/// What the classifier decided the user wants done, with the fields that
/// action needs. Payloads are validated before an `Action` is built; an
/// unknown tag or a mismatched payload is `NoAction`.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateEvent(EventActionData),
    CreateReminder(ReminderActionData),
    SearchInfo(SearchActionData),
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActionData {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    #[serde(default)]
    pub all_day: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderActionData {
    pub title: String,
    pub date_time: String,
    #[serde(default)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchActionData {
    pub query: String,
}

impl Action {
    /// Validates the classifier's tag and payload. Anything that does not
    /// line up with a known variant is treated as no action at all.
    pub fn from_parts(tag: Option<&str>, data: Option<Value>) -> Self {
        match tag {
            Some("CREATE_EVENT") => match data.and_then(parse_payload::<EventActionData>) {
                Some(payload) => Action::CreateEvent(payload),
                None => Action::NoAction,
            },
            Some("CREATE_REMINDER") => match data.and_then(parse_payload::<ReminderActionData>) {
                Some(payload) => Action::CreateReminder(payload),
                None => Action::NoAction,
            },
            Some("SEARCH_INFO") => match data.and_then(parse_payload::<SearchActionData>) {
                Some(payload) => Action::SearchInfo(payload),
                None => Action::NoAction,
            },
            Some("NO_ACTION") | None => Action::NoAction,
            Some(other) => {
                warn!("Classifier produced an unknown action tag: {}", other);
                Action::NoAction
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Action::CreateEvent(_) => "CREATE_EVENT",
            Action::CreateReminder(_) => "CREATE_REMINDER",
            Action::SearchInfo(_) => "SEARCH_INFO",
            Action::NoAction => "NO_ACTION",
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Classifier payload did not match its action tag: {}", e);
            None
        }
    }
}

/// Result of executing an action; `message` overrides the classifier reply
/// when present, `data` carries the created event when there is one.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CalendarEvent>,
}

impl ActionOutcome {
    fn reply(message: String) -> Self {
        ActionOutcome {
            success: true,
            message: Some(message),
            data: None,
        }
    }

    fn failure() -> Self {
        ActionOutcome {
            success: false,
            message: Some(Prompts::ACTION_FAILED.to_string()),
            data: None,
        }
    }
}

/// Performs the side effect for a classified intent. Terminal in one step:
/// no retries, no multi-turn negotiation. Gateway failures surface as a
/// generic failure reply, never as the raw error.
pub async fn execute_action(
    state: &AppState,
    user_id: i64,
    intent: &ClassifiedIntent,
) -> ActionOutcome {
    match &intent.action {
        Action::CreateEvent(data) => create_event(state, user_id, data).await,
        Action::CreateReminder(data) => create_reminder(state, user_id, data).await,
        Action::SearchInfo(_) => {
            // No search integration exists; the classifier's own reply is
            // the whole answer.
            ActionOutcome::reply(intent.reply.clone())
        }
        Action::NoAction => ActionOutcome::reply(intent.reply.clone()),
    }
}

async fn create_event(state: &AppState, user_id: i64, data: &EventActionData) -> ActionOutcome {
    let tz = state.config.calendar_timezone;

    let (start, end) = if data.all_day {
        (
            EventTime::all_day(&data.start_date),
            EventTime::all_day(&data.end_date),
        )
    } else {
        let start = match EventTime::timed(&data.start_date, &data.start_time, tz) {
            Ok(start) => start,
            Err(e) => {
                error!("Rejecting assistant event with bad start: {:?}", e);
                return ActionOutcome::failure();
            }
        };
        let end = match EventTime::timed(&data.end_date, &data.end_time, tz) {
            Ok(end) => end,
            Err(e) => {
                error!("Rejecting assistant event with bad end: {:?}", e);
                return ActionOutcome::failure();
            }
        };
        (start, end)
    };

    let payload = EventPayload {
        title: data.title.clone(),
        description: data.description.clone(),
        location: data.location.clone(),
        start,
        end,
        reminders: EventReminders::provider_default(),
    };

    match google_calendar::create_event(state, user_id, "primary", &payload).await {
        Ok(event) => {
            state.store.cache_provider_event(user_id, &event, tz);
            let message = format!(
                "Evento \"{}\" criado com sucesso para {} às {}.",
                data.title, data.start_date, data.start_time
            );
            ActionOutcome {
                success: true,
                message: Some(message),
                data: Some(event),
            }
        }
        Err(e) => {
            error!("Failed to create event from assistant action: {:?}", e);
            ActionOutcome::failure()
        }
    }
}

async fn create_reminder(
    state: &AppState,
    user_id: i64,
    data: &ReminderActionData,
) -> ActionOutcome {
    let tz = state.config.calendar_timezone;

    let instant = match parse_reminder_instant(&data.date_time, tz) {
        Some(instant) => instant,
        None => {
            error!(
                "Rejecting reminder with unparseable moment: {:?}",
                data.date_time
            );
            return ActionOutcome::failure();
        }
    };

    let lead = data.minutes.unwrap_or(DEFAULT_REMINDER_LEAD_MINUTES);
    let payload = EventPayload {
        title: data.title.clone(),
        description: Some(format!("Lembrete: {}", data.title)),
        location: None,
        start: EventTime::from_instant(instant, tz),
        end: EventTime::from_instant(instant + Duration::minutes(REMINDER_WINDOW_MINUTES), tz),
        reminders: EventReminders::popup(lead),
    };

    match google_calendar::create_event(state, user_id, "primary", &payload).await {
        Ok(event) => {
            state.store.cache_provider_event(user_id, &event, tz);
            let message = format!(
                "Lembrete \"{}\" criado com sucesso para {}.",
                data.title,
                instant.with_timezone(&tz).format("%d/%m/%Y %H:%M")
            );
            ActionOutcome {
                success: true,
                message: Some(message),
                data: Some(event),
            }
        }
        Err(e) => {
            error!("Failed to create reminder from assistant action: {:?}", e);
            ActionOutcome::failure()
        }
    }
}

/// The reminder moment comes back from the model either as a full RFC 3339
/// timestamp or as a naive `YYYY-MM-DDTHH:MM[:SS]` local time.
fn parse_reminder_instant(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
