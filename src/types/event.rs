use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::google_calendar::{local_instant, EventTime, ReminderOverride};

fn default_calendar_id() -> String {
    "primary".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default)]
    pub all_day: bool,
    pub reminders: Option<Vec<ReminderOverride>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: &str) -> Self {
        FieldError {
            field,
            message: message.to_string(),
        }
    }
}

impl CreateEventRequest {
    /// Checks the request and builds the provider start/end pair. Timed
    /// events must end after they start; this runs before any provider
    /// call.
    pub fn validate(&self, tz: Tz) -> Result<(EventTime, EventTime), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push(FieldError::new("title", "não pode ser vazio"));
        }

        if self.all_day {
            if NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").is_err() {
                errors.push(FieldError::new("startDate", "data inválida, use YYYY-MM-DD"));
            }
            if NaiveDate::parse_from_str(&self.end_date, "%Y-%m-%d").is_err() {
                errors.push(FieldError::new("endDate", "data inválida, use YYYY-MM-DD"));
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            return Ok((
                EventTime::all_day(&self.start_date),
                EventTime::all_day(&self.end_date),
            ));
        }

        let start = local_instant(&self.start_date, &self.start_time, tz);
        if start.is_err() {
            errors.push(FieldError::new("startDate", "data ou hora de início inválida"));
        }
        let end = local_instant(&self.end_date, &self.end_time, tz);
        if end.is_err() {
            errors.push(FieldError::new("endDate", "data ou hora de término inválida"));
        }

        if let (Ok(start), Ok(end)) = (&start, &end) {
            if end <= start {
                errors.push(FieldError::new(
                    "endTime",
                    "o término deve ser depois do início",
                ));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        match (start, end) {
            (Ok(start), Ok(end)) => Ok((
                EventTime::from_instant(start, tz),
                EventTime::from_instant(end, tz),
            )),
            _ => Err(vec![FieldError::new("startDate", "dados inválidos")]),
        }
    }
}
