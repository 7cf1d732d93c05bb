use serde::{Deserialize, Serialize};

/// A calendar the user subscribes to; `selected` controls whether its
/// events are aggregated into calendar views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: i64,
    pub user_id: i64,
    pub google_calendar_id: String,
    pub name: String,
    pub color: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct NewCalendar {
    pub user_id: i64,
    pub google_calendar_id: String,
    pub name: String,
    pub color: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub selected: Option<bool>,
}
