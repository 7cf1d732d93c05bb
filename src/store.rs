use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    Calendar, CalendarPatch, Conversation, Event, EventPatch, Message, NewCalendar, NewEvent,
    NewUser, Role, User,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// In-memory record store. Ids are sequential per entity; nothing survives
/// a restart. Constructed once at startup and shared through `AppState`.
pub struct Store {
    users: RwLock<HashMap<i64, User>>,
    conversations: RwLock<HashMap<i64, Conversation>>,
    messages: RwLock<HashMap<i64, Message>>,
    events: RwLock<HashMap<i64, Event>>,
    calendars: RwLock<HashMap<i64, Calendar>>,

    next_user_id: AtomicI64,
    next_conversation_id: AtomicI64,
    next_message_id: AtomicI64,
    next_event_id: AtomicI64,
    next_calendar_id: AtomicI64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            users: RwLock::new(HashMap::new()),
            conversations: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            calendars: RwLock::new(HashMap::new()),
            next_user_id: AtomicI64::new(1),
            next_conversation_id: AtomicI64::new(1),
            next_message_id: AtomicI64::new(1),
            next_event_id: AtomicI64::new(1),
            next_calendar_id: AtomicI64::new(1),
        }
    }

    // Users

    pub fn get_user(&self, id: i64) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|user| user.username == username)
            .cloned()
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|user| user.email == email)
            .cloned()
    }

    pub fn create_user(&self, new_user: NewUser) -> User {
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            password: new_user.password,
            google_id: new_user.google_id,
            google_refresh_token: new_user.google_refresh_token,
            google_access_token: new_user.google_access_token,
            google_token_expiry: new_user.google_token_expiry,
            picture: new_user.picture,
            created_at: Utc::now(),
        };
        self.users.write().insert(id, user.clone());
        user
    }

    /// Stores a fresh access token. The refresh token and expiry only
    /// change when the provider actually returned new ones; repeat consent
    /// often omits the refresh token.
    pub fn update_user_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(&user_id).ok_or(StoreError::NotFound {
            entity: "user",
            id: user_id,
        })?;

        user.google_access_token = Some(access_token.to_string());
        if refresh_token.is_some() {
            user.google_refresh_token = refresh_token;
        }
        if expiry.is_some() {
            user.google_token_expiry = expiry;
        }

        Ok(user.clone())
    }

    // Conversations

    pub fn get_conversation(&self, id: i64) -> Option<Conversation> {
        self.conversations.read().get(&id).cloned()
    }

    /// Newest first.
    pub fn conversations_by_user(&self, user_id: i64) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> = self
            .conversations
            .read()
            .values()
            .filter(|conversation| conversation.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        conversations
    }

    pub fn create_conversation(&self, user_id: i64, title: Option<String>) -> Conversation {
        let id = self.next_conversation_id.fetch_add(1, Ordering::SeqCst);
        let conversation = Conversation {
            id,
            user_id,
            title,
            created_at: Utc::now(),
        };
        self.conversations.write().insert(id, conversation.clone());
        conversation
    }

    // Messages

    /// Oldest first.
    pub fn messages_by_conversation(&self, conversation_id: i64) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .values()
            .filter(|message| message.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        messages
    }

    pub fn create_message(&self, conversation_id: i64, content: &str, role: Role) -> Message {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id,
            conversation_id,
            content: content.to_string(),
            role,
            timestamp: Utc::now(),
        };
        self.messages.write().insert(id, message.clone());
        message
    }

    // Events

    pub fn get_event(&self, id: i64) -> Option<Event> {
        self.events.read().get(&id).cloned()
    }

    /// Ascending by start time.
    pub fn events_by_user(&self, user_id: i64) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|event| event.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        events
    }

    /// At most `limit` events starting at or after now, ascending.
    pub fn upcoming_events_by_user(&self, user_id: i64, limit: usize) -> Vec<Event> {
        let now = Utc::now();
        let mut events: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|event| event.user_id == user_id && event.start_time >= now)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        events.truncate(limit);
        events
    }

    pub fn create_event(&self, new_event: NewEvent) -> Event {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            user_id: new_event.user_id,
            google_event_id: new_event.google_event_id,
            title: new_event.title,
            description: new_event.description,
            location: new_event.location,
            start_time: new_event.start_time,
            end_time: new_event.end_time,
            calendar_id: new_event.calendar_id,
            all_day: new_event.all_day,
            reminders: new_event.reminders,
            created_at: Utc::now(),
        };
        self.events.write().insert(id, event.clone());
        event
    }

    pub fn update_event(&self, id: i64, patch: EventPatch) -> Result<Event, StoreError> {
        let mut events = self.events.write();
        let event = events.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "event",
            id,
        })?;

        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = Some(description);
        }
        if let Some(location) = patch.location {
            event.location = Some(location);
        }
        if let Some(start_time) = patch.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            event.end_time = end_time;
        }
        if let Some(all_day) = patch.all_day {
            event.all_day = all_day;
        }
        if let Some(reminders) = patch.reminders {
            event.reminders = Some(reminders);
        }

        Ok(event.clone())
    }

    /// Removing an absent id is not an error.
    pub fn delete_event(&self, id: i64) {
        self.events.write().remove(&id);
    }

    /// Mirrors a provider-created event locally so upcoming-event views can
    /// be served without a provider round trip.
    pub fn cache_provider_event(
        &self,
        user_id: i64,
        event: &crate::google_calendar::CalendarEvent,
        tz: chrono_tz::Tz,
    ) -> Option<Event> {
        match NewEvent::from_created(user_id, event, tz) {
            Some(new_event) => Some(self.create_event(new_event)),
            None => {
                warn!(
                    "Not caching provider event {:?}: timestamps were not interpretable",
                    event.id
                );
                None
            }
        }
    }

    // Calendars

    pub fn calendars_by_user(&self, user_id: i64) -> Vec<Calendar> {
        let mut calendars: Vec<Calendar> = self
            .calendars
            .read()
            .values()
            .filter(|calendar| calendar.user_id == user_id)
            .cloned()
            .collect();
        calendars.sort_by_key(|calendar| calendar.id);
        calendars
    }

    pub fn create_calendar(&self, new_calendar: NewCalendar) -> Calendar {
        let id = self.next_calendar_id.fetch_add(1, Ordering::SeqCst);
        let calendar = Calendar {
            id,
            user_id: new_calendar.user_id,
            google_calendar_id: new_calendar.google_calendar_id,
            name: new_calendar.name,
            color: new_calendar.color,
            selected: new_calendar.selected,
        };
        self.calendars.write().insert(id, calendar.clone());
        calendar
    }

    pub fn update_calendar(&self, id: i64, patch: CalendarPatch) -> Result<Calendar, StoreError> {
        let mut calendars = self.calendars.write();
        let calendar = calendars.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "calendar",
            id,
        })?;

        if let Some(name) = patch.name {
            calendar.name = name;
        }
        if let Some(color) = patch.color {
            calendar.color = Some(color);
        }
        if let Some(selected) = patch.selected {
            calendar.selected = selected;
        }

        Ok(calendar.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "ana".to_string(),
            email: email.to_string(),
            password: None,
            google_id: None,
            google_refresh_token: Some("refresh-1".to_string()),
            google_access_token: Some("access-1".to_string()),
            google_token_expiry: Some(Utc::now() + Duration::hours(1)),
            picture: None,
        }
    }

    fn new_event(user_id: i64, start: DateTime<Utc>) -> NewEvent {
        NewEvent {
            user_id,
            google_event_id: None,
            title: "Reunião".to_string(),
            description: None,
            location: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            calendar_id: Some("primary".to_string()),
            all_day: false,
            reminders: None,
        }
    }

    #[test]
    fn assigns_sequential_ids() {
        let store = Store::new();
        let first = store.create_user(new_user("a@example.com"));
        let second = store.create_user(new_user("b@example.com"));
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn update_user_tokens_keeps_refresh_token_when_absent() {
        let store = Store::new();
        let user = store.create_user(new_user("a@example.com"));

        let updated = store
            .update_user_tokens(user.id, "access-2", None, None)
            .unwrap();

        assert_eq!(updated.google_access_token.as_deref(), Some("access-2"));
        assert_eq!(updated.google_refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(updated.google_token_expiry, user.google_token_expiry);

        let rotated = store
            .update_user_tokens(user.id, "access-3", Some("refresh-2".to_string()), None)
            .unwrap();
        assert_eq!(rotated.google_refresh_token.as_deref(), Some("refresh-2"));
    }

    #[test]
    fn update_user_tokens_fails_for_unknown_user() {
        let store = Store::new();
        let result = store.update_user_tokens(99, "access", None, None);
        assert_eq!(
            result.unwrap_err(),
            StoreError::NotFound {
                entity: "user",
                id: 99
            }
        );
    }

    #[test]
    fn conversations_are_listed_newest_first() {
        let store = Store::new();
        let first = store.create_conversation(1, Some("primeira".to_string()));
        let second = store.create_conversation(1, Some("segunda".to_string()));
        store.create_conversation(2, None);

        let listed = store.conversations_by_user(1);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn messages_are_listed_oldest_first() {
        let store = Store::new();
        let conversation = store.create_conversation(1, None);
        let first = store.create_message(conversation.id, "oi", Role::User);
        let second = store.create_message(conversation.id, "olá!", Role::Assistant);
        store.create_message(999, "outro", Role::User);

        let listed = store.messages_by_conversation(conversation.id);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn upcoming_events_filter_sort_and_limit() {
        let store = Store::new();
        let now = Utc::now();
        store.create_event(new_event(1, now - Duration::hours(2)));
        let soon = store.create_event(new_event(1, now + Duration::hours(1)));
        let later = store.create_event(new_event(1, now + Duration::hours(5)));
        let farthest = store.create_event(new_event(1, now + Duration::days(3)));
        store.create_event(new_event(2, now + Duration::hours(1)));

        let upcoming = store.upcoming_events_by_user(1, 2);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, soon.id);
        assert_eq!(upcoming[1].id, later.id);
        assert!(upcoming.iter().all(|event| event.start_time >= now));

        let all = store.upcoming_events_by_user(1, 10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].id, farthest.id);
    }

    #[test]
    fn update_event_merges_partial_fields() {
        let store = Store::new();
        let now = Utc::now();
        let event = store.create_event(new_event(1, now + Duration::hours(1)));

        let updated = store
            .update_event(
                event.id,
                EventPatch {
                    title: Some("Consulta".to_string()),
                    location: Some("Clínica".to_string()),
                    ..EventPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Consulta");
        assert_eq!(updated.location.as_deref(), Some("Clínica"));
        assert_eq!(updated.start_time, event.start_time);
    }

    #[test]
    fn update_event_fails_for_unknown_id() {
        let store = Store::new();
        let result = store.update_event(42, EventPatch::default());
        assert_eq!(
            result.unwrap_err(),
            StoreError::NotFound {
                entity: "event",
                id: 42
            }
        );
    }

    #[test]
    fn delete_event_is_idempotent() {
        let store = Store::new();
        let event = store.create_event(new_event(1, Utc::now()));
        store.delete_event(event.id);
        store.delete_event(event.id);
        assert!(store.get_event(event.id).is_none());
    }

    #[test]
    fn update_calendar_toggles_selection() {
        let store = Store::new();
        let calendar = store.create_calendar(NewCalendar {
            user_id: 1,
            google_calendar_id: "primary".to_string(),
            name: "Pessoal".to_string(),
            color: None,
            selected: true,
        });

        let updated = store
            .update_calendar(
                calendar.id,
                CalendarPatch {
                    selected: Some(false),
                    ..CalendarPatch::default()
                },
            )
            .unwrap();
        assert!(!updated.selected);
        assert_eq!(updated.name, "Pessoal");
    }
}
