use std::sync::Arc;

use actix_web::{delete, get, post, put, web, Error, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::google_calendar::{self, EventChanges, EventPayload, EventReminders};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{parse_event_stamp, EventPatch};
use crate::types::CreateEventRequest;
use crate::AppState;

const UPCOMING_EVENTS_LIMIT: usize = 10;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventWindowQuery {
    time_min: Option<String>,
    time_max: Option<String>,
}

#[get("")]
async fn get_calendars(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, Error> {
    let calendars =
        google_calendar::list_calendars(app_state.get_ref(), authenticated_user.user_id)
            .await
            .into_items_or_empty();
    Ok(HttpResponse::Ok().json(calendars))
}

#[get("")]
async fn get_events(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<EventWindowQuery>,
) -> Result<HttpResponse, Error> {
    let query = query.into_inner();
    let events = google_calendar::list_events(
        app_state.get_ref(),
        authenticated_user.user_id,
        query.time_min,
        query.time_max,
    )
    .await
    .into_items_or_empty();
    Ok(HttpResponse::Ok().json(events))
}

/// Served from the local mirror, not the provider.
#[get("/upcoming")]
async fn get_upcoming_events(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, Error> {
    let events = app_state
        .store
        .upcoming_events_by_user(authenticated_user.user_id, UPCOMING_EVENTS_LIMIT);
    Ok(HttpResponse::Ok().json(events))
}

#[post("")]
async fn create_event(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(request): web::Json<CreateEventRequest>,
) -> Result<HttpResponse, Error> {
    let tz = app_state.config.calendar_timezone;

    let (start, end) = match request.validate(tz) {
        Ok(pair) => pair,
        Err(errors) => {
            return Ok(HttpResponse::BadRequest()
                .json(json!({ "message": "Dados inválidos", "errors": errors })));
        }
    };

    let payload = EventPayload {
        title: request.title.clone(),
        description: request.description.clone(),
        location: request.location.clone(),
        start,
        end,
        reminders: match request.reminders.clone() {
            Some(overrides) => EventReminders {
                use_default: false,
                overrides: Some(overrides),
            },
            None => EventReminders::provider_default(),
        },
    };

    match google_calendar::create_event(
        app_state.get_ref(),
        authenticated_user.user_id,
        &request.calendar_id,
        &payload,
    )
    .await
    {
        Ok(event) => {
            app_state
                .store
                .cache_provider_event(authenticated_user.user_id, &event, tz);
            Ok(HttpResponse::Ok().json(event))
        }
        Err(e) => {
            error!("Failed to create event: {:?}", e);
            Ok(HttpResponse::InternalServerError().json(json!({ "message": "Erro ao criar evento" })))
        }
    }
}

#[put("/{calendar_id}/{event_id}")]
async fn update_event(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(String, String)>,
    web::Json(changes): web::Json<EventChanges>,
) -> Result<HttpResponse, Error> {
    let (calendar_id, event_id) = path.into_inner();
    let user_id = authenticated_user.user_id;

    match google_calendar::update_event(
        app_state.get_ref(),
        user_id,
        &calendar_id,
        &event_id,
        &changes,
    )
    .await
    {
        Ok(event) => {
            sync_cached_event(&app_state, user_id, &event_id, &event);
            Ok(HttpResponse::Ok().json(event))
        }
        Err(e) => {
            error!("Failed to update event {}: {:?}", event_id, e);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "message": "Erro ao atualizar evento" })))
        }
    }
}

#[delete("/{calendar_id}/{event_id}")]
async fn delete_event(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, Error> {
    let (calendar_id, event_id) = path.into_inner();
    let user_id = authenticated_user.user_id;

    match google_calendar::delete_event(app_state.get_ref(), user_id, &calendar_id, &event_id).await
    {
        Ok(()) => {
            if let Some(local) = find_cached_event(&app_state, user_id, &event_id) {
                app_state.store.delete_event(local);
            }
            Ok(HttpResponse::Ok().json(json!({ "success": true })))
        }
        Err(e) => {
            error!("Failed to delete event {}: {:?}", event_id, e);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "message": "Erro ao excluir evento" })))
        }
    }
}

fn find_cached_event(app_state: &AppState, user_id: i64, google_event_id: &str) -> Option<i64> {
    app_state
        .store
        .events_by_user(user_id)
        .into_iter()
        .find(|event| event.google_event_id.as_deref() == Some(google_event_id))
        .map(|event| event.id)
}

/// Keeps the local mirror row in step with a provider-side update.
fn sync_cached_event(
    app_state: &AppState,
    user_id: i64,
    google_event_id: &str,
    event: &google_calendar::CalendarEvent,
) {
    let Some(local_id) = find_cached_event(app_state, user_id, google_event_id) else {
        return;
    };

    let tz = app_state.config.calendar_timezone;
    let patch = EventPatch {
        title: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start_time: event.start.as_deref().and_then(|s| parse_event_stamp(s, tz)),
        end_time: event.end.as_deref().and_then(|s| parse_event_stamp(s, tz)),
        all_day: Some(event.all_day),
        reminders: event.reminders.clone(),
    };

    if let Err(e) = app_state.store.update_event(local_id, patch) {
        warn!("Failed to sync cached event {}: {}", local_id, e);
    }
}
