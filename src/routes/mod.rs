use std::sync::Arc;

use actix_web::web;

use crate::AppState;

pub mod assistant;
pub mod auth;
pub mod calendar;

pub fn configure(app_state: Arc<AppState>) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(app_state.clone()))
            .service(
                web::scope("/api/auth")
                    .service(auth::auth_url)
                    .service(auth::auth_callback)
                    .service(auth::auth_status)
                    .service(auth::logout)
                    .service(auth::get_user),
            )
            .service(web::scope("/api/calendars").service(calendar::get_calendars))
            .service(
                web::scope("/api/events")
                    .service(calendar::get_upcoming_events)
                    .service(calendar::get_events)
                    .service(calendar::create_event)
                    .service(calendar::update_event)
                    .service(calendar::delete_event),
            )
            .service(web::scope("/api/assistant").service(assistant::send_message))
            .service(
                web::scope("/api/conversations")
                    .service(assistant::get_conversations)
                    .service(assistant::get_conversation_messages),
            );
    }
}
