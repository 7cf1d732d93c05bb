use std::sync::Arc;

use actix_web::{get, post, web, Error, HttpResponse};
use serde_json::json;

use crate::actions;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::Role;
use crate::openai;
use crate::types::SendMessageRequest;
use crate::AppState;

const TITLE_LIMIT: usize = 50;

/// The assistant pipeline: persist the user message, classify it, perform
/// the identified action, persist and return the reply. Classifier-side
/// problems never fail this endpoint; it always answers with a reply.
#[post("/message")]
async fn send_message(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    web::Json(request): web::Json<SendMessageRequest>,
) -> Result<HttpResponse, Error> {
    if request.content.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Mensagem inválida",
            "errors": [{ "field": "content", "message": "não pode ser vazio" }]
        })));
    }

    let user_id = authenticated_user.user_id;

    let conversation = match request.conversation_id {
        Some(id) => match app_state.store.get_conversation(id) {
            Some(conversation) if conversation.user_id == user_id => conversation,
            _ => {
                return Ok(
                    HttpResponse::NotFound().json(json!({ "message": "Conversa não encontrada" }))
                );
            }
        },
        None => app_state
            .store
            .create_conversation(user_id, Some(conversation_title(&request.content))),
    };

    app_state
        .store
        .create_message(conversation.id, &request.content, Role::User);

    let intent = openai::classify(app_state.get_ref(), &request.content).await;
    let outcome = actions::execute_action(app_state.get_ref(), user_id, &intent).await;

    let reply = outcome
        .message
        .clone()
        .unwrap_or_else(|| intent.reply.clone());
    let assistant_message = app_state
        .store
        .create_message(conversation.id, &reply, Role::Assistant);

    Ok(HttpResponse::Ok().json(json!({
        "message": assistant_message,
        "action": intent.action.tag(),
        "actionResult": outcome,
        "conversationId": conversation.id,
    })))
}

#[get("")]
async fn get_conversations(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, Error> {
    let conversations = app_state
        .store
        .conversations_by_user(authenticated_user.user_id);
    Ok(HttpResponse::Ok().json(conversations))
}

#[get("/{id}/messages")]
async fn get_conversation_messages(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    let conversation_id = path.into_inner();

    // Ownership is checked before any message data leaves the store.
    match app_state.store.get_conversation(conversation_id) {
        Some(conversation) if conversation.user_id == authenticated_user.user_id => {
            let messages = app_state.store.messages_by_conversation(conversation_id);
            Ok(HttpResponse::Ok().json(messages))
        }
        _ => Ok(HttpResponse::NotFound().json(json!({ "message": "Conversa não encontrada" }))),
    }
}

/// First characters of the opening message, with an ellipsis when cut.
fn conversation_title(content: &str) -> String {
    let title: String = content.chars().take(TITLE_LIMIT).collect();
    if content.chars().count() > TITLE_LIMIT {
        format!("{}...", title)
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_are_kept_verbatim() {
        assert_eq!(conversation_title("Marque uma reunião"), "Marque uma reunião");
    }

    #[test]
    fn long_titles_are_truncated_with_an_ellipsis() {
        let content = "a".repeat(60);
        let title = conversation_title(&content);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let content = "ã".repeat(55);
        let title = conversation_title(&content);
        assert!(title.starts_with("ã"));
        assert_eq!(title.chars().count(), 53);
    }
}
