use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::actions::Action;
use crate::prompts::Prompts;
use crate::AppState;

const CLASSIFIER_MODEL: &str = "gpt-4o";

/// What the classifier settled on: a conversational reply plus the action
/// the rest of the pipeline should perform.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedIntent {
    pub reply: String,
    pub action: Action,
}

impl ClassifiedIntent {
    fn fallback() -> Self {
        ClassifiedIntent {
            reply: Prompts::FALLBACK_ERROR.to_string(),
            action: Action::NoAction,
        }
    }
}

/// Wire shape the model is instructed to produce. Everything is optional
/// here; validation into `Action` happens afterwards.
#[derive(Debug, Deserialize)]
struct RawAssistantReply {
    message: Option<String>,
    action: Option<String>,
    #[serde(rename = "actionData")]
    action_data: Option<Value>,
}

/// Classifies a user message. Never fails: any model or parsing problem
/// degrades to a conversational reply with `NoAction`.
pub async fn classify(state: &AppState, message: &str) -> ClassifiedIntent {
    let request = match build_request(message) {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to build classification request: {:?}", e);
            return ClassifiedIntent::fallback();
        }
    };

    let response = match state.oai_client.chat().create(request).await {
        Ok(response) => response,
        Err(e) => {
            error!("Classifier request failed: {:?}", e);
            return ClassifiedIntent::fallback();
        }
    };

    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default();

    parse_reply(&content)
}

fn build_request(message: &str) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(Prompts::ASSISTANT)
        .build()?;
    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(ChatCompletionRequestUserMessageContent::Text(
            message.to_string(),
        ))
        .build()?;

    CreateChatCompletionRequestArgs::default()
        .model(CLASSIFIER_MODEL)
        .temperature(0.2)
        .response_format(ResponseFormat::JsonObject)
        .messages(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
        .build()
}

/// Interprets the raw model output. Non-JSON output becomes the reply
/// itself; a JSON reply with an unknown tag or a payload that does not
/// match the tag's shape degrades to `NoAction`.
pub fn parse_reply(content: &str) -> ClassifiedIntent {
    if content.trim().is_empty() {
        return ClassifiedIntent::fallback();
    }

    match serde_json::from_str::<RawAssistantReply>(content) {
        Ok(raw) => {
            let reply = raw
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| Prompts::FALLBACK_REPHRASE.to_string());
            let action = Action::from_parts(raw.action.as_deref(), raw.action_data);
            ClassifiedIntent { reply, action }
        }
        Err(e) => {
            error!("Classifier output was not valid JSON: {}", e);
            ClassifiedIntent {
                reply: content.to_string(),
                action: Action::NoAction,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_output_falls_back_to_apology() {
        let intent = parse_reply("   ");
        assert_eq!(intent.reply, Prompts::FALLBACK_ERROR);
        assert_eq!(intent.action, Action::NoAction);
    }

    #[test]
    fn non_json_output_becomes_the_reply() {
        let intent = parse_reply("Claro, posso ajudar!");
        assert_eq!(intent.reply, "Claro, posso ajudar!");
        assert_eq!(intent.action, Action::NoAction);
    }

    #[test]
    fn valid_create_event_reply_is_typed() {
        let content = json!({
            "message": "Agendado!",
            "action": "CREATE_EVENT",
            "actionData": {
                "title": "Reunião com José",
                "startDate": "2026-03-10",
                "startTime": "10:00",
                "endDate": "2026-03-10",
                "endTime": "11:00"
            }
        })
        .to_string();

        let intent = parse_reply(&content);
        assert_eq!(intent.reply, "Agendado!");
        match intent.action {
            Action::CreateEvent(data) => {
                assert_eq!(data.title, "Reunião com José");
                assert_eq!(data.start_time, "10:00");
                assert!(!data.all_day);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_degrades_to_no_action() {
        let content = json!({
            "message": "ok",
            "action": "LAUNCH_ROCKET",
            "actionData": {"target": "moon"}
        })
        .to_string();

        let intent = parse_reply(&content);
        assert_eq!(intent.action, Action::NoAction);
        assert_eq!(intent.reply, "ok");
    }

    #[test]
    fn mismatched_payload_degrades_to_no_action() {
        // CREATE_REMINDER without the required dateTime field.
        let content = json!({
            "message": "ok",
            "action": "CREATE_REMINDER",
            "actionData": {"minutes": 5}
        })
        .to_string();

        assert_eq!(parse_reply(&content).action, Action::NoAction);
    }

    #[test]
    fn missing_payload_degrades_to_no_action() {
        let content = json!({"message": "oi", "action": "SEARCH_INFO"}).to_string();
        assert_eq!(parse_reply(&content).action, Action::NoAction);
    }

    #[test]
    fn missing_message_uses_rephrase_fallback() {
        let content = json!({"action": "NO_ACTION"}).to_string();
        let intent = parse_reply(&content);
        assert_eq!(intent.reply, Prompts::FALLBACK_REPHRASE);
        assert_eq!(intent.action, Action::NoAction);
    }
}
