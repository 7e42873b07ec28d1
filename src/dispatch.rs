//! Dispatch Router
//!
//! Ordered predicates mapping inbound events to handlers. First match wins:
//!
//! 1. photo → [`Route::UnsupportedMedia`]
//! 2. document → [`Route::Document`]
//! 3. exact command text → management route
//! 4. any other text → [`Route::Completion`]
//! 5. anything else → [`Route::Ignore`]

use crate::models::ModelId;
use crate::personas::PersonaId;
use crate::render::AGREEMENT_PAYLOAD;
use crate::types::{InboundMessage, MessageContent};

pub const BALANCE_COMMANDS: [&str; 2] = ["/balance", "💵 Balance"];
pub const CLEAR_COMMANDS: [&str; 2] = ["/clear", "🧹 Clear context"];
pub const PERSONA_COMMANDS: [&str; 2] = ["/mode", "⚙️ Bot mode"];
pub const MODEL_COMMANDS: [&str; 2] = ["/model", "🤖 Change model"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    UnsupportedMedia,
    Document { file_id: String },
    Balance,
    ClearContext,
    ChangePersona,
    ChangeModel,
    Completion(String),
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRoute {
    SelectPersona(PersonaId),
    SelectModel(ModelId),
    AcceptAgreement,
    Unknown,
}

fn command_route(text: &str) -> Option<Route> {
    let text = text.trim();
    if BALANCE_COMMANDS.contains(&text) {
        Some(Route::Balance)
    } else if CLEAR_COMMANDS.contains(&text) {
        Some(Route::ClearContext)
    } else if PERSONA_COMMANDS.contains(&text) {
        Some(Route::ChangePersona)
    } else if MODEL_COMMANDS.contains(&text) {
        Some(Route::ChangeModel)
    } else {
        None
    }
}

pub fn route_message(message: &InboundMessage) -> Route {
    match &message.content {
        MessageContent::Photo => Route::UnsupportedMedia,
        MessageContent::Document { file_id, .. } => Route::Document {
            file_id: file_id.clone(),
        },
        MessageContent::Text(text) => {
            command_route(text).unwrap_or_else(|| Route::Completion(text.clone()))
        }
        MessageContent::Other => Route::Ignore,
    }
}

pub fn route_callback(data: Option<&str>) -> CallbackRoute {
    let Some(data) = data else {
        return CallbackRoute::Unknown;
    };

    if let Some(persona) = PersonaId::from_payload(data) {
        CallbackRoute::SelectPersona(persona)
    } else if let Some(model) = ModelId::selectable_from_payload(data) {
        CallbackRoute::SelectModel(model)
    } else if data == AGREEMENT_PAYLOAD {
        CallbackRoute::AcceptAgreement
    } else {
        CallbackRoute::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatId, MessageId, UserId};

    fn message(content: MessageContent) -> InboundMessage {
        InboundMessage {
            user_id: UserId(1),
            chat_id: ChatId(1),
            message_id: MessageId(1),
            content,
        }
    }

    fn text(s: &str) -> InboundMessage {
        message(MessageContent::Text(s.to_string()))
    }

    #[test]
    fn test_commands_match_exactly() {
        assert_eq!(route_message(&text("/balance")), Route::Balance);
        assert_eq!(route_message(&text("💵 Balance")), Route::Balance);
        assert_eq!(route_message(&text("/clear")), Route::ClearContext);
        assert_eq!(route_message(&text("🧹 Clear context")), Route::ClearContext);
        assert_eq!(route_message(&text("/mode")), Route::ChangePersona);
        assert_eq!(route_message(&text("⚙️ Bot mode")), Route::ChangePersona);
        assert_eq!(route_message(&text("/model")), Route::ChangeModel);
        assert_eq!(route_message(&text("🤖 Change model")), Route::ChangeModel);
        assert_eq!(route_message(&text("  /balance ")), Route::Balance);
    }

    #[test]
    fn test_command_prefix_is_plain_text() {
        assert_eq!(
            route_message(&text("/balance please")),
            Route::Completion("/balance please".to_string())
        );
    }

    #[test]
    fn test_media_routes_before_text() {
        assert_eq!(route_message(&message(MessageContent::Photo)), Route::UnsupportedMedia);
        assert_eq!(
            route_message(&message(MessageContent::Document {
                file_id: "f1".to_string(),
                file_name: Some("notes.txt".to_string()),
            })),
            Route::Document { file_id: "f1".to_string() }
        );
        assert_eq!(route_message(&message(MessageContent::Other)), Route::Ignore);
    }

    #[test]
    fn test_callback_routes() {
        assert_eq!(
            route_callback(Some("translator")),
            CallbackRoute::SelectPersona(PersonaId::Translator)
        );
        assert_eq!(route_callback(Some("gpt-4o")), CallbackRoute::SelectModel(ModelId::Gpt4o));
        assert_eq!(route_callback(Some("agreement:accept")), CallbackRoute::AcceptAgreement);
        assert_eq!(route_callback(Some("gpt-4")), CallbackRoute::Unknown);
        assert_eq!(route_callback(Some("junk")), CallbackRoute::Unknown);
        assert_eq!(route_callback(None), CallbackRoute::Unknown);
    }
}
