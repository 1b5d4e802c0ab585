use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::TextGenerator;
use crate::{config::GeminiConfig, error::ServiceError};

/// What the chat widget asked for. The two menu actions arrive as fixed
/// command strings with the user's text in `context`; anything else is a
/// free-form question.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand<'a> {
    LeftoverRecipes { ingredients: &'a str },
    FoodSafetyTips { food: &'a str },
    Question(&'a str),
}

impl<'a> ChatCommand<'a> {
    pub fn parse(message: &'a str, context: &'a str) -> Self {
        match message.trim() {
            "GET_LEFTOVER_RECIPES" => Self::LeftoverRecipes { ingredients: context },
            "GET_FOOD_SAFETY_TIPS" => Self::FoodSafetyTips { food: context },
            other => Self::Question(other),
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Self::LeftoverRecipes { ingredients } => format!(
                "You are Anna, a food waste assistant. Suggest one simple recipe for '{ingredients}'. \
                 IMPORTANT: The entire response must be under 125 words. Use Markdown for a title \
                 (e.g., **Recipe Name**). Provide a bulleted list for ingredients and a numbered list for steps."
            ),
            Self::FoodSafetyTips { food } => format!(
                "You are Anna, a food waste assistant. Provide 3 key food safety tips for storing '{food}'. \
                 Use a numbered list. Keep it concise."
            ),
            Self::Question(q) => format!(
                "You are Anna, a helpful assistant. Keep responses under 50 words. User's question: '{q}'"
            ),
        }
    }
}

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini `generateContent` over plain HTTP, key in the query string.
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    pub fn request_body(prompt: &str) -> Value {
        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|c| json!({ "category": c, "threshold": "BLOCK_NONE" }))
            .collect();
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "safetySettings": safety,
        })
    }

    /// Concatenated text parts of the first candidate, `None` when there is
    /// no candidate or it carries no text.
    pub fn parse_response(body: &Value) -> Result<Option<String>, ServiceError> {
        let candidates = match body.get("candidates") {
            None => return Ok(None),
            Some(c) => c
                .as_array()
                .ok_or_else(|| ServiceError::Parse("'candidates' is not an array".into()))?,
        };
        let Some(first) = candidates.first() else {
            return Ok(None);
        };
        let text: String = first["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        Ok(if text.trim().is_empty() { None } else { Some(text) })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ServiceError> {
        tracing::debug!(model = %self.config.model, "sending generateContent request");
        let response = self
            .client
            .post(self.endpoint_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Parse(format!("invalid json: {e}")))?;
        Self::parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_commands_use_context() {
        let c = ChatCommand::parse("GET_LEFTOVER_RECIPES", "rice, peas");
        assert_eq!(c, ChatCommand::LeftoverRecipes { ingredients: "rice, peas" });
        let p = c.prompt();
        assert!(p.contains("recipe for 'rice, peas'"));
        assert!(p.contains("under 125 words"));

        let c = ChatCommand::parse(" GET_FOOD_SAFETY_TIPS ", "paneer");
        assert!(c.prompt().contains("3 key food safety tips for storing 'paneer'"));
    }

    #[test]
    fn anything_else_is_a_question() {
        let c = ChatCommand::parse("how long does milk last?", "ignored");
        assert_eq!(c, ChatCommand::Question("how long does milk last?"));
        assert!(c.prompt().ends_with("User's question: 'how long does milk last?'"));
    }

    #[test]
    fn request_body_disables_blocking() {
        let body = GeminiClient::request_body("hi");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert!(safety.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn parses_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "**Fried Rice**"}, {"text": "\n1. Heat oil"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            GeminiClient::parse_response(&body).unwrap().as_deref(),
            Some("**Fried Rice**\n1. Heat oil")
        );
    }

    #[test]
    fn blocked_or_empty_candidates_have_no_text() {
        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(GeminiClient::parse_response(&blocked).unwrap(), None);
        let empty = json!({"candidates": []});
        assert_eq!(GeminiClient::parse_response(&empty).unwrap(), None);
        let no_parts = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert_eq!(GeminiClient::parse_response(&no_parts).unwrap(), None);
        assert!(GeminiClient::parse_response(&json!({"candidates": 3})).is_err());
    }
}
