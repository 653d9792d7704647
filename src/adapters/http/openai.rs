//! Chat-completions client used for style prompts, mood segmentation and
//! sound-event extraction.

use super::check_status;
use crate::error::{Error, Result};
use crate::ports::collaborators::TextAnalyzer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: String,
}

fn style_request(text: &str) -> (String, String, u32) {
    (
        String::from("You write background music prompts for audiobook producers."),
        format!(
            "Read this audiobook excerpt and write one short prompt for background music \
             that makes the listening immersive. Name instrumentation, mood and style.\n\
             ---\n{}\n---\nReply with the prompt only.",
            text
        ),
        60,
    )
}

fn segment_request(duration: f64, excerpt: &str, count: usize) -> (String, String, u32) {
    (
        String::from("You split narration into mood segments."),
        format!(
            "The narration lasts {:.2} seconds. Excerpt: {}\n\
             Reply with ONLY a JSON array of exactly {} objects with keys \"start\", \"end\" \
             and \"mood\" (one of \"suspense\", \"action\", \"climax\", \"sad\", \"neutral\"). \
             Segments must be in order and cover the whole narration.",
            duration, excerpt, count
        ),
        300,
    )
}

fn events_request(duration: f64, excerpt: &str) -> (String, String, u32) {
    (
        String::from("You find sound events in narration."),
        format!(
            "The narration lasts {:.2} seconds. Excerpt: {}\n\
             List distinct sound event types (for example \"sword_clash\", \"door_creak\") and \
             reply with ONLY a JSON object mapping each type to an array of timestamps in seconds.",
            duration, excerpt
        ),
        150,
    )
}

fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| Error::external(SERVICE, "no choices returned"))
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model,
            url,
        })
    }

    async fn complete(&self, (system, user, max_tokens): (String, String, u32)) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature: 0.7,
        };
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        let response = check_status(SERVICE, response).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::external(SERVICE, format!("undecodable response: {}", e)))?;
        let content = first_choice(body)?;
        debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[async_trait]
impl TextAnalyzer for OpenAiClient {
    async fn style_prompt(&self, text: &str) -> Result<String> {
        let prompt = self.complete(style_request(text)).await?;
        if prompt.is_empty() {
            return Err(Error::external(SERVICE, "empty style prompt"));
        }
        Ok(prompt)
    }

    async fn segment_plan(&self, duration: f64, excerpt: &str, count: usize) -> Result<String> {
        self.complete(segment_request(duration, excerpt, count)).await
    }

    async fn sound_events(&self, duration: f64, excerpt: &str) -> Result<String> {
        self.complete(events_request(duration, excerpt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_request_names_count_and_moods() {
        let (_, user, max_tokens) = segment_request(46.0, "It was night.", 3);
        assert!(user.contains("46.00 seconds"));
        assert!(user.contains("exactly 3 objects"));
        assert!(user.contains("\"suspense\""));
        assert_eq!(max_tokens, 300);
    }

    #[test]
    fn test_first_choice_is_trimmed() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  soft strings \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(body).unwrap(), "soft strings");
    }

    #[test]
    fn test_no_choices_is_external_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            first_choice(body),
            Err(Error::ExternalService { service: "openai", .. })
        ));
    }
}
