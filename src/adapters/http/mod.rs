//! HTTP collaborators: text analysis, music/effect generation, narration.

pub mod elevenlabs;
pub mod openai;

pub use elevenlabs::ElevenLabsClient;
pub use openai::OpenAiClient;

use crate::error::Error;

/// Keep error bodies short enough for a log line.
fn body_excerpt(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(300)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    body[..end].trim()
}

async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::external(
        service,
        format!("returned {}: {}", status, body_excerpt(&body)),
    ))
}
