//! Sound generation (music beds and Foley clips) and streamed text-to-speech.

use super::check_status;
use crate::error::{Error, Result};
use crate::ports::collaborators::{ClipGenerator, NarrationSynthesizer};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "elevenlabs";
const TTS_MODEL: &str = "eleven_multilingual_v2";
const TTS_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Serialize)]
struct SoundRequest<'a> {
    text: &'a str,
    duration_seconds: f64,
    prompt_influence: f64,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SpeechChunk {
    audio_base64: String,
}

/// Join the audio of a newline-delimited JSON speech stream.
///
/// Lines that do not parse or decode are skipped; a stream with no audio at
/// all is an error.
fn decode_speech_stream(body: &str) -> Result<Bytes> {
    let mut audio = BytesMut::new();
    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: SpeechChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(line_no, error = %e, "skipping unparsable speech chunk");
                continue;
            }
        };
        match STANDARD.decode(chunk.audio_base64.as_bytes()) {
            Ok(data) => audio.extend_from_slice(&data),
            Err(e) => warn!(line_no, error = %e, "skipping undecodable speech chunk"),
        }
    }
    if audio.is_empty() {
        return Err(Error::external(SERVICE, "speech stream carried no audio"));
    }
    Ok(audio.freeze())
}

pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    voice_id: Option<String>,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(
        api_key: String,
        voice_id: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            voice_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        check_status(SERVICE, response).await
    }
}

#[async_trait]
impl ClipGenerator for ElevenLabsClient {
    async fn generate(&self, prompt: &str, duration: f64) -> Result<Bytes> {
        let url = format!("{}/sound-generation", self.base_url);
        let request = SoundRequest {
            text: prompt,
            duration_seconds: duration,
            prompt_influence: 0.5,
        };
        let audio = self
            .post(&url, &request)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        if audio.is_empty() {
            return Err(Error::external(SERVICE, "empty clip"));
        }
        debug!(bytes = audio.len(), duration, "clip generated");
        Ok(audio)
    }
}

#[async_trait]
impl NarrationSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let voice_id = self
            .voice_id
            .as_deref()
            .ok_or_else(|| Error::external(SERVICE, "ELEVENLABS_VOICE_ID is not set"))?;
        let url = format!(
            "{}/text-to-speech/{}/stream/with-timestamps?output_format={}",
            self.base_url, voice_id, TTS_FORMAT
        );
        let request = SpeechRequest {
            text,
            model_id: TTS_MODEL,
        };
        let body = self
            .post(&url, &request)
            .await?
            .text()
            .await
            .map_err(|e| Error::external(SERVICE, e.to_string()))?;
        decode_speech_stream(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_stream_joins_chunks_and_skips_garbage() {
        let body = format!(
            "{{\"audio_base64\":\"{}\",\"alignment\":null}}\nnot json\n\n{{\"audio_base64\":\"{}\"}}\n",
            STANDARD.encode(b"ID3"),
            STANDARD.encode(b"\xff\xfb")
        );
        let audio = decode_speech_stream(&body).unwrap();
        assert_eq!(&audio[..], b"ID3\xff\xfb");
    }

    #[test]
    fn test_empty_speech_stream_is_error() {
        assert!(decode_speech_stream("{\"audio_base64\":\"\"}\n").is_err());
        assert!(decode_speech_stream("").is_err());
    }

    #[test]
    fn test_sound_request_shape() {
        let json = serde_json::to_value(SoundRequest {
            text: "thunder",
            duration_seconds: 2.0,
            prompt_influence: 0.5,
        })
        .unwrap();
        assert_eq!(json["duration_seconds"], 2.0);
        assert_eq!(json["prompt_influence"], 0.5);
    }
}
