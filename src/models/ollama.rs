//! # Local Streaming Adapter (Ollama)
//!
//! Client per il server di inferenza locale con risposta in streaming.
//!
//! ## Protocollo:
//! - POST NDJSON `{model, prompt, stream: true, options{...}}`
//! - La risposta è una sequenza di token parziali (`response`) terminata
//!   da `done: true`
//!
//! ## Timeout:
//! - Connessione: 30 secondi
//! - Inattività dello stream: 120 secondi senza byte ⇒ fallimento del
//!   backend (distinto dal timeout di connessione)

use crate::config::GenerationParams;
use anyhow::Result;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Abort when the stream produces no bytes for this long
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// Local streaming inference client
pub struct OllamaClient {
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Stream a completion, accumulating partial tokens until the done
    /// signal. Inactivity beyond the configured window fails the call.
    pub async fn generate(
        &self,
        api_url: &str,
        model_id: &str,
        prompt: &str,
        generation: &GenerationParams,
    ) -> Result<String> {
        eprintln!("⏳ Calling local {} (this can take a while)...", model_id);

        let payload = json!({
            "model": model_id,
            "prompt": prompt,
            "stream": true,
            "options": {
                "temperature": generation.temperature,
                "top_p": generation.top_p,
                "top_k": generation.top_k,
                "repeat_penalty": generation.repeat_penalty,
                "num_predict": generation.num_predict,
                "num_ctx": generation.num_ctx,
            }
        });

        let response = self
            .http
            .post(api_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut accumulator = NdjsonAccumulator::new();

        loop {
            let chunk = match tokio::time::timeout(INACTIVITY_TIMEOUT, stream.next()).await {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => {
                    return Err(anyhow::anyhow!(
                        "stream stalled: no data for {}s",
                        INACTIVITY_TIMEOUT.as_secs()
                    ));
                }
            };

            if accumulator.push_chunk(&chunk) {
                debug!("Stream done after {} chars", accumulator.summary.len());
                let trimmed = accumulator.summary.trim().to_string();
                if trimmed.is_empty() {
                    return Err(anyhow::anyhow!("stream produced no content"));
                }
                return Ok(trimmed);
            }
        }

        let trimmed = accumulator.summary.trim().to_string();
        if trimmed.is_empty() {
            return Err(anyhow::anyhow!("stream ended without content"));
        }
        Ok(trimmed)
    }
}

/// Accumulates NDJSON stream chunks into the generated text.
///
/// Chunk boundaries fall at arbitrary byte offsets, possibly inside a
/// multi-byte character, so the buffer holds raw bytes and lines are only
/// decoded once their terminating newline has arrived.
struct NdjsonAccumulator {
    buffer: Vec<u8>,
    summary: String,
}

impl NdjsonAccumulator {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            summary: String::new(),
        }
    }

    /// Feed one network chunk; returns true once the done signal is seen
    fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        self.buffer.extend_from_slice(chunk);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = &line[..line.len() - 1];

            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            match serde_json::from_slice::<Value>(line) {
                Ok(data) => {
                    if let Some(token) = data["response"].as_str() {
                        self.summary.push_str(token);
                    }
                    if data["done"].as_bool() == Some(true) {
                        return true;
                    }
                }
                Err(e) => debug!("Skipping malformed stream line: {}", e),
            }
        }

        false
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulate(chunks: &[&[u8]]) -> (String, bool) {
        let mut accumulator = NdjsonAccumulator::new();
        let mut done = false;
        for chunk in chunks {
            if accumulator.push_chunk(chunk) {
                done = true;
                break;
            }
        }
        (accumulator.summary, done)
    }

    #[test]
    fn test_token_accumulation_until_done() {
        let (text, done) = accumulate(&[
            b"{\"response\": \"\xE8\xA6\x81\xE7\xB4\x84\", \"done\": false}\n",
            "{\"response\": \"です\", \"done\": false}\n".as_bytes(),
            b"{\"response\": \"\", \"done\": true}\n",
            b"{\"response\": \"ignored\", \"done\": false}\n",
        ]);
        assert_eq!(text, "要約です");
        assert!(done);
    }

    #[test]
    fn test_chunk_boundary_inside_multibyte_character() {
        // "要約" is six UTF-8 bytes; split one character across chunks
        let line = "{\"response\": \"要約\", \"done\": true}\n".as_bytes();
        let (text, done) = accumulate(&[&line[..16], &line[16..]]);
        assert_eq!(text, "要約");
        assert!(!text.contains('\u{FFFD}'));
        assert!(done);
    }

    #[test]
    fn test_partial_line_held_until_newline() {
        let (text, done) = accumulate(&[
            b"{\"response\": \"ab\", \"do",
            b"ne\": false}\n{\"response\": \"cd\", \"done\": true}\n",
        ]);
        assert_eq!(text, "abcd");
        assert!(done);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let (text, done) = accumulate(&[
            b"not json\n",
            b"{\"response\": \"ok\", \"done\": true}\n",
        ]);
        assert_eq!(text, "ok");
        assert!(done);
    }

    #[tokio::test]
    async fn test_unreachable_server_errors() {
        let client = OllamaClient::new();
        let result = client
            .generate(
                "http://127.0.0.1:1/api/generate",
                "test-model",
                "prompt",
                &GenerationParams::default(),
            )
            .await;
        assert!(result.is_err());
    }
}
