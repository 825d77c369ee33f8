//! # Hosted Multimodal Adapter (Gemini)
//!
//! Client REST per il backend multimodale ospitato.
//!
//! ## Protocollo video (upload-and-poll):
//! 1. Upload raw del file (MIME dedotto dall'estensione)
//! 2. Polling ogni 2 secondi finché lo stato remoto è PROCESSING
//! 3. generateContent con file_uri, media_resolution e fps opzionale
//! 4. Cancellazione best-effort del file remoto, qualunque sia l'esito
//!
//! ## Validazione risposta:
//! - Testo vuoto o blocco del content-safety ⇒ errore del backend
//!   (il chiamante passa al backend successivo, mai fatale)

use crate::config::GenerationParams;
use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Interval between remote-processing polls
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Hosted multimodal API client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Text request: single generateContent call
    pub async fn generate_from_text(
        &self,
        prompt: &str,
        model_id: &str,
        generation: &GenerationParams,
    ) -> Result<String> {
        eprintln!("⏳ Calling {}...", model_id);

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": self.generation_config(generation, None),
        });

        let response: Value = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, model_id, self.api_key
            ))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_text(&response)
    }

    /// Video request: upload, poll until ready, generate, then delete the
    /// remote file regardless of outcome. Returns the text plus the
    /// remote-reported media duration when available.
    pub async fn generate_from_video(
        &self,
        media_path: &Path,
        prompt: &str,
        model_id: &str,
        generation: &GenerationParams,
        media_resolution: &str,
        fps: Option<f64>,
    ) -> Result<(String, Option<f64>)> {
        eprintln!("⏳ Uploading media to {}...", model_id);

        let mime_type = mime_for_extension(media_path);
        let uploaded = self.upload_file(media_path, mime_type).await?;
        let file_name = uploaded.name.clone();

        let result = self
            .generate_after_upload(uploaded, prompt, model_id, generation, media_resolution, fps)
            .await;

        // Remote cleanup happens on every path, success or failure
        self.delete_file(&file_name).await;

        result
    }

    async fn generate_after_upload(
        &self,
        uploaded: RemoteFile,
        prompt: &str,
        model_id: &str,
        generation: &GenerationParams,
        media_resolution: &str,
        fps: Option<f64>,
    ) -> Result<(String, Option<f64>)> {
        let ready = self.poll_until_ready(uploaded).await?;

        if let Some(duration) = ready.duration_secs {
            info!(
                "Remote media duration: {:.1}s ({:.1} min)",
                duration,
                duration / 60.0
            );
        }

        eprintln!("   ⏳ Analyzing media...");

        let mut file_part = json!({
            "file_data": { "file_uri": ready.uri, "mime_type": ready.mime_type }
        });
        if let Some(fps) = fps {
            file_part["video_metadata"] = json!({ "fps": fps });
        }

        let body = json!({
            "contents": [{ "parts": [file_part, { "text": prompt }] }],
            "generationConfig": self.generation_config(generation, Some(media_resolution)),
        });

        let response: Value = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, model_id, self.api_key
            ))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = extract_text(&response)?;
        Ok((text, ready.duration_secs))
    }

    async fn upload_file(&self, media_path: &Path, mime_type: &str) -> Result<RemoteFile> {
        // Media files run to gigabytes; stream from disk instead of
        // loading the whole file into memory
        let (body, content_length) = streaming_body(media_path).await?;

        let response: Value = self
            .http
            .post(format!(
                "{}/upload/v1beta/files?key={}",
                self.base_url, self.api_key
            ))
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .header("Content-Length", content_length)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let file = &response["file"];
        let name = file["name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("upload response missing file name"))?
            .to_string();

        eprintln!("   ✅ Upload complete: {}", name);

        Ok(RemoteFile {
            name,
            uri: file["uri"].as_str().unwrap_or_default().to_string(),
            state: file["state"].as_str().unwrap_or("PROCESSING").to_string(),
            mime_type: mime_type.to_string(),
            duration_secs: parse_video_duration(file),
        })
    }

    /// Poll the remote file every 2 seconds until it leaves PROCESSING
    async fn poll_until_ready(&self, mut file: RemoteFile) -> Result<RemoteFile> {
        while file.state == "PROCESSING" {
            tokio::time::sleep(POLL_INTERVAL).await;

            let response: Value = self
                .http
                .get(format!(
                    "{}/v1beta/{}?key={}",
                    self.base_url, file.name, self.api_key
                ))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            file.state = response["state"].as_str().unwrap_or("PROCESSING").to_string();
            if let Some(uri) = response["uri"].as_str() {
                file.uri = uri.to_string();
            }
            if file.duration_secs.is_none() {
                file.duration_secs = parse_video_duration(&response);
            }
        }

        if file.state == "FAILED" {
            return Err(anyhow::anyhow!("remote media processing failed"));
        }

        eprintln!("   ✅ Remote processing complete");
        Ok(file)
    }

    /// Best-effort remote deletion; failure is logged, never propagated
    async fn delete_file(&self, file_name: &str) {
        let result = self
            .http
            .delete(format!(
                "{}/v1beta/{}?key={}",
                self.base_url, file_name, self.api_key
            ))
            .send()
            .await;

        match result {
            Ok(r) if r.status().is_success() => debug!("Deleted uploaded file {}", file_name),
            Ok(r) => warn!("Could not delete uploaded file {}: {}", file_name, r.status()),
            Err(e) => warn!("Could not delete uploaded file {}: {}", file_name, e),
        }
    }

    fn generation_config(&self, generation: &GenerationParams, media_resolution: Option<&str>) -> Value {
        let mut config = json!({
            "temperature": generation.temperature,
            "topP": generation.top_p,
            "topK": generation.top_k,
            "maxOutputTokens": generation.max_output_tokens,
        });
        if let Some(resolution) = media_resolution {
            config["mediaResolution"] = json!(format!("MEDIA_RESOLUTION_{}", resolution));
        }
        config
    }
}

#[derive(Debug, Clone)]
struct RemoteFile {
    name: String,
    uri: String,
    state: String,
    mime_type: String,
    duration_secs: Option<f64>,
}

/// Pull the generated text out of a generateContent response. Empty text
/// and content-safety blocks both count as failures.
fn extract_text(response: &Value) -> Result<String> {
    if let Some(reason) = response["promptFeedback"]["blockReason"].as_str() {
        return Err(anyhow::anyhow!("content blocked: {}", reason));
    }

    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(anyhow::anyhow!("API returned empty content"));
    }

    Ok(text)
}

/// Open a file as a streaming request body plus its content length
async fn streaming_body(path: &Path) -> Result<(reqwest::Body, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let content_length = file.metadata().await?.len();
    let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));
    Ok((body, content_length))
}

/// Remote duration strings look like "123.456s"
fn parse_video_duration(value: &Value) -> Option<f64> {
    value["videoMetadata"]["videoDuration"]
        .as_str()
        .and_then(|d| d.trim_end_matches('s').parse::<f64>().ok())
}

/// MIME type by file extension, defaulting to video/mp4
pub fn mime_for_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        _ => "video/mp4",
    }
}
