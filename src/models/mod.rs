//! # Model Orchestration Module
//!
//! Questo modulo coordina i backend di riassunto configurati.
//!
//! ## Responsabilità:
//! - Itera i backend abilitati in ordine di priorità (posizione in lista)
//! - Primo successo vince: nessun confronto di qualità tra backend
//! - Ogni fallimento (timeout, eccezione, risposta vuota/bloccata) è
//!   loggato e si passa al successivo, mai fatale
//! - In modalità video filtra i soli backend capaci di accettare media
//!
//! ## Architettura:
//! - `BackendInvoker`: cucitura per i protocolli (e per i test)
//! - `LiveInvoker`: dispatch sul kind del descrittore (Gemini / Ollama)
//! - `ModelOrchestrator`: il loop di fallback vero e proprio

pub mod gemini;
pub mod ollama;

use crate::config::{BackendDescriptor, BackendKind};
use crate::error::SummarizeError;
use crate::format::format_duration_jp;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Protocol seam: one call against one backend
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke_text(&self, backend: &BackendDescriptor, prompt: &str) -> Result<String>;

    async fn invoke_video(
        &self,
        backend: &BackendDescriptor,
        media_path: &Path,
        prompt: &str,
        media_resolution: &str,
        fps: Option<f64>,
    ) -> Result<(String, Option<f64>)>;
}

/// Production invoker dispatching on the backend kind
pub struct LiveInvoker {
    gemini: Option<GeminiClient>,
    ollama: OllamaClient,
}

impl LiveInvoker {
    /// `api_key` feeds the hosted backends; without it they fail
    /// individually while local backends keep working.
    pub fn new(api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("No API key configured; hosted backends will be skipped");
        }
        Self {
            gemini: api_key.map(GeminiClient::new),
            ollama: OllamaClient::new(),
        }
    }
}

#[async_trait]
impl BackendInvoker for LiveInvoker {
    async fn invoke_text(&self, backend: &BackendDescriptor, prompt: &str) -> Result<String> {
        match backend.kind {
            BackendKind::Gemini => {
                let client = self.gemini.as_ref().ok_or_else(|| {
                    SummarizeError::Backend("hosted API client not initialized".into())
                })?;
                client
                    .generate_from_text(prompt, &backend.model_id, &backend.generation)
                    .await
            }
            BackendKind::Ollama => {
                let api_url = backend.api_url.as_deref().unwrap_or(ollama::DEFAULT_API_URL);
                self.ollama
                    .generate(api_url, &backend.model_id, prompt, &backend.generation)
                    .await
            }
        }
    }

    async fn invoke_video(
        &self,
        backend: &BackendDescriptor,
        media_path: &Path,
        prompt: &str,
        media_resolution: &str,
        fps: Option<f64>,
    ) -> Result<(String, Option<f64>)> {
        match backend.kind {
            BackendKind::Gemini => {
                let client = self.gemini.as_ref().ok_or_else(|| {
                    SummarizeError::Backend("hosted API client not initialized".into())
                })?;
                client
                    .generate_from_video(
                        media_path,
                        prompt,
                        &backend.model_id,
                        &backend.generation,
                        media_resolution,
                        fps,
                    )
                    .await
            }
            BackendKind::Ollama => Err(SummarizeError::Backend(
                "local streaming backend cannot accept media upload".into(),
            )
            .into()),
        }
    }
}

/// Tries each enabled backend in priority order until one succeeds
pub struct ModelOrchestrator {
    backends: Vec<BackendDescriptor>,
    invoker: Box<dyn BackendInvoker>,
    media_resolution: String,
}

impl ModelOrchestrator {
    pub fn new(
        backends: Vec<BackendDescriptor>,
        invoker: Box<dyn BackendInvoker>,
        media_resolution: String,
    ) -> Self {
        let enabled: Vec<_> = backends.into_iter().filter(|b| b.enabled).collect();
        info!("Model orchestrator ready with {} backend(s)", enabled.len());
        for (i, b) in enabled.iter().enumerate() {
            info!("  {}. {} ({:?})", i + 1, b.name, b.kind);
        }
        Self {
            backends: enabled,
            invoker,
            media_resolution,
        }
    }

    /// Summarize a transcript. Returns (summary, backend name) or None
    /// when every backend failed.
    pub async fn summarize_text(
        &self,
        transcript: &str,
        duration_secs: f64,
    ) -> Option<(String, String)> {
        eprintln!("\n🤖 Starting AI summarization...");
        eprintln!("   transcript: {} chars", transcript.chars().count());

        let prompt = text_prompt(transcript, duration_secs);

        for (i, backend) in self.backends.iter().enumerate() {
            eprintln!(
                "Trying backend {}/{}: {}",
                i + 1,
                self.backends.len(),
                backend.name
            );

            match self.invoker.invoke_text(backend, &prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    eprintln!("✅ Success with {}\n", backend.name);
                    return Some((text, backend.name.clone()));
                }
                Ok(_) => warn!("{} returned empty text, trying next backend", backend.name),
                Err(e) => warn!("{} failed: {}", backend.name, e),
            }
        }

        eprintln!("❌ All backends failed");
        None
    }

    /// Summarize a media file directly. Only media-capable backends are
    /// considered. Returns (response, backend name, reported duration).
    pub async fn summarize_video(
        &self,
        media_path: &Path,
        fps: Option<f64>,
    ) -> Option<(String, String, Option<f64>)> {
        eprintln!("\n🎬 Direct media analysis mode");

        let capable: Vec<&BackendDescriptor> = self
            .backends
            .iter()
            .filter(|b| b.kind == BackendKind::Gemini)
            .collect();

        if capable.is_empty() {
            eprintln!("❌ No media-capable backend configured");
            return None;
        }

        let prompt = video_prompt();

        for (i, backend) in capable.iter().enumerate() {
            eprintln!("Trying backend {}/{}: {}", i + 1, capable.len(), backend.name);

            match self
                .invoker
                .invoke_video(backend, media_path, prompt, &self.media_resolution, fps)
                .await
            {
                Ok((text, duration)) if !text.trim().is_empty() => {
                    eprintln!("✅ Success with {}\n", backend.name);
                    return Some((text, backend.name.clone(), duration));
                }
                Ok(_) => warn!("{} returned empty text, trying next backend", backend.name),
                Err(e) => warn!("{} failed: {}", backend.name, e),
            }
        }

        eprintln!("❌ All media-capable backends failed");
        None
    }
}

/// Japanese summarization prompt for transcript text
pub fn text_prompt(transcript: &str, duration_secs: f64) -> String {
    let (minutes, seconds) = format_duration_jp(duration_secs);

    format!(
        "あなたは日本語の動画内容を正確に要約する専門家です。\n\
この動画は{minutes}分{seconds}秒です。\n\n\
以下の文字起こし内容を注意深く読み、視聴者に最も役立つ要約を作成してください。\n\n\
【要求事項】\n\
1. 事実を正確に反映すること（推測や創作をしない）\n\
2. 重要な情報を漏らさないこと\n\
3. 適切な構造で分かりやすく整理すること\n\
4. 自然で読みやすい日本語で書くこと\n\
5. ⭐ 文字起こしに書かれていない内容は絶対に追加しない\n\n\
【要約の形式】\n\
## 概要\n\
（動画全体の内容を2-3文で簡潔に説明）\n\n\
## 主なトピック\n\
1. **[トピック1のタイトル]**\n\
   - 重要なポイント\n\n\
2. **[トピック2のタイトル]**\n\
   - 重要なポイント\n\n\
（必要に応じて3-5個のトピック）\n\n\
## 重要なポイント・結論\n\
（特に重要な内容、結論、印象的な発言や具体的な数字など）\n\n\
---\n\
文字起こし内容：\n\
{transcript}\n\n\
---\n\
要約："
    )
}

/// Dual-format prompt for direct media analysis. The two section markers
/// here are the contract `summary::split_dual` parses against.
pub fn video_prompt() -> &'static str {
    "あなたは日本語の配信動画を正確に要約する専門家です。\n\n\
⚠️ 最重要ルール：動画で見聞きした内容「だけ」を書く\n\
❌ 禁止：背景知識や推測を加える\n\
❌ 禁止：日付・名前などを推測で補完する\n\
✅ OK：動画内で明確に言及された内容のみ\n\n\
この動画を視聴し、以下の2つを作成してください。\n\n\
📋 パート1：詳細版\n\n\
## 概要\n\
（動画全体の内容を伝える紹介文）\n\n\
## 主なトピック\n\
1. **[トピック1]**\n\
   - 詳細な内容とエピソード\n\n\
2. **[トピック2]**\n\
   - 詳細な内容とエピソード\n\n\
## 重要なポイント・結論\n\
（重要な内容、具体的な発言や数字など）\n\n\
📺 パート2：YouTube投稿用\n\n\
📝 [配信のタイトル]\n\n\
[配信の雰囲気を伝える紹介文]\n\n\
💡 この配信の見どころ：\n\
• [見どころ1]\n\
• [見どころ2]\n\
• [見どころ3]\n\n\
[視聴を促す一言]\n\n\
※ この要約は自動生成されました\n\n\
【出力形式】必ず以下の形式で出力してください：\n\n\
=== 詳細版 ===\n\
（パート1の内容）\n\n\
=== YouTube版 ===\n\
（パート2の内容）\n\n\
⚠️ 重要：\n\
- 必ず「=== 詳細版 ===」から始めてください\n\
- 前置き文章は一切書かないでください\n\
- 上記の2つのパートだけを出力してください"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn backend(name: &str, kind: BackendKind) -> BackendDescriptor {
        BackendDescriptor {
            name: name.to_string(),
            kind,
            model_id: format!("{}-model", name),
            api_url: None,
            enabled: true,
            generation: GenerationParams::default(),
            notes: None,
        }
    }

    /// Fails the first `fail_count` invocations, then succeeds, counting
    /// every call
    struct ScriptedInvoker {
        fail_count: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BackendInvoker for ScriptedInvoker {
        async fn invoke_text(&self, backend: &BackendDescriptor, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_count {
                Err(anyhow::anyhow!("scripted failure"))
            } else {
                Ok(format!("summary from {}", backend.name))
            }
        }

        async fn invoke_video(
            &self,
            backend: &BackendDescriptor,
            _media_path: &Path,
            _prompt: &str,
            _media_resolution: &str,
            _fps: Option<f64>,
        ) -> Result<(String, Option<f64>)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_count {
                Err(anyhow::anyhow!("scripted failure"))
            } else {
                Ok((format!("summary from {}", backend.name), Some(60.0)))
            }
        }
    }

    fn orchestrator(backends: Vec<BackendDescriptor>, fail_count: usize) -> (ModelOrchestrator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = ScriptedInvoker {
            fail_count,
            calls: calls.clone(),
        };
        (
            ModelOrchestrator::new(backends, Box::new(invoker), "MEDIUM".to_string()),
            calls,
        )
    }

    #[tokio::test]
    async fn test_first_success_wins_without_further_calls() {
        let backends = vec![
            backend("a", BackendKind::Gemini),
            backend("b", BackendKind::Gemini),
            backend("c", BackendKind::Ollama),
        ];
        let (orchestrator, calls) = orchestrator(backends, 0);

        let (text, name) = orchestrator.summarize_text("文字起こし", 120.0).await.unwrap();
        assert_eq!(name, "a");
        assert_eq!(text, "summary from a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_after_k_failures() {
        let backends = vec![
            backend("a", BackendKind::Gemini),
            backend("b", BackendKind::Ollama),
            backend("c", BackendKind::Ollama),
            backend("d", BackendKind::Ollama),
        ];
        let (orchestrator, calls) = orchestrator(backends, 2);

        let (_, name) = orchestrator.summarize_text("文字起こし", 120.0).await.unwrap();
        assert_eq!(name, "c");
        // exactly K failures + 1 success, nothing after the winner
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_failure() {
        let backends = vec![backend("a", BackendKind::Gemini), backend("b", BackendKind::Ollama)];
        let (orchestrator, calls) = orchestrator(backends, 99);

        assert!(orchestrator.summarize_text("文字起こし", 120.0).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_backends_are_never_tried() {
        let mut disabled = backend("off", BackendKind::Gemini);
        disabled.enabled = false;
        let backends = vec![disabled, backend("on", BackendKind::Gemini)];
        let (orchestrator, calls) = orchestrator(backends, 0);

        let (_, name) = orchestrator.summarize_text("x", 1.0).await.unwrap();
        assert_eq!(name, "on");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_video_mode_filters_to_media_capable() {
        let backends = vec![
            backend("local", BackendKind::Ollama),
            backend("hosted", BackendKind::Gemini),
        ];
        let (orchestrator, calls) = orchestrator(backends, 0);

        let (_, name, duration) = orchestrator
            .summarize_video(Path::new("/videos/a.mp4"), Some(0.5))
            .await
            .unwrap();
        assert_eq!(name, "hosted");
        assert_eq!(duration, Some(60.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_video_mode_without_capable_backend() {
        let backends = vec![backend("local", BackendKind::Ollama)];
        let (orchestrator, calls) = orchestrator(backends, 0);

        assert!(orchestrator
            .summarize_video(Path::new("/videos/a.mp4"), None)
            .await
            .is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_text_prompt_embeds_duration_and_transcript() {
        let prompt = text_prompt("こんにちは", 125.0);
        assert!(prompt.contains("2分5秒"));
        assert!(prompt.contains("こんにちは"));
    }

    #[test]
    fn test_video_prompt_carries_section_markers() {
        let prompt = video_prompt();
        assert!(prompt.contains(crate::summary::DETAIL_MARKER));
        assert!(prompt.contains(crate::summary::SHORT_MARKER));
        assert!(prompt.contains("💡 この配信の見どころ："));
        assert!(prompt.contains("※ この要約は自動生成されました"));
    }
}
