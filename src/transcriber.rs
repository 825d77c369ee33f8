//! # Transcription Collaborator Module
//!
//! Questo modulo definisce l'interfaccia verso il collaboratore di
//! trascrizione (modalità testo). La trascrizione stessa è opaca: un
//! comando esterno produce i segmenti, il core li consuma.
//!
//! ## Responsabilità:
//! - Trait `Transcribe` come cucitura per i test
//! - Implementazione a comando esterno (JSON dei segmenti su stdout)
//! - Caricamento del vocabolario personalizzato come hint di contesto
//!
//! ## Contratto:
//! - Una trascrizione vuota è un fallimento duro per quell'asset

use crate::config::TranscriberConfig;
use crate::error::SummarizeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Base context hint prepended to the vocabulary terms
const BASE_PROMPT: &str = "以下は日本語の音声です。";

/// One transcript segment with its time span
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcription collaborator seam. Production uses an external command;
/// tests inject a fake.
pub trait Transcribe {
    /// Domain hint prepended to the recognition prompt
    fn vocabulary_hint(&self) -> String {
        String::new()
    }

    /// Produce the full text plus ordered segments for a media file.
    fn transcribe(&self, path: &Path, vocab_hint: &str) -> Result<(String, Vec<TranscriptSegment>)>;
}

/// Shells out to a configured command that prints a JSON array of
/// `{start, end, text}` segments on stdout. The media path is appended as
/// the last argument, the vocabulary hint via `--prompt`.
pub struct CommandTranscriber {
    config: TranscriberConfig,
}

impl CommandTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Build the vocabulary hint: base prompt plus the configured terms
    /// (non-empty, non-comment lines) joined with `、`.
    pub fn load_vocabulary(&self) -> String {
        let vocab_path = match &self.config.vocabulary_file {
            Some(p) => p,
            None => return BASE_PROMPT.to_string(),
        };

        let content = match std::fs::read_to_string(vocab_path) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Could not read vocabulary file {}: {}",
                    vocab_path.display(),
                    e
                );
                return BASE_PROMPT.to_string();
            }
        };

        let terms: Vec<&str> = content
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        if terms.is_empty() {
            warn!("Vocabulary file {} is empty", vocab_path.display());
            return BASE_PROMPT.to_string();
        }

        info!("Loaded {} vocabulary terms", terms.len());
        format!("{}\n{}", BASE_PROMPT, terms.join("、"))
    }
}

impl Transcribe for CommandTranscriber {
    fn vocabulary_hint(&self) -> String {
        self.load_vocabulary()
    }

    fn transcribe(&self, path: &Path, vocab_hint: &str) -> Result<(String, Vec<TranscriptSegment>)> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| SummarizeError::Transcription("empty transcriber command".into()))?;

        let output = Command::new(program)
            .args(args)
            .arg("--prompt")
            .arg(vocab_hint)
            .arg(path)
            .output()
            .map_err(|e| {
                SummarizeError::Transcription(format!("failed to run {}: {}", program, e))
            })?;

        if !output.status.success() {
            return Err(SummarizeError::Transcription(
                String::from_utf8_lossy(&output.stderr).to_string(),
            )
            .into());
        }

        let segments: Vec<TranscriptSegment> = serde_json::from_slice(&output.stdout)
            .map_err(|e| SummarizeError::Transcription(format!("invalid segment JSON: {}", e)))?;

        let transcript: String = segments.iter().map(|s| s.text.as_str()).collect();

        if transcript.trim().is_empty() {
            return Err(SummarizeError::Transcription("empty transcript".into()).into());
        }

        Ok((transcript, segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_vocabulary_without_file_uses_base_prompt() {
        let transcriber = CommandTranscriber::new(TranscriberConfig {
            command: vec!["true".to_string()],
            vocabulary_file: None,
        });
        assert_eq!(transcriber.load_vocabulary(), BASE_PROMPT);
    }

    #[test]
    fn test_vocabulary_joins_terms() {
        let mut vocab = NamedTempFile::new().unwrap();
        writeln!(vocab, "# comment").unwrap();
        writeln!(vocab, "用語A").unwrap();
        writeln!(vocab).unwrap();
        writeln!(vocab, "用語B").unwrap();

        let transcriber = CommandTranscriber::new(TranscriberConfig {
            command: vec!["true".to_string()],
            vocabulary_file: Some(vocab.path().to_path_buf()),
        });

        let hint = transcriber.load_vocabulary();
        assert!(hint.starts_with(BASE_PROMPT));
        assert!(hint.ends_with("用語A、用語B"));
    }

    #[test]
    fn test_vocabulary_missing_file_falls_back() {
        let transcriber = CommandTranscriber::new(TranscriberConfig {
            command: vec!["true".to_string()],
            vocabulary_file: Some("/no/such/vocab.txt".into()),
        });
        assert_eq!(transcriber.load_vocabulary(), BASE_PROMPT);
    }

    #[test]
    fn test_segment_json_shape() {
        let json = r#"[{"start": 0.0, "end": 2.5, "text": "こんにちは"}]"#;
        let segments: Vec<TranscriptSegment> = serde_json::from_str(json).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "こんにちは");
    }
}
