//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Definisce `BackendDescriptor` per i backend di riassunto (ordine = priorità)
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `input_dir`: Directory dei video da elaborare
//! - `output_dir`: Directory per i risultati (testo dettagliato, YouTube, JSON)
//! - `ledger_path`: File JSON del registro di elaborazione
//! - `use_video_direct`: Modalità diretta (upload multimodale) vs trascrizione
//! - `backends`: Lista ordinata dei backend abilitati (fallback order)
//! - `media_resolution`: Risoluzione media per i backend multimodali (LOW/MEDIUM/HIGH)
//! - `token_limit`: Budget token del modello remoto (default 250000)
//!
//! ## Validazione:
//! - Controlla che almeno un backend sia abilitato
//! - Controlla che media_resolution sia LOW/MEDIUM/HIGH
//! - Controlla che timeline_points e token_limit siano positivi
//!
//! ## Esempio:
//! ```rust
//! use stream_summarizer::Config;
//!
//! let config = Config {
//!     use_video_direct: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of summarization backend, deciding the wire protocol used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted multimodal API (upload-and-poll for video, plain request for text)
    Gemini,
    /// Local streaming inference server (NDJSON token stream)
    Ollama,
}

/// Generation parameters forwarded to a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "defaults::temperature")]
    pub temperature: f64,
    #[serde(default = "defaults::top_p")]
    pub top_p: f64,
    #[serde(default = "defaults::top_k")]
    pub top_k: u32,
    #[serde(default = "defaults::max_output_tokens")]
    pub max_output_tokens: u32,
    /// Only used by streaming local backends
    #[serde(default = "defaults::repeat_penalty")]
    pub repeat_penalty: f64,
    /// Only used by streaming local backends
    #[serde(default = "defaults::num_predict")]
    pub num_predict: u32,
    /// Only used by streaming local backends
    #[serde(default = "defaults::num_ctx")]
    pub num_ctx: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: defaults::temperature(),
            top_p: defaults::top_p(),
            top_k: defaults::top_k(),
            max_output_tokens: defaults::max_output_tokens(),
            repeat_penalty: defaults::repeat_penalty(),
            num_predict: defaults::num_predict(),
            num_ctx: defaults::num_ctx(),
        }
    }
}

/// One configured summarization backend. List position is fallback priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub model_id: String,
    /// API endpoint override (Ollama defaults to the local server)
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Transcription collaborator configuration (text mode only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// External command producing a JSON segment array on stdout.
    /// The media path is appended as the last argument.
    pub command: Vec<String>,
    /// Optional vocabulary file, one term per line, `#` comments
    #[serde(default)]
    pub vocabulary_file: Option<PathBuf>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            command: vec!["transcribe-json".to_string()],
            vocabulary_file: None,
        }
    }
}

/// Timings for the auto-processing watcher daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Seconds a file's size must stay unchanged to count as fully written
    #[serde(default = "defaults::stable_window_secs")]
    pub stable_window_secs: u64,
    /// Cool-down between consecutive batch triggers
    #[serde(default = "defaults::cooldown_secs")]
    pub cooldown_secs: u64,
    /// Delay before retrying when files are still growing
    #[serde(default = "defaults::retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stable_window_secs: defaults::stable_window_secs(),
            cooldown_secs: defaults::cooldown_secs(),
            retry_delay_secs: defaults::retry_delay_secs(),
        }
    }
}

/// Configuration for the summarization pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing the videos to process
    pub input_dir: PathBuf,
    /// Recognized video extensions (lowercase, without dot)
    pub extensions: Vec<String>,
    /// Recurse into subdirectories during discovery
    pub recursive: bool,
    /// Directory receiving the generated artifacts
    pub output_dir: PathBuf,
    /// Processing ledger file (idempotence record)
    pub ledger_path: PathBuf,
    /// Skip assets already recorded as successfully processed
    pub skip_processed: bool,
    /// Keep going after a per-asset failure
    pub continue_on_error: bool,
    /// Direct mode: send media to a multimodal backend instead of transcribing
    pub use_video_direct: bool,
    /// Media resolution for multimodal backends (LOW/MEDIUM/HIGH)
    pub media_resolution: String,
    /// Number of timeline points derived from transcript segments
    pub timeline_points: usize,
    /// Remote model token budget
    pub token_limit: f64,
    /// Warn (only) when a video exceeds this many minutes
    pub segment_warn_minutes: f64,
    /// File containing the hosted-backend API key
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    /// Ordered backend list; position is fallback priority
    pub backends: Vec<BackendDescriptor>,
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./videos"),
            extensions: vec![
                "mp4".to_string(),
                "mkv".to_string(),
                "mov".to_string(),
                "flv".to_string(),
                "webm".to_string(),
            ],
            recursive: false,
            output_dir: PathBuf::from("./outputs"),
            ledger_path: PathBuf::from("./outputs/processed.json"),
            skip_processed: true,
            continue_on_error: true,
            use_video_direct: true,
            media_resolution: "MEDIUM".to_string(),
            timeline_points: 10,
            token_limit: 250_000.0,
            segment_warn_minutes: 90.0,
            api_key_file: None,
            backends: vec![
                BackendDescriptor {
                    name: "Gemini Flash".to_string(),
                    kind: BackendKind::Gemini,
                    model_id: "gemini-2.0-flash".to_string(),
                    api_url: None,
                    enabled: true,
                    generation: GenerationParams::default(),
                    notes: None,
                },
                BackendDescriptor {
                    name: "Local Qwen".to_string(),
                    kind: BackendKind::Ollama,
                    model_id: "qwen2.5:14b".to_string(),
                    api_url: None,
                    enabled: true,
                    generation: GenerationParams::default(),
                    notes: Some("slow fallback".to_string()),
                },
            ],
            transcriber: TranscriberConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }
}

impl Config {
    /// Enabled backends in priority order
    pub fn enabled_backends(&self) -> Vec<&BackendDescriptor> {
        self.backends.iter().filter(|b| b.enabled).collect()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one video extension is required"));
        }

        if self.timeline_points == 0 {
            return Err(anyhow::anyhow!("Timeline points must be greater than 0"));
        }

        if self.token_limit <= 0.0 {
            return Err(anyhow::anyhow!("Token limit must be positive"));
        }

        if !matches!(self.media_resolution.as_str(), "LOW" | "MEDIUM" | "HIGH") {
            return Err(anyhow::anyhow!(
                "Media resolution must be LOW, MEDIUM or HIGH (got {})",
                self.media_resolution
            ));
        }

        if self.enabled_backends().is_empty() {
            return Err(anyhow::anyhow!("At least one backend must be enabled"));
        }

        if !self.use_video_direct && self.transcriber.command.is_empty() {
            return Err(anyhow::anyhow!(
                "Transcriber command is required in transcription mode"
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

mod defaults {
    pub fn temperature() -> f64 {
        0.3
    }
    pub fn top_p() -> f64 {
        0.85
    }
    pub fn top_k() -> u32 {
        40
    }
    pub fn max_output_tokens() -> u32 {
        16384
    }
    pub fn repeat_penalty() -> f64 {
        1.2
    }
    pub fn num_predict() -> u32 {
        2000
    }
    pub fn num_ctx() -> u32 {
        8192
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn stable_window_secs() -> u64 {
        5
    }
    pub fn cooldown_secs() -> u64 {
        10
    }
    pub fn retry_delay_secs() -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.timeline_points = 0;
        assert!(config.validate().is_err());

        config.timeline_points = 10;
        config.media_resolution = "ULTRA".to_string();
        assert!(config.validate().is_err());

        config.media_resolution = "LOW".to_string();
        for b in &mut config.backends {
            b.enabled = false;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.skip_processed);
        assert!(config.continue_on_error);
        assert_eq!(config.media_resolution, "MEDIUM");
        assert_eq!(config.timeline_points, 10);
        assert_eq!(config.token_limit, 250_000.0);
        assert_eq!(config.enabled_backends().len(), 2);
    }

    #[test]
    fn test_enabled_backends_keep_order() {
        let mut config = Config::default();
        config.backends[0].enabled = false;
        let enabled = config.enabled_backends();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "Local Qwen");
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            use_video_direct: false,
            media_resolution: "HIGH".to_string(),
            timeline_points: 6,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert!(!loaded_config.use_video_direct);
        assert_eq!(loaded_config.media_resolution, "HIGH");
        assert_eq!(loaded_config.timeline_points, 6);
    }

    #[tokio::test]
    async fn test_config_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("missing.json");
        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.timeline_points, Config::default().timeline_points);
    }
}
