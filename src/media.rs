//! # Media Transform Module
//!
//! Questo modulo applica una strategia di elaborazione a un video sorgente.
//!
//! ## Responsabilità:
//! - Lettura durata e dimensione con ffprobe
//! - Accelerazione video+audio con FFmpeg (setpts + atempo)
//! - Estrazione solo-audio per il tier 4
//! - Degradazione controllata: su errore ritorna il file originale
//! - Verifica dipendenze esterne (ffmpeg, ffprobe)
//!
//! ## Pipeline di accelerazione:
//! - Video: `setpts=(1/speedup)*PTS`
//! - Audio: `atempo=speedup`, concatenato in due stadi quando speedup > 2.0
//!   (atempo accetta al massimo 2.0 per stadio)
//!
//! ## Gestione file temporanei:
//! - Gli artefatti derivati sono NamedTempFile mantenuti con `keep()`
//! - Il chiamante è responsabile della cancellazione dopo l'uso,
//!   indipendentemente dall'esito della chiamata al backend
//!
//! ## Dipendenze richieste:
//! - `ffmpeg`: trasformazione media
//! - `ffprobe`: lettura durata

use crate::error::SummarizeError;
use crate::strategy::ProcessingStrategy;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Snapshot of a video file taken at analysis time
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub path: PathBuf,
    /// Duration in seconds; 0.0 when ffprobe failed
    pub duration: f64,
    /// File size in bytes
    pub file_size: u64,
}

impl VideoInfo {
    /// Probe a video file with ffprobe. A probe failure is not fatal:
    /// duration stays 0.0 and the caller decides what to do with it.
    pub async fn probe(path: &Path) -> Result<Self> {
        let file_size = tokio::fs::metadata(path).await?.len();
        let duration = Self::probe_duration(path).await.unwrap_or_else(|e| {
            warn!("Could not read duration of {}: {}", path.display(), e);
            0.0
        });

        Ok(Self {
            path: path.to_path_buf(),
            duration,
            file_size,
        })
    }

    async fn probe_duration(path: &Path) -> Result<f64> {
        let path = path.to_path_buf();
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            tokio::task::spawn_blocking(move || {
                Command::new("ffprobe")
                    .args([
                        "-v",
                        "error",
                        "-show_entries",
                        "format=duration",
                        "-of",
                        "default=noprint_wrappers=1:nokey=1",
                    ])
                    .arg(&path)
                    .output()
            }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("ffprobe timed out"))??;

        let output = output?;
        if !output.status.success() {
            return Err(SummarizeError::FFmpeg(
                String::from_utf8_lossy(&output.stderr).to_string(),
            )
            .into());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.trim().parse::<f64>()?)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration / 60.0
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0)
    }
}

/// Applies a [`ProcessingStrategy`] to a source video
pub struct MediaTransform;

impl MediaTransform {
    /// Realize a strategy. Returns the path to feed to the backend and
    /// whether it is a temporary file the caller must delete afterwards.
    ///
    /// Transform failures degrade to the original path instead of erroring:
    /// a slower upload beats a lost asset.
    pub async fn apply_strategy(source: &Path, strategy: &ProcessingStrategy) -> (PathBuf, bool) {
        if strategy.audio_only {
            return Self::extract_audio(source, strategy.speedup).await;
        }

        if strategy.speedup != 1.0 {
            return Self::speed_up(source, strategy.speedup).await;
        }

        (source.to_path_buf(), false)
    }

    /// Re-encode video and audio at the given speed-up factor
    async fn speed_up(source: &Path, speedup: f64) -> (PathBuf, bool) {
        eprintln!("⚡ Speeding up video: {}x", speedup);

        let temp_path = match Self::keep_temp(".mp4") {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not create temp file, using original video: {}", e);
                return (source.to_path_buf(), false);
            }
        };

        let pts_factor = 1.0 / speedup;
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-i")
            .arg(source)
            .args(["-filter:v", &format!("setpts={}*PTS", pts_factor)])
            .args(["-filter:a", &atempo_filter(speedup)])
            .args(["-loglevel", "warning", "-y"])
            .arg(&temp_path);

        Self::run_or_degrade(cmd, source, temp_path, "speed-up").await
    }

    /// Extract an audio-only artifact, applying the speed-up to the audio.
    /// Degenerate case: speedup 1.0 on an audio container returns the source.
    async fn extract_audio(source: &Path, speedup: f64) -> (PathBuf, bool) {
        if speedup == 1.0 && is_audio_container(source) {
            debug!("Audio-only passthrough for {}", source.display());
            return (source.to_path_buf(), false);
        }

        eprintln!("🎵 Extracting audio ({}x)", speedup);

        let temp_path = match Self::keep_temp(".mp3") {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not create temp file, using original video: {}", e);
                return (source.to_path_buf(), false);
            }
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-i").arg(source).args(["-vn", "-acodec", "libmp3lame"]);
        if speedup != 1.0 {
            cmd.args(["-filter:a", &atempo_filter(speedup)]);
        }
        cmd.args(["-loglevel", "warning", "-y"]).arg(&temp_path);

        Self::run_or_degrade(cmd, source, temp_path, "audio extraction").await
    }

    async fn run_or_degrade(
        mut cmd: Command,
        source: &Path,
        temp_path: PathBuf,
        what: &str,
    ) -> (PathBuf, bool) {
        let result = tokio::task::spawn_blocking(move || cmd.output()).await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                eprintln!("✅ {} completed", what);
                (temp_path, true)
            }
            Ok(Ok(output)) => {
                warn!(
                    "{} failed for {}, using original: {}",
                    what,
                    source.display(),
                    String::from_utf8_lossy(&output.stderr)
                );
                let _ = std::fs::remove_file(&temp_path);
                (source.to_path_buf(), false)
            }
            Ok(Err(e)) => {
                warn!("Failed to execute ffmpeg for {}: {}", what, e);
                let _ = std::fs::remove_file(&temp_path);
                (source.to_path_buf(), false)
            }
            Err(e) => {
                warn!("ffmpeg task for {} panicked: {}", what, e);
                let _ = std::fs::remove_file(&temp_path);
                (source.to_path_buf(), false)
            }
        }
    }

    /// Create a temp file that survives scope exit; caller deletes it
    fn keep_temp(suffix: &str) -> Result<PathBuf> {
        let temp = NamedTempFile::with_suffix(suffix)?;
        let (_file, path) = temp.keep()?;
        Ok(path)
    }

    /// Check if required tools are available
    pub async fn check_dependencies() -> Result<()> {
        for tool in ["ffmpeg", "ffprobe"] {
            let available = tokio::task::spawn_blocking(move || {
                Command::new(tool)
                    .arg("-version")
                    .output()
                    .map(|o| o.status.success())
                    .unwrap_or(false)
            })
            .await
            .unwrap_or(false);

            if !available {
                return Err(SummarizeError::MissingDependency(format!(
                    "{} is required for video processing",
                    tool
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// Build the ffmpeg audio tempo filter. atempo accepts at most 2.0 per
/// stage, so larger factors are chained: stage1 fixed at 2.0, stage2 the
/// remainder.
fn atempo_filter(speedup: f64) -> String {
    if speedup <= 2.0 {
        format!("atempo={}", speedup)
    } else {
        format!("atempo=2.0,atempo={}", speedup / 2.0)
    }
}

fn is_audio_container(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "mp3" | "m4a" | "aac" | "wav" | "ogg" | "flac"
        ),
        None => false,
    }
}
