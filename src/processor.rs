//! # Processing Pipeline Module
//!
//! Questo modulo coordina l'elaborazione di un singolo asset e il giro
//! batch sull'intera directory di input.
//!
//! ## Responsabilità:
//! - Due modalità per asset: analisi diretta del media (upload) oppure
//!   trascrizione locale seguita da riassunto testuale
//! - Decisione di strategia PRIMA di ogni trasformazione o chiamata di
//!   rete: un video oltre il limite non tocca mai ffmpeg né i backend
//! - Pulizia garantita degli artefatti temporanei dopo la chiamata al
//!   backend, successo o fallimento che sia
//! - Registro delle elaborazioni aggiornato dopo OGNI tentativo
//!
//! ## Modalità batch:
//! - Scansione, filtro dei già elaborati, loop sequenziale con barra di
//!   avanzamento; un fallimento non ferma il giro (configurabile)

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::format::create_timeline;
use crate::media::{MediaTransform, VideoInfo};
use crate::models::ModelOrchestrator;
use crate::output::{save_results, save_transcript_only, SummaryOutput};
use crate::progress::{BatchStats, ProgressManager};
use crate::state::ProcessingLedger;
use crate::strategy::{ProcessingStrategy, StrategyDecision, StrategySelector};
use crate::summary::{derive_short_form, split_dual, validate_short_form};
use crate::transcriber::Transcribe;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Placeholder transcript written in direct mode, where no local
/// transcription happens
const DIRECT_MODE_TRANSCRIPT: &str = "（動画直接解析モードのため文字起こしなし）";

/// Drives one asset end to end, and the batch loop around it
pub struct Processor {
    config: Config,
    selector: StrategySelector,
    orchestrator: ModelOrchestrator,
    transcriber: Arc<dyn Transcribe + Send + Sync>,
    ledger: ProcessingLedger,
}

impl Processor {
    pub fn new(
        config: Config,
        orchestrator: ModelOrchestrator,
        transcriber: Arc<dyn Transcribe + Send + Sync>,
        ledger: ProcessingLedger,
    ) -> Self {
        let selector = StrategySelector::new(config.token_limit);
        Self {
            config,
            selector,
            orchestrator,
            transcriber,
            ledger,
        }
    }

    /// Process every discovered asset sequentially, recording each attempt
    /// in the ledger. Returns the batch statistics.
    pub async fn run_batch(&mut self) -> Result<BatchStats> {
        let files = FileManager::find_video_files(
            &self.config.input_dir,
            &self.config.extensions,
            self.config.recursive,
        )?;

        if files.is_empty() {
            eprintln!("📂 No video files found in {}", self.config.input_dir.display());
            return Ok(BatchStats::new(0));
        }

        let mut stats = BatchStats::new(files.len());
        let mut pending: Vec<PathBuf> = Vec::new();

        for file in files {
            // Any recorded attempt counts, failed ones included: a video
            // that keeps failing must not be retried on every pass
            if self.config.skip_processed && self.ledger.has_attempt(&file) {
                info!("Skipping already attempted: {}", file.display());
                stats.add_skipped();
            } else {
                pending.push(file);
            }
        }

        eprintln!(
            "\n🎬 Found {} video(s), {} to process ({} already done)",
            stats.total,
            pending.len(),
            stats.total - pending.len()
        );

        let progress = ProgressManager::new(pending.len() as u64);

        for file in pending {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            progress.update(&name);

            match self.process_file(&file).await {
                Ok(()) => {
                    self.record_attempt(&file, true).await;
                    stats.add_success();
                }
                Err(e) => {
                    warn!("Processing failed for {}: {:#}", file.display(), e);
                    eprintln!("❌ {}: {:#}", name, e);
                    self.record_attempt(&file, false).await;
                    stats.add_failure();
                    if !self.config.continue_on_error {
                        progress.finish("halted on error");
                        return Err(e.context(format!("halted at {}", file.display())));
                    }
                }
            }
        }

        progress.finish("batch complete");
        eprintln!("\n📊 {}", stats.format_summary());
        Ok(stats)
    }

    /// Ledger writes must never take the batch loop down with them
    async fn record_attempt(&mut self, file: &Path, success: bool) {
        if let Err(e) = self.ledger.record_attempt(file, success).await {
            warn!("Could not update ledger for {}: {:#}", file.display(), e);
        }
    }

    /// Process one asset in the configured mode
    pub async fn process_file(&self, path: &Path) -> Result<()> {
        eprintln!("\n{}", "=".repeat(60));
        eprintln!("▶️  {}", path.display());

        if self.config.use_video_direct {
            self.process_direct(path).await
        } else {
            self.process_text(path).await
        }
    }

    /// Duration gate: reject before any transform or network call
    fn select_or_reject(&self, info: &VideoInfo) -> Result<ProcessingStrategy> {
        match self.selector.select(info.duration, info.file_size) {
            StrategyDecision::Selected(strategy) => {
                eprintln!(
                    "📐 Strategy: {} (~{:.0} tokens)",
                    strategy.description, strategy.estimated_tokens
                );
                Ok(strategy)
            }
            StrategyDecision::TooLong => Err(anyhow!(
                "video is {:.1} minutes, exceeds the {:.0} minute limit",
                info.duration_minutes(),
                crate::strategy::MAX_DURATION_MINUTES
            )),
            StrategyDecision::UnknownDuration => {
                Err(anyhow!("could not determine video duration"))
            }
        }
    }

    /// Direct mode: upload the (possibly transformed) media to a
    /// media-capable backend and parse the dual-format response.
    async fn process_direct(&self, path: &Path) -> Result<()> {
        let info = VideoInfo::probe(path).await.context("probing video")?;
        eprintln!(
            "⏱️  {:.1} min, {:.1} MB",
            info.duration_minutes(),
            info.file_size_mb()
        );

        if info.duration_minutes() > self.config.segment_warn_minutes {
            warn!(
                "{} is {:.1} minutes; consider splitting long recordings",
                path.display(),
                info.duration_minutes()
            );
        }

        let strategy = self.select_or_reject(&info)?;

        let (upload_path, is_temp) = MediaTransform::apply_strategy(path, &strategy).await;

        let result = self
            .orchestrator
            .summarize_video(&upload_path, strategy.fps)
            .await;

        // The temp artifact must not outlive the backend call
        if is_temp {
            if let Err(e) = tokio::fs::remove_file(&upload_path).await {
                warn!("Could not remove temp file {}: {}", upload_path.display(), e);
            }
        }

        let (response, model_name, reported) =
            result.ok_or_else(|| anyhow!("all backends failed"))?;

        if let Some(reported_secs) = reported {
            info!("Backend reports media duration: {:.0}s", reported_secs);
        }

        let (detailed, short) = split_dual(&response);
        let (detailed, short) = if detailed.is_empty() {
            warn!("Response missing section markers, deriving short form locally");
            let derived = derive_short_form(&response);
            (response.clone(), derived)
        } else if !validate_short_form(&short) {
            warn!("Short form failed validation, deriving from detailed text");
            (detailed.clone(), derive_short_form(&detailed))
        } else {
            (detailed, short)
        };

        let output = SummaryOutput {
            video_path: path,
            transcript: DIRECT_MODE_TRANSCRIPT,
            summary: &detailed,
            timeline: &[],
            youtube_comment: &short,
            model_name: &model_name,
        };
        let (detailed_path, youtube_path, json_path) =
            save_results(&output, &self.config.output_dir).await?;

        eprintln!("💾 Saved:");
        eprintln!("   {}", detailed_path.display());
        eprintln!("   {}", youtube_path.display());
        eprintln!("   {}", json_path.display());
        Ok(())
    }

    /// Text mode: local transcription, then text summarization with
    /// fallback across backends. The transcript is rescued to disk even
    /// when every backend fails.
    async fn process_text(&self, path: &Path) -> Result<()> {
        let transcriber = self.transcriber.clone();
        let media_path = path.to_path_buf();
        let (transcript, segments) = tokio::task::spawn_blocking(move || {
            let hint = transcriber.vocabulary_hint();
            transcriber.transcribe(&media_path, &hint)
        })
        .await
        .context("transcription task panicked")??;

        if transcript.trim().is_empty() {
            return Err(anyhow!("transcription produced no text"));
        }
        eprintln!(
            "📝 Transcribed: {} chars, {} segments",
            transcript.chars().count(),
            segments.len()
        );

        let duration_secs = segments.last().map(|s| s.end).unwrap_or(0.0);
        if duration_secs / 60.0 > self.config.segment_warn_minutes {
            warn!(
                "{} is {:.1} minutes; consider splitting long recordings",
                path.display(),
                duration_secs / 60.0
            );
        }

        let summarized = self
            .orchestrator
            .summarize_text(&transcript, duration_secs)
            .await;

        let (summary, model_name) = match summarized {
            Some(pair) => pair,
            None => {
                let rescued =
                    save_transcript_only(path, &transcript, &self.config.output_dir).await?;
                eprintln!("💾 Transcript rescued to {}", rescued.display());
                return Err(anyhow!("all backends failed, transcript saved"));
            }
        };

        let timeline = create_timeline(&segments, self.config.timeline_points);
        let short = derive_short_form(&summary);

        let output = SummaryOutput {
            video_path: path,
            transcript: &transcript,
            summary: &summary,
            timeline: &timeline,
            youtube_comment: &short,
            model_name: &model_name,
        };
        let (detailed_path, youtube_path, json_path) =
            save_results(&output, &self.config.output_dir).await?;

        eprintln!("💾 Saved:");
        eprintln!("   {}", detailed_path.display());
        eprintln!("   {}", youtube_path.display());
        eprintln!("   {}", json_path.display());
        Ok(())
    }
}
