//! # Output Artifacts Module
//!
//! Questo modulo persiste i risultati di un asset elaborato con successo.
//!
//! ## Artefatti per asset (stem comune `{video}_{timestamp}`):
//! - `{stem}_detailed.txt`: report leggibile (nome, timestamp, modello,
//!   riassunto dettagliato, timeline, trascrizione completa o placeholder)
//! - `{stem}_youtube.txt`: solo il testo della versione breve
//! - `{stem}.json`: record strutturato con statistiche
//!
//! Lo stem comune è il contratto verso lo step di pubblicazione a valle,
//! che abbina gli artefatti per prefisso.
//!
//! ## Salvataggio parziale:
//! - In modalità testo, se tutti i backend falliscono la trascrizione
//!   viene comunque salvata in `transcript_only_{stem}.txt` prima di
//!   riportare il fallimento

use crate::format::TimelinePoint;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

const BANNER: &str =
    "======================================================================";
const RULE: &str =
    "----------------------------------------------------------------------";

/// Inputs for one asset's persisted artifacts
pub struct SummaryOutput<'a> {
    pub video_path: &'a Path,
    pub transcript: &'a str,
    pub summary: &'a str,
    pub timeline: &'a [TimelinePoint],
    pub youtube_comment: &'a str,
    pub model_name: &'a str,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    video: String,
    summary: &'a str,
    timeline: &'a [TimelinePoint],
    transcript: &'a str,
    youtube_comment: &'a str,
    model: &'a str,
    stats: JsonStats,
}

#[derive(Serialize)]
struct JsonStats {
    char_count: usize,
    segment_count: usize,
    generated_at: String,
}

fn video_stem(video_path: &Path) -> String {
    video_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn video_name(video_path: &Path) -> String {
    video_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Persist the three artifacts for a processed asset.
/// Returns (detailed txt, youtube txt, json record) paths.
pub async fn save_results(
    output: &SummaryOutput<'_>,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir).await?;

    let now = chrono::Local::now();
    let stem = format!("{}_{}", video_stem(output.video_path), now.format("%Y%m%d_%H%M%S"));

    // Artifact 1: human-readable detailed report
    let detailed_path = output_dir.join(format!("{}_detailed.txt", stem));
    let mut detailed = String::new();
    detailed.push_str(BANNER);
    detailed.push('\n');
    detailed.push_str(&format!("動画: {}\n", video_name(output.video_path)));
    detailed.push_str(&format!("生成時間: {}\n", now.format("%Y-%m-%d %H:%M:%S")));
    detailed.push_str(&format!("使用モデル: {}\n", output.model_name));
    detailed.push_str(BANNER);
    detailed.push_str("\n\n【AI要約（詳細版）】\n");
    detailed.push_str(RULE);
    detailed.push('\n');
    detailed.push_str(output.summary);
    detailed.push_str("\n\n【タイムライン】\n");
    detailed.push_str(RULE);
    detailed.push('\n');
    for item in output.timeline {
        detailed.push_str(&format!("{} - {}\n", item.time, item.text));
    }
    detailed.push_str("\n【完全な文字起こし】\n");
    detailed.push_str(RULE);
    detailed.push('\n');
    detailed.push_str(output.transcript);
    detailed.push('\n');
    fs::write(&detailed_path, detailed).await?;

    // Artifact 2: raw short-form text
    let youtube_path = output_dir.join(format!("{}_youtube.txt", stem));
    fs::write(&youtube_path, output.youtube_comment).await?;

    // Artifact 3: structured record
    let json_path = output_dir.join(format!("{}.json", stem));
    let record = JsonRecord {
        video: video_name(output.video_path),
        summary: output.summary,
        timeline: output.timeline,
        transcript: output.transcript,
        youtube_comment: output.youtube_comment,
        model: output.model_name,
        stats: JsonStats {
            char_count: output.transcript.chars().count(),
            segment_count: output.timeline.len(),
            generated_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        },
    };
    fs::write(&json_path, serde_json::to_string_pretty(&record)?).await?;

    Ok((detailed_path, youtube_path, json_path))
}

/// Rescue path: persist the transcript alone when summarization failed,
/// so transcription work is never silently lost.
pub async fn save_transcript_only(
    video_path: &Path,
    transcript: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("transcript_only_{}.txt", video_stem(video_path)));
    fs::write(&path, transcript).await?;
    Ok(path)
}
