//! # Stream Summarizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e merge con gli override CLI
//! - Risoluzione della chiave API (variabile d'ambiente o file)
//! - Avvio del giro batch oppure della modalità watch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (config, input/output, modalità, watch)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica il file di configurazione JSON (default se assente)
//! 4. Verifica che ffmpeg e ffprobe siano installati
//! 5. Costruisce il Processor e lancia batch o watch
//!
//! ## Esempio di utilizzo:
//! ```bash
//! stream-summarizer --input ./videos --output ./outputs --watch --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use stream_summarizer::media::MediaTransform;
use stream_summarizer::models::{LiveInvoker, ModelOrchestrator};
use stream_summarizer::transcriber::CommandTranscriber;
use stream_summarizer::watcher::run_watch;
use stream_summarizer::{Config, ProcessingLedger, Processor};

#[derive(Parser)]
#[command(name = "stream-summarizer")]
#[command(about = "Summarize stream recordings with AI backends and fallback")]
struct Args {
    /// Configuration file (JSON); defaults are used when it does not exist
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing video files (overrides config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for generated artifacts (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upload media directly to a capable backend (overrides config)
    #[arg(long, conflicts_with = "transcribe")]
    direct: bool,

    /// Transcribe locally and summarize the text (overrides config)
    #[arg(long)]
    transcribe: bool,

    /// Keep watching the input directory for new recordings
    #[arg(short, long)]
    watch: bool,

    /// Reprocess files already recorded as done
    #[arg(long)]
    no_skip_processed: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Default config location under the platform config directory
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stream-summarizer")
        .join("config.json")
}

/// API key from the environment, else from the configured key file
fn resolve_api_key(config: &Config) -> Option<String> {
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }

    let key_file = config.api_key_file.as_ref()?;
    match std::fs::read_to_string(key_file) {
        Ok(content) => {
            let key = content.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        }
        Err(e) => {
            tracing::warn!("Could not read API key file {}: {}", key_file.display(), e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config = Config::from_file(&config_path).await?;

    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if args.direct {
        config.use_video_direct = true;
    }
    if args.transcribe {
        config.use_video_direct = false;
    }
    if args.no_skip_processed {
        config.skip_processed = false;
    }
    config.validate()?;

    if !config.input_dir.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            config.input_dir.display()
        ));
    }

    MediaTransform::check_dependencies().await?;

    let api_key = resolve_api_key(&config);
    let invoker = LiveInvoker::new(api_key);
    let orchestrator = ModelOrchestrator::new(
        config.backends.clone(),
        Box::new(invoker),
        config.media_resolution.clone(),
    );
    let transcriber = Arc::new(CommandTranscriber::new(config.transcriber.clone()));
    let ledger = ProcessingLedger::load(&config.ledger_path).await?;
    info!("Ledger has {} recorded attempt(s)", ledger.len());

    let input_dir = config.input_dir.clone();
    let extensions = config.extensions.clone();
    let watcher_config = config.watcher.clone();
    let watch = args.watch;

    let mut processor = Processor::new(config, orchestrator, transcriber, ledger);

    if watch {
        // Process the backlog first, then keep watching
        processor.run_batch().await?;
        run_watch(&input_dir, extensions, &watcher_config, &mut processor).await?;
    } else {
        let stats = processor.run_batch().await?;
        if stats.failed > 0 {
            std::process::exit(1);
        }
    }

    Ok(())
}
