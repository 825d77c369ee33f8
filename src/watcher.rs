//! # Directory Watch Module
//!
//! Questo modulo sorveglia la directory di input e lancia un giro batch
//! quando compare una nuova registrazione.
//!
//! ## Responsabilità:
//! - Eventi filesystem debounced (500ms) filtrati per estensione
//! - Attesa di stabilità: un file ancora in scrittura (dimensione che
//!   cambia) viene ricontrollato finché non smette di crescere
//! - Cooldown dopo ogni giro per assorbire raffiche di eventi
//! - Un solo giro alla volta: il loop è sequenziale per costruzione

use crate::config::WatcherConfig;
use crate::file_manager::FileManager;
use crate::processor::Processor;
use anyhow::{Context, Result};
use notify_debouncer_mini::new_debouncer;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Forwards debounced filesystem events for matching media files
pub struct FileWatcher {
    // Dropping the sender stops the forwarding thread
    _stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FileWatcher {
    /// Watch `input_dir` (non-recursive) and send the paths of created or
    /// modified files with a matching extension through `event_tx`.
    pub fn start(
        input_dir: &Path,
        extensions: Vec<String>,
        event_tx: mpsc::UnboundedSender<PathBuf>,
    ) -> Result<Self> {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(500), tx)
            .context("creating file watcher")?;

        debouncer
            .watcher()
            .watch(input_dir, notify::RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {}", input_dir.display()))?;

        std::thread::spawn(move || {
            let _debouncer = debouncer;

            loop {
                if stop_rx.try_recv().is_ok() {
                    debug!("File watcher stopped by signal");
                    break;
                }

                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(Ok(events)) => {
                        for event in events {
                            let path = event.path;
                            if !path.exists() {
                                continue;
                            }
                            if !FileManager::matches_extension(&path, &extensions) {
                                continue;
                            }
                            if event_tx.send(path).is_err() {
                                debug!("Watch event channel closed, stopping");
                                return;
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        warn!("File watcher error: {}", error);
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                        debug!("File watcher channel disconnected, stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _stop_tx: Some(stop_tx),
        })
    }

    pub fn stop(&mut self) {
        self._stop_tx.take();
    }
}

/// Wait until the file stops growing. Returns false when the file
/// disappears before settling.
pub async fn wait_until_stable(path: &Path, stable_window: Duration, retry_delay: Duration) -> bool {
    loop {
        let before = match FileManager::get_file_size(path).await {
            Ok(size) => size,
            Err(_) => return false,
        };

        tokio::time::sleep(stable_window).await;

        let after = match FileManager::get_file_size(path).await {
            Ok(size) => size,
            Err(_) => return false,
        };

        if before == after {
            return true;
        }

        info!(
            "{} still growing ({} -> {} bytes), retrying",
            path.display(),
            before,
            after
        );
        tokio::time::sleep(retry_delay).await;
    }
}

/// Watch the input directory forever, running a batch pass for each new
/// stable recording. The batch itself skips already processed files, so a
/// redundant trigger is cheap.
pub async fn run_watch(
    input_dir: &Path,
    extensions: Vec<String>,
    watcher_config: &WatcherConfig,
    processor: &mut Processor,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let _watcher = FileWatcher::start(input_dir, extensions, event_tx)?;

    eprintln!("👀 Watching {} (Ctrl+C to stop)", input_dir.display());

    let stable_window = Duration::from_secs(watcher_config.stable_window_secs);
    let retry_delay = Duration::from_secs(watcher_config.retry_delay_secs);
    let cooldown = Duration::from_secs(watcher_config.cooldown_secs);

    while let Some(path) = event_rx.recv().await {
        info!("New activity on {}", path.display());

        if !wait_until_stable(&path, stable_window, retry_delay).await {
            warn!("{} vanished before settling, skipping", path.display());
            continue;
        }

        eprintln!("🆕 {} is stable, starting batch pass", path.display());
        if let Err(e) = processor.run_batch().await {
            warn!("Batch pass failed: {:#}", e);
        }

        tokio::time::sleep(cooldown).await;

        // Drain events that accumulated while processing; the next batch
        // pass would rediscover those files anyway
        while event_rx.try_recv().is_ok() {}
    }

    Ok(())
}
