//! # Processing Ledger Module
//!
//! Questo modulo gestisce il registro idempotente dei video elaborati.
//!
//! ## Responsabilità:
//! - Traccia quali video sono già stati elaborati e con quale esito
//! - Persiste il registro in un file JSON riscritto integralmente dopo
//!   ogni singolo tentativo (nessun batching): un crash perde al più il
//!   risultato dell'elemento in corso
//! - Chiavi = path assoluti canonicalizzati
//!
//! ## Semantica di idempotenza:
//! - Una entry con `success=true` non viene mai rielaborata finché il
//!   registro è rispettato
//! - Le entry con `success=false` restano eleggibili per retry quando il
//!   filtro `skip_processed` è disattivato o il registro viene azzerato
//!
//! ## Esempio struttura file:
//! ```json
//! {
//!   "videos": {
//!     "/abs/path/video.mp4": {
//!       "processed_at": "2026-08-29T12:00:00",
//!       "success": true
//!     }
//!   },
//!   "created_at": "2026-08-01T09:00:00"
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Outcome of one processing attempt
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerEntry {
    pub processed_at: String,
    pub success: bool,
}

/// Persisted ledger document
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerFile {
    pub videos: HashMap<String, LedgerEntry>,
    pub created_at: String,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            videos: HashMap::new(),
            created_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// Manages the idempotent processing record
pub struct ProcessingLedger {
    ledger_path: PathBuf,
    ledger: LedgerFile,
}

impl ProcessingLedger {
    /// Fresh in-memory ledger bound to a path not yet read
    pub fn new(ledger_path: PathBuf) -> Self {
        Self {
            ledger_path,
            ledger: LedgerFile::default(),
        }
    }

    /// Load the ledger, tolerating a missing or corrupt file
    pub async fn load(ledger_path: &Path) -> Result<Self> {
        let ledger = if ledger_path.exists() {
            let content = fs::read_to_string(ledger_path).await?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(
                    "Ledger file {} is corrupt, starting fresh: {}",
                    ledger_path.display(),
                    e
                );
                LedgerFile::default()
            })
        } else {
            LedgerFile::default()
        };

        Ok(Self {
            ledger_path: ledger_path.to_path_buf(),
            ledger,
        })
    }

    fn key_for(path: &Path) -> String {
        path.canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string()
    }

    /// True only for entries recorded as successful
    pub fn is_processed(&self, path: &Path) -> bool {
        self.ledger
            .videos
            .get(&Self::key_for(path))
            .map(|entry| entry.success)
            .unwrap_or(false)
    }

    /// True for any recorded attempt, failed ones included. The skip
    /// policy uses this so a permanently failing video is not retried on
    /// every pass; clearing the ledger makes it eligible again.
    pub fn has_attempt(&self, path: &Path) -> bool {
        self.ledger.videos.contains_key(&Self::key_for(path))
    }

    /// Record one attempt and synchronously rewrite the whole file.
    /// A repeated path overwrites its previous entry.
    pub async fn record_attempt(&mut self, path: &Path, success: bool) -> Result<()> {
        self.ledger.videos.insert(
            Self::key_for(path),
            LedgerEntry {
                processed_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                success,
            },
        );
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.ledger)?;
        fs::write(&self.ledger_path, content).await?;
        Ok(())
    }

    /// Recorded attempts (any outcome)
    pub fn len(&self) -> usize {
        self.ledger.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.videos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_success_marks_processed() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"x").unwrap();

        let ledger_path = dir.path().join("processed.json");
        let mut ledger = ProcessingLedger::load(&ledger_path).await.unwrap();

        assert!(!ledger.is_processed(&video));
        ledger.record_attempt(&video, true).await.unwrap();
        assert!(ledger.is_processed(&video));
        assert!(ledger_path.exists());
    }

    #[tokio::test]
    async fn test_failure_is_not_processed() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"x").unwrap();

        let mut ledger = ProcessingLedger::load(&dir.path().join("processed.json"))
            .await
            .unwrap();
        ledger.record_attempt(&video, false).await.unwrap();
        assert!(!ledger.is_processed(&video));
    }

    #[tokio::test]
    async fn test_failed_attempt_still_counts_as_attempted() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"x").unwrap();

        let mut ledger = ProcessingLedger::load(&dir.path().join("processed.json"))
            .await
            .unwrap();
        assert!(!ledger.has_attempt(&video));

        ledger.record_attempt(&video, false).await.unwrap();
        assert!(ledger.has_attempt(&video));
        assert!(!ledger.is_processed(&video));
    }

    #[tokio::test]
    async fn test_repeat_attempt_overwrites() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"x").unwrap();

        let mut ledger = ProcessingLedger::load(&dir.path().join("processed.json"))
            .await
            .unwrap();
        ledger.record_attempt(&video, false).await.unwrap();
        ledger.record_attempt(&video, true).await.unwrap();

        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_processed(&video));
    }

    #[tokio::test]
    async fn test_survives_reload() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"x").unwrap();
        let ledger_path = dir.path().join("processed.json");

        {
            let mut ledger = ProcessingLedger::load(&ledger_path).await.unwrap();
            ledger.record_attempt(&video, true).await.unwrap();
        }

        let reloaded = ProcessingLedger::load(&ledger_path).await.unwrap();
        assert!(reloaded.is_processed(&video));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("processed.json");
        std::fs::write(&ledger_path, b"{not json").unwrap();

        let ledger = ProcessingLedger::load(&ledger_path).await.unwrap();
        assert!(ledger.is_empty());
    }
}
