//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei video e le operazioni sui file.
//!
//! ## Responsabilità:
//! - Discovery dei video nella directory di input (ricorsiva opzionale)
//! - Filtraggio per estensione configurata
//! - Informazioni sui file (dimensione)
//! - Formattazione human-readable delle dimensioni

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// File size in bytes
    pub async fn get_file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Find all video files under the input directory, sorted by path so
    /// batch order is deterministic.
    pub fn find_video_files(
        input_dir: &Path,
        extensions: &[String],
        recursive: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let max_depth = if recursive { usize::MAX } else { 1 };

        for entry in WalkDir::new(input_dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if Self::matches_extension(path, extensions) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Check the file extension against the configured list (case-insensitive)
    pub fn matches_extension(path: &Path, extensions: &[String]) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext_lower))
            }
            None => false,
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
