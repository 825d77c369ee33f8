//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `SummarizeError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `FFmpeg`: Errori di elaborazione media con FFmpeg/ffprobe
//! - `Backend`: Errori di invocazione dei backend di riassunto
//! - `Transcription`: Errori del collaboratore di trascrizione
//! - `MissingDependency`: Tool esterno mancante (ffmpeg, ffprobe)

/// Custom error types for the summarization pipeline
#[derive(thiserror::Error, Debug)]
pub enum SummarizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),
}
