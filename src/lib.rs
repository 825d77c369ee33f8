//! # Stream Summarizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `strategy`: Selezione della strategia in base alla durata
//! - `media`: Probe ffprobe e trasformazioni ffmpeg
//! - `models`: Orchestratore dei backend di riassunto e relativi client
//! - `summary`: Parsing e validazione del formato duale
//! - `transcriber`: Trascrizione locale tramite comando esterno
//! - `format`: Timeline e formattazione dei timestamp
//! - `output`: Persistenza degli artefatti di output
//! - `state`: Registro dei file già elaborati
//! - `processor`: Pipeline per asset e giro batch
//! - `file_manager`: Discovery dei file media
//! - `progress`: Progress tracking e statistiche
//! - `watcher`: Sorveglianza della directory di input
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use stream_summarizer::{Config, StrategySelector};
//!
//! let config = Config::default();
//! let selector = StrategySelector::new(config.token_limit);
//! let decision = selector.select(55.0 * 60.0, 2_000_000_000);
//! assert!(decision.is_selected());
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod format;
pub mod media;
pub mod models;
pub mod output;
pub mod processor;
pub mod progress;
pub mod state;
pub mod strategy;
pub mod summary;
pub mod transcriber;
pub mod watcher;

pub use config::{BackendDescriptor, BackendKind, Config};
pub use error::SummarizeError;
pub use models::{LiveInvoker, ModelOrchestrator};
pub use processor::Processor;
pub use state::ProcessingLedger;
pub use strategy::{ProcessingStrategy, StrategyDecision, StrategySelector};
