//! Shared types, error model, and configuration for reportcast.
//!
//! This crate is the foundation depended on by all other reportcast crates.
//! It provides:
//! - [`ReportcastError`] — the unified error type
//! - Domain types ([`ReportDocument`], [`Section`], [`Chunk`], [`RunId`])
//! - Date windows ([`ReportingWindow`], [`resolve_window`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;
pub mod window;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, KbCredentials, KnowledgeBaseConfig, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_kb_credentials,
};
pub use error::{ReportcastError, Result};
pub use types::{
    Chunk, PublishOutcome, ReportDocument, RunId, SECTION_HEADING_DEPTH, Section, SourceResult,
    SourceStatus, TextSection,
};
pub use window::{DEFAULT_WINDOW_DAYS, ReportingWindow, resolve_window};
