//! Shared types, error model, configuration, and collaborator contracts for
//! the paper curator.
//!
//! This crate is the foundation depended on by all other curator crates.
//! It provides:
//! - [`CuratorError`]: the unified error type
//! - Domain types ([`Topic`], [`Paper`], [`DayGroup`], [`FetchStatus`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - Collaborator traits ([`SearchService`], [`ExtractionService`], [`CuratorStore`])

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeminiConfig, PipelineConfig, PipelineSection, StorageConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key,
};
pub use error::{CuratorError, Result};
pub use services::{CuratorStore, ExtractionService, SearchService};
pub use types::{DayGroup, FetchStatus, Paper, PipelineState, Topic, TopicDraft, TopicId};
