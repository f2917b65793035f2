//! Shared types, error model, and configuration for OptDesk.
//!
//! This crate is the foundation depended on by all other OptDesk crates.
//! It provides:
//! - [`OptdeskError`] — the unified error type
//! - Domain types ([`Problem`], [`StageBundle`], [`ConversationEntry`], [`Stage`])
//! - Configuration ([`AppConfig`], [`ServiceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CannedSection, ServiceConfig, ServiceSection, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_service,
};
pub use error::{OptdeskError, Result};
pub use types::{
    AnswerSource, CUSTOM_PROBLEM_ID, ConversationEntry, EntryId, EntryStatus, Formulation,
    Insight, Problem, RawInsight, Solution, Stage, StageBundle, StagePart,
};
