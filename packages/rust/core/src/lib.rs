//! Core session orchestration for OptDesk.
//!
//! This crate ties the stage client, the taxonomy normalizer, and the
//! canned-answer store into the staged answer pipeline: one run per
//! submitted problem, four strictly ordered stages, progressive merge
//! with observer notifications, uniform error fallback, and
//! generation-checked regeneration.

pub mod canned;
mod pipeline;
pub mod session;

pub use canned::{CannedBundle, CannedStore};
pub use session::{SessionOrchestrator, SilentObserver, StageObserver};
