//! Deterministic canned-answer playback for the demo problems.
//!
//! When the remote solver is unavailable (fairs, offline demos), fixed
//! catalog problems play back pre-recorded stage bundles instead. Stages
//! are revealed on a fixed per-stage delay to keep the progressive-arrival
//! feel of the real service.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use optdesk_shared::{
    Formulation, OptdeskError, RawInsight, Result, Solution, Stage, StagePart,
};

const CANNED_ANSWERS: &str = include_str!("../data/canned_answers.json");

/// One pre-recorded answer: all four stages for a fixed problem.
#[derive(Debug, Clone, Deserialize)]
pub struct CannedBundle {
    pub insights: Vec<RawInsight>,
    pub formulation: Formulation,
    pub code: String,
    pub solution: Solution,
}

/// Keyed store of canned bundles with a configurable reveal delay.
#[derive(Debug)]
pub struct CannedStore {
    bundles: HashMap<String, CannedBundle>,
    stage_delay: Duration,
}

impl CannedStore {
    /// Load the bundles shipped with the crate.
    pub fn bundled(stage_delay: Duration) -> Result<Self> {
        Self::from_json(CANNED_ANSWERS, stage_delay)
    }

    /// Load bundles from a JSON object keyed by problem id.
    pub fn from_json(json: &str, stage_delay: Duration) -> Result<Self> {
        let bundles: HashMap<String, CannedBundle> = serde_json::from_str(json)
            .map_err(|e| OptdeskError::decode(format!("canned answers: {e}")))?;

        if bundles.is_empty() {
            return Err(OptdeskError::validation("canned answer store is empty"));
        }

        Ok(Self {
            bundles,
            stage_delay,
        })
    }

    /// True if a bundle is registered for the given problem id.
    pub fn contains(&self, problem_id: &str) -> bool {
        self.bundles.contains_key(problem_id)
    }

    /// Registered problem ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.bundles.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Play back one stage: wait the reveal delay, then return the recorded part.
    ///
    /// The id is resolved before sleeping so an unregistered problem fails
    /// immediately with a data error.
    pub(crate) async fn stage(&self, problem_id: &str, stage: Stage) -> Result<StagePart> {
        let bundle = self.bundles.get(problem_id).ok_or_else(|| OptdeskError::Data {
            id: problem_id.to_string(),
        })?;

        tokio::time::sleep(self.stage_delay).await;
        debug!(%stage, problem_id, "revealing canned stage");

        Ok(match stage {
            Stage::Insights => StagePart::Insights(bundle.insights.clone()),
            Stage::Formulation => StagePart::Formulation(bundle.formulation.clone()),
            Stage::Code => StagePart::Code(bundle.code.clone()),
            Stage::Solution => StagePart::Solution(bundle.solution.clone()),
        })
    }
}
