//! The staged answer pipeline: four sequential fetches per run.
//!
//! Each stage fetch is a suspension point; between stages the session lock
//! is free, so readers can repaint with partial results. Merges are gated
//! on the run's generation — a completion from a superseded run is
//! discarded rather than overwriting newer state.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use optdesk_shared::{
    AnswerSource, ConversationEntry, EntryStatus, Formulation, Insight, OptdeskError, Problem,
    Result, Solution, Stage, StageBundle, StagePart,
};

use crate::session::{SessionOrchestrator, SessionState, StageObserver};

/// A stage payload after ingestion-time normalization.
enum StageValue {
    Insights(Vec<Insight>),
    Formulation(Formulation),
    Code(String),
    Solution(Solution),
}

/// Outcome of attempting to merge a stage completion.
enum Merge {
    Applied(ConversationEntry),
    Stale,
}

/// Drive one pipeline run for `problem` at `generation`.
///
/// A stage failure halts the run and fills error placeholders; it is
/// surfaced through the conversation entry and the observer, not as an
/// `Err` from this function.
pub(crate) async fn run(
    session: &SessionOrchestrator,
    problem: &Problem,
    regenerate: bool,
    generation: u64,
    source: AnswerSource,
    observer: &dyn StageObserver,
) -> Result<()> {
    for stage in Stage::ALL {
        let fetched = match source {
            AnswerSource::Remote => {
                session
                    .client
                    .fetch(stage, &problem.description, regenerate)
                    .await
            }
            AnswerSource::Canned => session.canned.stage(&problem.id, stage).await,
        };

        match fetched.and_then(normalize_part) {
            Ok(value) => match apply_stage(&session.state, generation, stage, value).await {
                Merge::Applied(entry) => observer.stage_filled(stage, &entry),
                Merge::Stale => {
                    debug!(generation, %stage, "discarding stale stage completion");
                    return Ok(());
                }
            },
            Err(error) => {
                warn!(%stage, %error, "stage failed, halting run");
                if apply_failure(&session.state, generation, stage, &error).await {
                    observer.run_failed(stage, &error);
                } else {
                    debug!(generation, %stage, "discarding stale stage failure");
                }
                return Ok(());
            }
        }
    }

    // All four stages merged under this generation; report the final entry.
    let final_entry = {
        let state = session.state.lock().await;
        if state.generation != generation {
            return Ok(());
        }
        state.entries.last().cloned()
    };
    if let Some(entry) = final_entry {
        observer.run_complete(&entry);
    }

    Ok(())
}

/// Derive insight taxonomy paths at ingestion; other stages pass through.
fn normalize_part(part: StagePart) -> Result<StageValue> {
    Ok(match part {
        StagePart::Insights(raw) => StageValue::Insights(
            raw.iter()
                .map(optdesk_taxonomy::normalize)
                .collect::<Result<Vec<_>>>()?,
        ),
        StagePart::Formulation(f) => StageValue::Formulation(f),
        StagePart::Code(c) => StageValue::Code(c),
        StagePart::Solution(s) => StageValue::Solution(s),
    })
}

/// Merge one stage into the in-flight assistant entry, if the run is current.
async fn apply_stage(
    state: &Arc<Mutex<SessionState>>,
    generation: u64,
    stage: Stage,
    value: StageValue,
) -> Merge {
    let mut state = state.lock().await;

    if state.generation != generation {
        return Merge::Stale;
    }

    let Some(ConversationEntry::Assistant { bundle, status, .. }) = state.entries.last_mut()
    else {
        return Merge::Stale;
    };

    match value {
        StageValue::Insights(v) => bundle.insights = Some(v),
        StageValue::Formulation(f) => bundle.formulation = Some(f),
        StageValue::Code(c) => bundle.code = Some(c),
        StageValue::Solution(s) => bundle.solution = Some(s),
    }
    *status = EntryStatus::after(stage);

    let snapshot = state
        .entries
        .last()
        .cloned()
        .expect("assistant entry just updated");
    Merge::Applied(snapshot)
}

/// Fill error placeholders from the failed stage onward and mark the
/// entry terminal. Returns false for a stale run (nothing touched).
async fn apply_failure(
    state: &Arc<Mutex<SessionState>>,
    generation: u64,
    failed: Stage,
    error: &OptdeskError,
) -> bool {
    let mut state = state.lock().await;

    if state.generation != generation {
        return false;
    }

    let Some(ConversationEntry::Assistant { bundle, status, .. }) = state.entries.last_mut()
    else {
        return false;
    };

    fill_placeholders(bundle, failed, error);
    *status = EntryStatus::Error;
    true
}

/// Uniform placeholders: already-arrived stages keep their values, the
/// failed and later stages fill with inert content, and the solution
/// slot carries the failure message for inline display.
fn fill_placeholders(bundle: &mut StageBundle, failed: Stage, error: &OptdeskError) {
    if failed <= Stage::Insights {
        bundle.insights = Some(Vec::new());
    }
    if failed <= Stage::Formulation {
        bundle.formulation = Some(Formulation::error_placeholder());
    }
    if failed <= Stage::Code {
        bundle.code = Some(String::new());
    }
    bundle.solution = Some(Solution::error_placeholder(error.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_at_formulation_keeps_insights() {
        let mut bundle = StageBundle::pending(AnswerSource::Remote);
        bundle.insights = Some(vec![]);

        let error = OptdeskError::Status {
            url: "http://solver/api/solve/formulation".into(),
            status: 500,
        };
        fill_placeholders(&mut bundle, Stage::Formulation, &error);

        assert_eq!(bundle.formulation, Some(Formulation::error_placeholder()));
        assert_eq!(bundle.code, Some(String::new()));
        match bundle.solution {
            Some(Solution::Structured {
                ref status,
                ref details,
                ..
            }) => {
                assert_eq!(status, "Error");
                assert!(details.contains("HTTP 500"));
            }
            _ => panic!("expected structured error placeholder"),
        }
    }

    #[test]
    fn failure_at_solution_touches_only_solution() {
        let mut bundle = StageBundle::pending(AnswerSource::Remote);
        bundle.insights = Some(vec![]);
        bundle.formulation = Some(Formulation::Text("Maximize profit".into()));
        bundle.code = Some("model.optimize()".into());

        let error = OptdeskError::Transport("connection reset".into());
        fill_placeholders(&mut bundle, Stage::Solution, &error);

        assert_eq!(
            bundle.formulation,
            Some(Formulation::Text("Maximize profit".into()))
        );
        assert_eq!(bundle.code, Some("model.optimize()".into()));
        assert!(matches!(bundle.solution, Some(Solution::Structured { .. })));
    }

    #[test]
    fn failure_at_insights_fills_everything() {
        let mut bundle = StageBundle::pending(AnswerSource::Remote);

        let error = OptdeskError::Transport("dns failure".into());
        fill_placeholders(&mut bundle, Stage::Insights, &error);

        assert_eq!(bundle.insights, Some(Vec::new()));
        assert!(bundle.is_complete());
    }
}
