//! Conversation session state and the public orchestrator surface.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use optdesk_client::StageClient;
use optdesk_shared::{
    AnswerSource, ConversationEntry, OptdeskError, Problem, Result, Stage,
};

use crate::canned::CannedStore;
use crate::pipeline;

/// Progress callback for reporting stage arrivals to the display layer.
pub trait StageObserver: Send + Sync {
    /// Called after a stage merges into the in-flight assistant entry.
    fn stage_filled(&self, stage: Stage, entry: &ConversationEntry);
    /// Called once when a stage fetch fails and the run halts.
    fn run_failed(&self, stage: Stage, error: &OptdeskError);
    /// Called when all four stages have arrived.
    fn run_complete(&self, entry: &ConversationEntry);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl StageObserver for SilentObserver {
    fn stage_filled(&self, _stage: Stage, _entry: &ConversationEntry) {}
    fn run_failed(&self, _stage: Stage, _error: &OptdeskError) {}
    fn run_complete(&self, _entry: &ConversationEntry) {}
}

/// Mutable session state: the conversation and the run bookkeeping.
///
/// Mutated one stage completion at a time under the lock, so readers only
/// ever see fully formed intermediate snapshots.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) entries: Vec<ConversationEntry>,
    /// Bumped by every `submit`/`regenerate`. Stage completions carrying a
    /// stale generation are discarded instead of overwriting newer state.
    pub(crate) generation: u64,
    /// The question a `regenerate` replays; never re-read from input.
    pub(crate) last_problem: Option<Problem>,
}

/// Owns the conversation and drives one staged pipeline run per question.
pub struct SessionOrchestrator {
    pub(crate) client: StageClient,
    pub(crate) canned: CannedStore,
    pub(crate) state: Arc<Mutex<SessionState>>,
}

impl SessionOrchestrator {
    /// Create a session over a stage client and a canned store.
    pub fn new(client: StageClient, canned: CannedStore) -> Self {
        Self {
            client,
            canned,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Snapshot of the conversation sequence.
    pub async fn entries(&self) -> Vec<ConversationEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Submit a problem: append the user entry and a pending assistant
    /// entry, then drive one pipeline run to completion.
    ///
    /// A problem whose description is empty after trimming is ignored.
    #[instrument(skip_all, fields(problem_id = %problem.id))]
    pub async fn submit(&self, problem: &Problem, observer: &dyn StageObserver) -> Result<()> {
        let text = problem.description.trim();
        if text.is_empty() {
            debug!("ignoring problem with empty description");
            return Ok(());
        }

        let source = self.source_for(&problem.id);
        let generation = {
            let mut state = self.state.lock().await;
            state.entries.push(ConversationEntry::user(text));
            state
                .entries
                .push(ConversationEntry::pending_assistant(source));
            state.last_problem = Some(problem.clone());
            state.generation += 1;
            state.generation
        };

        info!(generation, ?source, "starting pipeline run");
        pipeline::run(self, problem, false, generation, source, observer).await
    }

    /// Replace the most recent answer: drop the last assistant entry,
    /// append a fresh pending one, and re-run the pipeline with the
    /// stored question and the regenerate flag set.
    #[instrument(skip_all)]
    pub async fn regenerate(&self, observer: &dyn StageObserver) -> Result<()> {
        let (problem, source, generation) = {
            let mut state = self.state.lock().await;

            let problem = state.last_problem.clone().ok_or_else(|| {
                OptdeskError::validation("nothing to regenerate — no problem has been submitted")
            })?;

            if matches!(state.entries.last(), Some(ConversationEntry::Assistant { .. })) {
                state.entries.pop();
            }

            let source = self.source_for(&problem.id);
            state
                .entries
                .push(ConversationEntry::pending_assistant(source));
            state.generation += 1;
            (problem, source, state.generation)
        };

        info!(generation, ?source, "starting regeneration run");
        pipeline::run(self, &problem, true, generation, source, observer).await
    }

    /// Canned playback for registered demo ids, the remote service otherwise.
    fn source_for(&self, problem_id: &str) -> AnswerSource {
        if self.canned.contains(problem_id) {
            AnswerSource::Canned
        } else {
            AnswerSource::Remote
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use optdesk_shared::{EntryStatus, Formulation, ServiceConfig, Solution, StageBundle};

    /// A single demo bundle keyed `demo`, so ad-hoc problems stay remote.
    const DEMO_CANNED: &str = r#"{
      "demo": {
        "insights": [{
          "category": "domain",
          "taxonomy": { "Insight Taxonomy": { "Problem Identification": ["Linear Programming"] } },
          "condition": "Linear objective",
          "explanation": "A linear program.",
          "example": "max c^T x"
        }],
        "formulation": "Maximize: 50x_1 + 60x_2",
        "code": "model.optimize()",
        "solution": { "status": "Optimal", "variables": {}, "objective": "2120", "details": "done" }
      }
    }"#;

    /// Records every observer callback for later assertions.
    #[derive(Default)]
    struct Recorder {
        snapshots: StdMutex<Vec<StageBundle>>,
        failures: StdMutex<Vec<(Stage, String)>>,
        completions: StdMutex<usize>,
    }

    impl Recorder {
        fn snapshots(&self) -> Vec<StageBundle> {
            self.snapshots.lock().unwrap().clone()
        }

        fn failures(&self) -> Vec<(Stage, String)> {
            self.failures.lock().unwrap().clone()
        }

        fn completions(&self) -> usize {
            *self.completions.lock().unwrap()
        }
    }

    impl StageObserver for Recorder {
        fn stage_filled(&self, _stage: Stage, entry: &ConversationEntry) {
            if let ConversationEntry::Assistant { bundle, .. } = entry {
                self.snapshots.lock().unwrap().push(bundle.clone());
            }
        }

        fn run_failed(&self, stage: Stage, error: &OptdeskError) {
            self.failures
                .lock()
                .unwrap()
                .push((stage, error.to_string()));
        }

        fn run_complete(&self, _entry: &ConversationEntry) {
            *self.completions.lock().unwrap() += 1;
        }
    }

    fn session_against(server: &MockServer) -> SessionOrchestrator {
        let client = StageClient::new(&ServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let canned = CannedStore::from_json(DEMO_CANNED, Duration::ZERO).unwrap();
        SessionOrchestrator::new(client, canned)
    }

    async fn mount_stage(server: &MockServer, endpoint: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_all_stages(server: &MockServer) {
        mount_stage(
            server,
            "/api/solve/insights",
            serde_json::json!({ "insights": [{
                "category": "domain",
                "taxonomy": "Problem Type",
                "condition": "Linear objective and constraints",
                "explanation": "Classic linear program.",
                "example": "max c^T x"
            }] }),
        )
        .await;
        mount_stage(
            server,
            "/api/solve/formulation",
            serde_json::json!({ "formulation": "Maximize: 50x_1 + 60x_2" }),
        )
        .await;
        mount_stage(
            server,
            "/api/solve/code",
            serde_json::json!({ "code": "model.optimize()" }),
        )
        .await;
        mount_stage(
            server,
            "/api/solve/solution",
            serde_json::json!({ "solution": {
                "status": "Optimal",
                "variables": { "x_1": "12.00" },
                "objective": "$2,120.00",
                "details": "Optimal plan found."
            } }),
        )
        .await;
    }

    #[tokio::test]
    async fn four_stages_notify_four_monotonic_snapshots() {
        let server = MockServer::start().await;
        mount_all_stages(&server).await;

        let session = session_against(&server);
        let recorder = Recorder::default();

        session
            .submit(&Problem::custom("maximize profit"), &recorder)
            .await
            .unwrap();

        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 4);
        assert_eq!(recorder.completions(), 1);

        // Each successive payload is a superset of the previous: no field
        // reverts from filled to empty, and the fill count only grows.
        for pair in snapshots.windows(2) {
            assert!(pair[1].filled_count() > pair[0].filled_count());
            assert!(pair[0].insights.is_none() || pair[1].insights.is_some());
            assert!(pair[0].formulation.is_none() || pair[1].formulation.is_some());
            assert!(pair[0].code.is_none() || pair[1].code.is_some());
        }
        assert!(snapshots[3].is_complete());

        let entries = session.entries().await;
        assert_eq!(entries.len(), 2);
        match &entries[1] {
            ConversationEntry::Assistant { bundle, status, .. } => {
                assert_eq!(*status, EntryStatus::SolutionFilled);
                assert_eq!(bundle.source, AnswerSource::Remote);
                let insights = bundle.insights.as_ref().unwrap();
                assert_eq!(insights[0].taxonomy_path, "Problem Type");
            }
            other => panic!("expected assistant entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stage_failure_halts_run_and_fills_placeholders() {
        let server = MockServer::start().await;
        mount_stage(
            &server,
            "/api/solve/insights",
            serde_json::json!({ "insights": [] }),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/api/solve/formulation"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        // Later stages must never be requested after the halt.
        Mock::given(method("POST"))
            .and(path("/api/solve/code"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let session = session_against(&server);
        let recorder = Recorder::default();

        session
            .submit(&Problem::custom("maximize profit"), &recorder)
            .await
            .unwrap();

        let failures = recorder.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, Stage::Formulation);
        assert_eq!(recorder.completions(), 0);

        let entries = session.entries().await;
        match &entries[1] {
            ConversationEntry::Assistant { bundle, status, .. } => {
                assert_eq!(*status, EntryStatus::Error);
                // Insights keeps what had already arrived.
                assert_eq!(bundle.insights, Some(Vec::new()));
                assert_eq!(bundle.formulation, Some(Formulation::error_placeholder()));
                assert_eq!(bundle.code, Some(String::new()));
                match bundle.solution.as_ref().unwrap() {
                    Solution::Structured { status, details, .. } => {
                        assert_eq!(status, "Error");
                        assert!(details.contains("HTTP 500"));
                    }
                    Solution::Text(_) => panic!("expected structured placeholder"),
                }
            }
            other => panic!("expected assistant entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_submission_is_a_no_op() {
        let server = MockServer::start().await;
        let session = session_against(&server);

        session
            .submit(&Problem::custom("   \n "), &SilentObserver)
            .await
            .unwrap();

        assert!(session.entries().await.is_empty());
    }

    #[tokio::test]
    async fn regenerate_replaces_only_the_last_assistant_entry() {
        let server = MockServer::start().await;
        mount_all_stages(&server).await;

        let session = session_against(&server);
        session
            .submit(&Problem::custom("maximize profit"), &SilentObserver)
            .await
            .unwrap();

        let before = session.entries().await;
        assert_eq!(before.len(), 2);
        let first_answer_id = before[1].id().clone();

        session.regenerate(&SilentObserver).await.unwrap();

        let after = session.entries().await;
        assert_eq!(after.len(), 2);
        // The user entry is untouched; the assistant entry is a fresh one.
        assert_eq!(after[0].id(), before[0].id());
        assert_ne!(after[1].id(), &first_answer_id);
        match &after[1] {
            ConversationEntry::Assistant { status, .. } => {
                assert_eq!(*status, EntryStatus::SolutionFilled);
            }
            other => panic!("expected assistant entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn regenerate_without_a_question_is_rejected() {
        let server = MockServer::start().await;
        let session = session_against(&server);

        let err = session.regenerate(&SilentObserver).await.unwrap_err();
        assert!(matches!(err, OptdeskError::Validation { .. }));
    }

    #[tokio::test]
    async fn canned_playback_fills_all_stages_without_the_network() {
        // Nothing listens here; a canned run must never touch it.
        let client = StageClient::new(&ServiceConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let canned = CannedStore::from_json(DEMO_CANNED, Duration::ZERO).unwrap();
        let session = SessionOrchestrator::new(client, canned);
        let recorder = Recorder::default();

        let problem = Problem {
            id: "demo".into(),
            title: "Demo".into(),
            description: "maximize profit".into(),
        };
        session.submit(&problem, &recorder).await.unwrap();

        assert_eq!(recorder.snapshots().len(), 4);
        assert_eq!(recorder.completions(), 1);

        let entries = session.entries().await;
        match &entries[1] {
            ConversationEntry::Assistant { bundle, status, .. } => {
                assert_eq!(*status, EntryStatus::SolutionFilled);
                assert_eq!(bundle.source, AnswerSource::Canned);
                let insights = bundle.insights.as_ref().unwrap();
                assert_eq!(
                    insights[0].taxonomy_path,
                    "Problem Identification > Linear Programming"
                );
            }
            other => panic!("expected assistant entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_run_completions_are_discarded() {
        let server = MockServer::start().await;

        // Slow insights keep the first run in flight while a regeneration
        // supersedes it; the remaining stages answer immediately.
        Mock::given(method("POST"))
            .and(path("/api/solve/insights"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "insights": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        mount_stage(
            &server,
            "/api/solve/formulation",
            serde_json::json!({ "formulation": "Maximize: 50x_1 + 60x_2" }),
        )
        .await;
        mount_stage(
            &server,
            "/api/solve/code",
            serde_json::json!({ "code": "model.optimize()" }),
        )
        .await;
        mount_stage(
            &server,
            "/api/solve/solution",
            serde_json::json!({ "solution": "optimal" }),
        )
        .await;

        let session = Arc::new(session_against(&server));
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        let submit_task = {
            let session = Arc::clone(&session);
            let first = Arc::clone(&first);
            tokio::spawn(async move {
                session
                    .submit(&Problem::custom("maximize profit"), first.as_ref())
                    .await
            })
        };

        // Let the first run get its insights request in flight, then
        // supersede it.
        tokio::time::sleep(Duration::from_millis(150)).await;
        session.regenerate(second.as_ref()).await.unwrap();
        submit_task.await.unwrap().unwrap();

        // Every completion of the superseded run was discarded; only the
        // regeneration filled the (single) assistant entry.
        assert!(first.snapshots().is_empty());
        assert_eq!(second.snapshots().len(), 4);

        let entries = session.entries().await;
        assert_eq!(entries.len(), 2);
        match &entries[1] {
            ConversationEntry::Assistant { status, .. } => {
                assert_eq!(*status, EntryStatus::SolutionFilled);
            }
            other => panic!("expected assistant entry, got {other:?}"),
        }
    }
}
