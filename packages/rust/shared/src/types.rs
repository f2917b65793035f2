//! Core domain types for OptDesk conversations and answer stages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Problem id used for ad-hoc, user-typed problems.
pub const CUSTOM_PROBLEM_ID: &str = "custom";

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for conversation entry identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Uuid);

impl EntryId {
    /// Generate a new time-sortable entry identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Problem
// ---------------------------------------------------------------------------

/// An optimization problem, either from the remote catalog or typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Catalog slug, or [`CUSTOM_PROBLEM_ID`] for ad-hoc problems.
    pub id: String,
    /// Short display title.
    pub title: String,
    /// Full problem statement sent to the solver service.
    pub description: String,
}

impl Problem {
    /// Wrap free-form user text as an ad-hoc problem.
    pub fn custom(text: impl Into<String>) -> Self {
        Self {
            id: CUSTOM_PROBLEM_ID.to_string(),
            title: "Custom problem".to_string(),
            description: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One of the four sequential artifacts produced for a problem.
///
/// The ordering of the variants is the reveal order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Insights,
    Formulation,
    Code,
    Solution,
}

impl Stage {
    /// All stages in reveal order.
    pub const ALL: [Stage; 4] = [
        Stage::Insights,
        Stage::Formulation,
        Stage::Code,
        Stage::Solution,
    ];

    /// Path segment of the per-stage solve endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Stage::Insights => "api/solve/insights",
            Stage::Formulation => "api/solve/formulation",
            Stage::Code => "api/solve/code",
            Stage::Solution => "api/solve/solution",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Insights => "insights",
            Stage::Formulation => "formulation",
            Stage::Code => "code",
            Stage::Solution => "solution",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

/// A modeling insight as it appears on the wire.
///
/// `taxonomy` is polymorphic: a plain breadcrumb string, or a nested
/// category mapping that must be flattened at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInsight {
    pub category: String,
    pub taxonomy: serde_json::Value,
    pub condition: String,
    pub explanation: String,
    pub example: String,
}

/// A normalized modeling insight.
///
/// `taxonomy_path` is derived exactly once from the raw record; the raw
/// mapping is never consulted again after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub category: String,
    pub taxonomy_path: String,
    pub condition: String,
    pub explanation: String,
    pub example: String,
}

// ---------------------------------------------------------------------------
// Formulation / Solution
// ---------------------------------------------------------------------------

/// A mathematical formulation: free text or a structured objective record.
///
/// The wire shape is polymorphic (string or object); `untagged` resolves
/// it into an explicit variant at decode time so render code never type-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Formulation {
    Structured {
        objective: String,
        constraints: Vec<String>,
        variables: String,
    },
    Text(String),
}

impl Formulation {
    /// Placeholder written into halted pipeline runs.
    pub fn error_placeholder() -> Self {
        Formulation::Text("Error".to_string())
    }
}

/// A numeric solution: free text or a structured solver report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Solution {
    Structured {
        status: String,
        #[serde(default)]
        variables: BTreeMap<String, String>,
        objective: String,
        details: String,
    },
    Text(String),
}

impl Solution {
    /// Placeholder written into halted pipeline runs, carrying the failure message.
    pub fn error_placeholder(details: impl Into<String>) -> Self {
        Solution::Structured {
            status: "Error".to_string(),
            variables: BTreeMap::new(),
            objective: String::new(),
            details: details.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StageBundle
// ---------------------------------------------------------------------------

/// Where an assistant entry's stages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Remote,
    Canned,
}

/// The cumulative answer for one assistant entry.
///
/// Every field starts `None` ("not yet arrived" — never "empty") and is
/// filled in strict order insights → formulation → code → solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageBundle {
    pub insights: Option<Vec<Insight>>,
    pub formulation: Option<Formulation>,
    pub code: Option<String>,
    pub solution: Option<Solution>,
    pub source: AnswerSource,
}

impl StageBundle {
    /// An empty bundle awaiting its first stage.
    pub fn pending(source: AnswerSource) -> Self {
        Self {
            insights: None,
            formulation: None,
            code: None,
            solution: None,
            source,
        }
    }

    /// True once all four stages have arrived.
    pub fn is_complete(&self) -> bool {
        self.insights.is_some()
            && self.formulation.is_some()
            && self.code.is_some()
            && self.solution.is_some()
    }

    /// Number of stage fields currently filled.
    pub fn filled_count(&self) -> usize {
        [
            self.insights.is_some(),
            self.formulation.is_some(),
            self.code.is_some(),
            self.solution.is_some(),
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }
}

/// The payload produced by one stage fetch, remote or canned.
#[derive(Debug, Clone)]
pub enum StagePart {
    Insights(Vec<RawInsight>),
    Formulation(Formulation),
    Code(String),
    Solution(Solution),
}

impl StagePart {
    /// The stage this payload fills.
    pub fn stage(&self) -> Stage {
        match self {
            StagePart::Insights(_) => Stage::Insights,
            StagePart::Formulation(_) => Stage::Formulation,
            StagePart::Code(_) => Stage::Code,
            StagePart::Solution(_) => Stage::Solution,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationEntry
// ---------------------------------------------------------------------------

/// Lifecycle of an assistant entry as its stages fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    InsightsFilled,
    FormulationFilled,
    CodeFilled,
    SolutionFilled,
    Error,
}

impl EntryStatus {
    /// Status reached after the given stage arrives.
    pub fn after(stage: Stage) -> Self {
        match stage {
            Stage::Insights => EntryStatus::InsightsFilled,
            Stage::Formulation => EntryStatus::FormulationFilled,
            Stage::Code => EntryStatus::CodeFilled,
            Stage::Solution => EntryStatus::SolutionFilled,
        }
    }

    /// True for the two end states of the per-entry state machine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::SolutionFilled | EntryStatus::Error)
    }
}

/// One element of the conversation: a user question or an assistant answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationEntry {
    User {
        id: EntryId,
        text: String,
        asked_at: DateTime<Utc>,
    },
    Assistant {
        id: EntryId,
        bundle: StageBundle,
        status: EntryStatus,
    },
}

impl ConversationEntry {
    /// A user entry stamped now.
    pub fn user(text: impl Into<String>) -> Self {
        ConversationEntry::User {
            id: EntryId::new(),
            text: text.into(),
            asked_at: Utc::now(),
        }
    }

    /// A pending assistant entry with all stage fields empty.
    pub fn pending_assistant(source: AnswerSource) -> Self {
        ConversationEntry::Assistant {
            id: EntryId::new(),
            bundle: StageBundle::pending(source),
            status: EntryStatus::Pending,
        }
    }

    pub fn id(&self) -> &EntryId {
        match self {
            ConversationEntry::User { id, .. } | ConversationEntry::Assistant { id, .. } => id,
        }
    }
}
