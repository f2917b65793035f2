//! HTTP client for the remote solver service.
//!
//! One POST per artifact stage (`/api/solve/{insights,formulation,code,solution}`),
//! plus the single-shot legacy endpoint, the problem catalog, and the
//! liveness probe. Transport failures, non-success statuses, and malformed
//! bodies each map to their own error variant; the orchestrator treats them
//! uniformly.

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};
use url::Url;

use optdesk_shared::{
    Formulation, OptdeskError, Problem, RawInsight, Result, ServiceConfig, Solution, Stage,
    StagePart,
};

/// User-Agent string for solver requests.
const USER_AGENT: &str = concat!("OptDesk/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Request body shared by all solve endpoints.
#[derive(Debug, Clone, Serialize)]
struct SolveRequest<'a> {
    problem: &'a str,
    regenerate: bool,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    insights: Vec<RawInsight>,
}

#[derive(Debug, Deserialize)]
struct FormulationResponse {
    formulation: Formulation,
}

#[derive(Debug, Deserialize)]
struct CodeResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct SolutionResponse {
    solution: Solution,
}

/// All four artifacts at once, from the single-shot legacy endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveBundle {
    pub insights: Vec<RawInsight>,
    pub formulation: Formulation,
    pub code: String,
    pub solution: Solution,
}

/// Liveness probe response.
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// StageClient
// ---------------------------------------------------------------------------

/// Client for the remote solver service.
pub struct StageClient {
    client: Client,
    base_url: Url,
}

impl StageClient {
    /// Build a client against the configured service address.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            OptdeskError::config(format!("invalid service base URL '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| OptdeskError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Fetch one artifact stage for the given problem text.
    #[instrument(skip(self, problem), fields(stage = %stage))]
    pub async fn fetch(&self, stage: Stage, problem: &str, regenerate: bool) -> Result<StagePart> {
        let body = SolveRequest {
            problem,
            regenerate,
        };

        let part = match stage {
            Stage::Insights => {
                let resp: InsightsResponse = self.post_json(stage.endpoint(), &body).await?;
                StagePart::Insights(resp.insights)
            }
            Stage::Formulation => {
                let resp: FormulationResponse = self.post_json(stage.endpoint(), &body).await?;
                StagePart::Formulation(resp.formulation)
            }
            Stage::Code => {
                let resp: CodeResponse = self.post_json(stage.endpoint(), &body).await?;
                StagePart::Code(resp.code)
            }
            Stage::Solution => {
                let resp: SolutionResponse = self.post_json(stage.endpoint(), &body).await?;
                StagePart::Solution(resp.solution)
            }
        };

        debug!(%stage, "stage fetched");
        Ok(part)
    }

    /// Fetch all four artifacts at once via the legacy single-shot endpoint.
    ///
    /// No progressive reveal; used by the `once` command.
    #[instrument(skip(self, problem))]
    pub async fn solve_once(&self, problem: &str) -> Result<SolveBundle> {
        let body = SolveRequest {
            problem,
            regenerate: false,
        };
        self.post_json("api/solve", &body).await
    }

    /// Fetch the problem catalog.
    pub async fn problems(&self) -> Result<Vec<Problem>> {
        self.get_json("api/problems").await
    }

    /// Probe service liveness.
    pub async fn health(&self) -> Result<Health> {
        self.get_json("api/health").await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| OptdeskError::config(format!("invalid endpoint path '{path}': {e}")))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &SolveRequest<'_>,
    ) -> Result<T> {
        let url = self.endpoint(path)?;

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| OptdeskError::Transport(format!("{url}: {e}")))?;

        decode_response(url, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OptdeskError::Transport(format!("{url}: {e}")))?;

        decode_response(url, response).await
    }
}

/// Map status and body decoding uniformly for all endpoints.
async fn decode_response<T: DeserializeOwned>(url: Url, response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        return Err(OptdeskError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| OptdeskError::decode(format!("{url}: {e}")))
}
