//! HTTP access to the benchmark server.
//!
//! [`BenchmarkApi`] is what the benchmarker needs from the server; [`ApiClient`] implements
//! it over blocking `reqwest`. Every request carries the user token in the `X-API-Token`
//! header and anything but `200 OK` is a [`RemoteError::Status`].

use std::fmt;
use std::time::Duration;

use anyhow::ensure;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::problem::{MarkedLocation, Problem};
use crate::solution::Solution;
use crate::test_bench::BenchResult;

use super::error::RemoteError;

/// Production server.
pub const DEFAULT_BASE_URL: &str = "https://mapf.nl";
const TOKEN_HEADER: &str = "X-API-Token";

/// Server side identifier of an attempt (number or uuid depending on the server version).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttemptId {
    /// Numeric identifier.
    Number(u64),
    /// Textual identifier.
    Text(String),
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptId::Number(n) => write!(f, "{n}"),
            AttemptId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Agent and team counts of a progressive benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressiveConfig {
    /// Number of agents.
    pub num_agents: u32,
    /// Number of teams.
    pub num_teams: u32,
    /// Maximum difference in team sizes.
    pub max_diff: u32,
}

/// Body of an attempt creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRequest {
    /// Name of the algorithm.
    pub algorithm: String,
    /// Version of the algorithm.
    pub version: String,
    /// Debug attempts stay out of the global rankings.
    pub debug: bool,
    /// Present for progressive benchmarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progressive: Option<ProgressiveConfig>,
}

/// Server answer to an attempt creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttemptResponse {
    /// Problems to solve, in submission order.
    pub problems: Vec<Problem>,
    /// Where to submit.
    pub attempt_id: AttemptId,
    /// Recommended per-problem timeout, in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl AttemptResponse {
    /// The recommended timeout as a [`Duration`], zero meaning none.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

/// Extra metadata sent with results of a progressive benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressiveParams {
    /// Number of agents.
    pub num_agents: u32,
    /// Number of teams.
    pub num_teams: u32,
    /// Maximum difference in team sizes.
    pub max_diff: u32,
    /// Starts of the solved problem.
    pub starts: Vec<MarkedLocation>,
    /// Goals of the solved problem.
    pub goals: Vec<MarkedLocation>,
}

/// Result of one problem as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Identifier of the solved problem, when the server gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<u64>,
    /// Solving time in nanoseconds.
    pub time: u64,
    /// The answer, empty when none was found.
    pub solution: Solution,
    /// Present for progressive benchmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progressive_params: Option<ProgressiveParams>,
}

impl Submission {
    /// Build the submission of `result`.
    pub fn from_result(result: &BenchResult, progressive: Option<ProgressiveConfig>) -> Self {
        Submission {
            benchmark: result.problem.id,
            time: u64::try_from(result.elapsed.as_nanos()).unwrap_or(u64::MAX),
            solution: result.solution.clone().unwrap_or_default(),
            progressive_params: progressive.map(|config| ProgressiveParams {
                num_agents: config.num_agents,
                num_teams: config.num_teams,
                max_diff: config.max_diff,
                starts: result.problem.starts.clone(),
                goals: result.problem.goals.clone(),
            }),
        }
    }
}

/// What the benchmarker needs from the server.
pub trait BenchmarkApi {
    /// Start an attempt on `benchmark` and fetch its problems.
    fn create_attempt(
        &self,
        benchmark: u64,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, RemoteError>;

    /// Send the results of `attempt`, one submission per problem in problem order.
    fn submit(&self, attempt: &AttemptId, submissions: &[Submission]) -> Result<(), RemoteError>;

    /// Identifiers of every public benchmark.
    fn list_benchmarks(&self) -> Result<Vec<u64>, RemoteError>;
}

/// Blocking HTTP client of the benchmark server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    http: Client,
}

impl ApiClient {
    /// Client of the production server authenticated by `token`.
    ///
    /// # Errors
    /// Returned when the token is empty or the HTTP client cannot be created.
    pub fn new(token: impl Into<String>) -> anyhow::Result<ApiClient> {
        let token = token.into();
        ensure!(!token.trim().is_empty(), "no API token given");
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(RemoteError::Transport)?;
        Ok(ApiClient {
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            http,
        })
    }

    /// Talk to another server, e.g. `https://dev.mapf.nl`. A trailing `/` is ignored.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    /// The server in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

/// Read the body of a successful response, error out on any other status.
fn body_of(response: Response) -> Result<String, RemoteError> {
    let status = response.status();
    let body = response.text()?;
    if status != StatusCode::OK {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

impl BenchmarkApi for ApiClient {
    #[instrument(skip(self, request))]
    fn create_attempt(
        &self,
        benchmark: u64,
        request: &AttemptRequest,
    ) -> Result<AttemptResponse, RemoteError> {
        let response = self
            .http
            .post(self.url(&format!("api/benchmark/{benchmark}")))
            .header(TOKEN_HEADER, &self.token)
            .json(request)
            .send()?;
        let body = body_of(response)?;
        let attempt: AttemptResponse = serde_json::from_str(&body)?;
        debug!(
            attempt = %attempt.attempt_id,
            problems = attempt.problems.len(),
            timeout = ?attempt.timeout
        );
        Ok(attempt)
    }

    #[instrument(skip(self, submissions), fields(submissions = submissions.len()))]
    fn submit(&self, attempt: &AttemptId, submissions: &[Submission]) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.url(&format!("api/solutions/{attempt}")))
            .header(TOKEN_HEADER, &self.token)
            .json(submissions)
            .send()?;
        let body = body_of(response)?;
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(serde_json::Value::String(s)) if s == "OK" => Ok(()),
            _ => Err(RemoteError::Rejected(body)),
        }
    }

    #[instrument(skip(self))]
    fn list_benchmarks(&self) -> Result<Vec<u64>, RemoteError> {
        let response = self
            .http
            .get(self.url("benchmarks/list.json"))
            .header(TOKEN_HEADER, &self.token)
            .send()?;
        let body = body_of(response)?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(solution: Option<Solution>) -> BenchResult {
        BenchResult {
            problem: Problem::new(
                vec![vec![0, 0]],
                2,
                1,
                vec![MarkedLocation::new(0, 0, 0)],
                vec![MarkedLocation::new(0, 1, 0)],
            )
            .with_id(42),
            solution,
            elapsed: Duration::from_micros(1500),
        }
    }

    #[test]
    fn submission_payload() {
        let solution = Solution::from(vec![vec![(0, 0), (1, 0)]]);
        let submission = Submission::from_result(&result(Some(solution)), None);
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "benchmark": 42,
                "time": 1_500_000,
                "solution": {"paths": [{"route": [{"x": 0, "y": 0}, {"x": 1, "y": 0}]}]}
            })
        );
    }

    #[test]
    fn missing_solution_is_sent_empty() {
        let submission = Submission::from_result(&result(None), None);
        assert_eq!(submission.solution, Solution::new());
    }

    #[test]
    fn progressive_payload() {
        let config = ProgressiveConfig {
            num_agents: 1,
            num_teams: 1,
            max_diff: 0,
        };
        let submission = Submission::from_result(&result(None), Some(config));
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            value["progressive_params"],
            serde_json::json!({
                "num_agents": 1,
                "num_teams": 1,
                "max_diff": 0,
                "starts": [{"x": 0, "y": 0, "color": 0}],
                "goals": [{"x": 1, "y": 0, "color": 0}]
            })
        );
    }

    #[test]
    fn attempt_response_ids_and_timeout() {
        let json = r#"{"problems": [], "attempt_id": "3f2a", "timeout": 0}"#;
        let response: AttemptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.attempt_id, AttemptId::Text("3f2a".to_string()));
        assert_eq!(response.timeout(), None);

        let json = r#"{"problems": [], "attempt_id": 17, "timeout": 250}"#;
        let response: AttemptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.attempt_id.to_string(), "17");
        assert_eq!(response.timeout(), Some(Duration::from_millis(250)));

        let json = r#"{"problems": [], "attempt_id": 17}"#;
        let response: AttemptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.timeout(), None);
    }

    #[test]
    fn request_omits_missing_progressive() {
        let request = AttemptRequest {
            algorithm: "A*".to_string(),
            version: "1".to_string(),
            debug: true,
            progressive: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"algorithm": "A*", "version": "1", "debug": true})
        );
    }

    #[test]
    fn client_configuration() {
        assert!(ApiClient::new("  ").is_err());
        let client = ApiClient::new("token")
            .unwrap()
            .with_base_url("https://dev.mapf.nl/");
        assert_eq!(client.base_url(), "https://dev.mapf.nl");
        assert_eq!(client.url("benchmarks/list.json"), "https://dev.mapf.nl/benchmarks/list.json");
    }
}
