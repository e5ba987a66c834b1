use super::status::IllegalTransition;

/// Failure talking to the benchmark server.
///
/// The benchmarker skips the benchmark on any of these and goes on with the next one.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The server answered with a status other than `200 OK`.
    #[error("server answered {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The request could not be sent or its answer not read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The answer is not the expected json.
    #[error("unexpected server answer: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server did not accept the submitted results.
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// The attempt lifecycle was not followed.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}
