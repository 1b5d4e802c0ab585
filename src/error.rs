use thiserror::Error;

/// The two ways a prediction can fail.
///
/// `InvalidInput` is the caller's problem and is fixed by changing the
/// request. `ModelUnavailable` is the operator's problem: an artifact is
/// missing or broken and nothing will be served until it is redeployed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl PredictError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidInput(detail.into())
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::ModelUnavailable(detail.into())
    }

    /// Collapse an anyhow chain (artifact loading) into a single
    /// operator-facing message.
    pub fn from_load(err: &anyhow::Error) -> Self {
        Self::ModelUnavailable(format!("{err:#}"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    Malformed {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{var} is out of range: {detail}")]
    OutOfRange { var: &'static str, detail: String },
}

/// Failures of the outbound collaborators (text generation, places, email).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("email delivery failed: {0}")]
    Email(String),
}
