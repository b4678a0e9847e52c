use reqwest::StatusCode;

/// Failure of a call to the account API. The store never translates these;
/// they reach the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to account API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("account API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid account API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid account API url: {0}")]
    Url(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status(),
            _ => None,
        }
    }
}
