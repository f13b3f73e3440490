use thiserror::Error;

const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "no_permission",
];

#[derive(Debug, Error)]
/// Errors surfaced by [`crate::SlackApiClient`].
pub enum SlackApiError {
    #[error("slack {method} returned error `{code}`")]
    Api { method: String, code: String },
    #[error("slack {method} was rate limited after {attempts} attempt(s)")]
    RateLimited { method: String, attempts: usize },
    #[error("slack {method} failed with status {status}: {body}")]
    HttpStatus {
        method: String,
        status: u16,
        body: String,
    },
    #[error("slack {method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode slack {method} response: {message}")]
    Decode { method: String, message: String },
    #[error("slack {method} response missing `{field}`")]
    MissingField { method: String, field: &'static str },
    #[error("invalid slack request: {0}")]
    InvalidRequest(String),
}

impl SlackApiError {
    /// Slack error code from an `ok: false` response, if that is what failed.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Api { code, .. } => AUTH_ERROR_CODES.contains(&code.as_str()),
            Self::HttpStatus { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SlackApiError;

    #[test]
    fn unit_auth_failure_classification_uses_slack_codes() {
        let error = SlackApiError::Api {
            method: "auth.test".to_string(),
            code: "invalid_auth".to_string(),
        };
        assert!(error.is_auth_failure());
        assert_eq!(error.code(), Some("invalid_auth"));

        let other = SlackApiError::Api {
            method: "conversations.history".to_string(),
            code: "not_in_channel".to_string(),
        };
        assert!(!other.is_auth_failure());
    }
}
