use thiserror::Error;

/// Slack error codes that mean our tokens will never work.
const CREDENTIAL_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack rejected credentials: {0}")]
    InvalidAuth(String),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("slack http failure: {0}")]
    Http(String),
    #[error("unexpected slack response: {0}")]
    InvalidResponse(String),
}

impl SlackApiError {
    pub fn from_code(code: &str) -> Self {
        if CREDENTIAL_ERRORS.contains(&code) {
            SlackApiError::InvalidAuth(code.to_string())
        } else {
            SlackApiError::Api(code.to_string())
        }
    }

    pub fn is_invalid_auth(&self) -> bool {
        matches!(self, SlackApiError::InvalidAuth(_))
    }
}

impl From<reqwest::Error> for SlackApiError {
    fn from(error: reqwest::Error) -> Self {
        SlackApiError::Http(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_codes_are_classified() {
        assert!(SlackApiError::from_code("invalid_auth").is_invalid_auth());
        assert!(SlackApiError::from_code("token_revoked").is_invalid_auth());
        assert!(!SlackApiError::from_code("channel_not_found").is_invalid_auth());
    }
}
