//! Protocol-level error objects returned by the server (and synthesised locally).

use serde::{Deserialize, Serialize};

/// Classification of an error reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ClientError,
    SessionTokenExpired,
    SessionTokenInvalid,
    SessionResourcesExhausted,
    BillingTokensExhausted,
    AccountDisabled,
    SessionInvalid,
    ResourceNotFound,
    SafetyViolation,
    SessionExpired,
    AudioSessionExpired,
    SessionPaused,
    #[default]
    #[serde(other)]
    Undefined,
}

/// What the server wants the client to do about an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconnectionType {
    NoRetry,
    Immediate,
    Timeout,
    #[default]
    #[serde(other)]
    Undefined,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default)]
    pub error_type: ErrorType,
    #[serde(default)]
    pub reconnect_type: ReconnectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_time: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
}

/// An error carried in the `error` field of a server frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct InworldError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl InworldError {
    /// A locally raised error: code -1, client error, no reconnect directive.
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            message: message.into(),
            details: vec![ErrorDetail {
                error_type: ErrorType::ClientError,
                reconnect_type: ReconnectionType::Undefined,
                reconnect_time: None,
                max_retries: 0,
            }],
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.message.is_empty()
    }

    pub fn retry_type(&self) -> ReconnectionType {
        self.details
            .first()
            .map(|d| d.reconnect_type)
            .unwrap_or_default()
    }

    pub fn error_type(&self) -> ErrorType {
        self.details.first().map(|d| d.error_type).unwrap_or_default()
    }

    /// The server forbids automatic retries for this error.
    pub fn is_terminal(&self) -> bool {
        self.retry_type() == ReconnectionType::NoRetry
    }

    /// The session token was rejected and must be fetched again.
    pub fn invalidates_token(&self) -> bool {
        matches!(
            self.error_type(),
            ErrorType::SessionTokenExpired | ErrorType::SessionTokenInvalid
        )
    }
}
