//! Session credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session token issued by the token endpoint (or supplied pre-fetched).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

impl Token {
    /// Parses a token JSON blob such as the one returned by the token endpoint.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty()
            && !self.kind.is_empty()
            && !self.session_id.is_empty()
            && self.expiration_time.is_none_or(|expiry| expiry > now)
    }

    /// Value of the `Authorization` header used to open the session socket.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.kind, self.token)
    }
}

/// Body of the token generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub api_key: String,
    pub resource_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Token {
        Token {
            token: "tok".into(),
            kind: "Bearer".into(),
            session_id: "sess-1".into(),
            expiration_time: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_token_validity() {
        let token = sample();
        let before = Utc.with_ymd_and_hms(2029, 12, 31, 0, 0, 0).unwrap();
        assert!(token.is_valid_at(before));
        assert!(!token.is_valid_at(before + Duration::days(2)));

        let mut missing_session = sample();
        missing_session.session_id.clear();
        assert!(!missing_session.is_valid_at(before));

        assert!(!Token::default().is_valid());
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        let mut token = sample();
        token.expiration_time = None;
        assert!(token.is_valid());
    }

    #[test]
    fn test_token_from_json() {
        let token = Token::from_json(
            r#"{"token":"abc","type":"Bearer","sessionId":"s","expirationTime":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(token.kind, "Bearer");
        assert_eq!(token.session_id, "s");
        assert_eq!(token.authorization(), "Bearer abc");
    }

    #[test]
    fn test_access_token_request_serialization() {
        let req = AccessTokenRequest {
            api_key: "key".into(),
            resource_id: "workspaces/demo".into(),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"api_key":"key","resource_id":"workspaces/demo"}"#
        );
    }
}
