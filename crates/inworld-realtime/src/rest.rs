//! REST collaborators: session history and interaction feedback.

use crate::{config::ServerConfig, error::ClientError};
use async_trait::async_trait;
use inworld_realtime_types::{Feedback, FeedbackData, SessionState, Token};
use reqwest::RequestBuilder;
use tracing::debug;

/// Resource name feedback is attached to.
pub fn callback_reference(
    session_full_name: &str,
    interaction_id: &str,
    correlation_id: &str,
) -> String {
    format!(
        "{}/interactions/{}/groups/{}",
        session_full_name, interaction_id, correlation_id
    )
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Fetches the opaque saved state of a session.
    async fn fetch_history(&self, session_full_name: String, token: Token)
    -> Result<String, ClientError>;

    /// Creates feedback (`update == false`) or replaces earlier feedback.
    async fn send_feedback(
        &self,
        callback_ref: String,
        token: Token,
        feedback: Feedback,
        update: bool,
    ) -> Result<FeedbackData, ClientError>;
}

pub struct HttpSessionApi {
    http: reqwest::Client,
    server: ServerConfig,
}

impl HttpSessionApi {
    pub fn new(http: reqwest::Client, server: ServerConfig) -> Self {
        Self { http, server }
    }

    fn authorized(&self, builder: RequestBuilder, token: &Token) -> RequestBuilder {
        builder
            .header("Grpc-Metadata-session-id", token.session_id.as_str())
            .bearer_auth(&token.token)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_history(
        &self,
        session_full_name: String,
        token: Token,
    ) -> Result<String, ClientError> {
        let url = self.server.session_state_url(&session_full_name);
        debug!(%url, "Fetching session history");
        let response = self
            .authorized(self.http.get(&url), &token)
            .send()
            .await?
            .error_for_status()?;
        let state: SessionState = response.json().await?;
        Ok(state.state)
    }

    async fn send_feedback(
        &self,
        callback_ref: String,
        token: Token,
        feedback: Feedback,
        update: bool,
    ) -> Result<FeedbackData, ClientError> {
        let url = self.server.feedback_url(&callback_ref);
        debug!(%url, update, "Sending feedback");
        let builder = if update {
            self.http.patch(&url)
        } else {
            self.http.post(&url)
        };
        let response = self
            .authorized(builder, &token)
            .json(&feedback)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
