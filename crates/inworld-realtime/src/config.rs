use inworld_realtime_types::{Capabilities, ClientInfo, Continuation, UserRequest};
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Hosts of the Inworld runtime (websocket) and web (REST) services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub runtime: String,
    pub web: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            runtime: "api-engine.inworld.ai:443".to_string(),
            web: "api.inworld.ai:443".to_string(),
        }
    }
}

impl ServerConfig {
    /// The runtime host without the default TLS port, as used when signing.
    pub fn runtime_host(&self) -> &str {
        self.runtime.strip_suffix(":443").unwrap_or(&self.runtime)
    }

    pub fn token_url(&self) -> String {
        format!("https://{}/auth/v1/tokens/token:generate", self.web)
    }

    pub fn session_url(&self, session_id: &str) -> String {
        format!("wss://{}/v1/session/open?session_id={}", self.runtime, session_id)
    }

    pub fn session_state_url(&self, session_full_name: &str) -> String {
        format!("https://{}/v1/{}/state", self.web, session_full_name)
    }

    pub fn feedback_url(&self, callback_ref: &str) -> String {
        format!("https://{}/v1/feedback/{}/feedbacks", self.web, callback_ref)
    }
}

/// Holds everything the session client needs, loaded from the environment or built in code.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Full scene name, e.g. `workspaces/{ws}/scenes/{scene}`.
    pub scene: String,
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
    /// A pre-fetched token JSON used verbatim instead of the key/secret exchange.
    pub custom_token: Option<String>,
    pub workspace: Option<String>,
    pub server: ServerConfig,
    pub user: UserRequest,
    pub capabilities: Capabilities,
    pub client_info: ClientInfo,
    pub continuation: Continuation,
    pub max_sent_history: usize,
    pub pump_interval: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    pub close_grace: Duration,
}

impl ClientConfig {
    /// A configuration with defaults for everything but the scene.
    pub fn new(scene: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            api_key: None,
            api_secret: None,
            custom_token: None,
            workspace: None,
            server: ServerConfig::default(),
            user: UserRequest::new("Player"),
            capabilities: Capabilities::conversational(),
            client_info: ClientInfo {
                id: "rust".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: String::new(),
            },
            continuation: Continuation::default(),
            max_sent_history: 100,
            pump_interval: Duration::from_millis(100),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(64),
            close_grace: Duration::from_millis(50),
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Tests set variables explicitly.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let scene = std::env::var("INWORLD_SCENE")
            .map_err(|_| ConfigError::MissingVar("INWORLD_SCENE".to_string()))?;
        let mut config = Self::new(scene);

        config.api_key = non_empty_var("INWORLD_API_KEY");
        config.api_secret = non_empty_var("INWORLD_API_SECRET").map(SecretString::from);
        config.custom_token = non_empty_var("INWORLD_CUSTOM_TOKEN");
        config.workspace = non_empty_var("INWORLD_WORKSPACE");

        if let Some(runtime) = non_empty_var("INWORLD_RUNTIME_HOST") {
            config.server.runtime = runtime;
        }
        if let Some(web) = non_empty_var("INWORLD_WEB_HOST") {
            config.server.web = web;
        }
        if let Some(name) = non_empty_var("INWORLD_PLAYER_NAME") {
            config.user.name = name;
        }

        if let Some(max) = parse_var::<usize>("INWORLD_MAX_SENT_HISTORY")? {
            if max == 0 {
                return Err(ConfigError::InvalidValue(
                    "INWORLD_MAX_SENT_HISTORY".to_string(),
                    "must be at least 1".to_string(),
                ));
            }
            config.max_sent_history = max;
        }
        if let Some(ms) = parse_var::<u64>("INWORLD_PUMP_INTERVAL_MS")? {
            config.pump_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse_var::<u64>("INWORLD_RECONNECT_BASE_MS")? {
            config.reconnect_base = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Resource id of the token request: the configured workspace, else the scene's workspace.
    pub fn workspace_full_name(&self) -> String {
        if let Some(workspace) = &self.workspace {
            return if workspace.starts_with("workspaces/") {
                workspace.clone()
            } else {
                format!("workspaces/{}", workspace)
            };
        }
        let parts: Vec<&str> = self.scene.split('/').collect();
        if parts.len() >= 2 && parts[0] == "workspaces" {
            format!("workspaces/{}", parts[1])
        } else {
            String::new()
        }
    }

    /// Session resource name for REST calls, empty when the scene is not a full name.
    pub fn session_full_name(&self, session_id: &str) -> String {
        let parts: Vec<&str> = self.scene.split('/').collect();
        if parts.len() != 4 {
            return String::new();
        }
        format!("workspaces/{}/sessions/{}", parts[1], session_id)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(None),
    }
}
