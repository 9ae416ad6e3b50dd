use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::LockerClient;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// What the CLI remembers between invocations: where the server is and
/// who is logged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub email: Option<String>,
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl SessionConfig {
    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn store_login(&mut self, email: &str, token: &str) {
        self.email = Some(email.to_string());
        self.token = Some(token.to_string());
        self.logged_in_at = Some(Utc::now());
    }

    pub fn clear_login(&mut self) {
        self.email = None;
        self.token = None;
        self.logged_in_at = None;
    }

    /// A client for the configured server, carrying the saved token if any.
    pub fn client(&self) -> anyhow::Result<LockerClient> {
        let mut client = LockerClient::new(self.server_url())?;
        client.set_token(self.token.clone());
        Ok(client)
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("LOCKER_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("ai-locker").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<SessionConfig> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(SessionConfig::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: SessionConfig = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session(session: &SessionConfig) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(session)?;
    fs::write(session_file, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_points_at_local_server() {
        let session = SessionConfig::default();
        assert_eq!(session.server_url(), DEFAULT_SERVER_URL);
        assert!(session.token.is_none());
    }

    #[test]
    fn login_round_trips_through_json() {
        let mut session = SessionConfig {
            server_url: Some("http://locker.test".to_string()),
            ..Default::default()
        };
        session.store_login("seed@example.com", "abc");

        let text = serde_json::to_string(&session).unwrap();
        let mut back: SessionConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.token.as_deref(), Some("abc"));
        assert_eq!(back.server_url(), "http://locker.test");

        back.clear_login();
        assert!(back.token.is_none() && back.email.is_none());
    }
}
