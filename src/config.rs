use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "napoleon";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Account key for the token store, usually the Google address.
    pub user_id: String,
    pub fetch_timeout_secs: Option<u64>,
    pub google: GoogleConfig,
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub imap_server: Option<String>,
    pub max_messages: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SlackConfig {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub max_channels: Option<u32>,
    pub messages_per_channel: Option<u32>,
}

impl Config {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

impl GoogleConfig {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string())
    }

    pub fn imap_server(&self) -> String {
        self.imap_server
            .clone()
            .unwrap_or_else(|| "imap.gmail.com".to_string())
    }

    pub fn max_messages(&self) -> u32 {
        self.max_messages.unwrap_or(25)
    }
}

impl SlackConfig {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8081/callback".to_string())
    }

    pub fn max_channels(&self) -> u32 {
        self.max_channels.unwrap_or(10)
    }

    pub fn messages_per_channel(&self) -> u32 {
        self.messages_per_channel.unwrap_or(20)
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join(APP_DIR);
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn template() -> Config {
    Config {
        user_id: "you@example.com".to_string(),
        fetch_timeout_secs: Some(30),
        google: GoogleConfig {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            redirect_uri: Some("http://127.0.0.1:8080/callback".to_string()),
            imap_server: Some("imap.gmail.com".to_string()),
            max_messages: Some(25),
        },
        slack: Some(SlackConfig {
            client_id: "YOUR_SLACK_CLIENT_ID".to_string(),
            redirect_uri: Some("http://127.0.0.1:8081/callback".to_string()),
            max_channels: Some(10),
            messages_per_channel: Some(20),
        }),
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Load the config at `path`, writing a template there first if it is missing.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let tom = toml::to_string_pretty(&template())?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
