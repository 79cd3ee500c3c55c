use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::oauth::Provider;
use crate::config::config_dir;

/// Non-secret access token metadata, one file per provider and account:
/// `~/.config/napoleon/tokens-<provider>-<account>.json`
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    /// Epoch seconds. `None` with a token present means it never expires.
    pub expires_at_epoch: Option<i64>,
}

impl TokensFile {
    /// The cached access token, if it is still valid at `now` (epoch seconds).
    pub fn usable_token(&self, now: i64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.expires_at_epoch {
            Some(exp) if now >= exp => None,
            _ => Some(token),
        }
    }
}

fn tokens_path_in(dir: &Path, provider: Provider, account: &str) -> PathBuf {
    let account: String = account
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '@' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    dir.join(format!("tokens-{}-{account}.json", provider.as_str()))
}

/// Save access_token (non-secret) and expiry epoch
pub fn save_tokens(
    provider: Provider,
    account: &str,
    access_token: Option<&str>,
    expires_at_epoch: Option<i64>,
) -> Result<()> {
    save_tokens_in(&config_dir()?, provider, account, access_token, expires_at_epoch)
}

pub fn save_tokens_in(
    dir: &Path,
    provider: Provider,
    account: &str,
    access_token: Option<&str>,
    expires_at_epoch: Option<i64>,
) -> Result<()> {
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)?;
    fs::write(tokens_path_in(dir, provider, account), s)?;
    Ok(())
}

/// Load tokens file if present
pub fn load_tokens(provider: Provider, account: &str) -> Result<Option<TokensFile>> {
    load_tokens_in(&config_dir()?, provider, account)
}

pub fn load_tokens_in(dir: &Path, provider: Provider, account: &str) -> Result<Option<TokensFile>> {
    let p = tokens_path_in(dir, provider, account);
    if !p.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(&p)?;
    let tf: TokensFile = serde_json::from_str(&s)?;
    Ok(Some(tf))
}
