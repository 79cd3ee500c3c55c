use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

use crate::auth::oauth::Provider;
use crate::config::APP_DIR;

fn entry_user(provider: Provider, key: &str) -> String {
    format!("{}:{}", provider.as_str(), key)
}

fn entry(provider: Provider, key: &str) -> Result<Entry> {
    Entry::new(APP_DIR, &entry_user(provider, key)).map_err(|e| anyhow!(e.to_string()))
}

fn load(provider: Provider, key: &str) -> Result<Option<String>> {
    match entry(provider, key)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn save(provider: Provider, key: &str, secret: &str) -> Result<()> {
    entry(provider, key)?
        .set_password(secret)
        .map_err(|e| anyhow!(e.to_string()))
}

/// Save a refresh token into the OS keyring for the given account
pub fn save_refresh_token(provider: Provider, account: &str, refresh_token: &str) -> Result<()> {
    save(provider, account, refresh_token)
}

/// Load a refresh token from the keyring for the given account
pub fn load_refresh_token(provider: Provider, account: &str) -> Result<Option<String>> {
    load(provider, account)
}

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(provider: Provider, client_id: &str, client_secret: &str) -> Result<()> {
    save(provider, client_id, client_secret)
}

/// Load a client secret by client_id
pub fn load_client_secret(provider: Provider, client_id: &str) -> Result<Option<String>> {
    load(provider, client_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_namespaced_by_provider() {
        assert_eq!(entry_user(Provider::Google, "me@x.com"), "google:me@x.com");
        assert_eq!(entry_user(Provider::Slack, "me@x.com"), "slack:me@x.com");
    }
}
