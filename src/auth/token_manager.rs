use anyhow::{Result, anyhow};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::oauth::{self, Provider, Tokens};
use crate::auth::{token_store, tokens_file};
use crate::config::{GoogleConfig, SlackConfig, config_dir};

#[derive(Clone)]
pub struct TokenManager {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl TokenManager {
    fn new(provider: Provider, client_id: String, redirect_uri: String) -> Result<Self> {
        let client_secret = token_store::load_client_secret(provider, &client_id)?
            .or_else(|| std::env::var(provider.client_secret_env()).ok());

        Ok(Self {
            provider,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    pub fn google(cfg: &GoogleConfig) -> Result<Self> {
        Self::new(Provider::Google, cfg.client_id.clone(), cfg.redirect_uri())
    }

    pub fn slack(cfg: &SlackConfig) -> Result<Self> {
        let mgr = Self::new(Provider::Slack, cfg.client_id.clone(), cfg.redirect_uri())?;
        if mgr.client_secret.is_none() {
            return Err(anyhow!(
                "Slack client secret missing: run set-client-secret or set {}",
                Provider::Slack.client_secret_env()
            ));
        }
        Ok(mgr)
    }

    /// Returns a valid access token for `account` from the cache or by
    /// refreshing. Never prompts: without a usable token this fails and
    /// asks for `napoleon login <provider>`.
    pub fn access_token(&self, account: &str) -> Result<String> {
        self.access_token_in(&config_dir()?, account, now_epoch()?, || {
            token_store::load_refresh_token(self.provider, account)
        })
    }

    fn access_token_in(
        &self,
        cache_dir: &Path,
        account: &str,
        now: i64,
        refresh_token: impl FnOnce() -> Result<Option<String>>,
    ) -> Result<String> {
        // 1) cached & not expired
        if let Some(tf) = tokens_file::load_tokens_in(cache_dir, self.provider, account)?
            && let Some(at) = tf.usable_token(now)
        {
            return Ok(at.to_string());
        }

        // 2) refresh if possible
        if let Some(rt) = refresh_token()? {
            match oauth::refresh_access_token(
                self.provider,
                &self.client_id,
                self.client_secret.as_deref(),
                &rt,
            ) {
                Ok(t) => return self.persist_in(cache_dir, account, t, now),
                Err(e) => log::warn!("{e}"),
            }
        }

        Err(anyhow!(
            "no usable {} token for {account}: run `napoleon login {}`",
            self.provider,
            self.provider
        ))
    }

    /// Always run the interactive flow and store the result.
    pub fn login(&self, account: &str) -> Result<String> {
        let now = now_epoch()?;
        let t = oauth::perform_interactive_flow(
            self.provider,
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
        )?;
        self.persist_in(&config_dir()?, account, t, now)
    }

    fn persist_in(&self, cache_dir: &Path, account: &str, t: Tokens, now: i64) -> Result<String> {
        // Keyring trouble should not cost us a token we already have
        if let Some(rt) = &t.refresh_token
            && let Err(e) = token_store::save_refresh_token(self.provider, account, rt)
        {
            log::warn!("couldn't save {} refresh token to keyring: {e}", self.provider);
        }

        let exp = expiry_epoch(self.provider, t.expires_in, now);
        tokens_file::save_tokens_in(cache_dir, self.provider, account, Some(&t.access_token), exp)?;
        Ok(t.access_token)
    }
}

fn now_epoch() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

fn expiry_epoch(provider: Provider, expires_in: Option<u64>, now: i64) -> Option<i64> {
    match expires_in {
        Some(s) => Some(now + s as i64),
        None => provider.default_token_lifetime_secs().map(|s| now + s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: &str = "me@example.com";

    fn manager(provider: Provider) -> TokenManager {
        TokenManager {
            provider,
            client_id: "client".to_string(),
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
        }
    }

    #[test]
    fn cached_token_is_used_without_refreshing() {
        let dir = tempfile::tempdir().unwrap();
        tokens_file::save_tokens_in(dir.path(), Provider::Google, ME, Some("ya29"), Some(2000))
            .unwrap();

        let token = manager(Provider::Google)
            .access_token_in(dir.path(), ME, 1000, || panic!("refresh not needed"))
            .unwrap();
        assert_eq!(token, "ya29");
    }

    #[test]
    fn missing_token_fails_instead_of_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager(Provider::Slack)
            .access_token_in(dir.path(), ME, 1000, || Ok(None))
            .unwrap_err();
        assert!(err.to_string().contains("napoleon login slack"));
    }

    #[test]
    fn expired_token_without_refresh_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        tokens_file::save_tokens_in(dir.path(), Provider::Google, ME, Some("old"), Some(500))
            .unwrap();

        let err = manager(Provider::Google)
            .access_token_in(dir.path(), ME, 1000, || Ok(None))
            .unwrap_err();
        assert!(err.to_string().contains("napoleon login google"));
    }

    #[test]
    fn another_accounts_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        tokens_file::save_tokens_in(dir.path(), Provider::Google, "old@example.com", Some("x"), None)
            .unwrap();

        let res = manager(Provider::Google).access_token_in(dir.path(), ME, 1000, || Ok(None));
        assert!(res.is_err());
    }

    #[test]
    fn explicit_expiry_wins() {
        assert_eq!(expiry_epoch(Provider::Google, Some(60), 1000), Some(1060));
        assert_eq!(expiry_epoch(Provider::Slack, Some(60), 1000), Some(1060));
    }

    #[test]
    fn missing_expiry_uses_provider_default() {
        assert_eq!(expiry_epoch(Provider::Google, None, 1000), Some(4500));
        assert_eq!(expiry_epoch(Provider::Slack, None, 1000), None);
    }
}
