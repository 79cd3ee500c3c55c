use anyhow::Result;

use crate::auth::token_manager::TokenManager;
use crate::config::GoogleConfig;
use crate::domain::message::{Message, Source, collect_valid};
use crate::mail::imap_client::ImapClient;
use crate::sources::MessageSource;

/// Gmail over IMAP with XOAUTH2.
pub struct GmailSource {
    token_mgr: TokenManager,
    imap_server: String,
    max_messages: u32,
}

impl GmailSource {
    pub fn new(token_mgr: TokenManager, imap_server: impl Into<String>, max_messages: u32) -> Self {
        Self {
            token_mgr,
            imap_server: imap_server.into(),
            max_messages,
        }
    }

    pub fn from_config(cfg: &GoogleConfig) -> Result<Self> {
        Ok(Self::new(
            TokenManager::google(cfg)?,
            cfg.imap_server(),
            cfg.max_messages(),
        ))
    }
}

impl MessageSource for GmailSource {
    fn source(&self) -> Source {
        Source::Gmail
    }

    /// `user_id` is the Gmail address: it is both the IMAP login and the
    /// keyring account for the refresh token.
    fn fetch(&self, user_id: &str) -> Result<Vec<Message>> {
        let access = self.token_mgr.access_token(user_id)?;
        let imap = ImapClient::new(self.imap_server.as_str(), user_id);
        let drafts = imap.fetch_recent(&access, self.max_messages)?;
        Ok(collect_valid(drafts))
    }
}
