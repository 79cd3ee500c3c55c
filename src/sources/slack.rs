//! Slack Web API source.
//!
//! Lists the conversations the token can see (public channels and IMs),
//! then reads the latest history of each one.

use anyhow::{Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::auth::token_manager::TokenManager;
use crate::config::SlackConfig;
use crate::domain::message::{Message, MessageDraft, Source, collect_valid};
use crate::sources::MessageSource;

const API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ConversationList {
    #[serde(default)]
    channels: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

pub struct SlackSource {
    token_mgr: TokenManager,
    client: Client,
    max_channels: u32,
    messages_per_channel: u32,
}

impl SlackSource {
    pub fn new(token_mgr: TokenManager, max_channels: u32, messages_per_channel: u32) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            token_mgr,
            client,
            max_channels,
            messages_per_channel,
        })
    }

    pub fn from_config(cfg: &SlackConfig) -> Result<Self> {
        Self::new(
            TokenManager::slack(cfg)?,
            cfg.max_channels(),
            cfg.messages_per_channel(),
        )
    }

    fn api_get<T: DeserializeOwned>(
        &self,
        token: &str,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(format!("{API_BASE}/{method}"))
            .bearer_auth(token)
            .query(query)
            .send()?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(anyhow!("slack {method} rate limited (retry after {retry_after}s)"));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("slack {method} failed: {status}: {body}"));
        }

        unwrap_envelope(method, resp.json::<Envelope<T>>()?)
    }
}

fn unwrap_envelope<T>(method: &str, env: Envelope<T>) -> Result<T> {
    if !env.ok {
        let error = env.error.as_deref().unwrap_or("unknown");
        return Err(anyhow!("slack {method} returned error: {error}"));
    }
    env.body
        .ok_or_else(|| anyhow!("slack {method} returned an empty body"))
}

/// Slack `ts` is "<epoch seconds>.<micros>".
fn ts_to_millis(ts: &str) -> Option<i64> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs: i64 = secs.parse().ok()?;
    let millis: i64 = if frac.is_empty() {
        0
    } else {
        let mut digits: String = frac.chars().take(3).collect();
        while digits.len() < 3 {
            digits.push('0');
        }
        digits.parse().ok()?
    };
    secs.checked_mul(1000)?.checked_add(millis)
}

fn to_draft(channel_id: &str, m: SlackMessage) -> MessageDraft {
    let ts = m.ts.unwrap_or_default();
    let mut draft = MessageDraft::new(format!("slack:{channel_id}:{ts}"), Source::Slack);
    draft.from = m.user.or(m.username).or(m.bot_id);
    draft.text = m.text;
    draft.timestamp_millis = ts_to_millis(&ts);
    draft
}

impl MessageSource for SlackSource {
    fn source(&self) -> Source {
        Source::Slack
    }

    fn fetch(&self, user_id: &str) -> Result<Vec<Message>> {
        let token = self.token_mgr.access_token(user_id)?;

        let list: ConversationList = self.api_get(
            &token,
            "conversations.list",
            &[
                ("types", "public_channel,im".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", self.max_channels.to_string()),
            ],
        )?;

        let mut drafts = Vec::new();
        for conv in list.channels.into_iter().take(self.max_channels as usize) {
            let history: Result<History> = self.api_get(
                &token,
                "conversations.history",
                &[
                    ("channel", conv.id.clone()),
                    ("limit", self.messages_per_channel.to_string()),
                ],
            );
            match history {
                Ok(h) => drafts.extend(h.messages.into_iter().map(|m| to_draft(&conv.id, m))),
                Err(e) => {
                    let name = conv.name.as_deref().unwrap_or(&conv.id);
                    log::warn!("Skipping slack conversation {name}: {e}");
                }
            }
        }

        Ok(collect_valid(drafts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ts_into_millis() {
        assert_eq!(ts_to_millis("1700000000.123456"), Some(1_700_000_000_123));
        assert_eq!(ts_to_millis("1700000000.5"), Some(1_700_000_000_500));
        assert_eq!(ts_to_millis("1700000000"), Some(1_700_000_000_000));
        assert_eq!(ts_to_millis(""), None);
        assert_eq!(ts_to_millis("abc.def"), None);
    }

    #[test]
    fn out_of_range_ts_is_rejected() {
        assert_eq!(ts_to_millis("99999999999999999.0"), None);
        assert_eq!(ts_to_millis("-9223372036854775.900"), None);
    }

    #[test]
    fn history_payload_becomes_messages() {
        let raw = r#"{
            "ok": true,
            "messages": [
                {"type": "message", "user": "U1", "text": "urgent: deploy?", "ts": "1700000000.000100"},
                {"type": "message", "bot_id": "B9", "text": "build green", "ts": "1700000001.000200"},
                {"type": "message", "user": "U2", "text": "no ts"}
            ]
        }"#;
        let env: Envelope<History> = serde_json::from_str(raw).unwrap();
        let history = unwrap_envelope("conversations.history", env).unwrap();
        let drafts = history.messages.into_iter().map(|m| to_draft("C1", m));
        let messages = collect_valid(drafts);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "slack:C1:1700000000.000100");
        assert_eq!(messages[0].from, "U1");
        assert_eq!(messages[0].subject, None);
        assert_eq!(messages[0].timestamp_millis, 1_700_000_000_000);
        assert_eq!(messages[1].from, "B9");
    }

    #[test]
    fn error_envelope_fails() {
        let raw = r#"{"ok": false, "error": "invalid_auth"}"#;
        let env: Envelope<ConversationList> = serde_json::from_str(raw).unwrap();
        let err = unwrap_envelope("conversations.list", env).unwrap_err();
        assert!(err.to_string().contains("invalid_auth"));
    }

    #[test]
    fn conversation_list_parses() {
        let raw = r#"{"ok": true, "channels": [{"id": "C1", "name": "general"}, {"id": "D1", "is_im": true}]}"#;
        let env: Envelope<ConversationList> = serde_json::from_str(raw).unwrap();
        let list = unwrap_envelope("conversations.list", env).unwrap();
        assert_eq!(list.channels.len(), 2);
        assert_eq!(list.channels[0].name.as_deref(), Some("general"));
        assert_eq!(list.channels[1].name, None);
    }
}
