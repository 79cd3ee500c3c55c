use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gmail,
    Slack,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Gmail => "gmail",
            Source::Slack => "slack",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A Gmail or Slack message normalized to one shape for ranking.
///
/// Fetchers build these through [`MessageDraft::validate`], so a message
/// always carries a sender and a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub source: Source,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub text: String,
    pub timestamp_millis: i64,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        source: Source,
        from: impl Into<String>,
        subject: Option<String>,
        text: impl Into<String>,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            from: from.into(),
            subject,
            text: text.into(),
            timestamp_millis,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message has an empty id")]
    MissingId,
    #[error("message {0} has no sender")]
    MissingSender(String),
    #[error("message {0} has no timestamp")]
    MissingTimestamp(String),
}

/// What a fetcher managed to extract before validation.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub id: String,
    pub source: Source,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub text: String,
    pub timestamp_millis: Option<i64>,
}

impl MessageDraft {
    pub fn new(id: impl Into<String>, source: Source) -> Self {
        Self {
            id: id.into(),
            source,
            from: None,
            subject: None,
            text: String::new(),
            timestamp_millis: None,
        }
    }

    pub fn validate(self) -> Result<Message, MessageError> {
        if self.id.trim().is_empty() {
            return Err(MessageError::MissingId);
        }
        let from = match self.from {
            Some(f) if !f.trim().is_empty() => f,
            _ => return Err(MessageError::MissingSender(self.id)),
        };
        let Some(timestamp_millis) = self.timestamp_millis else {
            return Err(MessageError::MissingTimestamp(self.id));
        };

        Ok(Message {
            id: self.id,
            source: self.source,
            from,
            subject: self.subject.filter(|s| !s.is_empty()),
            text: self.text,
            timestamp_millis,
        })
    }
}

/// Validate every draft, dropping (and logging) the ones that fail.
pub fn collect_valid(drafts: impl IntoIterator<Item = MessageDraft>) -> Vec<Message> {
    drafts
        .into_iter()
        .filter_map(|d| match d.validate() {
            Ok(m) => Some(m),
            Err(e) => {
                log::debug!("Skipping message: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MessageDraft {
        let mut d = MessageDraft::new("gmail:42", Source::Gmail);
        d.from = Some("Alice".to_string());
        d.subject = Some("Quarterly numbers".to_string());
        d.text = "Need ARR figure before 3pm".to_string();
        d.timestamp_millis = Some(1_700_000_000_000);
        d
    }

    #[test]
    fn complete_draft_validates() {
        let m = draft().validate().unwrap();
        assert_eq!(m.id, "gmail:42");
        assert_eq!(m.from, "Alice");
        assert_eq!(m.timestamp_millis, 1_700_000_000_000);
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let mut d = draft();
        d.timestamp_millis = None;
        assert_eq!(
            d.validate(),
            Err(MessageError::MissingTimestamp("gmail:42".to_string()))
        );
    }

    #[test]
    fn blank_sender_is_rejected() {
        let mut d = draft();
        d.from = Some("  ".to_string());
        assert!(matches!(d.validate(), Err(MessageError::MissingSender(_))));
    }

    #[test]
    fn empty_subject_becomes_none() {
        let mut d = draft();
        d.subject = Some(String::new());
        assert_eq!(d.validate().unwrap().subject, None);
    }

    #[test]
    fn collect_valid_drops_bad_drafts() {
        let mut bad = draft();
        bad.id = String::new();
        let out = collect_valid(vec![draft(), bad]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn serializes_with_camel_case_and_lowercase_source() {
        let m = Message::new("slack:C1:1.0", Source::Slack, "U1", None, "hi", 1000);
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["source"], "slack");
        assert_eq!(v["timestampMillis"], 1000);
        assert!(v.get("subject").is_none());
    }
}
