pub mod gmail;
pub mod slack;

use anyhow::Result;

use crate::domain::message::{Message, Source};

/// Something that can list the latest messages for a signed-in user.
///
/// Sources are shared with worker threads during aggregation, hence
/// `Send + Sync`. A failing fetch is isolated by the caller.
pub trait MessageSource: Send + Sync {
    fn source(&self) -> Source;

    fn fetch(&self, user_id: &str) -> Result<Vec<Message>>;
}

pub use gmail::GmailSource;
pub use slack::SlackSource;

/// Stand-in for a source that could not be set up (missing secret, bad
/// config). Every fetch fails with the setup error, so aggregation reports
/// it like any other failing source.
pub struct UnavailableSource {
    source: Source,
    reason: String,
}

impl UnavailableSource {
    pub fn new(source: Source, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

impl MessageSource for UnavailableSource {
    fn source(&self) -> Source {
        self.source
    }

    fn fetch(&self, _user_id: &str) -> Result<Vec<Message>> {
        Err(anyhow::anyhow!("{} unavailable: {}", self.source, self.reason))
    }
}
