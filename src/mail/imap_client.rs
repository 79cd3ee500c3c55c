use crate::domain::message::{MessageDraft, Source};
use crate::mail::decoders::{decode_mime_words, decode_subject, html_to_text, normalize_snippet};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use mailparse::MailHeaderMap;
use native_tls::TlsConnector;

type ImapSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

const SNIPPET_CHARS: usize = 500;

/// Build canonical auth string as bytes.
fn build_xoauth2_bytes(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {access_token}\x01\x01").into_bytes()
}

struct OAuth2Authenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for OAuth2Authenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

pub struct ImapClient {
    pub server: String,
    pub user: String,
}

impl ImapClient {
    pub fn new(server: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
        }
    }

    fn connect_and_auth(&self, access_token: &str) -> Result<ImapSession> {
        let tls = TlsConnector::builder().build()?;
        let mut client = imap::connect((self.server.as_str(), 993), self.server.as_str(), &tls)?;

        let raw_payload = build_xoauth2_bytes(&self.user, access_token);

        // Try RAW first
        let auth_raw = OAuth2Authenticator {
            response: raw_payload.clone(),
        };
        match client.authenticate("XOAUTH2", &auth_raw) {
            Ok(session) => return Ok(session),
            Err((e, returned_client)) => {
                log::debug!("XOAUTH2 raw attempt failed: {e}");
                client = returned_client;
            }
        }

        // Fallback BASE64
        let b64_bytes = general_purpose::STANDARD.encode(&raw_payload).into_bytes();
        let auth_b64 = OAuth2Authenticator {
            response: b64_bytes,
        };
        match client.authenticate("XOAUTH2", &auth_b64) {
            Ok(session) => Ok(session),
            Err((e, _)) => Err(anyhow!("XOAUTH2 failed (raw+base64): {e}")),
        }
    }

    /// Fetch the newest `limit` INBOX messages, newest first.
    pub fn fetch_recent(&self, access_token: &str, limit: u32) -> Result<Vec<MessageDraft>> {
        let mut session = self.connect_and_auth(access_token)?;
        session.select("INBOX")?;

        let mut uids: Vec<u32> = session.uid_search("ALL")?.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(limit as usize);

        let mut out = Vec::with_capacity(uids.len());

        for uid in uids {
            // One UID per fetch, more reliable than bulk
            let fetches = session.uid_fetch(uid.to_string(), "(UID ENVELOPE BODY.PEEK[])")?;
            let Some(f) = fetches.iter().next() else {
                continue;
            };

            let mut draft = MessageDraft::new(format!("gmail:{uid}"), Source::Gmail);

            draft.subject = f
                .envelope()
                .and_then(|env| env.subject)
                .map(decode_subject)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            draft.from = f
                .envelope()
                .and_then(|env| env.from.as_ref())
                .and_then(|froms| froms.first())
                .and_then(|addr| {
                    // Prefer display name; if missing, use mailbox (without host).
                    addr.name.or(addr.mailbox)
                })
                .map(decode_mime_words)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            match f.body() {
                Some(raw) => fill_from_rfc822(&mut draft, raw),
                None => log::warn!("UID {uid} came back without a body"),
            }

            out.push(draft);
        }

        session.logout()?;
        Ok(out)
    }
}

/// Fill text, timestamp and any missing subject/sender from the raw message.
fn fill_from_rfc822(draft: &mut MessageDraft, raw_rfc822: &[u8]) {
    let Ok(parsed) = mailparse::parse_mail(raw_rfc822) else {
        draft.text = normalize_snippet(&String::from_utf8_lossy(raw_rfc822), SNIPPET_CHARS);
        return;
    };

    draft.timestamp_millis = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .map(|secs| secs * 1000);

    if draft.subject.is_none() {
        draft.subject = parsed
            .headers
            .get_first_value("Subject")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    if draft.from.is_none() {
        draft.from = parsed
            .headers
            .get_first_value("From")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    let body = extract_text_part(&parsed)
        .or_else(|| parsed.get_body().ok())
        .unwrap_or_default();
    draft.text = normalize_snippet(&body, SNIPPET_CHARS);
}

fn extract_text_part(p: &mailparse::ParsedMail) -> Option<String> {
    find_part(p, "text/plain")
        .or_else(|| find_part(p, "text/html").map(|html| html_to_text(&html)))
}

fn find_part(p: &mailparse::ParsedMail, target_mime: &str) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case(target_mime) {
        return p.get_body().ok();
    }
    p.subparts.iter().find_map(|sp| find_part(sp, target_mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: Bob Smith <bob@example.com>\r\n\
Subject: Q3 numbers\r\n\
Date: Tue, 14 Nov 2023 22:13:20 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Can you send the ARR figure?\r\n\
\r\n\
Thanks\r\n";

    const MULTIPART: &[u8] = b"From: ops@example.com\r\n\
Date: Tue, 14 Nov 2023 22:13:20 +0000\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>HTML version</p>\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
URGENT: plain version\r\n\
--b1--\r\n";

    #[test]
    fn xoauth2_payload_layout() {
        assert_eq!(
            build_xoauth2_bytes("me@x.com", "tok"),
            b"user=me@x.com\x01auth=Bearer tok\x01\x01".to_vec()
        );
    }

    #[test]
    fn fills_draft_from_plain_message() {
        let mut d = MessageDraft::new("gmail:1", Source::Gmail);
        fill_from_rfc822(&mut d, PLAIN);

        assert_eq!(d.timestamp_millis, Some(1_700_000_000_000));
        assert_eq!(d.subject.as_deref(), Some("Q3 numbers"));
        assert_eq!(d.from.as_deref(), Some("Bob Smith <bob@example.com>"));
        assert_eq!(d.text, "Can you send the ARR figure? Thanks");
    }

    #[test]
    fn envelope_values_are_kept() {
        let mut d = MessageDraft::new("gmail:1", Source::Gmail);
        d.from = Some("Bob".into());
        d.subject = Some("From envelope".into());
        fill_from_rfc822(&mut d, PLAIN);

        assert_eq!(d.from.as_deref(), Some("Bob"));
        assert_eq!(d.subject.as_deref(), Some("From envelope"));
    }

    #[test]
    fn prefers_plain_part_over_html() {
        let mut d = MessageDraft::new("gmail:2", Source::Gmail);
        fill_from_rfc822(&mut d, MULTIPART);
        assert_eq!(d.text, "URGENT: plain version");
        assert_eq!(d.subject, None);
        assert!(d.validate().is_ok());
    }
}
