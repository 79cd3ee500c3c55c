pub fn decode_subject(raw: &[u8]) -> String {
    decode_header_value(b"Subject: ", raw)
}

pub fn decode_mime_words(raw: &[u8]) -> String {
    decode_header_value(b"X: ", raw)
}

// mailparse expects a full "Key: value" header line; it decodes RFC 2047 words
fn decode_header_value(prefix: &[u8], raw: &[u8]) -> String {
    let mut line = prefix.to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Collapse non-empty lines into one line of at most `max_chars` chars.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}

pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120).unwrap_or_else(|_| html.to_string())
}
