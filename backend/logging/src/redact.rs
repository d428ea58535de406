//! Log Redaction
//!
//! Scrubs bot tokens and bearer credentials from strings before they are
//! logged or printed.

use regex::Regex;
use std::sync::LazyLock;

static BOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{6,12}:[A-Za-z0-9_-]{30,}").expect("valid regex"));
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").expect("valid regex"));
// Token embedded in Bot API URLs: https://api.telegram.org/bot<token>/...
static BOT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bot\d+:[^/\s]+/").expect("valid regex"));

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BOT_URL_RE.replace_all(input, "/bot[REDACTED_TOKEN]/");
    let redacted = BOT_TOKEN_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";

    #[test]
    fn bot_token_is_redacted() {
        let clean = redact_sensitive_data(&format!("botToken: {TOKEN}"));
        assert_eq!(clean, "botToken: [REDACTED_TOKEN]");
    }

    #[test]
    fn token_in_api_url_is_redacted() {
        let clean = redact_sensitive_data(&format!(
            "error sending request for url (https://api.telegram.org/bot{TOKEN}/getFile)"
        ));
        assert!(!clean.contains(TOKEN));
        assert!(clean.contains("/bot[REDACTED_TOKEN]/getFile"));
    }

    #[test]
    fn bearer_is_redacted_and_plain_text_kept() {
        let clean = redact_sensitive_data("auth Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9 for chat 42");
        assert!(!clean.contains("eyJhbGci"));
        assert!(clean.ends_with("for chat 42"));
    }
}
