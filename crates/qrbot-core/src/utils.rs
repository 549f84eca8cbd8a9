use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64, username: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            username: Some(username.to_string()),
            message_type: None,
            content: None,
            response: None,
            authorized: None,
            error: None,
            context: None,
            retry_after: None,
        }
    }

    pub fn message(
        user_id: i64,
        username: &str,
        message_type: &str,
        content: &str,
        response: Option<&str>,
    ) -> Self {
        Self {
            message_type: Some(message_type.to_string()),
            content: Some(content.to_string()),
            response: response.map(|s| s.to_string()),
            ..Self::base("message", user_id, username)
        }
    }

    pub fn auth(user_id: i64, username: &str, authorized: bool) -> Self {
        Self {
            authorized: Some(authorized),
            ..Self::base("auth", user_id, username)
        }
    }

    pub fn error(user_id: i64, username: &str, error: &str, context: Option<&str>) -> Self {
        Self {
            error: Some(error.to_string()),
            context: context.map(|s| s.to_string()),
            ..Self::base("error", user_id, username)
        }
    }

    pub fn rate_limit(user_id: i64, username: &str, retry_after: f64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", user_id, username)
        }
    }
}

/// Append-only audit trail. A logger without a path discards events.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: Option<PathBuf>,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: Option<PathBuf>, json: bool) -> Self {
        Self { path, json }
    }

    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Payloads can be up to a full QR capacity; keep the log readable.
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.response {
            event.response = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

// ============== Message Splitting ==============

/// Split `text` into chunks of at most `limit` chars.
///
/// Cuts at the last newline inside the window when there is one, otherwise
/// at the char boundary. Telegram counts UTF-16 units, so callers should
/// leave headroom for astral-plane characters.
pub fn split_text_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut out = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = match window.rfind('\n') {
            Some(nl) if nl > 0 => nl + 1,
            _ => window_end,
        };
        out.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || out.is_empty() {
        out.push(rest.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.len(), AUDIT_MAX_TEXT + 3);
        assert_eq!(truncate_text("short", AUDIT_MAX_TEXT), "short");
    }

    #[test]
    fn truncate_text_respects_char_boundaries() {
        let s = "é".repeat(10);
        assert_eq!(truncate_text(&s, 3), "ééé...");
    }

    #[test]
    fn audit_json_truncates_content() {
        let log = AuditLogger::new(Some(tmp_file("qrbot-audit-json")), true);
        let content = "x".repeat(AUDIT_MAX_TEXT + 1);
        let ev = AuditEvent::message(1, "u", "TEXT", &content, Some("qr"));
        log.write(ev).unwrap();

        let written = std::fs::read_to_string(log.path().unwrap()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "message");
        assert_eq!(v["message_type"], "TEXT");
        assert!(v["content"].as_str().unwrap().ends_with("..."));
        assert!(v.get("error").is_none());
        let _ = std::fs::remove_file(log.path().unwrap());
    }

    #[test]
    fn audit_text_format_lists_fields() {
        let log = AuditLogger::new(Some(tmp_file("qrbot-audit-text")), false);
        log.write(AuditEvent::rate_limit(7, "alice", 2.5)).unwrap();
        log.write(AuditEvent::auth(8, "bob", false)).unwrap();

        let written = std::fs::read_to_string(log.path().unwrap()).unwrap();
        assert!(written.contains("event: rate_limit"));
        assert!(written.contains("retry_after: 2.5"));
        assert!(written.contains("username: bob"));
        assert!(written.contains("authorized: false"));
        let _ = std::fs::remove_file(log.path().unwrap());
    }

    #[test]
    fn disabled_audit_logger_is_a_no_op() {
        let log = AuditLogger::disabled();
        assert!(log.path().is_none());
        log.write(AuditEvent::error(1, "u", "boom", None)).unwrap();
    }

    #[test]
    fn split_keeps_short_text_whole() {
        assert_eq!(split_text_chunks("hello", 10), vec!["hello"]);
        assert_eq!(split_text_chunks("", 10), vec![""]);
    }

    #[test]
    fn split_prefers_newlines() {
        let chunks = split_text_chunks("aaaa\nbbbb\ncccc", 7);
        assert_eq!(chunks, vec!["aaaa\n", "bbbb\n", "cccc"]);
    }

    #[test]
    fn split_hard_cuts_long_lines_on_char_boundaries() {
        let text = "ü".repeat(25);
        let chunks = split_text_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
