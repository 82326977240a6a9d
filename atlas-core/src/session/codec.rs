//! JSON codec for the persisted session list
//!
//! Encoding is plain serde. Decoding never trusts the payload: every record is
//! coerced field by field into a fully-defaulted [`Session`], so a damaged or
//! hand-edited slot degrades to defaults instead of failing the load. Only a
//! payload that is not a JSON array at all is rejected, with
//! [`Error::StorageCorrupt`], and callers recover from that by starting empty.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use super::store::{Message, Session, SessionId, PLACEHOLDER_TITLE};
use crate::{Error, Result};

/// Serialize the full ordered session list
pub fn encode_sessions(sessions: &[Session]) -> Result<String> {
    Ok(serde_json::to_string(sessions)?)
}

/// Decode a stored session list, coercing every record
pub fn decode_sessions(raw: &str) -> Result<Vec<Session>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::StorageCorrupt(format!("payload is not valid JSON: {}", e)))?;

    let Value::Array(records) = value else {
        return Err(Error::StorageCorrupt(
            "payload is not an array".to_string(),
        ));
    };

    let mut sessions: Vec<Session> = records.iter().map(coerce_session).collect();
    dedupe_session_ids(&mut sessions);
    Ok(sessions)
}

/// Coerce one stored record into a session
pub fn coerce_session(record: &Value) -> Session {
    let messages = record
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(coerce_message).collect())
        .unwrap_or_default();

    Session {
        id: SessionId::from(coerce_string(record.get("id")).unwrap_or_else(fallback_id)),
        title: coerce_string(record.get("title")).unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        messages,
        created_at: coerce_timestamp(record.get("createdAt")),
        updated_at: coerce_timestamp(record.get("updatedAt")),
    }
}

/// Coerce one stored record into a message
pub fn coerce_message(record: &Value) -> Message {
    Message {
        id: coerce_string(record.get("id")).unwrap_or_else(fallback_id),
        content: coerce_string(record.get("content")).unwrap_or_default(),
        is_user: coerce_flag(record.get("isUser")),
        timestamp: coerce_timestamp(record.get("timestamp")),
    }
}

fn fallback_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Truthiness of a stored flag; absent means false
fn coerce_flag(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Parse a stored timestamp, falling back to now when absent or invalid.
/// Numbers are epoch milliseconds.
fn coerce_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    let parsed = match value {
        Some(Value::String(s)) => parse_timestamp(s),
        Some(Value::Number(n)) => n
            .as_i64()
            .filter(|ms| *ms != 0)
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.unwrap_or_else(Utc::now)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn dedupe_session_ids(sessions: &mut [Session]) {
    let mut seen = HashSet::new();
    for session in sessions.iter_mut() {
        let unique = unique_id(session.id.as_str(), &mut seen);
        session.id = SessionId::from(unique);

        let mut seen_messages = HashSet::new();
        for message in session.messages.iter_mut() {
            message.id = unique_id(&message.id, &mut seen_messages);
        }
    }
}

fn unique_id(id: &str, seen: &mut HashSet<String>) -> String {
    let mut candidate = id.to_string();
    let mut suffix = 1;
    while seen.contains(&candidate) {
        candidate = format!("{}-{}", id, suffix);
        suffix += 1;
    }
    seen.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_preserves_counts_and_timestamps() {
        let mut first = Session::new();
        first.push(Message::user("Where is Tuvalu?"));
        first.push(Message::assistant("In the Pacific."));
        let second = Session::with_title("Empty");

        let raw = encode_sessions(&[first.clone(), second.clone()]).unwrap();
        let decoded = decode_sessions(&raw).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].messages.len(), 2);
        assert_eq!(decoded[1].messages.len(), 0);
        assert_eq!(decoded[0], first);
        assert_eq!(decoded[1].created_at, second.created_at);
    }

    #[test]
    fn test_non_array_payload_is_corrupt() {
        let err = decode_sessions(r#"{"id":"1"}"#).unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)));

        let err = decode_sessions("not json at all").unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)));
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let before = Utc::now();
        let raw = json!([{ "messages": [{}] }]).to_string();
        let sessions = decode_sessions(&raw).unwrap();

        let session = &sessions[0];
        assert!(!session.id.as_str().is_empty());
        assert_eq!(session.title, PLACEHOLDER_TITLE);
        assert!(session.created_at >= before);

        let message = &session.messages[0];
        assert!(!message.id.is_empty());
        assert_eq!(message.content, "");
        assert!(!message.is_user);
        assert!(message.timestamp >= before);
    }

    #[test]
    fn test_malformed_fields_are_coerced() {
        let raw = json!([
            "just a string",
            {
                "id": 1717171717000u64,
                "title": null,
                "messages": "nope",
                "createdAt": 1717171717000u64,
                "updatedAt": "garbage",
                "pinned": true
            },
            {
                "id": "s3",
                "messages": [
                    { "id": "m", "content": 42, "isUser": 1, "timestamp": "2024-05-01T10:00:00Z" },
                    { "id": "m", "content": "x", "isUser": "", "timestamp": "2024-05-01T10:00:00.250" }
                ]
            }
        ])
        .to_string();

        let sessions = decode_sessions(&raw).unwrap();
        assert_eq!(sessions.len(), 3);

        assert_eq!(sessions[0].title, PLACEHOLDER_TITLE);
        assert!(sessions[0].messages.is_empty());

        assert_eq!(sessions[1].id.as_str(), "1717171717000");
        assert_eq!(sessions[1].title, PLACEHOLDER_TITLE);
        assert!(sessions[1].messages.is_empty());
        assert_eq!(sessions[1].created_at.timestamp_millis(), 1717171717000);

        let messages = &sessions[2].messages;
        assert_eq!(messages[0].content, "42");
        assert!(messages[0].is_user);
        assert!(!messages[1].is_user);
        assert_eq!(messages[0].timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(messages[1].timestamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_colliding_ids_are_made_unique() {
        let raw = json!([
            { "id": "dup", "messages": [{ "id": "m" }, { "id": "m" }, { "id": "m" }] },
            { "id": "dup" }
        ])
        .to_string();

        let sessions = decode_sessions(&raw).unwrap();
        assert_eq!(sessions[0].id.as_str(), "dup");
        assert_eq!(sessions[1].id.as_str(), "dup-1");

        let ids: Vec<&str> = sessions[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m", "m-1", "m-2"]);
    }

    #[test]
    fn test_empty_array() {
        assert!(decode_sessions("[]").unwrap().is_empty());
    }
}
