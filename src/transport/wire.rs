//! # Wire format of status records.
//!
//! The backend publishes one JSON object per status event:
//! ```json
//! {"component_name": "next_player", "origin": 4, "status_code": 4211, "status_msg": "init finished"}
//! ```
//! `status_code` may also arrive as a string with leading zeros (`"0211"`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::{Origin, StatusMessage, normalize};

/// Errors produced while decoding a status record.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WireError {
    /// Payload is not valid JSON or has the wrong shape.
    #[error("malformed status record: {0}")]
    Json(#[from] serde_json::Error),

    /// A mandatory field is absent.
    #[error("status record without `{0}`")]
    MissingField(&'static str),

    /// Origin value outside the known range.
    #[error("unknown origin {0}")]
    BadOrigin(i64),

    /// Code is negative, wider than four digits, or not a number.
    #[error("invalid status code {0:?}")]
    BadCode(String),
}

impl WireError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WireError::Json(_) => "wire_json",
            WireError::MissingField(_) => "wire_missing_field",
            WireError::BadOrigin(_) => "wire_bad_origin",
            WireError::BadCode(_) => "wire_bad_code",
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum RawCode {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize, Serialize)]
struct WireRecord {
    component_name: Option<String>,
    origin: Option<i64>,
    status_code: Option<RawCode>,
    #[serde(default)]
    status_msg: Option<String>,
}

/// Decodes one JSON status record.
pub fn decode(payload: &str) -> Result<StatusMessage, WireError> {
    let record: WireRecord = serde_json::from_str(payload)?;

    let component = record
        .component_name
        .ok_or(WireError::MissingField("component_name"))?;
    let raw_origin = record.origin.ok_or(WireError::MissingField("origin"))?;
    let origin = u8::try_from(raw_origin)
        .ok()
        .and_then(Origin::from_u8)
        .ok_or(WireError::BadOrigin(raw_origin))?;
    let code = match record.status_code.ok_or(WireError::MissingField("status_code"))? {
        RawCode::Number(n) => normalize(n).ok_or_else(|| WireError::BadCode(n.to_string()))?,
        RawCode::Text(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(normalize)
            .ok_or(WireError::BadCode(s))?,
    };

    let mut msg = StatusMessage::any()
        .with_component(component)
        .with_origin(origin)
        .with_code(code);
    if let Some(text) = record.status_msg {
        msg = msg.with_text(text);
    }
    Ok(msg)
}

/// Encodes a fully specified message into the wire format.
///
/// Returns `None` if component, origin or code is unset.
pub fn encode(msg: &StatusMessage) -> Option<String> {
    let record = WireRecord {
        component_name: Some(msg.component.as_deref()?.to_owned()),
        origin: Some(i64::from(msg.origin?.as_u8())),
        status_code: Some(RawCode::Number(i64::from(msg.code?))),
        status_msg: msg.text.as_deref().map(str::to_owned),
    };
    serde_json::to_string(&record).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_numeric_record() {
        let msg = decode(
            r#"{"component_name":"next_player","origin":4,"status_code":4211,"status_msg":"ok"}"#,
        )
        .expect("valid record");
        assert_eq!(msg, StatusMessage::new("next_player", Origin::Player, 4211, "ok"));
    }

    #[test]
    fn decodes_zero_padded_string_code() {
        let msg = decode(r#"{"component_name":"n","origin":1,"status_code":"0211"}"#)
            .expect("valid record");
        assert_eq!(msg.code, Some(211));
        assert_eq!(msg.text, None);
    }

    #[test]
    fn rejects_bad_records() {
        let cases = [
            (r#"{"origin":1,"status_code":1}"#, "wire_missing_field"),
            (r#"{"component_name":"n","origin":9,"status_code":1}"#, "wire_bad_origin"),
            (r#"{"component_name":"n","origin":1,"status_code":-3}"#, "wire_bad_code"),
            (r#"{"component_name":"n","origin":1,"status_code":"x"}"#, "wire_bad_code"),
            ("not json", "wire_json"),
        ];
        for (payload, label) in cases {
            let err = decode(payload).expect_err(payload);
            assert_eq!(err.as_label(), label, "{payload}");
        }
    }

    #[test]
    fn encode_then_decode_preserves_message() {
        let msg = StatusMessage::new("radar", Origin::SimNode, 5211, "ready");
        let payload = encode(&msg).expect("complete message");
        assert_eq!(decode(&payload).expect("valid record"), msg);
        assert!(encode(&StatusMessage::any()).is_none());
    }
}
