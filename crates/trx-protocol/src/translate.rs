//! Translation of server frames into Cloudlog messages
//!
//! Every frame the server pushes is a JSON object whose `request` field names
//! its kind. Only `status-update` frames carry radio state; everything else
//! (acknowledgements, pings, listener traffic) is recognized and ignored.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::Rejected;
use crate::message::{ForwardMessage, RadioId, StatusUpdate, STATUS_UPDATE_REQUEST};

/// Outcome of translating one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// A status update that should be offered to the rate limiter
    Forward(ForwardMessage),
    /// A well-formed frame of a kind we do not forward
    Ignored {
        /// The frame's `request` value, if it had a textual one
        kind: Option<String>,
    },
}

/// Translate one inbound text frame
pub fn translate(payload: &str) -> Result<Translation, Rejected> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| Rejected::Malformed(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(Rejected::Malformed("expected a JSON object".to_string()));
    };

    let kind = object.get("request").and_then(Value::as_str);
    if kind != Some(STATUS_UPDATE_REQUEST) {
        trace!("Ignoring frame of kind {:?}", kind);
        return Ok(Translation::Ignored {
            kind: kind.map(str::to_string),
        });
    }

    parse_status_update(&object).map(|update| Translation::Forward(update.into_forward()))
}

/// Extract the radio state from a `status-update` object
pub fn parse_status_update(object: &Map<String, Value>) -> Result<StatusUpdate, Rejected> {
    let from = scalar_field(object.get("from"), "from")?;

    let status = match object.get("status") {
        None | Some(Value::Null) => return Err(Rejected::MissingField("status")),
        Some(Value::Object(status)) => status,
        Some(other) => {
            return Err(Rejected::InvalidField {
                field: "status",
                reason: format!("expected an object, got {}", kind_name(other)),
            })
        }
    };

    Ok(StatusUpdate {
        from: RadioId::new(from),
        frequency: scalar_field(status.get("frequency"), "status.frequency")?,
        mode: scalar_field(status.get("mode"), "status.mode")?,
    })
}

/// Render a scalar JSON field as text
///
/// Strings pass through verbatim; numbers and booleans keep their JSON
/// spelling.
fn scalar_field(value: Option<&Value>, field: &'static str) -> Result<String, Rejected> {
    match value {
        None | Some(Value::Null) => Err(Rejected::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(Rejected::InvalidField {
            field,
            reason: format!("expected a scalar, got {}", kind_name(other)),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(payload: &str) -> ForwardMessage {
        match translate(payload).unwrap() {
            Translation::Forward(msg) => msg,
            other => panic!("Expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn test_status_update_translates() {
        let msg = forward(
            r#"{"request":"status-update","from":"ft817","status":{"frequency":"14074000","mode":"USB"}}"#,
        );
        assert_eq!(msg.radio, RadioId::new("ft817"));
        assert_eq!(msg.frequency, "14074000");
        assert_eq!(msg.mode, "USB");
    }

    #[test]
    fn test_extra_status_fields_are_ignored() {
        let msg = forward(
            r#"{"request":"status-update","from":"ic7300","status":{"frequency":"7074000","mode":"LSB","ptt":false,"vfo":"A"}}"#,
        );
        assert_eq!(msg.frequency, "7074000");
        assert_eq!(msg.mode, "LSB");
    }

    #[test]
    fn test_numeric_frequency_keeps_json_spelling() {
        let msg = forward(
            r#"{"request":"status-update","from":"ft817","status":{"frequency":14074000,"mode":"USB"}}"#,
        );
        assert_eq!(msg.frequency, "14074000");
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        assert_eq!(
            translate(r#"{"request":"ping","to":"ping"}"#).unwrap(),
            Translation::Ignored {
                kind: Some("ping".to_string())
            }
        );
        assert_eq!(
            translate(r#"{"status":"ok","reply":"start-status-updates"}"#).unwrap(),
            Translation::Ignored { kind: None }
        );
    }

    #[test]
    fn test_missing_frequency_rejected() {
        let err = translate(r#"{"request":"status-update","from":"ft817","status":{"mode":"USB"}}"#)
            .unwrap_err();
        assert_eq!(err, Rejected::MissingField("status.frequency"));
    }

    #[test]
    fn test_null_mode_rejected() {
        let err = translate(
            r#"{"request":"status-update","from":"ft817","status":{"frequency":"14074000","mode":null}}"#,
        )
        .unwrap_err();
        assert_eq!(err, Rejected::MissingField("status.mode"));
    }

    #[test]
    fn test_missing_status_rejected() {
        let err = translate(r#"{"request":"status-update","from":"ft817"}"#).unwrap_err();
        assert_eq!(err, Rejected::MissingField("status"));
    }

    #[test]
    fn test_missing_from_rejected() {
        let err = translate(
            r#"{"request":"status-update","status":{"frequency":"14074000","mode":"USB"}}"#,
        )
        .unwrap_err();
        assert_eq!(err, Rejected::MissingField("from"));
    }

    #[test]
    fn test_structured_mode_rejected() {
        let err = translate(
            r#"{"request":"status-update","from":"ft817","status":{"frequency":"1","mode":["USB"]}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Rejected::InvalidField {
                field: "status.mode",
                ..
            }
        ));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_text_never_panics(payload in ".*") {
            let _ = translate(&payload);
        }

        #[test]
        fn string_fields_pass_through_verbatim(
            radio in "[a-z0-9-]{1,12}",
            frequency in "[0-9]{1,10}",
            mode in "[A-Z]{2,5}",
        ) {
            let frame = serde_json::json!({
                "request": "status-update",
                "from": radio,
                "status": { "frequency": frequency, "mode": mode },
            })
            .to_string();

            let msg = forward(&frame);
            proptest::prop_assert_eq!(msg.radio.as_str(), radio.as_str());
            proptest::prop_assert_eq!(msg.frequency, frequency);
            proptest::prop_assert_eq!(msg.mode, mode);
        }
    }

    #[test]
    fn test_non_json_rejected() {
        assert!(matches!(
            translate("FA00014074000;"),
            Err(Rejected::Malformed(_))
        ));
        assert!(matches!(translate("[1,2,3]"), Err(Rejected::Malformed(_))));
    }
}
