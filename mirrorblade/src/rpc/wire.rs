//! Versioned request/reply framing for the line protocol.
//!
//! One request per line, one reply per line, UTF-8 JSON. A request is
//! `{ "v": 1, "id"?: <any>, "op": "<name>", "args"?: {} }`; replies echo
//! `v` and `id` and carry either `ok:true` with a result or `ok:false`
//! with `{ code, msg }`.

use serde_json::{json, Value};

/// The only protocol version accepted.
pub const PROTOCOL_VERSION: u64 = 1;

/// Maximum accumulated bytes without a line terminator. Beyond this the
/// session is terminated without a reply.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Wire error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadJson,
    BadVersion,
    BadArgs,
    UnknownOp,
    Exception,
    Unavailable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadJson => "BadJSON",
            ErrorCode::BadVersion => "BadVersion",
            ErrorCode::BadArgs => "BadArgs",
            ErrorCode::UnknownOp => "UnknownOp",
            ErrorCode::Exception => "Exception",
            ErrorCode::Unavailable => "Unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub v: u64,
    /// Correlation id, echoed unchanged when present.
    pub id: Option<Value>,
    pub op: String,
    pub args: Value,
}

/// A rejected line, with enough context to build the error reply.
#[derive(Debug, Clone, PartialEq)]
pub struct WireError {
    pub code: ErrorCode,
    pub msg: String,
    /// Version to echo (the request's, when it parsed that far).
    pub v: u64,
    pub id: Option<Value>,
}

impl Request {
    /// Parses and validates one line.
    pub fn parse_line(line: &str) -> Result<Request, WireError> {
        let value: Value = serde_json::from_str(line).map_err(|_| WireError {
            code: ErrorCode::BadJson,
            msg: "parse failed".to_string(),
            v: PROTOCOL_VERSION,
            id: None,
        })?;

        let obj = value.as_object().ok_or_else(|| WireError {
            code: ErrorCode::BadJson,
            msg: "request must be an object".to_string(),
            v: PROTOCOL_VERSION,
            id: None,
        })?;

        let v = obj.get("v").and_then(|v| v.as_u64()).unwrap_or(0);
        let id = obj.get("id").cloned();

        if v != PROTOCOL_VERSION {
            return Err(WireError {
                code: ErrorCode::BadVersion,
                msg: format!("Only v={PROTOCOL_VERSION} supported"),
                v: if v > 0 { v } else { PROTOCOL_VERSION },
                id,
            });
        }

        let op = obj
            .get("op")
            .and_then(|op| op.as_str())
            .ok_or_else(|| WireError {
                code: ErrorCode::BadArgs,
                msg: "op required".to_string(),
                v,
                id: id.clone(),
            })?
            .to_string();

        let args = match obj.get("args") {
            None => json!({}),
            Some(args) if args.is_object() => args.clone(),
            Some(_) => {
                return Err(WireError {
                    code: ErrorCode::BadArgs,
                    msg: "args must be an object".to_string(),
                    v,
                    id,
                })
            }
        };

        Ok(Request { v, id, op, args })
    }
}

/// `{ ok: false, error: { code, msg } }`.
pub fn error_envelope(code: ErrorCode, msg: &str) -> Value {
    json!({
        "ok": false,
        "error": { "code": code.as_str(), "msg": msg },
    })
}

/// Stamps `v` (and `id` when present) onto a reply envelope.
pub fn attach_meta(envelope: Value, v: u64, id: Option<&Value>) -> Value {
    let mut obj = match envelope {
        Value::Object(obj) => obj,
        other => {
            let mut obj = serde_json::Map::new();
            obj.insert("ok".to_string(), json!(true));
            obj.insert("result".to_string(), other);
            obj
        }
    };
    obj.insert("v".to_string(), json!(v));
    if let Some(id) = id {
        obj.insert("id".to_string(), id.clone());
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_request() {
        let req = Request::parse_line(r#"{"v":1,"op":"ping"}"#).unwrap();
        assert_eq!(req.v, 1);
        assert_eq!(req.op, "ping");
        assert_eq!(req.args, json!({}));
        assert!(req.id.is_none());
    }

    #[test]
    fn test_parse_preserves_id_verbatim() {
        let req = Request::parse_line(r#"{"v":1,"id":"abc","op":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(json!("abc")));

        let req = Request::parse_line(r#"{"v":1,"id":17,"op":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(json!(17)));
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        let err = Request::parse_line("{nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadJson);

        let err = Request::parse_line("[1,2,3]").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadJson);
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        let err = Request::parse_line(r#"{"v":2,"op":"ping"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadVersion);
        assert_eq!(err.v, 2);

        let err = Request::parse_line(r#"{"op":"ping"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadVersion);
    }

    #[test]
    fn test_parse_requires_op() {
        let err = Request::parse_line(r#"{"v":1}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadArgs);
    }

    #[test]
    fn test_parse_rejects_non_object_args() {
        let err = Request::parse_line(r#"{"v":1,"op":"ping","args":[1]}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadArgs);
    }

    #[test]
    fn test_bad_version_error_keeps_id_for_echo() {
        let err = Request::parse_line(r#"{"v":3,"id":"x","op":"ping"}"#).unwrap_err();
        assert_eq!(err.id, Some(json!("x")));
    }

    #[test]
    fn test_attach_meta_to_ok_envelope() {
        let reply = attach_meta(json!({"ok": true, "result": "pong"}), 1, Some(&json!("abc")));
        assert_eq!(reply["v"], 1);
        assert_eq!(reply["id"], "abc");
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["result"], "pong");
    }

    #[test]
    fn test_attach_meta_wraps_non_object() {
        let reply = attach_meta(json!(42), 1, None);
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["result"], 42);
        assert!(reply.get("id").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = error_envelope(ErrorCode::UnknownOp, "nope");
        assert_eq!(envelope["ok"], false);
        assert_eq!(envelope["error"]["code"], "UnknownOp");
        assert_eq!(envelope["error"]["msg"], "nope");
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::BadJson.as_str(), "BadJSON");
        assert_eq!(ErrorCode::Exception.as_str(), "Exception");
    }
}
