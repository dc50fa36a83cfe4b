//! Argument extraction helpers for operation handlers.

use super::OpError;
use serde_json::Value;

pub fn opt_f64(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub fn opt_u64(args: &Value, key: &str, default: u64) -> u64 {
    args.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}

pub fn opt_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn opt_str<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub fn require_f64(args: &Value, key: &str) -> Result<f64, OpError> {
    args.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| OpError::BadArgs(format!("args.{key} required")))
}

pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, OpError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| OpError::BadArgs(format!("args.{key} required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_accessors_fall_back() {
        let args = json!({"f": 1.5, "b": true, "s": "x", "n": 7});
        assert_eq!(opt_f64(&args, "f", 0.0), 1.5);
        assert_eq!(opt_f64(&args, "missing", 2.0), 2.0);
        assert_eq!(opt_u64(&args, "n", 0), 7);
        assert!(opt_bool(&args, "b", false));
        assert_eq!(opt_str(&args, "s", "d"), "x");
        assert_eq!(opt_str(&args, "missing", "d"), "d");
    }

    #[test]
    fn test_wrong_types_fall_back() {
        let args = json!({"f": "not a number"});
        assert_eq!(opt_f64(&args, "f", 3.0), 3.0);
    }

    #[test]
    fn test_required_accessors_error() {
        let args = json!({"x": 1.0});
        assert_eq!(require_f64(&args, "x").unwrap(), 1.0);
        assert!(matches!(
            require_f64(&args, "y"),
            Err(OpError::BadArgs(_))
        ));
        assert!(matches!(
            require_str(&args, "x"),
            Err(OpError::BadArgs(_))
        ));
    }

    #[test]
    fn test_integers_read_as_f64() {
        let args = json!({"n": 3});
        assert_eq!(require_f64(&args, "n").unwrap(), 3.0);
    }
}
