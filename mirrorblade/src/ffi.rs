//! C ABI exports for embedding hosts.
//!
//! All returned strings are heap-owned; callers must release them with
//! [`mb_free_string`]. No call in this module panics across the
//! boundary: dispatch failures come back as `{"ok":false,"error":…}`.

use crate::bridge::{Bridge, BridgeOptions};
use serde_json::{json, Value};
use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

struct FfiInstance {
    runtime: tokio::runtime::Runtime,
    bridge: Arc<Bridge>,
}

static INSTANCE: Mutex<Option<FfiInstance>> = Mutex::new(None);

fn alloc_string(s: &str) -> *mut c_char {
    // NUL bytes cannot appear in serialized JSON output, but a handler
    // could echo one through a string; strip rather than fail.
    let cleaned: String = s.chars().filter(|c| *c != '\0').collect();
    match CString::new(cleaned) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

unsafe fn str_arg<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    CStr::from_ptr(ptr).to_str().unwrap_or("")
}

/// Initializes the sidecar under `host_root` (UTF-8 path; NULL means the
/// working directory). Returns 1 on success, 0 on failure or when
/// already initialized.
///
/// # Safety
///
/// `host_root` must be NULL or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mb_init(host_root: *const c_char) -> c_int {
    let root = {
        let s = str_arg(host_root);
        if s.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(s)
        }
    };

    let result = catch_unwind(|| {
        let mut guard = match INSTANCE.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_some() {
            return 0;
        }

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(_) => return 0,
        };

        let options = BridgeOptions::default().with_host_root(root);
        match runtime.block_on(Bridge::init(options)) {
            Ok(bridge) => {
                *guard = Some(FfiInstance { runtime, bridge });
                1
            }
            Err(_) => 0,
        }
    });
    result.unwrap_or(0)
}

/// Tears the sidecar down. Safe to call when never initialized.
#[no_mangle]
pub extern "C" fn mb_shutdown() {
    let _ = catch_unwind(|| {
        let instance = {
            let mut guard = match INSTANCE.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(instance) = instance {
            instance
                .runtime
                .block_on(instance.bridge.shutdown());
            // Runtime drops here, joining its workers.
        }
    });
}

/// Library version as an allocated string.
#[no_mangle]
pub extern "C" fn mb_version() -> *mut c_char {
    alloc_string(crate::VERSION)
}

/// Liveness probe; always 1.
#[no_mangle]
pub extern "C" fn mb_ping() -> c_int {
    1
}

/// Dispatches `op` with JSON-encoded `args_json` (NULL or empty means
/// `{}`). Returns an allocated JSON reply; never throws.
///
/// # Safety
///
/// Both pointers must be NULL or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn mb_dispatch_json(
    op: *const c_char,
    args_json: *const c_char,
) -> *mut c_char {
    let op = str_arg(op).to_string();
    let args_text = str_arg(args_json).to_string();

    let reply = catch_unwind(AssertUnwindSafe(|| dispatch_inner(&op, &args_text)))
        .unwrap_or_else(|_| json!({ "ok": false, "error": "internal panic" }));

    alloc_string(&reply.to_string())
}

fn dispatch_inner(op: &str, args_text: &str) -> Value {
    let args = if args_text.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str::<Value>(args_text) {
            Ok(value) if value.is_object() => value,
            Ok(_) => json!({}),
            Err(e) => {
                return json!({ "ok": false, "error": format!("args parse: {e}") });
            }
        }
    };

    let guard = match INSTANCE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_ref() {
        Some(instance) => instance.bridge.dispatch(op, &args),
        None => json!({ "ok": false, "error": "bridge not initialized" }),
    }
}

/// Releases a string returned by this library. NULL is ignored.
///
/// # Safety
///
/// `s` must be NULL or a pointer previously returned by this library
/// and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn mb_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_is_constant() {
        assert_eq!(mb_ping(), 1);
    }

    #[test]
    fn test_version_round_trips() {
        let ptr = mb_version();
        assert!(!ptr.is_null());
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        assert_eq!(text, crate::VERSION);
        unsafe { mb_free_string(ptr) };
    }

    #[test]
    fn test_dispatch_without_init_reports_error() {
        let op = CString::new("ping").unwrap();
        let ptr = unsafe { mb_dispatch_json(op.as_ptr(), std::ptr::null()) };
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        unsafe { mb_free_string(ptr) };

        let reply: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reply["ok"], false);
    }

    #[test]
    fn test_bad_args_json_reports_parse_error() {
        let reply = dispatch_inner("ping", "{broken");
        assert_eq!(reply["ok"], false);
        assert!(reply["error"].as_str().unwrap().contains("args parse"));
    }

    #[test]
    fn test_free_null_is_safe() {
        unsafe { mb_free_string(std::ptr::null_mut()) };
    }

    #[test]
    fn test_alloc_string_strips_nul() {
        let ptr = alloc_string("a\0b");
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        assert_eq!(text, "ab");
        unsafe { mb_free_string(ptr) };
    }
}
