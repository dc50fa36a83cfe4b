//! Endpoint identifier mapping.
//!
//! The config names the transport endpoint with an OS-flavored pipe
//! string (historically `\\.\pipe\MirrorBladeBridge-v1`). On this
//! platform the equivalent local-only endpoint is a Unix domain socket,
//! so the pipe name is reduced to its basename and mapped to a socket
//! path under the system temp directory.

use std::path::PathBuf;

/// Reduces a pipe name to a filesystem-safe token: everything after the
/// last path separator, with disallowed characters replaced by `_`.
pub fn sanitize_pipe_name(pipe_name: &str) -> String {
    let base = pipe_name
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(pipe_name)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "MirrorBladeBridge".to_string()
    } else {
        cleaned
    }
}

/// Resolves the socket path for a configured pipe name.
pub fn socket_path(pipe_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}.sock", sanitize_pipe_name(pipe_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_pipe_name_reduces_to_basename() {
        assert_eq!(
            sanitize_pipe_name(r"\\.\pipe\MirrorBladeBridge-v1"),
            "MirrorBladeBridge-v1"
        );
    }

    #[test]
    fn test_plain_name_passes_through() {
        assert_eq!(sanitize_pipe_name("MirrorBladeBridge-v1"), "MirrorBladeBridge-v1");
    }

    #[test]
    fn test_hostile_characters_are_replaced() {
        assert_eq!(sanitize_pipe_name("a b:c"), "a_b_c");
    }

    #[test]
    fn test_empty_name_gets_default() {
        assert_eq!(sanitize_pipe_name(""), "MirrorBladeBridge");
        assert_eq!(sanitize_pipe_name(r"\\.\pipe\"), "MirrorBladeBridge");
    }

    #[test]
    fn test_socket_path_has_sock_suffix() {
        let path = socket_path("MyPipe");
        assert!(path.to_string_lossy().ends_with("MyPipe.sock"));
    }
}
