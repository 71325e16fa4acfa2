//! Backend configuration loading.
//!
//! Reads an `mcpServers` JSON file and resolves environment variables
//! inside its string values.
//! Whole-file problems (unreadable, not JSON, wrong top-level shape) are fatal;
//! per-entry problems are left for [`ServerEntry::validate`] so one bad
//! backend never hides the others.
//!
//! [`ServerEntry::validate`]: super::types::ServerEntry::validate

use std::path::Path;

use super::errors::ConfigError;
use super::types::{McpServersConfig, ServerEntry};

/// Config file looked for in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "mcp_servers.json";

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load and parse a backend configuration file.
///
/// `${VAR_NAME}` and `${VAR_NAME:-default}` are resolved inside string
/// values after parsing, so substituted text is never read as JSON.
pub fn load_servers_config(path: &Path) -> Result<McpServersConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_servers_config(&raw).map_err(|reason| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    })
}

fn parse_servers_config(raw: &str) -> Result<McpServersConfig, String> {
    let mut value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if !value.is_object() {
        return Err("top level must be a JSON object".into());
    }
    interpolate_strings(&mut value);

    serde_json::from_value(value).map_err(|e| format!("invalid mcpServers section: {e}"))
}

/// Build config entries from server script paths given on the command line.
///
/// Returns `(backend_id, entry)` pairs; a path with an unsupported extension
/// comes back as an `Err` for that path alone.
pub fn entries_from_scripts<'a>(
    paths: impl IntoIterator<Item = &'a str>,
) -> Vec<Result<(String, ServerEntry), super::errors::ConnectError>> {
    paths.into_iter().map(ServerEntry::for_script).collect()
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Interpolate every string leaf of a parsed document. Keys are left as-is.
fn interpolate_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) if s.contains("${") => *s = interpolate_env_vars(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(interpolate_strings),
        serde_json::Value::Object(map) => map.values_mut().for_each(interpolate_strings),
        _ => {}
    }
}

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => {
            std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
        }
        None => std::env::var(expr).unwrap_or_else(|_| {
            tracing::warn!(var = %expr, "config references unset environment variable");
            String::new()
        }),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = write_config(
            r#"{"mcpServers": {"weather": {"command": "python", "args": ["weather.py"]}}}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.servers["weather"].command.as_deref(), Some("python"));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_servers_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_is_parse_error() {
        let file = write_config("{ not json");
        let err = load_servers_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let file = write_config("[1, 2, 3]");
        let err = load_servers_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_loaded_but_empty_is_ok() {
        let file = write_config("{}");
        assert!(load_servers_config(file.path()).unwrap().servers.is_empty());

        let file = write_config(r#"{"mcpServers": {}}"#);
        assert!(load_servers_config(file.path()).unwrap().servers.is_empty());
    }

    #[test]
    fn test_bad_entry_survives_parsing() {
        // Left for per-entry validation, not fatal here.
        let file = write_config(
            r#"{"mcpServers": {
                "ok": {"command": "node", "args": ["a.js"]},
                "no_command": {"args": []},
                "bad_args": {"command": "python", "args": "x.py"}
            }}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        assert_eq!(cfg.servers.len(), 3);
        assert!(cfg.servers["no_command"].validate("no_command").is_err());
        assert!(cfg.servers["bad_args"].validate("bad_args").is_err());
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__MCPMUX_TEST_UNSET_VAR__");
        let result = interpolate_env_vars("${__MCPMUX_TEST_UNSET_VAR__:-/fallback/path}");
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__MCPMUX_TEST_SET_VAR__", "/custom/path");
        let result = interpolate_env_vars("${__MCPMUX_TEST_SET_VAR__:-/fallback/path}");
        assert_eq!(result, "/custom/path");
        std::env::remove_var("__MCPMUX_TEST_SET_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_interpolated_config() {
        std::env::set_var("__MCPMUX_TEST_SERVER_DIR__", "/opt/servers");
        let file = write_config(
            r#"{"mcpServers": {"fs": {"command": "node", "args": ["${__MCPMUX_TEST_SERVER_DIR__}/fs.js"]}}}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        let config = cfg.servers["fs"].validate("fs").unwrap();
        assert_eq!(config.args, vec!["/opt/servers/fs.js"]);
        std::env::remove_var("__MCPMUX_TEST_SERVER_DIR__");
    }

    #[test]
    fn test_interpolated_value_with_backslash_and_quote() {
        std::env::set_var("__MCPMUX_TEST_WIN_DIR__", r#"C:\tools\srv "x""#);
        let file = write_config(
            r#"{"mcpServers": {
                "win": {"command": "node", "args": ["${__MCPMUX_TEST_WIN_DIR__}"]},
                "other": {"command": "python", "args": ["b.py"]}
            }}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        std::env::remove_var("__MCPMUX_TEST_WIN_DIR__");

        assert_eq!(cfg.servers.len(), 2);
        let config = cfg.servers["win"].validate("win").unwrap();
        assert_eq!(config.args, vec![r#"C:\tools\srv "x""#]);
    }

    #[test]
    fn test_interpolated_value_cannot_add_entries() {
        std::env::set_var(
            "__MCPMUX_TEST_INJECT__",
            r#"a.py"]}, "evil": {"command": "sh", "args": ["x"#,
        );
        let file = write_config(
            r#"{"mcpServers": {"ok": {"command": "python", "args": ["${__MCPMUX_TEST_INJECT__}"]}}}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        std::env::remove_var("__MCPMUX_TEST_INJECT__");

        assert_eq!(cfg.servers.keys().collect::<Vec<_>>(), vec!["ok"]);
    }

    #[test]
    fn test_mistyped_entry_does_not_fail_the_file() {
        let file = write_config(
            r#"{"mcpServers": {
                "good": {"command": "python", "args": ["a.py"]},
                "bad": {"command": 42}
            }}"#,
        );
        let cfg = load_servers_config(file.path()).unwrap();
        assert!(cfg.servers["good"].validate("good").is_ok());
        assert!(cfg.servers["bad"].validate("bad").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/servers");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/servers"));
    }

    #[test]
    fn test_entries_from_scripts() {
        let entries = entries_from_scripts(["weather.py", "notes.rb"]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap().0, "weather");
        assert!(entries[1].is_err());
    }
}
