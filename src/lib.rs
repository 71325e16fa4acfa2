pub mod agent_core;
pub mod commands;
pub mod inference;
pub mod mcp_client;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::{Path, PathBuf};

/// Return the platform-standard data directory for mcpmux.
///
/// - macOS: `~/Library/Application Support/mcpmux/`
/// - Windows: `{FOLDERID_RoamingAppData}\mcpmux\`
/// - Linux: `$XDG_DATA_HOME/mcpmux/` (fallback `~/.local/share/mcpmux/`)
///
/// Falls back to `~/.mcpmux/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("mcpmux");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcpmux")
}

// ─── Logging ─────────────────────────────────────────────────────────────────

/// Where log output goes and how verbose it is.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Log to stderr instead of the rotated log file.
    pub to_stderr: bool,
    /// Number of `-v` flags: 0 = info, 1 = debug, 2+ = trace.
    pub verbosity: u8,
}

impl LogOptions {
    fn default_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "mcpmux=info,warn",
            1 => "mcpmux=debug,info",
            _ => "mcpmux=trace,debug",
        }
    }
}

/// Initialize the tracing subscriber.
///
/// By default logs go to `data_dir()/mcpmux.log` so the interactive prompt
/// stays clean:
/// 1. Rotates existing logs (mcpmux.log → mcpmux.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh mcpmux.log with a line-flushing writer.
/// 3. Logs a startup banner with the log path.
///
/// `RUST_LOG` overrides the verbosity-derived filter. Returns the log file
/// path, or `None` when logging to stderr.
pub fn init_tracing(options: &LogOptions) -> std::io::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_filter()));

    if options.to_stderr {
        fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
        return Ok(None);
    }

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("mcpmux.log");

    // Rotate: mcpmux.log.2 → .3, .1 → .2, mcpmux.log → .1
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== mcpmux starting ==="
    );

    Ok(Some(log_path))
}

/// Rotate log files: `mcpmux.log` → `mcpmux.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// Each log line is on disk immediately, even if the process is killed
/// while a backend hangs.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── .env ────────────────────────────────────────────────────────────────────

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped;
/// surrounding quotes on values are stripped.
pub fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Load a `.env` file into the process environment.
///
/// Variables already set in the environment win. Returns the number of
/// variables applied; a missing file applies none.
pub fn load_dotenv(path: &Path) -> usize {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return 0;
    };

    let mut applied = 0;
    for (key, value) in parse_dotenv(&contents) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied += 1;
        }
    }
    applied
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# provider\nOPENROUTER_API_KEY=\"sk-123\"\n\nexport YOUR_SITE_NAME='demo'\nnot a pair\n=orphan\n",
        );
        assert_eq!(
            vars,
            vec![
                ("OPENROUTER_API_KEY".to_string(), "sk-123".to_string()),
                ("YOUR_SITE_NAME".to_string(), "demo".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_dotenv_keeps_existing() {
        std::env::set_var("__MCPMUX_DOTENV_EXISTING__", "kept");
        std::env::remove_var("__MCPMUX_DOTENV_NEW__");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "__MCPMUX_DOTENV_EXISTING__=replaced").unwrap();
        writeln!(file, "__MCPMUX_DOTENV_NEW__=fresh").unwrap();

        assert_eq!(load_dotenv(file.path()), 1);
        assert_eq!(std::env::var("__MCPMUX_DOTENV_EXISTING__").unwrap(), "kept");
        assert_eq!(std::env::var("__MCPMUX_DOTENV_NEW__").unwrap(), "fresh");

        std::env::remove_var("__MCPMUX_DOTENV_EXISTING__");
        std::env::remove_var("__MCPMUX_DOTENV_NEW__");
    }

    #[test]
    fn test_load_dotenv_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_dotenv(&dir.path().join(".env")), 0);
    }

    #[test]
    fn test_rotate_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("mcpmux.log");
        std::fs::write(&base, "current").unwrap();
        std::fs::write(dir.path().join("mcpmux.log.1"), "older").unwrap();

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mcpmux.log.1")).unwrap(),
            "current"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mcpmux.log.2")).unwrap(),
            "older"
        );
    }

    #[test]
    fn test_default_filter_by_verbosity() {
        let opts = |verbosity| LogOptions {
            to_stderr: true,
            verbosity,
        };
        assert_eq!(opts(0).default_filter(), "mcpmux=info,warn");
        assert_eq!(opts(1).default_filter(), "mcpmux=debug,info");
        assert_eq!(opts(5).default_filter(), "mcpmux=trace,debug");
    }
}
