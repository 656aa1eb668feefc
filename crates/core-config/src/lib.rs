//! Configuration loading and parsing.
//!
//! Parses `ghostkeys.toml` (or an override path provided by the binary).
//! Every section and field is optional; absent values take the defaults
//! below. Unknown fields are ignored so older binaries tolerate newer files.
//! A file that fails to parse yields the default configuration rather than
//! an error: a presenter must never lose the session to a typo.
//!
//! Interval fields are clamped to at least 1 by `Config::normalize`, which
//! logs under the `config` target whenever it changes a value.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PERSIST_EVERY: usize = 50;
pub const DEFAULT_REFRESH_EVERY: usize = 20;
pub const DEFAULT_REWIND_REFRESH_EVERY: usize = 10;
pub const DEFAULT_PROMPT: &str = "PS C:\\> ";
pub const DEFAULT_LOG_FILE: &str = "ghostkeys.log";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_enabled_on_start")]
    pub enabled_on_start: bool,
    #[serde(default = "EngineConfig::default_persist_every")]
    pub persist_every: usize,
    #[serde(default = "EngineConfig::default_refresh_every")]
    pub refresh_every: usize,
    #[serde(default = "EngineConfig::default_rewind_refresh_every")]
    pub rewind_refresh_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: Self::default_enabled_on_start(),
            persist_every: Self::default_persist_every(),
            refresh_every: Self::default_refresh_every(),
            rewind_refresh_every: Self::default_rewind_refresh_every(),
        }
    }
}

impl EngineConfig {
    const fn default_enabled_on_start() -> bool {
        true
    }
    const fn default_persist_every() -> usize {
        DEFAULT_PERSIST_EVERY
    }
    const fn default_refresh_every() -> usize {
        DEFAULT_REFRESH_EVERY
    }
    const fn default_rewind_refresh_every() -> usize {
        DEFAULT_REWIND_REFRESH_EVERY
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Settings file; `None` means the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Explicit path, else `<data_dir>/ghostkeys/state.json`, else a relative file.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(p) = &self.path {
            return p.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("ghostkeys").join("state.json"))
            .unwrap_or_else(|| PathBuf::from("ghostkeys-state.json"))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    #[serde(default = "TerminalConfig::default_prompt")]
    pub default_prompt: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_prompt: Self::default_prompt(),
        }
    }
}

impl TerminalConfig {
    fn default_prompt() -> String {
        DEFAULT_PROMPT.to_string()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Self::default_file(),
        }
    }
}

impl LoggingConfig {
    fn default_file() -> PathBuf {
        PathBuf::from(DEFAULT_LOG_FILE)
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub source: Option<PathBuf>,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("ghostkeys.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("ghostkeys").join("ghostkeys.toml");
    }
    PathBuf::from("ghostkeys.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default().normalize());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
            source: Some(path),
        }
        .normalize()),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default().normalize())
        }
    }
}

impl Config {
    /// Clamp batching intervals to at least 1 step.
    pub fn normalize(mut self) -> Self {
        let engine = &mut self.file.engine;
        for (field, value) in [
            ("persist_every", &mut engine.persist_every),
            ("refresh_every", &mut engine.refresh_every),
            ("rewind_refresh_every", &mut engine.rewind_refresh_every),
        ] {
            if *value == 0 {
                info!(target: "config", field, raw = 0, clamped = 1, "interval_clamped");
                *value = 1;
            }
        }
        if self.file.terminal.default_prompt.is_empty() {
            self.file.terminal.default_prompt = DEFAULT_PROMPT.to_string();
        }
        self
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.file.engine
    }

    pub fn storage_path(&self) -> PathBuf {
        self.file.storage.resolved_path()
    }

    pub fn default_prompt(&self) -> &str {
        &self.file.terminal.default_prompt
    }

    pub fn log_file(&self) -> &PathBuf {
        &self.file.logging.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.engine().persist_every, 50);
        assert_eq!(cfg.engine().refresh_every, 20);
        assert_eq!(cfg.engine().rewind_refresh_every, 10);
        assert!(cfg.engine().enabled_on_start);
        assert_eq!(cfg.default_prompt(), "PS C:\\> ");
        assert_eq!(cfg.log_file(), &PathBuf::from("ghostkeys.log"));
        assert!(cfg.source.is_none());
    }

    #[test]
    fn parses_engine_and_terminal_sections() {
        let tmp = write_config(
            "[engine]\nenabled_on_start = false\npersist_every = 5\n[terminal]\ndefault_prompt = \"$ \"\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(!cfg.engine().enabled_on_start);
        assert_eq!(cfg.engine().persist_every, 5);
        assert_eq!(cfg.engine().refresh_every, 20);
        assert_eq!(cfg.default_prompt(), "$ ");
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn storage_path_override() {
        let tmp = write_config("[storage]\npath = \"/tmp/gk/state.json\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.storage_path(), PathBuf::from("/tmp/gk/state.json"));
    }

    #[test]
    fn default_storage_path_is_namespaced() {
        let cfg = Config::default();
        assert!(cfg.storage_path().ends_with("state.json"));
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = write_config("[engine\npersist_every = 3");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.engine().persist_every, 50);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn empty_prompt_uses_default() {
        let tmp = write_config("[terminal]\ndefault_prompt = \"\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.default_prompt(), DEFAULT_PROMPT);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[engine]\npersist_every = 0\nrefresh_every = 0\n");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(tmp.path().to_path_buf())).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("interval_clamped"));
        assert_eq!(cfg.engine().persist_every, 1);
        assert_eq!(cfg.engine().refresh_every, 1);
        assert_eq!(cfg.engine().rewind_refresh_every, 10);
    }
}
