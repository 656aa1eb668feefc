//! Key-value persistence for staged mappings and terminal scripts.
//!
//! Values are JSON documents stored under fixed keys. A backend only has to
//! get/put strings; encoding and tolerance of bad data live here so every
//! backend degrades the same way.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

use crate::mapping::{DocumentId, StagedMapping};
use crate::terminal::TerminalScript;

pub const MAPPINGS_KEY: &str = "ghostkeys.mappings";
pub const TERMINAL_SCRIPTS_KEY: &str = "ghostkeys.terminalScripts";
pub const TERMINAL_PROMPT_KEY: &str = "ghostkeys.terminalPrompt";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("settings io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("settings backend rejected write for key {0}")]
    Rejected(String),
}

pub trait SettingsBackend: Send {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn put(&mut self, key: &str, value: String) -> Result<(), PersistError>;
}

/// All keys in one JSON object on disk, rewritten atomically on every put.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileBackend {
    /// Opens (or prepares) the settings file. A missing file is an empty store;
    /// an unreadable or corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(target: "state.persist", path = %path.display(), error = %e, "settings_file_corrupt");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(target: "state.persist", path = %path.display(), error = %e, "settings_file_unreadable");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self) -> Result<(), PersistError> {
        let io_err = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl SettingsBackend for JsonFileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        self.values.insert(key.to_string(), value);
        self.write_out()
    }
}

/// In-memory backend. Clones share storage so a test can reopen a store over
/// the same data, or make writes fail to exercise degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.raw(key))
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        if *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(PersistError::Rejected(key.to_string()));
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingRecord {
    staged_text: String,
    #[serde(default)]
    cursor: usize,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptRecord {
    id: String,
    #[serde(default)]
    label: String,
    transcript: String,
    #[serde(default)]
    delay_ms: u64,
}

pub(crate) fn encode_mappings(
    mappings: &BTreeMap<DocumentId, StagedMapping>,
) -> Result<String, PersistError> {
    let records: BTreeMap<&str, MappingRecord> = mappings
        .iter()
        .map(|(id, m)| {
            (
                id.as_str(),
                MappingRecord {
                    staged_text: m.staged_text(),
                    cursor: m.cursor(),
                    label: m.label().to_string(),
                },
            )
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

/// Entries with empty text are dropped; cursors beyond the text are clamped.
pub(crate) fn decode_mappings(raw: &str) -> BTreeMap<DocumentId, StagedMapping> {
    let records: BTreeMap<String, MappingRecord> = match serde_json::from_str(raw) {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "state.persist", key = MAPPINGS_KEY, error = %e, "stored_value_corrupt");
            return BTreeMap::new();
        }
    };
    records
        .into_iter()
        .filter_map(|(id, r)| {
            StagedMapping::restored(&r.staged_text, r.cursor, r.label)
                .map(|m| (DocumentId::new(id), m))
        })
        .collect()
}

pub(crate) fn encode_scripts(scripts: &[TerminalScript]) -> Result<String, PersistError> {
    let records: Vec<ScriptRecord> = scripts
        .iter()
        .map(|s| ScriptRecord {
            id: s.id().to_string(),
            label: s.label().to_string(),
            transcript: s.transcript_text(),
            delay_ms: s.delay_ms(),
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

pub(crate) fn decode_scripts(raw: &str) -> Vec<TerminalScript> {
    match serde_json::from_str::<Vec<ScriptRecord>>(raw) {
        Ok(records) => records
            .into_iter()
            .map(|r| TerminalScript::from_parts(r.id, r.label, &r.transcript, r.delay_ms))
            .collect(),
        Err(e) => {
            warn!(target: "state.persist", key = TERMINAL_SCRIPTS_KEY, error = %e, "stored_value_corrupt");
            Vec::new()
        }
    }
}

pub(crate) fn encode_prompt(prompt: &str) -> Result<String, PersistError> {
    Ok(serde_json::to_string(prompt)?)
}

pub(crate) fn decode_prompt(raw: &str) -> Option<String> {
    match serde_json::from_str::<String>(raw) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(target: "state.persist", key = TERMINAL_PROMPT_KEY, error = %e, "stored_value_corrupt");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_records_use_camel_case() {
        let mut map = BTreeMap::new();
        map.insert(
            DocumentId::new("/tmp/a.rs"),
            StagedMapping::restored("hello", 2, "demo".into()).unwrap(),
        );
        let json = encode_mappings(&map).unwrap();
        assert!(json.contains("\"stagedText\":\"hello\""));
        assert!(json.contains("\"cursor\":2"));
        let back = decode_mappings(&json);
        assert_eq!(back.len(), 1);
        assert_eq!(back[&DocumentId::new("/tmp/a.rs")].cursor(), 2);
    }

    #[test]
    fn decode_clamps_and_drops_bad_records() {
        let raw = r#"{"a":{"stagedText":"abc","cursor":99},"b":{"stagedText":"   "}}"#;
        let back = decode_mappings(raw);
        assert_eq!(back.len(), 1);
        let a = &back[&DocumentId::new("a")];
        assert_eq!(a.cursor(), 3);
        assert!(a.is_complete());
    }

    #[test]
    fn corrupt_values_degrade_to_empty() {
        assert!(decode_mappings("not json").is_empty());
        assert!(decode_scripts("{").is_empty());
        assert_eq!(decode_prompt("42"), None);
    }

    #[test]
    fn script_records_keep_delay_and_label() {
        let s = TerminalScript::from_parts("x".into(), "build".into(), "cargo b\n", 15);
        let json = encode_scripts(std::slice::from_ref(&s)).unwrap();
        assert!(json.contains("\"delayMs\":15"));
        assert_eq!(decode_scripts(&json), vec![s]);
    }

    #[test]
    fn json_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut backend = JsonFileBackend::open(&path);
        backend.put(TERMINAL_PROMPT_KEY, "\"> \"".into()).unwrap();
        let reopened = JsonFileBackend::open(&path);
        assert_eq!(
            reopened.get(TERMINAL_PROMPT_KEY).unwrap().as_deref(),
            Some("\"> \"")
        );
    }

    #[test]
    fn json_file_backend_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{{{").unwrap();
        let backend = JsonFileBackend::open(&path);
        assert_eq!(backend.get(MAPPINGS_KEY).unwrap(), None);
    }

    #[test]
    fn memory_backend_can_reject_writes() {
        let mut backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        assert!(matches!(
            backend.put("k", "v".into()),
            Err(PersistError::Rejected(_))
        ));
        backend.set_fail_writes(false);
        backend.put("k", "v".into()).unwrap();
        assert_eq!(backend.raw("k").as_deref(), Some("v"));
    }
}
