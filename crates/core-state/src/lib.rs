//! Staged script store: per-document staged text with a reveal cursor, the
//! terminal script list, and their durable persistence.
//!
//! The store is plain data plus accessors. Deciding *when* a mapping advances
//! belongs to the engine; the store only guarantees the cursor invariant
//! (`cursor <= len`) and that progress reaches the backend at least every
//! `persist_every` steps. Structural changes (stage, reset, remove, clear)
//! and completion are written through immediately.
//!
//! Every mutation goes through [`StoreHandle::with`], a closure over the one
//! lock. Callers never hold the guard across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub mod gate;
pub mod mapping;
pub mod persist;
pub mod summary;
pub mod terminal;

pub use gate::Gate;
pub use mapping::{Advance, DocumentId, StagedMapping};
pub use persist::{JsonFileBackend, MemoryBackend, PersistError, SettingsBackend};
pub use summary::{MappingListing, MappingSummary, ScriptListing, StatusLine};
pub use terminal::{Reveal, TerminalScript, TerminalScripts};

use persist::{MAPPINGS_KEY, TERMINAL_PROMPT_KEY, TERMINAL_SCRIPTS_KEY};

pub const DEFAULT_PERSIST_EVERY: usize = 50;
pub const DEFAULT_TERMINAL_PROMPT: &str = "PS C:\\> ";

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Cursor steps between durable writes. Zero is treated as one.
    pub persist_every: usize,
    /// Prompt used when none is stored or an empty one is set.
    pub default_prompt: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            persist_every: DEFAULT_PERSIST_EVERY,
            default_prompt: DEFAULT_TERMINAL_PROMPT.to_string(),
        }
    }
}

pub struct ScriptStore {
    mappings: BTreeMap<DocumentId, StagedMapping>,
    terminal: TerminalScripts,
    backend: Box<dyn SettingsBackend>,
    persist_every: usize,
    default_prompt: String,
    unsaved_steps: usize,
}

impl std::fmt::Debug for ScriptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptStore")
            .field("mappings", &self.mappings.len())
            .field("scripts", &self.terminal.scripts().len())
            .field("unsaved_steps", &self.unsaved_steps)
            .finish()
    }
}

impl ScriptStore {
    /// Loads whatever the backend holds. Unreadable or corrupt keys load as
    /// empty; opening never fails.
    pub fn open(backend: Box<dyn SettingsBackend>, options: StoreOptions) -> Self {
        let read = |key: &str| match backend.get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "state.persist", key, error = %e, "settings_read_failed");
                None
            }
        };
        let mappings = read(MAPPINGS_KEY)
            .map(|raw| persist::decode_mappings(&raw))
            .unwrap_or_default();
        let scripts = read(TERMINAL_SCRIPTS_KEY)
            .map(|raw| persist::decode_scripts(&raw))
            .unwrap_or_default();
        let prompt = read(TERMINAL_PROMPT_KEY)
            .and_then(|raw| persist::decode_prompt(&raw))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| options.default_prompt.clone());
        info!(
            target: "state.store",
            mappings = mappings.len(),
            scripts = scripts.len(),
            "store_loaded"
        );
        Self {
            mappings,
            terminal: TerminalScripts::restored(scripts, prompt),
            backend,
            persist_every: options.persist_every.max(1),
            default_prompt: options.default_prompt,
            unsaved_steps: 0,
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryBackend::new()), StoreOptions::default())
    }

    // ---- staged mappings -------------------------------------------------

    /// Replaces any mapping for `id` with a fresh one at cursor 0. Returns
    /// false (and changes nothing) when `text` is blank.
    pub fn stage(&mut self, id: &DocumentId, text: &str, label: impl Into<String>) -> bool {
        let Some(mapping) = StagedMapping::new(text, label) else {
            debug!(target: "state.store", doc = %id.display_name(), "stage_rejected_blank");
            return false;
        };
        info!(
            target: "state.store",
            doc = %id.display_name(),
            len = mapping.len(),
            "staged"
        );
        self.mappings.insert(id.clone(), mapping);
        self.persist_mappings();
        true
    }

    pub fn get(&self, id: &DocumentId) -> Option<&StagedMapping> {
        self.mappings.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.mappings.contains_key(id)
    }

    /// `(cursor, len)` for the gate.
    pub fn progress(&self, id: &DocumentId) -> Option<(usize, usize)> {
        self.mappings.get(id).map(|m| (m.cursor(), m.len()))
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&DocumentId, &StagedMapping)> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// `Advance::Boundary` when unmapped or already at the end.
    pub fn advance(&mut self, id: &DocumentId) -> Advance {
        let Some(mapping) = self.mappings.get_mut(id) else {
            return Advance::Boundary;
        };
        let step = mapping.advance();
        match step {
            Advance::Stepped { cursor, len } if cursor == len => {
                debug!(target: "state.persist", doc = %id.display_name(), len, "completion_write");
                self.persist_mappings();
            }
            Advance::Stepped { .. } => self.note_step(),
            Advance::Boundary => {}
        }
        step
    }

    /// New cursor, or `None` when unmapped.
    pub fn rewind(&mut self, id: &DocumentId) -> Option<usize> {
        let mapping = self.mappings.get_mut(id)?;
        let before = mapping.cursor();
        let after = mapping.rewind();
        if after != before {
            self.note_step();
        }
        Some(after)
    }

    /// Cursor to 0 and completion re-armed. False when unmapped.
    pub fn reset(&mut self, id: &DocumentId) -> bool {
        let Some(mapping) = self.mappings.get_mut(id) else {
            return false;
        };
        mapping.reset();
        info!(target: "state.store", doc = %id.display_name(), "progress_reset");
        self.persist_mappings();
        true
    }

    pub fn remove(&mut self, id: &DocumentId) -> bool {
        if self.mappings.remove(id).is_none() {
            return false;
        }
        info!(target: "state.store", doc = %id.display_name(), "mapping_removed");
        self.persist_mappings();
        true
    }

    pub fn clear(&mut self) {
        let count = self.mappings.len();
        self.mappings.clear();
        info!(target: "state.store", count, "mappings_cleared");
        self.persist_mappings();
    }

    /// Force-sets the cursor, clamped to `[0, len]`. `None` when unmapped.
    pub fn resync_to(&mut self, id: &DocumentId, index: usize) -> Option<usize> {
        let mapping = self.mappings.get_mut(id)?;
        let before = mapping.cursor();
        let after = mapping.resync_to(index);
        if after != before {
            debug!(target: "state.store", doc = %id.display_name(), before, after, "cursor_resynced");
            self.note_step();
        }
        Some(after)
    }

    /// True exactly once per staging lifetime, when the mapping is complete.
    /// The first signal is written through.
    pub fn mark_completed(&mut self, id: &DocumentId) -> bool {
        let fired = self
            .mappings
            .get_mut(id)
            .is_some_and(|m| m.mark_completed());
        if fired {
            self.persist_mappings();
        }
        fired
    }

    pub fn summary(&self, id: &DocumentId) -> Option<MappingSummary> {
        self.mappings.get(id).map(|m| MappingSummary {
            document: id.clone(),
            label: m.label().to_string(),
            cursor: m.cursor(),
            total: m.len(),
        })
    }

    pub fn listings(&self) -> Vec<MappingListing> {
        self.mappings
            .iter()
            .map(|(id, m)| MappingListing {
                summary: MappingSummary {
                    document: id.clone(),
                    label: m.label().to_string(),
                    cursor: m.cursor(),
                    total: m.len(),
                },
                preview: summary::preview(&m.staged_text(), summary::MAPPING_PREVIEW_CHARS),
            })
            .collect()
    }

    // ---- terminal scripts ------------------------------------------------

    pub fn terminal(&self) -> &TerminalScripts {
        &self.terminal
    }

    /// Reveal cursors are session state and are not persisted.
    pub fn terminal_mut(&mut self) -> &mut TerminalScripts {
        &mut self.terminal
    }

    /// Appends a script and returns its generated id. Blank transcripts are
    /// rejected.
    pub fn add_terminal_script(
        &mut self,
        transcript: &str,
        label: Option<String>,
        delay_ms: u64,
    ) -> Option<String> {
        if transcript.trim().is_empty() {
            return None;
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.terminal.push(TerminalScript::from_parts(
            id.clone(),
            label.unwrap_or_default(),
            transcript,
            delay_ms,
        ));
        info!(
            target: "state.store",
            len = transcript.chars().count(),
            count = self.terminal.scripts().len(),
            "terminal_script_added"
        );
        self.persist_scripts();
        Some(id)
    }

    pub fn remove_terminal_script(&mut self, id: &str) -> bool {
        if !self.terminal.remove(id) {
            return false;
        }
        info!(target: "state.store", count = self.terminal.scripts().len(), "terminal_script_removed");
        self.persist_scripts();
        true
    }

    pub fn clear_terminal_scripts(&mut self) {
        self.terminal.clear();
        info!(target: "state.store", "terminal_scripts_cleared");
        self.persist_scripts();
    }

    pub fn reset_terminal_progress(&mut self) {
        self.terminal.rewind_all();
    }

    /// An empty prompt stores the configured default instead.
    pub fn set_terminal_prompt(&mut self, prompt: &str) -> &str {
        let prompt = if prompt.is_empty() {
            self.default_prompt.clone()
        } else {
            prompt.to_string()
        };
        self.terminal.set_prompt(prompt);
        match persist::encode_prompt(self.terminal.prompt()) {
            Ok(raw) => self.write(TERMINAL_PROMPT_KEY, raw),
            Err(e) => warn!(target: "state.persist", key = TERMINAL_PROMPT_KEY, error = %e, "encode_failed"),
        }
        self.terminal.prompt()
    }

    pub fn script_listings(&self) -> Vec<ScriptListing> {
        let current = self.terminal.active_index();
        self.terminal
            .scripts()
            .iter()
            .enumerate()
            .map(|(i, s)| ScriptListing {
                id: s.id().to_string(),
                title: if s.label().is_empty() {
                    format!("Command {}", i + 1)
                } else {
                    s.label().to_string()
                },
                length: s.len(),
                preview: summary::preview(&s.transcript_text(), summary::SCRIPT_PREVIEW_CHARS),
                delay_ms: s.delay_ms(),
                is_current: i == current,
            })
            .collect()
    }

    // ---- persistence -----------------------------------------------------

    pub fn unsaved_steps(&self) -> usize {
        self.unsaved_steps
    }

    /// Writes all mappings now. Used on shutdown and by tests.
    pub fn flush(&mut self) -> Result<(), PersistError> {
        let raw = persist::encode_mappings(&self.mappings)?;
        self.backend.put(MAPPINGS_KEY, raw)?;
        self.unsaved_steps = 0;
        Ok(())
    }

    fn note_step(&mut self) {
        self.unsaved_steps += 1;
        if self.unsaved_steps >= self.persist_every {
            debug!(target: "state.persist", steps = self.unsaved_steps, "batch_threshold_reached");
            self.persist_mappings();
        }
    }

    fn persist_mappings(&mut self) {
        if let Err(e) = self.flush() {
            warn!(target: "state.persist", key = MAPPINGS_KEY, error = %e, "persist_failed");
        }
    }

    fn persist_scripts(&mut self) {
        match persist::encode_scripts(self.terminal.scripts()) {
            Ok(raw) => self.write(TERMINAL_SCRIPTS_KEY, raw),
            Err(e) => warn!(target: "state.persist", key = TERMINAL_SCRIPTS_KEY, error = %e, "encode_failed"),
        }
    }

    fn write(&mut self, key: &str, raw: String) {
        if let Err(e) = self.backend.put(key, raw) {
            warn!(target: "state.persist", key, error = %e, "persist_failed");
        }
    }
}

/// Shared handle to the one store instance.
#[derive(Debug, Clone)]
pub struct StoreHandle(Arc<Mutex<ScriptStore>>);

impl StoreHandle {
    pub fn new(store: ScriptStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// Runs `f` under the store lock. The closure is synchronous so the guard
    /// can never live across a suspension point.
    pub fn with<R>(&self, f: impl FnOnce(&mut ScriptStore) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
