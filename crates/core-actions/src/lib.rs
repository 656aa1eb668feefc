//! Keystroke interception engine.
//!
//! Every keystroke for the active document enters one FIFO queue. The first
//! arrival on an idle queue becomes the drain loop and processes items one at
//! a time, awaiting each edit before taking the next; concurrent arrivals only
//! append. This keeps at most one edit in flight and preserves arrival order
//! even when the host's edit application suspends.
//!
//! Per item the dispatcher evaluates the shared [`Gate`] and either substitutes
//! the next staged character or defers to default insertion. Deletions rewind
//! the staged cursor by one logical step before the real deletion. Undo and
//! redo go to the host; the next substitution's exact resync absorbs them.
//!
//! The engine owns no documents and no mappings. It holds an
//! [`EngineContext`] (store handle, master switch, queue, notifier) built
//! once by the entry point and an [`EditorHost`] to edit through.

use core_events::{EngineNotice, Keystroke, Notifier};
use core_model::EditorHost;
use core_state::{DocumentId, Gate, ScriptStore, StoreHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace};

pub mod commands;
mod dispatcher;
pub mod queue;
pub mod resync;

pub use commands::{Clipboard, CommandError};
pub use dispatcher::KeyOutcome;
pub use queue::{Enqueue, MutationQueue, Queued};
pub use resync::{ResyncPolicy, longest_common_prefix};

/// Presentation refresh cadence and start-up state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub enabled_on_start: bool,
    /// Substitutions between `RefreshMappings` notices.
    pub refresh_every: usize,
    /// Rewinds between `RefreshMappings` notices.
    pub rewind_refresh_every: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&core_config::EngineConfig::default())
    }
}

impl From<&core_config::EngineConfig> for EngineSettings {
    fn from(cfg: &core_config::EngineConfig) -> Self {
        Self {
            enabled_on_start: cfg.enabled_on_start,
            refresh_every: cfg.refresh_every.max(1),
            rewind_refresh_every: cfg.rewind_refresh_every.max(1),
        }
    }
}

/// Process-wide engine state, constructed once and shared by reference.
#[derive(Debug)]
pub struct EngineContext {
    store: StoreHandle,
    enabled: AtomicBool,
    queue: Mutex<MutationQueue>,
    notifier: Notifier,
    settings: EngineSettings,
}

impl EngineContext {
    pub fn new(store: StoreHandle, settings: EngineSettings, notifier: Notifier) -> Self {
        Self {
            store,
            enabled: AtomicBool::new(settings.enabled_on_start),
            queue: Mutex::new(MutationQueue::new()),
            notifier,
            settings,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    fn queue(&self) -> MutexGuard<'_, MutationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify(&self, notice: EngineNotice) {
        self.notifier.notify(notice);
    }

    /// The single decision every interception path consults.
    pub fn gate(&self, doc: &DocumentId) -> Gate {
        let progress = self.store.with(|s| s.progress(doc));
        Gate::evaluate(self.is_enabled(), progress)
    }
}

/// How `Engine::type_key` disposed of a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOutcome {
    /// No active document on arrival; nothing queued.
    Dropped,
    /// Appended behind a running drain.
    Queued { depth: usize },
    /// This call ran the drain loop to empty.
    Drained { processed: usize },
}

/// Releases the drain guard if the drain future is dropped before the queue
/// is empty.
struct DrainGuard<'a> {
    ctx: &'a EngineContext,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.ctx.queue().abandon();
            debug!(target: "engine.queue", "drain_abandoned");
        }
    }
}

pub struct Engine<H> {
    ctx: Arc<EngineContext>,
    host: Arc<H>,
}

impl<H> Clone for Engine<H> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            host: Arc::clone(&self.host),
        }
    }
}

impl<H: EditorHost> Engine<H> {
    pub fn new(ctx: Arc<EngineContext>, host: Arc<H>) -> Self {
        let loaded = ctx.store.with(|s| s.len());
        if loaded > 0 {
            info!(target: "engine.command", mappings = loaded, "mappings_loaded");
            ctx.notify(EngineNotice::Loaded { mappings: loaded });
        }
        Self { ctx, host }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn is_enabled(&self) -> bool {
        self.ctx.is_enabled()
    }

    /// Entry point for every keystroke aimed at the active document.
    pub async fn type_key(&self, key: Keystroke) -> TypeOutcome {
        let Some(doc) = self.host.active_document() else {
            trace!(target: "engine.queue", "key_dropped_no_document");
            return TypeOutcome::Dropped;
        };
        let enqueued = self.ctx.queue().enqueue(doc, key);
        match enqueued {
            Enqueue::Enqueued { depth } => {
                trace!(target: "engine.queue", depth, "key_enqueued");
                return TypeOutcome::Queued { depth };
            }
            Enqueue::StartDrain => {}
        }
        let mut guard = DrainGuard {
            ctx: &self.ctx,
            finished: false,
        };
        let mut processed = 0;
        loop {
            let next = self.ctx.queue().next();
            let Some(item) = next else {
                guard.finished = true;
                break;
            };
            let outcome = dispatcher::process(self, &item.doc, &item.key).await;
            trace!(target: "engine.queue", seq = item.seq, outcome = outcome.as_str(), "key_processed");
            processed += 1;
        }
        debug!(target: "engine.queue", processed, "drain_finished");
        TypeOutcome::Drained { processed }
    }

    /// Convenience for feeding raw text payloads; one keystroke per call.
    pub async fn type_text(&self, text: &str) -> TypeOutcome {
        match Keystroke::from_text(text) {
            Some(key) => self.type_key(key).await,
            None => TypeOutcome::Dropped,
        }
    }

    /// Switch substitution on and run a monotonic resync for every open,
    /// mapped document.
    pub(crate) fn enable(&self) {
        self.ctx.enabled.store(true, Ordering::SeqCst);
        for doc in self.host.open_documents() {
            self.resync(&doc, ResyncPolicy::Monotonic);
        }
    }

    /// Realign `doc`'s cursor with the live text. Returns the cursor after the
    /// policy is applied, `None` when unmapped or the document is gone.
    pub(crate) fn resync(&self, doc: &DocumentId, policy: ResyncPolicy) -> Option<usize> {
        let snapshot = self.host.snapshot(doc)?;
        self.ctx
            .store
            .with(|s| resync_locked(s, doc, snapshot.buffer.chars(), policy))
    }
}

/// Apply `policy` to `doc`'s cursor given the live text. Runs under the store
/// lock so the match and the cursor write see the same mapping.
pub(crate) fn resync_locked(
    store: &mut ScriptStore,
    doc: &DocumentId,
    live: impl Iterator<Item = char>,
    policy: ResyncPolicy,
) -> Option<usize> {
    let mapping = store.get(doc)?;
    let current = mapping.cursor();
    let matched = longest_common_prefix(live, mapping.staged());
    match policy.resolve(current, matched) {
        Some(target) => {
            debug!(
                target: "engine.insert",
                doc = %doc.display_name(),
                policy = policy.as_str(),
                from = current,
                to = target,
                "cursor_resynced"
            );
            store.resync_to(doc, target)
        }
        None => Some(current),
    }
}
