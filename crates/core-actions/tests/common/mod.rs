#![allow(dead_code)] // Shared across many integration tests; each test binary uses a subset of helpers.

use async_trait::async_trait;
use core_actions::{Clipboard, Engine, EngineContext, EngineSettings};
use core_events::{EVENT_CHANNEL_CAP, EngineNotice, Event, Keystroke, Notifier};
use core_model::Workspace;
use core_state::{DocumentId, MemoryBackend, ScriptStore, StoreHandle, StoreOptions};
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, channel};

pub struct Harness {
    pub engine: Engine<Workspace>,
    pub ws: Arc<Workspace>,
    pub doc: DocumentId,
    pub backend: MemoryBackend,
    pub rx: Receiver<Event>,
}

impl Harness {
    pub fn text(&self) -> String {
        self.ws.text(&self.doc).unwrap_or_default()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.engine.mapping_summary(&self.doc).map(|s| s.cursor)
    }

    pub async fn type_chars(&self, s: &str) {
        for c in s.chars() {
            self.engine.type_key(Keystroke::Printable(c)).await;
        }
    }

    pub async fn key(&self, key: Keystroke) {
        self.engine.type_key(key).await;
    }

    /// Notices published so far, in order.
    pub fn notices(&mut self) -> Vec<EngineNotice> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            if let Event::Notice(n) = ev {
                out.push(n);
            }
        }
        out
    }

    pub fn completions(&mut self) -> usize {
        self.notices()
            .iter()
            .filter(|n| matches!(n, EngineNotice::Completed { .. }))
            .count()
    }
}

pub fn harness(initial: &str) -> Harness {
    harness_with(initial, EngineSettings::default(), 50)
}

pub fn harness_with(initial: &str, settings: EngineSettings, persist_every: usize) -> Harness {
    let backend = MemoryBackend::new();
    let store = ScriptStore::open(
        Box::new(backend.clone()),
        StoreOptions {
            persist_every,
            ..StoreOptions::default()
        },
    );
    let (tx, rx) = channel(EVENT_CHANNEL_CAP);
    let ctx = Arc::new(EngineContext::new(
        StoreHandle::new(store),
        settings,
        Notifier::new(tx),
    ));
    let ws = Arc::new(Workspace::new());
    let doc = DocumentId::new("/demo/main.rs");
    ws.open(doc.clone(), initial);
    Harness {
        engine: Engine::new(ctx, ws.clone()),
        ws,
        doc,
        backend,
        rx,
    }
}

pub struct FixedClipboard(pub Option<String>);

#[async_trait]
impl Clipboard for FixedClipboard {
    async fn read_text(&self) -> Option<String> {
        tokio::task::yield_now().await;
        self.0.clone()
    }
}
