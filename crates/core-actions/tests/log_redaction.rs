mod common;

use common::{FixedClipboard, harness};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
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

#[tokio::test]
async fn staged_payloads_never_reach_logs() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = harness("");
    h.engine
        .stage_from_content(&h.doc, "QXZSECRET", "")
        .unwrap();
    h.type_chars("kkkk").await;
    let other = core_state::DocumentId::new("/demo/clip.rs");
    h.engine
        .stage_from_clipboard(&other, &FixedClipboard(Some("CLIPJWQ".into())))
        .await
        .unwrap();
    h.ws.paste(&h.doc, "PASTEVQ");

    let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("engine.insert"));
    assert!(logs.contains("substituted"));
    for secret in ["QXZS", "SECRET", "CLIPJWQ", "PASTEVQ"] {
        assert!(!logs.contains(secret), "payload {secret} leaked into logs");
    }
}
