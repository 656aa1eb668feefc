//! System clipboard via `arboard`.

use async_trait::async_trait;
use core_actions::Clipboard;
use tracing::warn;

/// `arboard` is synchronous and may block on the display server, so every
/// read runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn read_text(&self) -> Option<String> {
        let read = tokio::task::spawn_blocking(|| {
            arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text())
        })
        .await;
        match read {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(target: "runtime.clipboard", error = %e, "clipboard_read_failed");
                None
            }
            Err(join_err) => {
                warn!(target: "runtime.clipboard", ?join_err, "clipboard_read_join_failed");
                None
            }
        }
    }
}
