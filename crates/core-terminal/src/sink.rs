use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for session output.
pub trait TerminalSink: Send {
    fn write(&mut self, text: &str) -> io::Result<()>;
}

/// Writes straight to stdout, flushing after every chunk so each keypress
/// shows up immediately in raw mode.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl TerminalSink for StdoutSink {
    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// Records every chunk. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<String> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything written so far, concatenated.
    pub fn output(&self) -> String {
        self.chunks().concat()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.chunks.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TerminalSink for RecordingSink {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}
