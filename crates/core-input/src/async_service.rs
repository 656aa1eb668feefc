use crate::{build_key_event, log_paste_payload, map_key_event};
use core_events::{
    ASYNC_INPUT_STARTS, ASYNC_INPUT_STOP_CHANNEL, ASYNC_INPUT_STOP_ERROR, ASYNC_INPUT_STOP_SIGNAL,
    ASYNC_INPUT_STOP_STREAM, CHANNEL_SEND_FAILURES, Event, InputEvent, KEYPRESS_REPEAT,
    KEYPRESS_TOTAL, PASTE_BYTES, PASTE_SESSIONS,
};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event as CEvent, EventStream, KeyCode as CKeyCode,
    KeyEvent as CKeyEvent, KeyEventKind as CKind,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{Instrument, debug, info, trace, warn};

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

pub(crate) fn spawn_async_event_task(
    sender: Sender<Event>,
) -> (task::JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let span = tracing::debug_span!(target: "input.thread", "input_async_task");
    let handle = task::spawn(
        async move {
            if let Err(join_err) = task::spawn_blocking(|| set_bracketed_paste(true)).await {
                debug!(target: "input.paste", ?join_err, "enable_failed_join");
            }

            let stream = EventStream::new();
            AsyncEventStreamTask::new(sender, stream, listener)
                .run()
                .await;

            if let Err(join_err) = task::spawn_blocking(|| set_bracketed_paste(false)).await {
                debug!(target: "input.paste", ?join_err, "disable_failed_join");
            }
        }
        .instrument(span),
    );

    (handle, shutdown)
}

fn set_bracketed_paste(on: bool) {
    let mut out = io::stdout();
    let res = if on {
        crossterm::execute!(out, EnableBracketedPaste)
    } else {
        crossterm::execute!(out, DisableBracketedPaste)
    };
    if let Err(e) = res {
        debug!(target: "input.paste", ?e, on, "toggle_failed");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

struct AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: ShutdownListener,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(sender: Sender<Event>, stream: S, shutdown: ShutdownListener) -> Self {
        Self {
            sender,
            stream,
            shutdown,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    async fn run(mut self) {
        info!(target: "input.thread", "async_input_task_started");
        ASYNC_INPUT_STARTS.fetch_add(1, Ordering::Relaxed);
        self.exit_reason = ExitReason::StreamEnded;
        loop {
            let maybe_result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                result = self.stream.next() => result,
            };

            let Some(result) = maybe_result else {
                break;
            };

            let keep_going = match result {
                Ok(CEvent::Key(key)) => self.handle_key_event(key).await,
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.event", w, h, "resize");
                    self.send_event(Event::Input(InputEvent::Resize(w, h)))
                        .await
                }
                Ok(CEvent::Paste(data)) => self.handle_paste(data).await,
                // Focus and mouse events are not consumed.
                Ok(_) => true,
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    false
                }
            };
            if !keep_going {
                break;
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::StreamEnded,
            other => other,
        };

        match reason {
            ExitReason::ShutdownSignal => {
                ASYNC_INPUT_STOP_SIGNAL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::ChannelClosed => {
                ASYNC_INPUT_STOP_CHANNEL.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamEnded => {
                ASYNC_INPUT_STOP_STREAM.fetch_add(1, Ordering::Relaxed);
            }
            ExitReason::StreamError => {
                ASYNC_INPUT_STOP_ERROR.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "input.thread",
                    error_kind = ?self.stream_error,
                    "async_input_task_stream_error"
                );
            }
            ExitReason::Running => {}
        }

        info!(target: "input.thread", reason = reason.as_str(), "async_input_task_stopped");
    }

    async fn handle_key_event(&mut self, key: CKeyEvent) -> bool {
        if !matches!(key.kind, CKind::Press | CKind::Repeat) {
            return true;
        }

        if matches!(key.code, CKeyCode::Char('c'))
            && key
                .modifiers
                .contains(crossterm::event::KeyModifiers::CONTROL)
        {
            return self.send_event(Event::Input(InputEvent::CtrlC)).await;
        }

        let Some(mapped) = map_key_event(&key) else {
            trace!(target: "input.event", code = ?key.code, "unmapped_key");
            return true;
        };

        let repeat = matches!(key.kind, CKind::Repeat);
        // Only the key class is logged; typed characters stay out of the log.
        trace!(
            target: "input.event",
            kind = "keypress",
            repeat,
            mods = ?mapped.mods,
            code_kind = code_kind_label(&mapped.code)
        );

        let sent = self.send_event(build_key_event(mapped)).await;
        if sent {
            KEYPRESS_TOTAL.fetch_add(1, Ordering::Relaxed);
            if repeat {
                KEYPRESS_REPEAT.fetch_add(1, Ordering::Relaxed);
            }
        }
        sent
    }

    async fn handle_paste(&mut self, data: String) -> bool {
        if data.is_empty() {
            return true;
        }
        log_paste_payload(&data);
        let bytes = data.len() as u64;
        let sent = self.send_event(Event::Input(InputEvent::Paste(data))).await;
        if sent {
            PASTE_SESSIONS.fetch_add(1, Ordering::Relaxed);
            PASTE_BYTES.fetch_add(bytes, Ordering::Relaxed);
        }
        sent
    }

    async fn send_event(&mut self, event: Event) -> bool {
        match self.sender.send(event).await {
            Ok(_) => true,
            Err(_) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                if !matches!(self.exit_reason, ExitReason::ShutdownSignal) {
                    self.exit_reason = ExitReason::ChannelClosed;
                }
                false
            }
        }
    }
}

fn code_kind_label(code: &core_events::KeyCode) -> &'static str {
    match code {
        core_events::KeyCode::Char(_) => "char",
        _ => "named",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{KeyCode, KeyEvent};
    use std::sync::Mutex;
    use tokio::sync::{Mutex as TokioMutex, mpsc};
    use tokio::time::{Duration, timeout};
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use tracing::{Metadata, Subscriber, subscriber::Interest};

    use tracing::field::{Field, Visit};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    static LOG_CAPTURE_GUARD: TokioMutex<()> = TokioMutex::const_new(());

    #[derive(Clone, Default)]
    struct LogCapture {
        events: Arc<Mutex<Vec<CapturedLog>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedLog {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct LogVisitor {
        fields: Vec<(String, String)>,
    }

    impl Visit for LogVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for LogCapture
    where
        S: Subscriber,
    {
        fn register_callsite(
            &self,
            _metadata: &'static tracing::Metadata<'static>,
        ) -> tracing::subscriber::Interest {
            Interest::always()
        }

        fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
            metadata.target().starts_with("input.")
        }

        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = LogVisitor::default();
            event.record(&mut visitor);
            let meta = event.metadata();
            self.events.lock().unwrap().push(CapturedLog {
                target: meta.target().to_string(),
                fields: visitor.fields,
            });
        }
    }

    #[tokio::test]
    async fn forwards_basic_key_events() {
        let base_total = KEYPRESS_TOTAL.load(Ordering::Relaxed);

        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('a'),
            crossterm::event::KeyModifiers::NONE,
        ))])
        .await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(key))] => {
                assert_eq!(*key, KeyEvent::plain(KeyCode::Char('a')));
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }

        let after_total = KEYPRESS_TOTAL.load(Ordering::Relaxed);
        assert!(after_total.saturating_sub(base_total) >= 1);
    }

    #[tokio::test]
    async fn repeat_key_events_are_forwarded_and_counted() {
        let base_repeat = KEYPRESS_REPEAT.load(Ordering::Relaxed);

        let mut c_event = CKeyEvent::new(CKeyCode::Char('j'), crossterm::event::KeyModifiers::NONE);
        c_event.kind = CKind::Repeat;

        let outputs = run_scenario(vec![CEvent::Key(c_event)]).await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Key(KeyEvent {
                code: KeyCode::Char('j'),
                ..
            }))]
        ));
        let after_repeat = KEYPRESS_REPEAT.load(Ordering::Relaxed);
        assert!(after_repeat.saturating_sub(base_repeat) >= 1);
    }

    #[tokio::test]
    async fn release_events_are_ignored() {
        let mut c_event = CKeyEvent::new(CKeyCode::Char('r'), crossterm::event::KeyModifiers::NONE);
        c_event.kind = CKind::Release;

        let outputs = run_scenario(vec![CEvent::Key(c_event)]).await;
        assert!(outputs.is_empty(), "release produced {outputs:?}");
    }

    #[tokio::test]
    async fn keypress_log_omits_typed_character() {
        let _log_guard = LOG_CAPTURE_GUARD.lock().await;

        let capture = LogCapture::default();
        let events_handle = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        let dispatch = tracing::Dispatch::new(subscriber);
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('q'),
            crossterm::event::KeyModifiers::NONE,
        ))])
        .await;
        assert_eq!(outputs.len(), 1);

        let logs = events_handle.lock().unwrap();
        let keypress_log = logs
            .iter()
            .find(|entry| entry.target == "input.event")
            .unwrap_or_else(|| panic!("missing input.event log, captured: {logs:?}"));
        assert!(
            keypress_log
                .fields
                .iter()
                .any(|(k, v)| k == "code_kind" && v == "\"char\"")
        );
        assert!(
            keypress_log
                .fields
                .iter()
                .all(|(_, v)| !v.contains("'q'")),
            "typed character leaked: {keypress_log:?}"
        );
    }

    #[tokio::test]
    async fn forwards_ctrl_c() {
        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('c'),
            crossterm::event::KeyModifiers::CONTROL,
        ))])
        .await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::CtrlC)]
        ));
    }

    #[tokio::test]
    async fn forwards_control_chords() {
        let outputs = run_scenario(vec![CEvent::Key(CKeyEvent::new(
            CKeyCode::Char('t'),
            crossterm::event::KeyModifiers::CONTROL,
        ))])
        .await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(key))] => assert_eq!(*key, KeyEvent::ctrl('t')),
            other => panic!("unexpected output sequence: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_resize_event() {
        let outputs = run_scenario(vec![CEvent::Resize(120, 48)]).await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Resize(120, 48))]
        ));
    }

    #[tokio::test]
    async fn unmapped_keys_are_skipped() {
        let outputs = run_scenario(vec![
            CEvent::Key(CKeyEvent::new(
                CKeyCode::F(2),
                crossterm::event::KeyModifiers::NONE,
            )),
            CEvent::Key(CKeyEvent::new(
                CKeyCode::Enter,
                crossterm::event::KeyModifiers::NONE,
            )),
        ])
        .await;

        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Key(KeyEvent {
                code: KeyCode::Enter,
                ..
            }))]
        ));
    }

    #[tokio::test]
    async fn paste_event_forwards_whole_payload() {
        let base_sessions = PASTE_SESSIONS.load(Ordering::Relaxed);
        let base_bytes = PASTE_BYTES.load(Ordering::Relaxed);

        let outputs =
            run_scenario(vec![CEvent::Paste("fn main() {\n}\n".to_string())]).await;

        match outputs.as_slice() {
            [Event::Input(InputEvent::Paste(text))] => assert_eq!(text, "fn main() {\n}\n"),
            other => panic!("unexpected output sequence: {other:?}"),
        }

        let sessions = PASTE_SESSIONS.load(Ordering::Relaxed);
        let bytes = PASTE_BYTES.load(Ordering::Relaxed);
        assert!(sessions - base_sessions >= 1);
        assert!(bytes - base_bytes >= "fn main() {\n}\n".len() as u64);
    }

    #[tokio::test]
    async fn empty_paste_is_dropped() {
        let outputs = run_scenario(vec![CEvent::Paste(String::new())]).await;
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn stream_error_stops_task() {
        let base_error = ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed);

        let (tx, mut rx) = mpsc::channel(8);
        let stream = tokio_stream::iter(vec![
            Ok(CEvent::Resize(1, 1)),
            Err(io::Error::other("tty gone")),
            Ok(CEvent::Resize(2, 2)),
        ]);
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Resize(1, 1))]
        ));
        assert!(ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed) > base_error);
    }

    #[tokio::test]
    async fn logs_startup_and_shutdown_reason_on_signal() {
        let _log_guard = LOG_CAPTURE_GUARD.lock().await;
        let capture = LogCapture::default();
        let events_handle = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        let dispatch = tracing::Dispatch::new(subscriber);
        let _guard = tracing::dispatcher::set_default(&dispatch);

        let base_start = ASYNC_INPUT_STARTS.load(Ordering::Relaxed);
        let base_signal = ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let notifier = shutdown.clone();
        let signal_task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            notifier.signal();
        });

        let _keep_alive = event_tx;
        AsyncEventStreamTask::new(tx, stream, listener).run().await;
        signal_task.await.unwrap();
        drop(rx);

        let logged = events_handle.lock().unwrap();
        assert!(
            logged.iter().any(|entry| {
                entry.target == "input.thread"
                    && entry
                        .fields
                        .iter()
                        .any(|(k, v)| k == "message" && v == "async_input_task_started")
            }),
            "missing async_input_task_started log, captured events: {:?}",
            *logged
        );

        let stop_event = logged.iter().find(|entry| {
            entry.target == "input.thread"
                && entry
                    .fields
                    .iter()
                    .any(|(k, v)| k == "message" && v == "async_input_task_stopped")
        });
        let stop_event = stop_event.unwrap_or_else(|| {
            panic!(
                "missing async_input_task_stopped log, captured events: {:?}",
                *logged
            )
        });
        let reason_field = stop_event
            .fields
            .iter()
            .find(|(k, _)| k == "reason")
            .map(|(_, v)| v.trim_matches('"'))
            .unwrap_or_default();
        assert_eq!(reason_field, "shutdown_signal");

        let after_start = ASYNC_INPUT_STARTS.load(Ordering::Relaxed);
        let after_signal = ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed);
        assert!(
            after_start > base_start,
            "async input starts counter did not advance"
        );
        assert!(
            after_signal > base_signal,
            "shutdown signal counter did not advance"
        );
    }

    #[tokio::test]
    async fn channel_closed_increments_telemetry() {
        let base_channel = ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let stream = tokio_stream::iter(vec![Ok(CEvent::Resize(10, 10))]);
        let (_shutdown, listener) = ShutdownListener::new_pair();

        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        let after_channel = ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed);
        assert!(
            after_channel > base_channel,
            "channel closed counter did not advance"
        );
    }

    #[tokio::test]
    async fn shutdown_signal_exits_immediately() {
        let (tx, mut rx) = mpsc::channel(1);
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let task = tokio::spawn(async move {
            let _keep_alive = event_tx;
            AsyncEventStreamTask::new(tx, stream, listener).run().await;
        });

        shutdown.signal();

        timeout(Duration::from_millis(50), task)
            .await
            .expect("shutdown should resolve promptly")
            .expect("task join failed");

        assert!(rx.recv().await.is_none());
    }

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = tokio_stream::iter(events.into_iter().map(Ok));
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        outputs
    }
}
