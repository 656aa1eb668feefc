//! Shared plumbing for the interactive sessions: the input task lifecycle and
//! shutdown bookkeeping.

use core_events::Event;
use core_input::AsyncInputShutdown;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Quit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CtrlC => "ctrl_c",
            ShutdownReason::Quit => "quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

pub fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

/// The running terminal input task.
pub struct InputPump {
    task: Option<JoinHandle<()>>,
    shutdown: Option<AsyncInputShutdown>,
}

impl InputPump {
    pub fn spawn(tx: mpsc::Sender<Event>) -> Self {
        let (task, shutdown) = core_input::spawn_async_input(tx);
        Self {
            task: Some(task),
            shutdown: Some(shutdown),
        }
    }

    pub async fn stop(&mut self, reason: ShutdownReason) {
        if let Some(shutdown) = self.shutdown.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "input_task_shutdown_signal"
            );
            shutdown.signal();
        }

        if let Some(handle) = self.task.take() {
            match handle.await {
                Ok(_) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_joined"
                ),
                Err(err) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_cancelled"
                ),
                Err(err) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "input_task_join_failed"
                ),
            }
        }
    }
}
