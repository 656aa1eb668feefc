//! ghostkeys entrypoint.
//!
//! One-shot subcommands manage staged mappings and terminal scripts against
//! the persisted store. `type` and `shell` run interactive sessions that feed
//! terminal keystrokes through the interception engines.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use core_actions::{Engine, EngineContext, EngineSettings};
use core_config::{Config, load_from};
use core_events::{EVENT_CHANNEL_CAP, Event, Notifier};
use core_model::Workspace;
use core_state::{DocumentId, JsonFileBackend, ScriptStore, StoreHandle, StoreOptions};
use core_terminal::TerminalScriptEngine;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod clipboard;
mod report;
mod runtime;
mod shell;
mod typing;

use clipboard::SystemClipboard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ghostkeys", version, about = "Stage text, then type it out one key at a time")]
struct Args {
    /// Optional configuration file path (overrides discovery of `ghostkeys.toml`).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage text for a document. Reads stdin unless --file or --clipboard is given.
    Stage {
        document: PathBuf,
        #[arg(long, conflicts_with = "clipboard")]
        file: Option<PathBuf>,
        #[arg(long)]
        clipboard: bool,
        #[arg(long)]
        label: Option<String>,
    },
    /// List staged mappings with their progress.
    List,
    /// Show the status line for a document.
    Status { document: PathBuf },
    /// Move a document's cursor back to the start.
    Reset { document: PathBuf },
    /// Remove a document's mapping.
    Delete { document: PathBuf },
    /// Remove every mapping.
    Clear,
    /// Open a document and type into it with substitution active.
    Type {
        document: PathBuf,
        /// Save the document back to disk on exit.
        #[arg(long)]
        write: bool,
    },
    /// Manage terminal scripts.
    Term {
        #[command(subcommand)]
        command: TermCommand,
    },
    /// Run the fake shell that reveals terminal scripts.
    Shell,
}

#[derive(Subcommand, Debug)]
enum TermCommand {
    /// Add a script. Reads stdin unless --file is given.
    Add {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// Delete a script by id.
    Delete { id: String },
    /// Rewind every script and make the first one current.
    Reset,
    /// Remove every script.
    Clear,
    /// Show the prompt, or set it when a value is given.
    Prompt { prompt: Option<String> },
    /// List scripts in reveal order.
    List,
}

impl Command {
    fn is_interactive(&self) -> bool {
        matches!(self, Command::Type { .. } | Command::Shell)
    }
}

/// Stable identity for a document path: absolute, not canonicalized, so a
/// file that does not exist yet still maps to one id.
fn document_id(path: &Path) -> DocumentId {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    DocumentId::new(abs.to_string_lossy().into_owned())
}

fn open_store(config: &Config) -> StoreHandle {
    let path = config.storage_path();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(target: "runtime.startup", error = %e, dir = %parent.display(), "storage_dir_create_failed");
    }
    info!(target: "runtime.startup", path = %path.display(), "storage_opened");
    let options = StoreOptions {
        persist_every: config.engine().persist_every,
        default_prompt: config.default_prompt().to_string(),
    };
    StoreHandle::new(ScriptStore::open(
        Box::new(JsonFileBackend::open(path)),
        options,
    ))
}

fn configure_logging(path: &Path) -> Option<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name()?;
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(_) => Some(guard),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

/// Opens the on-disk document in the workspace so staging can resume past
/// text it already contains.
fn open_document(host: &Workspace, doc: &DocumentId, path: &Path) {
    let text = std::fs::read_to_string(path).unwrap_or_default();
    host.open(doc.clone(), &text);
}

async fn run_command(
    command: Command,
    engine: &Engine<Workspace>,
    store: StoreHandle,
    notifier: Notifier,
    channel: (mpsc::Sender<Event>, mpsc::Receiver<Event>),
) -> Result<()> {
    match command {
        Command::Stage {
            document,
            file,
            clipboard,
            label,
        } => {
            let doc = document_id(&document);
            open_document(engine.host(), &doc, &document);
            let summary = if clipboard {
                engine
                    .stage_from_clipboard(&doc, &SystemClipboard)
                    .await?
            } else {
                let text = read_input(file.as_deref())?;
                let label = label.as_deref().unwrap_or(doc.display_name());
                engine.stage_from_content(&doc, &text, label)?
            };
            println!("{}", report::summary_line(&summary));
        }
        Command::List => {
            for line in report::mapping_lines(&engine.mappings()) {
                println!("{line}");
            }
        }
        Command::Status { document } => {
            let doc = document_id(&document);
            open_document(engine.host(), &doc, &document);
            let status = engine.status_line();
            println!("{}", status.text);
            println!("{}", status.tooltip);
        }
        Command::Reset { document } => {
            if !engine.reset_progress(&document_id(&document)) {
                bail!("no mapping for {}", document.display());
            }
        }
        Command::Delete { document } => {
            if !engine.delete_mapping(&document_id(&document)) {
                bail!("no mapping for {}", document.display());
            }
        }
        Command::Clear => engine.clear_all_mappings(),
        Command::Type { document, write } => {
            let doc = document_id(&document);
            open_document(engine.host(), &doc, &document);
            let (tx, rx) = channel;
            let session = typing::TypingSession::new(engine.clone(), doc, document, write);
            session.run(tx, rx).await?;
        }
        Command::Term { command } => {
            let mut scripts = TerminalScriptEngine::new(store, notifier);
            run_term_command(command, &mut scripts)?;
        }
        Command::Shell => {
            let (tx, rx) = channel;
            let scripts = TerminalScriptEngine::new(store, notifier);
            shell::ShellSession::new(scripts).run(tx, rx).await?;
        }
    }
    Ok(())
}

fn run_term_command(command: TermCommand, scripts: &mut TerminalScriptEngine) -> Result<()> {
    match command {
        TermCommand::Add {
            file,
            label,
            delay_ms,
        } => {
            let transcript = read_input(file.as_deref())?;
            let Some(id) = scripts.add_script(&transcript, label, delay_ms) else {
                bail!("nothing to add: transcript is empty");
            };
            println!("{id}");
        }
        TermCommand::Delete { id } => {
            if !scripts.delete_script(&id) {
                bail!("no terminal script with id {id}");
            }
        }
        TermCommand::Reset => scripts.reset_progress(),
        TermCommand::Clear => scripts.clear_scripts(),
        TermCommand::Prompt { prompt } => match prompt {
            Some(p) => println!("{}", scripts.set_prompt(&p)),
            None => println!("{}", scripts.prompt()),
        },
        TermCommand::List => {
            for line in report::script_lines(&scripts.scripts()) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    let _log_guard = configure_logging(config.log_file());
    install_panic_hook();
    info!(
        target: "runtime",
        config = ?config.source,
        command = ?args.command,
        "startup"
    );

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    // One-shot commands have nobody listening for notices.
    let notifier = if args.command.is_interactive() {
        Notifier::new(tx.clone())
    } else {
        Notifier::detached()
    };

    let store = open_store(&config);
    let ctx = Arc::new(EngineContext::new(
        store.clone(),
        EngineSettings::from(config.engine()),
        notifier.clone(),
    ));
    let engine = Engine::new(ctx, Arc::new(Workspace::new()));

    let result = run_command(args.command, &engine, store, notifier, (tx, rx)).await;
    engine.shutdown();
    if let Err(e) = &result {
        warn!(target: "runtime", error = %e, "command_failed");
    }
    info!(target: "runtime", "exit");
    result
}
