//! Prompt Forge console driver
//!
//! Line-oriented front end over one workspace. Plain lines are sent to the
//! active project; lines starting with `/` are commands. Ctrl-C cancels the
//! run in flight.

use anyhow::{bail, Context, Result};
use prompt_forge::{AppState, ConfigService, RunOutcome};
use prompt_forge_core::{ChatRole, ConsoleLevel, ConsoleMessage};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
Commands:
  /new [name]          create a project and switch to it
  /projects            list projects
  /switch <n|id>       switch the active project
  /rename <name>       rename the active project
  /delete              delete the active project
  /undo, /redo         step through versions
  /versions            list versions of the active project
  /restore <n>         jump to version n
  /files               list files of the current version
  /approve             approve the pending plan
  /status              show the run status
  /telemetry <level> <text>  report console output from the preview
  /quit                save and exit
Anything else is sent to the active project.
While a run is active only /cancel, /status and /telemetry are accepted.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_service = ConfigService::new().context("failed to load configuration")?;
    let state = AppState::from_config_service(&config_service)
        .await
        .context("failed to open workspace")?;

    println!("Prompt Forge. Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if let Some(command) = line.strip_prefix('/') {
            match run_command(&state, &mut lines, command).await {
                Ok(true) => {
                    state.save().await?;
                    break;
                }
                Ok(false) => Ok(()),
                Err(err) => Err(err),
            }
        } else {
            send(&state, &mut lines, line).await
        };

        if let Err(err) = result {
            eprintln!("error: {:#}", err);
        }
        if let Err(err) = state.save().await {
            eprintln!("error: failed to save workspace: {}", err);
        }
    }

    Ok(())
}

/// Execute one command. Returns true when the driver should exit.
async fn run_command(state: &AppState, lines: &mut Input, command: &str) -> Result<bool> {
    let (name, args) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));
    let history = state.history();

    match name {
        "quit" | "exit" => return Ok(true),
        "help" => println!("{}", HELP),
        "new" => {
            let id = state.create_project(args).await;
            println!("Created project {}", id);
        }
        "projects" => {
            let active = state.active_project().await;
            for (i, project) in history.list_projects().await.iter().enumerate() {
                let marker = if active.as_deref() == Some(project.id.as_str()) { "*" } else { " " };
                println!(
                    "{} {:>2}. {} ({} version(s), {} file(s))",
                    marker, i, project.name, project.versions, project.file_count
                );
            }
        }
        "switch" => {
            let projects = history.list_projects().await;
            let id = match args.parse::<usize>() {
                Ok(index) => projects
                    .get(index)
                    .map(|p| p.id.clone())
                    .with_context(|| format!("no project at index {}", index))?,
                Err(_) => args.to_string(),
            };
            state.set_active_project(&id).await?;
            println!("Switched to {}", history.summary(&id).await?.name);
        }
        "rename" => {
            let id = active(state).await?;
            state.orchestrator().rename_project(&id, args).await?;
            println!("Renamed to {}", args);
        }
        "delete" => {
            let id = active(state).await?;
            state.delete_project(&id).await?;
            println!("Deleted project {}", id);
        }
        "undo" | "redo" => {
            let id = active(state).await?;
            let orchestrator = state.orchestrator();
            let moved = if name == "undo" {
                orchestrator.undo(&id).await?
            } else {
                orchestrator.redo(&id).await?
            };
            if !moved {
                println!("Nothing to {}", name);
            }
            print_cursor(state, &id).await?;
        }
        "versions" => {
            let id = active(state).await?;
            for version in history.versions(&id).await? {
                let marker = if version.is_current { "*" } else { " " };
                println!(
                    "{} {:>2}. {} ({} message(s), {} file(s))",
                    marker, version.index, version.name, version.message_count, version.file_count
                );
            }
        }
        "restore" => {
            let id = active(state).await?;
            let index: usize = args.parse().context("usage: /restore <n>")?;
            state.orchestrator().restore_to(&id, index).await?;
            print_cursor(state, &id).await?;
        }
        "files" => {
            let id = active(state).await?;
            let snapshot = history.current(&id).await?;
            if snapshot.files.is_empty() {
                println!("No files yet");
            }
            for (path, content) in &snapshot.files {
                println!("{} ({} bytes)", path, content.len());
            }
        }
        "approve" => {
            let id = active(state).await?;
            let orchestrator = state.orchestrator().clone();
            let project = id.clone();
            drive_run(state, lines, &id, async move { orchestrator.approve_plan(&project).await }).await?;
        }
        "status" => print_status(state, &active(state).await?).await?,
        "telemetry" => report_telemetry(state, &active(state).await?, args).await?,
        "cancel" => println!("Nothing to cancel"),
        other => bail!("unknown command /{} (try /help)", other),
    }
    Ok(false)
}

/// Send a message to the active project, creating one when none exists.
async fn send(state: &AppState, lines: &mut Input, text: &str) -> Result<()> {
    let id = match state.active_project().await {
        Some(id) => id,
        None => state.create_project("").await,
    };
    let orchestrator = state.orchestrator().clone();
    let text = text.to_string();
    let project = id.clone();
    drive_run(state, lines, &id, async move { orchestrator.send_message(&project, &text, None).await }).await
}

/// Await a run while still serving run-time commands, then print what it
/// produced. Ctrl-C or end of input cancels the run.
async fn drive_run<F>(state: &AppState, lines: &mut Input, project_id: &str, run: F) -> Result<()>
where
    F: std::future::Future<Output = prompt_forge::AppResult<RunOutcome>> + Send + 'static,
{
    let before = state.history().current(project_id).await?.messages.len();
    let mut handle = tokio::spawn(run);
    let mut input_open = true;

    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined??,
            _ = tokio::signal::ctrl_c() => {
                state.orchestrator().cancel(project_id).await?;
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) => {
                    if let Err(err) = run_time_command(state, project_id, line.trim()).await {
                        eprintln!("error: {:#}", err);
                    }
                }
                None => {
                    input_open = false;
                    state.orchestrator().cancel(project_id).await?;
                }
            },
        }
    };

    let snapshot = state.history().current(project_id).await?;
    for message in snapshot.messages.iter().skip(before) {
        if message.role == ChatRole::User {
            continue;
        }
        println!("[{}] {}", message.role, message.content);
        if let Some(plan) = &message.plan {
            println!("{}", plan.to_markdown());
        }
    }
    match outcome {
        RunOutcome::AwaitingApproval => println!("(plan pending: /approve or describe changes)"),
        RunOutcome::Completed { corrections } if corrections > 0 => {
            println!("(applied after {} automatic correction(s))", corrections)
        }
        _ => {}
    }
    Ok(())
}

async fn run_time_command(state: &AppState, project_id: &str, line: &str) -> Result<()> {
    let command = line.strip_prefix('/').unwrap_or(line);
    let (name, args) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));
    match name {
        "" => {}
        "cancel" => {
            state.orchestrator().cancel(project_id).await?;
        }
        "status" => print_status(state, project_id).await?,
        "telemetry" => report_telemetry(state, project_id, args).await?,
        _ => println!("A run is in progress. Use /cancel, /status or /telemetry."),
    }
    Ok(())
}

async fn print_status(state: &AppState, project_id: &str) -> Result<()> {
    let status = state.orchestrator().status(project_id).await?;
    let session = state.orchestrator().session(project_id).await;
    println!(
        "phase={} elapsed={}ms cancellable={} corrections={} oracle_calls={} tokens={}",
        status.phase,
        status.elapsed_ms,
        status.cancellable,
        status.retry_count,
        session.calls(),
        session.total_tokens()
    );
    Ok(())
}

/// `<level> <text>`, as the preview sandbox would report it.
async fn report_telemetry(state: &AppState, project_id: &str, args: &str) -> Result<()> {
    let (level, payload) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    state
        .orchestrator()
        .report_console(project_id, ConsoleMessage::new(parse_level(level)?, payload.trim()))
        .await;
    Ok(())
}

async fn active(state: &AppState) -> Result<String> {
    match state.active_project().await {
        Some(id) => Ok(id),
        None => bail!("no active project (use /new)"),
    }
}

async fn print_cursor(state: &AppState, project_id: &str) -> Result<()> {
    let summary = state.history().summary(project_id).await?;
    let mut steps = Vec::new();
    if summary.can_undo {
        steps.push("/undo");
    }
    if summary.can_redo {
        steps.push("/redo");
    }
    println!(
        "At version {} of {} ({})",
        summary.cursor,
        summary.versions,
        if steps.is_empty() { "no other versions".to_string() } else { steps.join(", ") }
    );
    Ok(())
}

fn parse_level(level: &str) -> Result<ConsoleLevel> {
    Ok(match level {
        "debug" => ConsoleLevel::Debug,
        "log" => ConsoleLevel::Log,
        "info" => ConsoleLevel::Info,
        "warn" => ConsoleLevel::Warn,
        "error" => ConsoleLevel::Error,
        other => bail!("unknown console level '{}'", other),
    })
}
