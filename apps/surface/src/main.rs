use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use shared::domain::PresentationId;
use storage::{SqliteRegister, Storage};
use surface_core::{
    ControlSurface, InteractionOutcome, Navigation, NavigationError, OutlineRenderer, OutputSurface,
    PresenterSurface, SchedulerEvent, StartOutcome, SurfaceChange, SurfaceCore, SurfaceRole,
    SyncChannels, Viewport,
};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod config;

use commands::{OperatorCommand, TimerCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Runs one presentation surface against a shared database")]
struct Args {
    /// control, output or presenter
    #[arg(long, value_parser = parse_role)]
    role: SurfaceRole,
    #[arg(long)]
    presentation: i64,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_role(raw: &str) -> Result<SurfaceRole, String> {
    SurfaceRole::parse(raw).ok_or_else(|| format!("unknown surface role '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let settings = config::load_settings(args.config.as_deref())?;
    let raw_database_url = args
        .database_url
        .as_deref()
        .unwrap_or(&settings.database_url);
    let database_url = config::prepare_database_url(raw_database_url)?;
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open database '{database_url}'"))?;
    storage.health_check().await?;

    let origin = format!("{}-{}", args.role, Uuid::new_v4());
    let register = SqliteRegister::open(
        storage.clone(),
        origin.clone(),
        Duration::from_millis(settings.watch_interval_ms.max(1)),
    )
    .await?;
    let presentation_id = PresentationId(args.presentation);
    let channels = SyncChannels::new(Arc::new(register), presentation_id);
    let viewport = Viewport::new(settings.viewport_width, settings.viewport_height);
    let core = SurfaceCore::open(args.role, channels, Arc::new(storage), OutlineRenderer, viewport)
        .await
        .with_context(|| format!("failed to open {} surface", args.role))?;
    info!(
        presentation_id = presentation_id.0,
        role = args.role.as_str(),
        %origin,
        %database_url,
        "surface started"
    );
    println!("{HELP}");

    let input = BufReader::new(io::stdin()).lines();
    match args.role {
        SurfaceRole::Control => run_control(ControlSurface::new(core).await, input).await,
        SurfaceRole::Output => run_output(OutputSurface::new(core), input).await,
        SurfaceRole::Presenter => run_presenter(PresenterSurface::new(core), input).await,
    }
}

async fn run_control<I: AsyncBufRead + Unpin>(
    mut surface: ControlSurface<OutlineRenderer>,
    mut input: Lines<I>,
) -> Result<()> {
    show(surface.core());
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let command = match OperatorCommand::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                match command {
                    OperatorCommand::Advance => report_navigation(surface.advance().await),
                    OperatorCommand::Back => report_navigation(surface.back().await),
                    OperatorCommand::JumpTo(index) => report_navigation(surface.jump_to(index).await),
                    OperatorCommand::Exit => report_exit(surface.exit().await),
                    OperatorCommand::Start(group_id) => report_start(surface.start_rotation(group_id).await),
                    OperatorCommand::Stop => report_write("rotation stop", surface.stop_rotation().await),
                    OperatorCommand::OpenOutput => {
                        report_write("output open signal", surface.mark_output_opened().await)
                    }
                    OperatorCommand::Status => {
                        println!("output window open: {}", surface.is_output_open());
                    }
                    OperatorCommand::Quit => break,
                    other => println!("'{other:?}' is not available on the control surface"),
                }
                show(surface.core());
            }
            change = surface.next_change() => {
                let Some(change) = change else { break };
                report_change(&change);
                show(surface.core());
            }
        }
    }
    Ok(())
}

async fn run_output<I: AsyncBufRead + Unpin>(
    mut surface: OutputSurface<OutlineRenderer>,
    mut input: Lines<I>,
) -> Result<()> {
    show(surface.core());
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                match OperatorCommand::parse(&line) {
                    Ok(OperatorCommand::Close | OperatorCommand::Quit) => break,
                    Ok(OperatorCommand::Status) => show(surface.core()),
                    Ok(other) => println!("'{other:?}' is not available on the output surface"),
                    Err(message) => println!("{message}"),
                }
            }
            change = surface.next_change() => {
                let Some(change) = change else { break };
                report_change(&change);
                show(surface.core());
            }
        }
    }
    surface.close().await
}

async fn run_presenter<I: AsyncBufRead + Unpin>(
    mut surface: PresenterSurface<OutlineRenderer>,
    mut input: Lines<I>,
) -> Result<()> {
    surface.stopwatch_mut().start();
    show_presenter(&surface);
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let command = match OperatorCommand::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                match command {
                    OperatorCommand::Advance => report_navigation(surface.advance().await),
                    OperatorCommand::Back => report_navigation(surface.back().await),
                    OperatorCommand::JumpTo(index) => report_navigation(surface.jump_to(index).await),
                    OperatorCommand::Exit => report_exit(surface.exit().await),
                    OperatorCommand::Start(group_id) => report_start(surface.start_rotation(group_id).await),
                    OperatorCommand::Stop => report_write("rotation stop", surface.stop_rotation().await),
                    OperatorCommand::Timer(TimerCommand::Start) => surface.stopwatch_mut().start(),
                    OperatorCommand::Timer(TimerCommand::Pause) => surface.stopwatch_mut().pause(),
                    OperatorCommand::Timer(TimerCommand::Reset) => surface.stopwatch_mut().reset(),
                    OperatorCommand::Status => {}
                    OperatorCommand::Quit => break,
                    other => println!("'{other:?}' is not available on the presenter surface"),
                }
                show_presenter(&surface);
            }
            change = surface.next_change() => {
                let Some(change) = change else { break };
                report_change(&change);
                show_presenter(&surface);
            }
        }
    }
    Ok(())
}

fn show(core: &SurfaceCore<OutlineRenderer>) {
    let rotation = match core.rotation().active_group() {
        Some(group_id) => format!("rotating group {group_id}"),
        None => "manual".to_string(),
    };
    match core.frame() {
        Some(frame) => println!(
            "[{}] {}/{} {frame} ({rotation})",
            core.role(),
            core.slide_index() + 1,
            core.presentation().len()
        ),
        None => println!("[{}] presentation has no slides", core.role()),
    }
}

fn show_presenter(surface: &PresenterSurface<OutlineRenderer>) {
    show(surface.core());
    let elapsed = surface.stopwatch().elapsed().as_secs();
    println!("  notes: {}", surface.notes());
    match surface.next_preview() {
        Some(next) => println!("  next:  {next}"),
        None => println!("  next:  (end of presentation)"),
    }
    println!("  timer: {:02}:{:02}", elapsed / 60, elapsed % 60);
}

fn report_navigation(result: Result<Navigation, NavigationError>) {
    match result {
        Ok(navigation) => info!(slide_index = navigation.slide_index, rotation = ?navigation.rotation, "navigated"),
        Err(err) => println!("navigation refused: {err}"),
    }
}

fn report_exit(result: Result<InteractionOutcome, NavigationError>) {
    if let Err(err) = result {
        warn!("exit failed: {err}");
    }
}

fn report_start(result: Result<StartOutcome>) {
    match result {
        Ok(StartOutcome::Started { group_id, .. }) => println!("rotation started for group {group_id}"),
        Ok(StartOutcome::Rejected(notice)) => println!("warning: {}", notice.message),
        Err(err) => warn!("rotation start failed: {err:#}"),
    }
}

/// Register write failures are reported and the surface keeps running.
fn report_write(what: &str, result: Result<()>) {
    if let Err(err) = result {
        warn!("{what} failed: {err:#}");
        println!("{what} failed; try again");
    }
}

fn report_change(change: &SurfaceChange) {
    match change {
        SurfaceChange::Scheduler(SchedulerEvent::Warning(notice)) => {
            println!("warning: {}", notice.message)
        }
        SurfaceChange::Scheduler(SchedulerEvent::Stopped { group_id, reason }) => {
            println!("rotation stopped ({reason:?}) group {group_id:?}")
        }
        SurfaceChange::Output(status) if !status.open => println!("output window closed"),
        SurfaceChange::Resynced => warn!("surface fell behind and re-read shared state"),
        _ => {}
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
