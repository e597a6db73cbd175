use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use register::RegisterKey;
use serde_json::json;
use shared::domain::{PresentationId, RotationGroupDraft, RotationGroupId, RotationMode, SlideId};
use storage::{ContentStore, SlideDraft, SqliteRegister, Storage};
use surface_core::{RotationScheduler, SyncChannels};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/stagesync.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreatePresentation {
        name: String,
    },
    List,
    Show {
        presentation_id: i64,
    },
    AddSlide {
        presentation_id: i64,
        #[arg(long, default_value = "#000000")]
        background: String,
        /// One text element per occurrence.
        #[arg(long = "text")]
        texts: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Deletes a slide, pruning it from rotation groups and stopping rotation if its group
    /// was emptied.
    DeleteSlide {
        presentation_id: i64,
        slide_id: i64,
    },
    CreateGroup {
        presentation_id: i64,
        #[arg(long)]
        name: String,
        /// Comma-separated slide ids in rotation order.
        #[arg(long, value_delimiter = ',', required = true)]
        slides: Vec<i64>,
        #[arg(long, default_value_t = 10)]
        interval_seconds: u32,
        #[arg(long, default_value = "loop")]
        mode: String,
        #[arg(long)]
        no_repeat: bool,
        #[arg(long)]
        stop_on_interaction: bool,
        #[arg(long, default_value = "")]
        transition: String,
    },
    DeleteGroup {
        presentation_id: i64,
        group_id: i64,
    },
    ShowRegisters {
        presentation_id: i64,
    },
    ResetRegisters {
        presentation_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open database '{}'", cli.database_url))?;

    match cli.command {
        Command::CreatePresentation { name } => {
            let presentation_id = storage.create_presentation(&name).await?;
            println!("created presentation_id={presentation_id}");
        }
        Command::List => {
            for (presentation_id, name) in storage.list_presentations().await? {
                println!("{presentation_id}\t{name}");
            }
        }
        Command::Show { presentation_id } => {
            let presentation = storage
                .load_presentation(PresentationId(presentation_id))
                .await?
                .ok_or_else(|| anyhow!("presentation {presentation_id} not found"))?;
            println!("{} ({} slides)", presentation.name, presentation.len());
            for (index, slide) in presentation.slides.iter().enumerate() {
                println!("  #{} slide_id={} background={}", index + 1, slide.id, slide.background);
            }
            for group in &presentation.rotation_groups {
                let indices = presentation.resolve_group_indices(group);
                println!(
                    "  group {} '{}' {} every {}s repeat={} stop_on_interaction={} slides={:?} positions={:?}",
                    group.id,
                    group.name,
                    group.mode.as_str(),
                    group.interval_seconds,
                    group.repeat,
                    group.stop_on_interaction,
                    group.slide_ids.iter().map(|id| id.0).collect::<Vec<_>>(),
                    indices.iter().map(|index| index + 1).collect::<Vec<_>>(),
                );
            }
        }
        Command::AddSlide {
            presentation_id,
            background,
            texts,
            notes,
        } => {
            let slide_id = storage
                .add_slide(
                    PresentationId(presentation_id),
                    &SlideDraft {
                        background,
                        elements: texts.into_iter().map(|text| json!({ "text": text })).collect(),
                        notes,
                    },
                )
                .await?;
            println!("created slide_id={slide_id}");
        }
        Command::DeleteSlide {
            presentation_id,
            slide_id,
        } => delete_slide(storage, PresentationId(presentation_id), SlideId(slide_id)).await?,
        Command::CreateGroup {
            presentation_id,
            name,
            slides,
            interval_seconds,
            mode,
            no_repeat,
            stop_on_interaction,
            transition,
        } => {
            let mode = RotationMode::parse(&mode).ok_or_else(|| anyhow!("unknown rotation mode '{mode}'"))?;
            let group_id = storage
                .create_rotation_group(
                    PresentationId(presentation_id),
                    RotationGroupDraft {
                        name,
                        slide_ids: slides.into_iter().map(SlideId).collect(),
                        interval_seconds,
                        mode,
                        repeat: !no_repeat,
                        stop_on_interaction,
                        transition,
                    },
                )
                .await?;
            println!("created group_id={group_id}");
        }
        Command::DeleteGroup {
            presentation_id,
            group_id,
        } => {
            let presentation_id = PresentationId(presentation_id);
            if !storage
                .delete_rotation_group(presentation_id, RotationGroupId(group_id))
                .await?
            {
                return Err(anyhow!("rotation group {group_id} not found"));
            }
            let channels = tool_channels(&storage, presentation_id).await?;
            settle_rotation(&storage, channels).await?;
            println!("deleted group_id={group_id}");
        }
        Command::ShowRegisters { presentation_id } => {
            let entries = storage
                .list_register_entries(PresentationId(presentation_id))
                .await?;
            if entries.is_empty() {
                println!("no register entries for presentation {presentation_id}");
            }
            for entry in entries {
                println!(
                    "{:<9} rev={} origin={} at={} {}",
                    entry.key,
                    entry.revision,
                    entry.origin,
                    entry.updated_at.to_rfc3339(),
                    entry.payload
                );
            }
        }
        Command::ResetRegisters { presentation_id } => {
            let removed = storage
                .clear_register(PresentationId(presentation_id))
                .await?;
            println!("removed {removed} register entries");
        }
    }

    Ok(())
}

async fn tool_channels(storage: &Storage, presentation_id: PresentationId) -> Result<SyncChannels> {
    let register = SqliteRegister::open(
        storage.clone(),
        format!("tools-{}", Uuid::new_v4()),
        Duration::from_millis(250),
    )
    .await?;
    Ok(SyncChannels::new(Arc::new(register), presentation_id))
}

async fn delete_slide(storage: Storage, presentation_id: PresentationId, slide_id: SlideId) -> Result<()> {
    let removal = storage
        .delete_slide(presentation_id, slide_id)
        .await?
        .ok_or_else(|| anyhow!("slide {slide_id} not found in presentation {presentation_id}"))?;
    info!(
        presentation_id = presentation_id.0,
        slide_id = slide_id.0,
        removed_index = removal.removed_index,
        "slide deleted"
    );

    let channels = tool_channels(&storage, presentation_id).await?;
    let len = storage
        .load_presentation(presentation_id)
        .await?
        .map(|presentation| presentation.len())
        .unwrap_or_default();
    let control = channels.read_control().await;
    if len > 0 && control.slide_index >= len {
        channels.write_control(len - 1).await?;
    }
    settle_rotation(&storage, channels).await?;

    println!(
        "deleted slide_id={slide_id}; pruned groups {:?}; deleted groups {:?}",
        removal.pruned_groups, removal.deleted_groups
    );
    Ok(())
}

/// Stops rotation when its group no longer resolves to any slide.
async fn settle_rotation(storage: &Storage, channels: SyncChannels) -> Result<()> {
    let scheduler = RotationScheduler::spawn(channels.clone(), Arc::new(storage.clone()));
    scheduler.on_group_mutated().await?;
    scheduler.shutdown().await;
    if let Some(group_id) = channels.read_rotation().await.active_group() {
        println!("rotation still active for group {group_id}");
    }
    println!(
        "{} register now: {}",
        RegisterKey::Rotation,
        serde_json::to_string(&channels.read_rotation().await)?
    );
    Ok(())
}
