use std::{sync::Arc, time::Duration};

use serde_json::json;
use shared::domain::{PresentationId, RotationGroupDraft, RotationMode, SlideId};
use storage::{ContentStore, SlideDraft, SqliteRegister, Storage};
use surface_core::{
    ControlSurface, OutlineRenderer, OutputSurface, StartOutcome, SurfaceCore, SurfaceRole,
    SyncChannels, Viewport,
};

const WATCH_INTERVAL: Duration = Duration::from_millis(10);

async fn seeded_storage() -> (Storage, PresentationId, Vec<SlideId>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let presentation_id = storage
        .create_presentation("evening service")
        .await
        .expect("presentation");
    let mut slide_ids = Vec::new();
    for verse in 1..=4 {
        let slide_id = storage
            .add_slide(
                presentation_id,
                &SlideDraft {
                    background: "#101010".into(),
                    elements: vec![json!({ "text": format!("verse {verse}") })],
                    notes: format!("sing verse {verse}"),
                },
            )
            .await
            .expect("slide");
        slide_ids.push(slide_id);
    }
    (storage, presentation_id, slide_ids)
}

async fn open_core(
    storage: &Storage,
    presentation_id: PresentationId,
    role: SurfaceRole,
) -> SurfaceCore<OutlineRenderer> {
    let register = SqliteRegister::open(storage.clone(), role.as_str(), WATCH_INTERVAL)
        .await
        .expect("register");
    SurfaceCore::open(
        role,
        SyncChannels::new(Arc::new(register), presentation_id),
        Arc::new(storage.clone()),
        OutlineRenderer,
        Viewport::new(1280, 720),
    )
    .await
    .expect("surface")
}

async fn wait_for_output_slide(output: &mut OutputSurface<OutlineRenderer>, slide_index: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while output.core().slide_index() != slide_index {
            output.next_change().await.expect("output connected");
        }
    })
    .await
    .expect("output caught up");
}

#[tokio::test]
async fn surfaces_sharing_a_database_stay_on_the_same_slide() {
    let (storage, presentation_id, _) = seeded_storage().await;
    let mut control =
        ControlSurface::new(open_core(&storage, presentation_id, SurfaceRole::Control).await).await;
    let mut output =
        OutputSurface::new(open_core(&storage, presentation_id, SurfaceRole::Output).await);

    control.jump_to(2).await.expect("jump");
    wait_for_output_slide(&mut output, 2).await;
    assert_eq!(
        output.frame().map(String::as_str),
        Some("slide 3 @0.67x [#101010] verse 3")
    );

    control.back().await.expect("back");
    wait_for_output_slide(&mut output, 1).await;
}

#[tokio::test]
async fn rotation_written_by_control_advances_output() {
    let (storage, presentation_id, slide_ids) = seeded_storage().await;
    let group_id = storage
        .create_rotation_group(
            presentation_id,
            RotationGroupDraft {
                name: "announcements".into(),
                slide_ids: vec![slide_ids[1], slide_ids[3]],
                interval_seconds: 1,
                mode: RotationMode::Loop,
                repeat: true,
                stop_on_interaction: true,
                transition: "fade".into(),
            },
        )
        .await
        .expect("group");

    let mut control =
        ControlSurface::new(open_core(&storage, presentation_id, SurfaceRole::Control).await).await;
    let mut output =
        OutputSurface::new(open_core(&storage, presentation_id, SurfaceRole::Output).await);

    let started = control.start_rotation(Some(group_id)).await.expect("start");
    assert_eq!(
        started,
        StartOutcome::Started {
            group_id,
            slide_index: 1
        }
    );
    wait_for_output_slide(&mut output, 1).await;
    wait_for_output_slide(&mut output, 3).await;

    control.advance().await.expect("advance stops rotation");
    assert!(!control.core().rotation().active);
    tokio::time::timeout(Duration::from_secs(5), async {
        while output.core().rotation().active {
            output.next_change().await.expect("output connected");
        }
    })
    .await
    .expect("output saw rotation stop");
    assert_eq!(output.core().rotation().group_id, Some(group_id));
}

#[tokio::test]
async fn closing_output_clears_control_flag() {
    let (storage, presentation_id, _) = seeded_storage().await;
    let mut control =
        ControlSurface::new(open_core(&storage, presentation_id, SurfaceRole::Control).await).await;
    let output = OutputSurface::new(open_core(&storage, presentation_id, SurfaceRole::Output).await);

    control.mark_output_opened().await.expect("opened");
    output.close().await.expect("close");

    tokio::time::timeout(Duration::from_secs(5), async {
        while control.is_output_open() {
            control.next_change().await.expect("control connected");
        }
    })
    .await
    .expect("control saw output close");
}
