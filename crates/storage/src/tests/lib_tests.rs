use super::*;
use shared::domain::RotationGroupDraft;

async fn seeded() -> (Storage, PresentationId, Vec<SlideId>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let presentation = storage
        .create_presentation("sunday service")
        .await
        .expect("presentation");
    let mut slides = Vec::new();
    for n in 0..4 {
        let slide = storage
            .add_slide(
                presentation,
                &SlideDraft {
                    background: format!("bg-{n}"),
                    elements: vec![serde_json::json!({"kind": "text", "value": format!("verse {n}")})],
                    notes: format!("notes {n}"),
                },
            )
            .await
            .expect("slide");
        slides.push(slide);
    }
    (storage, presentation, slides)
}

fn draft(name: &str, slide_ids: Vec<SlideId>) -> RotationGroupDraft {
    RotationGroupDraft {
        name: name.into(),
        slide_ids,
        interval_seconds: 5,
        mode: RotationMode::PingPong,
        repeat: true,
        stop_on_interaction: true,
        transition: "fade".into(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("stagesync_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn loads_presentation_with_ordered_slides_and_groups() {
    let (storage, presentation_id, slides) = seeded().await;
    let group_id = storage
        .create_rotation_group(presentation_id, draft("chorus", vec![slides[3], slides[1]]))
        .await
        .expect("group");

    let presentation = storage
        .load_presentation(presentation_id)
        .await
        .expect("load")
        .expect("exists");

    assert_eq!(presentation.name, "sunday service");
    assert_eq!(
        presentation.slides.iter().map(|s| s.id).collect::<Vec<_>>(),
        slides
    );
    assert_eq!(presentation.slides[2].notes, "notes 2");
    let group = presentation.group(group_id).expect("group loaded");
    assert_eq!(group.mode, RotationMode::PingPong);
    assert!(group.stop_on_interaction);
    assert_eq!(presentation.resolve_group_indices(group), vec![3, 1]);
}

#[tokio::test]
async fn missing_presentation_loads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage
        .load_presentation(PresentationId(77))
        .await
        .expect("load")
        .is_none());
}

#[tokio::test]
async fn rejects_invalid_rotation_groups() {
    let (storage, presentation_id, slides) = seeded().await;
    let mut invalid = draft("empty interval", vec![slides[0]]);
    invalid.interval_seconds = 0;

    assert!(storage
        .create_rotation_group(presentation_id, invalid)
        .await
        .is_err());
}

#[tokio::test]
async fn updates_and_deletes_rotation_groups() {
    let (storage, presentation_id, slides) = seeded().await;
    let group_id = storage
        .create_rotation_group(presentation_id, draft("intro", vec![slides[0]]))
        .await
        .expect("group");

    let mut group = draft("intro loop", vec![slides[0], slides[2]]).into_group(group_id);
    group.mode = RotationMode::Loop;
    assert!(storage
        .update_rotation_group(presentation_id, &group)
        .await
        .expect("update"));

    let loaded = storage
        .load_presentation(presentation_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(loaded.group(group_id), Some(&group));

    assert!(storage
        .delete_rotation_group(presentation_id, group_id)
        .await
        .expect("delete"));
    assert!(!storage
        .delete_rotation_group(presentation_id, group_id)
        .await
        .expect("delete again"));
}

#[tokio::test]
async fn deleting_slide_prunes_groups_and_renumbers_positions() {
    let (storage, presentation_id, slides) = seeded().await;
    let shared_group = storage
        .create_rotation_group(presentation_id, draft("shared", vec![slides[1], slides[2]]))
        .await
        .expect("group");
    let lonely_group = storage
        .create_rotation_group(presentation_id, draft("lonely", vec![slides[1]]))
        .await
        .expect("group");

    let removal = storage
        .delete_slide(presentation_id, slides[1])
        .await
        .expect("delete")
        .expect("slide existed");
    assert_eq!(removal.removed_index, 1);
    assert_eq!(removal.pruned_groups, vec![shared_group]);
    assert_eq!(removal.deleted_groups, vec![lonely_group]);

    let loaded = storage
        .load_presentation(presentation_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(
        loaded.slides.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![slides[0], slides[2], slides[3]]
    );
    assert!(loaded.group(lonely_group).is_none());
    let group = loaded.group(shared_group).expect("survives");
    assert_eq!(loaded.resolve_group_indices(group), vec![1]);

    // Appending after a deletion continues the dense ordering.
    let appended = storage
        .add_slide(
            presentation_id,
            &SlideDraft {
                background: "bg-new".into(),
                elements: Vec::new(),
                notes: String::new(),
            },
        )
        .await
        .expect("append");
    let reloaded = storage
        .load_presentation(presentation_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(reloaded.slide_index(appended), Some(3));
}

#[tokio::test]
async fn register_entries_upsert_with_increasing_revisions() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let presentation = PresentationId(5);

    let first = storage
        .write_register_entry(presentation, RegisterKey::Control, "{\"slideIndex\":1}", "a", Utc::now())
        .await
        .expect("write");
    let second = storage
        .write_register_entry(presentation, RegisterKey::Control, "{\"slideIndex\":2}", "b", Utc::now())
        .await
        .expect("write");
    assert!(second > first);

    assert_eq!(
        storage
            .read_register_entry(presentation, RegisterKey::Control)
            .await
            .expect("read")
            .as_deref(),
        Some("{\"slideIndex\":2}")
    );
    assert!(storage
        .read_register_entry(presentation, RegisterKey::Rotation)
        .await
        .expect("read")
        .is_none());

    let entries = storage.list_register_entries(presentation).await.expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].origin, "b");

    assert_eq!(storage.clear_register(presentation).await.expect("clear"), 1);
    assert_eq!(storage.latest_register_revision().await.expect("rev"), 0);
}
