use register::LoopbackHub;

use super::*;

const PRESENTATION: PresentationId = PresentationId(3);

fn channels(hub: &LoopbackHub, origin: &str) -> SyncChannels {
    SyncChannels::new(Arc::new(hub.attach(origin)), PRESENTATION)
}

#[tokio::test]
async fn missing_registers_read_as_defaults() {
    let hub = LoopbackHub::new();
    let channels = channels(&hub, "output");

    assert_eq!(channels.read_control().await.slide_index, 0);
    let rotation = channels.read_rotation().await;
    assert!(!rotation.active);
    assert_eq!(rotation.group_id, None);
    assert!(!channels.read_output().await.open);
}

#[tokio::test]
async fn malformed_payloads_fall_back_to_defaults() {
    let hub = LoopbackHub::new();
    let raw = hub.attach("legacy");
    raw.write(PRESENTATION, RegisterKey::Control, "{not json".into())
        .await
        .expect("write control");
    raw.write(PRESENTATION, RegisterKey::Rotation, r#"{"active":"yes"}"#.into())
        .await
        .expect("write rotation");

    let channels = channels(&hub, "presenter");
    assert_eq!(channels.read_control().await.slide_index, 0);
    assert!(!channels.read_rotation().await.active);
}

#[tokio::test]
async fn payloads_without_timestamps_still_decode() {
    let hub = LoopbackHub::new();
    let raw = hub.attach("legacy");
    raw.write(PRESENTATION, RegisterKey::Control, r#"{"slideIndex":4}"#.into())
        .await
        .expect("write control");
    raw.write(
        PRESENTATION,
        RegisterKey::Rotation,
        r#"{"active":true,"groupId":9}"#.into(),
    )
    .await
    .expect("write rotation");

    let channels = channels(&hub, "output");
    assert_eq!(channels.read_control().await.slide_index, 4);
    assert_eq!(
        channels.read_rotation().await.active_group(),
        Some(RotationGroupId(9))
    );
}

#[tokio::test]
async fn ensure_control_creates_slot_once() {
    let hub = LoopbackHub::new();
    let control = channels(&hub, "control");

    let created = control.ensure_control().await.expect("ensure");
    assert_eq!(created.slide_index, 0);

    control.write_control(5).await.expect("write");
    let existing = control.ensure_control().await.expect("ensure again");
    assert_eq!(existing.slide_index, 5);
}

#[tokio::test]
async fn writes_use_camel_case_wire_names() {
    let hub = LoopbackHub::new();
    let control = channels(&hub, "control");
    control
        .write_rotation_active(RotationGroupId(2))
        .await
        .expect("write rotation");

    let raw = hub
        .attach("inspector")
        .read(PRESENTATION, RegisterKey::Rotation)
        .await
        .expect("read")
        .expect("rotation written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["active"], true);
    assert_eq!(value["groupId"], 2);
    assert!(value.get("updatedAt").is_some());
}

#[tokio::test]
async fn subscribers_see_foreign_changes_only() {
    let hub = LoopbackHub::new();
    let control = channels(&hub, "control");
    let output = channels(&hub, "output");
    let mut output_changes = output.subscribe(RegisterKey::Control);
    let mut control_changes = control.subscribe(RegisterKey::Control);

    control.write_control(3).await.expect("write");
    let change = output_changes.recv().await.expect("change");
    assert_eq!(decode_change::<ControlState>(&change).slide_index, 3);

    let own = tokio::time::timeout(std::time::Duration::from_millis(50), control_changes.recv()).await;
    assert!(own.is_err(), "writer must not observe its own write");
}
