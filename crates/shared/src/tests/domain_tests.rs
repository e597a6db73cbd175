use super::*;

fn slide(id: i64) -> Slide {
    Slide {
        id: SlideId(id),
        background: format!("#00{id:04}"),
        elements: Vec::new(),
        notes: String::new(),
    }
}

fn group(id: i64, members: &[i64]) -> RotationGroup {
    RotationGroup {
        id: RotationGroupId(id),
        name: format!("group-{id}"),
        slide_ids: members.iter().copied().map(SlideId).collect(),
        interval_seconds: 5,
        mode: RotationMode::Loop,
        repeat: true,
        stop_on_interaction: false,
        transition: "fade".into(),
    }
}

fn presentation() -> Presentation {
    Presentation {
        id: PresentationId(1),
        name: "sunday".into(),
        slides: (10..16).map(slide).collect(),
        rotation_groups: vec![group(1, &[12, 14, 15]), group(2, &[13])],
    }
}

#[test]
fn resolves_group_members_in_group_order() {
    let presentation = presentation();
    let mut reordered = group(3, &[15, 11, 12]);
    reordered.slide_ids.push(SlideId(99));

    assert_eq!(presentation.resolve_group_indices(&reordered), vec![5, 1, 2]);
    assert_eq!(
        presentation.resolve_group_indices(&presentation.rotation_groups[0]),
        vec![2, 4, 5]
    );
}

#[test]
fn removing_slide_prunes_members_and_shifts_indices() {
    let mut presentation = presentation();
    let removal = presentation.remove_slide(SlideId(14)).expect("slide exists");

    assert_eq!(removal.removed_index, 4);
    assert_eq!(removal.pruned_groups, vec![RotationGroupId(1)]);
    assert!(removal.deleted_groups.is_empty());

    let (group, indices) = presentation
        .resolve_group(RotationGroupId(1))
        .expect("group survives");
    assert_eq!(group.slide_ids, vec![SlideId(12), SlideId(15)]);
    assert_eq!(indices, vec![2, 4]);
}

#[test]
fn removing_last_member_deletes_group() {
    let mut presentation = presentation();
    let removal = presentation.remove_slide(SlideId(13)).expect("slide exists");

    assert_eq!(removal.deleted_groups, vec![RotationGroupId(2)]);
    assert!(removal.touches(RotationGroupId(2)));
    assert!(presentation.group(RotationGroupId(2)).is_none());
}

#[test]
fn removing_unknown_slide_is_noop() {
    let mut presentation = presentation();
    assert!(presentation.remove_slide(SlideId(42)).is_none());
    assert_eq!(presentation.len(), 6);
}

#[test]
fn validates_group_fields() {
    let mut invalid = group(1, &[10]);
    invalid.interval_seconds = 0;
    assert_eq!(invalid.validate(), Err(GroupValidationError::ZeroInterval));

    invalid.interval_seconds = 3;
    invalid.slide_ids.clear();
    assert_eq!(invalid.validate(), Err(GroupValidationError::NoMembers));

    invalid.slide_ids.push(SlideId(10));
    invalid.name = "  ".into();
    assert_eq!(invalid.validate(), Err(GroupValidationError::EmptyName));
}

#[test]
fn parses_rotation_modes() {
    assert_eq!(RotationMode::parse("Ping-Pong"), Some(RotationMode::PingPong));
    assert_eq!(RotationMode::parse("loop"), Some(RotationMode::Loop));
    assert_eq!(RotationMode::parse("shuffle"), None);
}

#[test]
fn control_state_clamps_stale_index() {
    let state = crate::protocol::ControlState::new(9);
    assert_eq!(state.clamped(4), 3);
    assert_eq!(state.clamped(0), 0);
    assert_eq!(state.clamped(12), 9);
}
