use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PresentationId);
id_newtype!(SlideId);
id_newtype!(RotationGroupId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    #[default]
    Loop,
    PingPong,
}

impl RotationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RotationMode::Loop => "loop",
            RotationMode::PingPong => "ping_pong",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "loop" => Some(RotationMode::Loop),
            "ping_pong" | "ping-pong" | "pingpong" => Some(RotationMode::PingPong),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: SlideId,
    pub background: String,
    #[serde(default)]
    pub elements: Vec<serde_json::Value>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationGroup {
    pub id: RotationGroupId,
    pub name: String,
    pub slide_ids: Vec<SlideId>,
    pub interval_seconds: u32,
    pub mode: RotationMode,
    pub repeat: bool,
    pub stop_on_interaction: bool,
    /// Cosmetic; passed through to renderers untouched.
    #[serde(default)]
    pub transition: String,
}

/// A rotation group that has not been assigned an id by the content store yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationGroupDraft {
    pub name: String,
    pub slide_ids: Vec<SlideId>,
    pub interval_seconds: u32,
    pub mode: RotationMode,
    pub repeat: bool,
    pub stop_on_interaction: bool,
    #[serde(default)]
    pub transition: String,
}

impl RotationGroupDraft {
    pub fn into_group(self, id: RotationGroupId) -> RotationGroup {
        RotationGroup {
            id,
            name: self.name,
            slide_ids: self.slide_ids,
            interval_seconds: self.interval_seconds,
            mode: self.mode,
            repeat: self.repeat,
            stop_on_interaction: self.stop_on_interaction,
            transition: self.transition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupValidationError {
    #[error("rotation group name must not be empty")]
    EmptyName,
    #[error("rotation group interval must be greater than zero seconds")]
    ZeroInterval,
    #[error("rotation group must contain at least one slide")]
    NoMembers,
}

impl RotationGroup {
    pub fn validate(&self) -> Result<(), GroupValidationError> {
        validate_group_fields(&self.name, self.interval_seconds, &self.slide_ids)
    }

    pub fn contains(&self, slide_id: SlideId) -> bool {
        self.slide_ids.contains(&slide_id)
    }
}

impl RotationGroupDraft {
    pub fn validate(&self) -> Result<(), GroupValidationError> {
        validate_group_fields(&self.name, self.interval_seconds, &self.slide_ids)
    }
}

fn validate_group_fields(
    name: &str,
    interval_seconds: u32,
    slide_ids: &[SlideId],
) -> Result<(), GroupValidationError> {
    if name.trim().is_empty() {
        return Err(GroupValidationError::EmptyName);
    }
    if interval_seconds == 0 {
        return Err(GroupValidationError::ZeroInterval);
    }
    if slide_ids.is_empty() {
        return Err(GroupValidationError::NoMembers);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: PresentationId,
    pub name: String,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub rotation_groups: Vec<RotationGroup>,
}

/// What changed when a slide was removed from a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlideRemoval {
    pub removed_index: usize,
    /// Groups that lost the slide but still have members.
    pub pruned_groups: Vec<RotationGroupId>,
    /// Groups whose membership became empty and were deleted.
    pub deleted_groups: Vec<RotationGroupId>,
}

impl SlideRemoval {
    pub fn touches(&self, group_id: RotationGroupId) -> bool {
        self.pruned_groups.contains(&group_id) || self.deleted_groups.contains(&group_id)
    }
}

impl Presentation {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slide_index(&self, slide_id: SlideId) -> Option<usize> {
        self.slides.iter().position(|slide| slide.id == slide_id)
    }

    pub fn group(&self, group_id: RotationGroupId) -> Option<&RotationGroup> {
        self.rotation_groups.iter().find(|group| group.id == group_id)
    }

    pub fn group_mut(&mut self, group_id: RotationGroupId) -> Option<&mut RotationGroup> {
        self.rotation_groups
            .iter_mut()
            .find(|group| group.id == group_id)
    }

    /// Positions of the group's members in the current slide order, in group order.
    /// Member ids that no longer resolve are skipped.
    pub fn resolve_group_indices(&self, group: &RotationGroup) -> Vec<usize> {
        group
            .slide_ids
            .iter()
            .filter_map(|slide_id| self.slide_index(*slide_id))
            .collect()
    }

    pub fn resolve_group(&self, group_id: RotationGroupId) -> Option<(&RotationGroup, Vec<usize>)> {
        let group = self.group(group_id)?;
        let indices = self.resolve_group_indices(group);
        Some((group, indices))
    }

    pub fn remove_slide(&mut self, slide_id: SlideId) -> Option<SlideRemoval> {
        let removed_index = self.slide_index(slide_id)?;
        self.slides.remove(removed_index);

        let mut removal = SlideRemoval {
            removed_index,
            ..SlideRemoval::default()
        };
        for group in &mut self.rotation_groups {
            if !group.contains(slide_id) {
                continue;
            }
            group.slide_ids.retain(|member| *member != slide_id);
            if group.slide_ids.is_empty() {
                removal.deleted_groups.push(group.id);
            } else {
                removal.pruned_groups.push(group.id);
            }
        }
        self.rotation_groups
            .retain(|group| !removal.deleted_groups.contains(&group.id));

        Some(removal)
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
