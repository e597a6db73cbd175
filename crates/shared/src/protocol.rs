use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RotationGroupId;

/// Payload of the `control` register: which slide is showing now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub slide_index: usize,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl ControlState {
    pub fn new(slide_index: usize) -> Self {
        Self {
            slide_index,
            updated_at: Utc::now(),
        }
    }

    /// Index brought back into `[0, len)`; a stale register value can point past the end
    /// after slides were deleted.
    pub fn clamped(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            self.slide_index.min(len - 1)
        }
    }
}

/// Payload of the `rotation` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub active: bool,
    #[serde(default)]
    pub group_id: Option<RotationGroupId>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl RotationState {
    pub fn active(group_id: RotationGroupId) -> Self {
        Self {
            active: true,
            group_id: Some(group_id),
            updated_at: Utc::now(),
        }
    }

    pub fn inactive(group_id: Option<RotationGroupId>) -> Self {
        Self {
            active: false,
            group_id,
            updated_at: Utc::now(),
        }
    }

    pub fn active_group(&self) -> Option<RotationGroupId> {
        if self.active {
            self.group_id
        } else {
            None
        }
    }
}

/// Payload of the `output` register. The output surface itself only writes `open: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStatus {
    pub open: bool,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl OutputStatus {
    pub fn opened() -> Self {
        Self {
            open: true,
            updated_at: Utc::now(),
        }
    }

    pub fn closed() -> Self {
        Self {
            open: false,
            updated_at: Utc::now(),
        }
    }
}
