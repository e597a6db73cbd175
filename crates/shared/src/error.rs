use serde::{Deserialize, Serialize};

use crate::domain::RotationGroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeCode {
    UnknownGroup,
    EmptyGroup,
    NoGroupSelected,
    InvalidGroup,
    PresentationMissing,
    Internal,
}

/// A non-fatal problem surfaced to the operator instead of being thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorNotice {
    pub code: NoticeCode,
    pub message: String,
}

impl OperatorNotice {
    pub fn new(code: NoticeCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_group(group_id: RotationGroupId) -> Self {
        Self::new(
            NoticeCode::UnknownGroup,
            format!("rotation group {group_id} does not exist"),
        )
    }

    pub fn empty_group(group_id: RotationGroupId) -> Self {
        Self::new(
            NoticeCode::EmptyGroup,
            format!("rotation group {group_id} has no slides in this presentation"),
        )
    }
}

impl std::fmt::Display for OperatorNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}
