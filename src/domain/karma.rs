use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Discriminant of a likeable entity. Points per like are fixed by kind at
/// entry creation and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    pub fn points(&self) -> i64 {
        match self {
            Self::Post => 5,
            Self::Comment => 1,
        }
    }
}

/// Polymorphic address of a likeable entity; equality is structural on
/// (kind, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: i64,
}

impl TargetRef {
    pub fn post(id: i64) -> Self {
        Self {
            kind: TargetKind::Post,
            id,
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            kind: TargetKind::Comment,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub beneficiary_id: i64,
    pub actor_id: i64,
    pub points: i64,
    pub target: TargetRef,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeState {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy)]
pub struct ToggleOutcome {
    pub state: LikeState,
    pub like_count: i64,
}

/// Per-target read-side annotation produced by batch aggregation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Annotation {
    pub like_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub username: String,
    pub karma: i64,
}
