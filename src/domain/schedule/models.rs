//! Scheduled post model and status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::types::Json;
use sqlx::{Decode, Encode, Postgres, Type};

use crate::domain::platforms::{PlatformIssue, PlatformTarget};

/// Post status state machine
///
/// `scheduled_pending` -> `scheduled` via resolve/update once every target is
/// ready; `scheduled` -> `publishing` only through the atomic dispatch claim;
/// `publishing` ends in `published` or `failed`. The two terminal states
/// reject all further mutation. `scheduled_pending` is never a failure - it
/// is always recoverable via resolve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    ScheduledPending,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::ScheduledPending => "scheduled_pending",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "scheduled" => PostStatus::Scheduled,
            "publishing" => PostStatus::Publishing,
            "published" => PostStatus::Published,
            "failed" => PostStatus::Failed,
            _ => PostStatus::ScheduledPending,
        }
    }

    /// Published and failed posts accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }

    /// Whether update/resolve/duplicate-source edits are allowed from here.
    /// A post that is mid-dispatch cannot be edited out from under the worker.
    pub fn accepts_edits(&self) -> bool {
        matches!(self, PostStatus::ScheduledPending | PostStatus::Scheduled)
    }
}

// sqlx Type/Decode/Encode for PostStatus to enable FromRow on ScheduledPost
impl Type<Postgres> for PostStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PostStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Ok(PostStatus::from_str(&s))
    }
}

impl Encode<'_, Postgres> for PostStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// Status a post lands in after classifying its target list.
///
/// An empty target list is the explicit "save without targets yet" escape
/// hatch: the post parks in `scheduled_pending` with no issues rather than
/// being rejected.
pub fn status_after_classification(targets: &[PlatformTarget], issues: &[PlatformIssue]) -> PostStatus {
    if targets.is_empty() || !issues.is_empty() {
        PostStatus::ScheduledPending
    } else {
        PostStatus::Scheduled
    }
}

/// Media kind for the optional single attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Guess the media kind from a URL's extension (used when a draft fans out
/// and only carries bare media URLs)
pub fn infer_media_kind(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('.').next().map(|e| e.to_ascii_lowercase()) {
        Some(ext) if matches!(ext.as_str(), "mp4" | "webm" | "mov" | "m4v") => MediaKind::Video,
        _ => MediaKind::Image,
    }
}

/// A post scheduled for publishing across one or more platform targets
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledPost {
    pub id: i64,
    pub user_id: i64,
    pub caption: String,
    pub media_kind: Option<String>,
    pub media_url: Option<String>,
    pub platforms: Json<Vec<PlatformTarget>>,
    pub issues: Json<Vec<PlatformIssue>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platforms::{IssueReason, Provider};

    fn target(provider: Provider) -> PlatformTarget {
        PlatformTarget {
            provider,
            options: None,
        }
    }

    fn issue(provider: Provider) -> PlatformIssue {
        PlatformIssue {
            provider,
            reason: IssueReason::Unconnected,
            detail: None,
        }
    }

    #[test]
    fn test_all_ready_targets_schedule() {
        let targets = vec![target(Provider::Instagram)];
        assert_eq!(
            status_after_classification(&targets, &[]),
            PostStatus::Scheduled
        );
    }

    #[test]
    fn test_any_issue_parks_pending() {
        let targets = vec![target(Provider::Instagram), target(Provider::Facebook)];
        let issues = vec![issue(Provider::Facebook)];
        assert_eq!(
            status_after_classification(&targets, &issues),
            PostStatus::ScheduledPending
        );
    }

    #[test]
    fn test_empty_targets_park_pending_without_issues() {
        assert_eq!(
            status_after_classification(&[], &[]),
            PostStatus::ScheduledPending
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(PostStatus::Published.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(!PostStatus::Publishing.is_terminal());
        assert!(!PostStatus::ScheduledPending.is_terminal());
    }

    #[test]
    fn test_publishing_rejects_edits() {
        assert!(!PostStatus::Publishing.accepts_edits());
        assert!(PostStatus::Scheduled.accepts_edits());
        assert!(PostStatus::ScheduledPending.accepts_edits());
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            PostStatus::ScheduledPending,
            PostStatus::Scheduled,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            assert_eq!(PostStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_infer_media_kind() {
        assert_eq!(infer_media_kind("https://cdn.example.com/a.mp4"), MediaKind::Video);
        assert_eq!(infer_media_kind("https://cdn.example.com/a.mov?sig=x"), MediaKind::Video);
        assert_eq!(infer_media_kind("https://cdn.example.com/a.png"), MediaKind::Image);
        assert_eq!(infer_media_kind("https://cdn.example.com/noext"), MediaKind::Image);
    }
}
