//! Calendar projection - read-only month view of scheduled posts
//!
//! Grouping key is the calendar date in the viewer's reference timezone, not
//! the raw timestamp. The same `tz_offset` drives both the month-range filter
//! and the per-post bucketing, so a post can never pass the filter and then
//! land outside the month (or on the wrong visual day).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;

use super::schedule::ScheduledPost;

/// Parse a `YYYY-MM` month string into its first day
pub fn parse_month(month: &str) -> Option<NaiveDate> {
    let (year, month) = month.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Build a viewer timezone from an offset in minutes east of UTC
///
/// The minutes come straight off a query parameter, so the multiplication
/// must not be allowed to overflow ahead of the range check.
pub fn viewer_offset(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

/// UTC half-open range `[from, until)` covering the month in viewer-local time
pub fn month_range_utc(first_day: NaiveDate, tz: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let next_month = if first_day.month() == 12 {
        NaiveDate::from_ymd_opt(first_day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first_day.year(), first_day.month() + 1, 1)
    }
    // the 1st of a month always exists
    .expect("first of month");

    let start = first_day
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_local_timezone(tz)
        .single()
        .expect("fixed offsets are unambiguous")
        .with_timezone(&Utc);
    let end = next_month
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_local_timezone(tz)
        .single()
        .expect("fixed offsets are unambiguous")
        .with_timezone(&Utc);

    (start, end)
}

/// Calendar date a timestamp falls on for the viewer
pub fn local_date(at: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Group posts by viewer-local calendar date. Posts without a `scheduled_at`
/// never appear here - they only show in the unscheduled pending listing.
pub fn bucket_by_day(
    posts: Vec<ScheduledPost>,
    tz: FixedOffset,
) -> BTreeMap<NaiveDate, Vec<ScheduledPost>> {
    let mut days: BTreeMap<NaiveDate, Vec<ScheduledPost>> = BTreeMap::new();

    for post in posts {
        if let Some(at) = post.scheduled_at {
            days.entry(local_date(at, tz)).or_default().push(post);
        }
    }

    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::PostStatus;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn post(id: i64, scheduled_at: Option<DateTime<Utc>>) -> ScheduledPost {
        let now = Utc::now();
        ScheduledPost {
            id,
            user_id: 1,
            caption: "caption".to_string(),
            media_kind: None,
            media_url: None,
            platforms: Json(vec![]),
            issues: Json(vec![]),
            scheduled_at,
            status: PostStatus::ScheduledPending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(
            parse_month("2026-08"),
            NaiveDate::from_ymd_opt(2026, 8, 1)
        );
        assert_eq!(parse_month("2026-13"), None);
        assert_eq!(parse_month("2026"), None);
        assert_eq!(parse_month("aug-2026"), None);
    }

    #[test]
    fn test_viewer_offset_rejects_out_of_range_minutes() {
        assert!(viewer_offset(0).is_some());
        assert!(viewer_offset(-480).is_some());
        // beyond UTC+/-18:00
        assert!(viewer_offset(1500).is_none());
        assert!(viewer_offset(-1500).is_none());
        // large enough to overflow the seconds conversion
        assert!(viewer_offset(i32::MAX).is_none());
        assert!(viewer_offset(i32::MIN).is_none());
    }

    #[test]
    fn test_month_range_covers_viewer_local_month() {
        let first = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let tz = viewer_offset(-480).unwrap(); // UTC-8

        let (from, until) = month_range_utc(first, tz);

        // Local midnight Aug 1 at UTC-8 is 08:00 UTC
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let first = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        let (from, until) = month_range_utc(first, viewer_offset(0).unwrap());

        assert_eq!(from, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_bucketing_uses_viewer_local_date() {
        // 23:30 UTC on the 10th is already the 11th for a UTC+2 viewer
        let at = Utc.with_ymd_and_hms(2026, 8, 10, 23, 30, 0).unwrap();
        let tz = viewer_offset(120).unwrap();

        let days = bucket_by_day(vec![post(1, Some(at))], tz);

        let date = NaiveDate::from_ymd_opt(2026, 8, 11).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[&date].len(), 1);
    }

    #[test]
    fn test_unscheduled_posts_are_excluded() {
        let at = Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).unwrap();
        let days = bucket_by_day(
            vec![post(1, None), post(2, Some(at))],
            viewer_offset(0).unwrap(),
        );

        let all: Vec<i64> = days.values().flatten().map(|p| p.id).collect();
        assert_eq!(all, vec![2]);
    }

    #[test]
    fn test_same_day_posts_share_a_bucket() {
        let tz = viewer_offset(0).unwrap();
        let a = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 10, 18, 0, 0).unwrap();

        let days = bucket_by_day(vec![post(1, Some(a)), post(2, Some(b))], tz);

        let date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        assert_eq!(days[&date].iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
