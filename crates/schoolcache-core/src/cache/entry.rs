use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::query::{QueryData, QueryError, QueryKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: FetchStatus,
    /// Last successful result; kept through later errors and refetches.
    pub data: Option<Arc<QueryData>>,
    pub error: Option<QueryError>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub subscribers: usize,
}

impl CacheEntry {
    pub(crate) fn new(key: QueryKey) -> Self {
        Self {
            key,
            status: FetchStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            stale: false,
            subscribers: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    /// Loading with earlier data still on display.
    pub fn is_refreshing(&self) -> bool {
        self.is_loading() && self.data.is_some()
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, FetchStatus::Success | FetchStatus::Error)
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.fetched_at.map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;
    use chrono::Duration;

    fn entry_fetched(minutes_ago: i64) -> CacheEntry {
        let mut entry = CacheEntry::new(QueryKey::new(EntityKind::Fee, "all"));
        entry.fetched_at = Some(Utc::now() - Duration::minutes(minutes_ago));
        entry
    }

    #[test]
    fn test_age_display() {
        let never = CacheEntry::new(QueryKey::new(EntityKind::Fee, "all"));
        assert_eq!(never.age_display(), "never");
        assert_eq!(entry_fetched(0).age_display(), "just now");
        assert_eq!(entry_fetched(5).age_display(), "5m ago");
        assert_eq!(entry_fetched(95).age_display(), "2h ago");
        assert_eq!(entry_fetched(61).age_display(), "1h ago");
        assert_eq!(entry_fetched(3 * 1440 + 60).age_display(), "3d ago");
    }

    #[test]
    fn test_status_helpers() {
        let mut entry = CacheEntry::new(QueryKey::new(EntityKind::Fee, "all"));
        assert!(!entry.is_settled());
        entry.status = FetchStatus::Loading;
        assert!(entry.is_loading());
        assert!(!entry.is_refreshing());
        entry.data = Some(Arc::new(QueryData::List(Vec::new())));
        assert!(entry.is_refreshing());
        entry.status = FetchStatus::Error;
        assert!(entry.is_settled());
    }
}
