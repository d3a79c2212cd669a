use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::storage::{date_key, DocumentStore, VisitorStats};

/// Count one visit for the local calendar day.
pub async fn record_visit(store: &DocumentStore) -> VisitorStats {
    record_visit_on(store, Local::now().date_naive()).await
}

/// Read-modify-write of `data/stats.json`. Increments unconditionally;
/// callers guarantee it runs once per session. A failed remote write is
/// tolerated: a lost visit count is acceptable.
pub async fn record_visit_on(store: &DocumentStore, today: NaiveDate) -> VisitorStats {
    let mut stats = store.load_doc::<VisitorStats>().await.doc;
    stats.record(today);

    let message = format!("Update stats for {}", date_key(today));
    if !store.save_doc(&stats, &message).await {
        debug!("Visit for {} only recorded locally", date_key(today));
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFiles;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_two_visits_on_distinct_days() {
        let temp_dir = TempDir::new().unwrap();
        let (store, remote) = DocumentStore::in_memory(LocalFiles::new(temp_dir.path()));

        let d1 = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        record_visit_on(&store, d1).await;
        let stats = record_visit_on(&store, d2).await;

        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.daily_visitors.len(), 2);
        assert_eq!(stats.visitors_on(d1), 1);
        assert_eq!(stats.visitors_on(d2), 1);

        let messages: Vec<_> = remote.commits().into_iter().map(|c| c.message).collect();
        assert_eq!(messages, vec!["Update stats for 2024-03-15", "Update stats for 2024-03-16"]);
    }

    #[tokio::test]
    async fn test_visit_counted_locally_when_remote_is_down() {
        let temp_dir = TempDir::new().unwrap();
        let (store, remote) = DocumentStore::in_memory(LocalFiles::new(temp_dir.path()));
        remote.set_offline(true);

        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        record_visit_on(&store, today).await;
        let stats = record_visit_on(&store, today).await;

        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.visitors_on(today), 2);
    }
}
