#[cfg(test)]
mod tests {
    use crate::api::StoreId;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::RepositoryError;
    use crate::db::services::{resolve_reference_instant, resolve_store_universe, with_retry};
    use crate::models::{parse_utc_timestamp, BusinessSchedule, Poll, PollStatus};
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers_from_transient_failures() {
        let attempts = Cell::new(0u32);
        let result = with_retry("op", || {
            let attempt = attempts.get() + 1;
            attempts.set(attempt);
            async move {
                if attempt < 3 {
                    Err(RepositoryError::connection("database is unreachable"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up_after_backoff_schedule() {
        let attempts = Cell::new(0u32);
        let result: Result<(), _> = with_retry("op", || {
            attempts.set(attempts.get() + 1);
            async { Err(RepositoryError::timeout("query timed out")) }
        })
        .await;

        assert!(result.is_err());
        // One initial attempt plus three retries.
        assert_eq!(attempts.get(), 4);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_validation_errors() {
        let attempts = Cell::new(0u32);
        let result: Result<(), _> = with_retry("op", || {
            attempts.set(attempts.get() + 1);
            async { Err(RepositoryError::validation("bad input")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_store_universe_is_the_union_of_all_tables() {
        let repo = LocalRepository::new();
        repo.insert_poll(Poll {
            store_id: StoreId::from("a"),
            timestamp: parse_utc_timestamp("2024-01-01T00:00:00Z").unwrap(),
            status: PollStatus::Active,
        });
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(0, "09:00:00", "17:00:00");
        repo.set_schedule(StoreId::from("b"), schedule);
        repo.set_timezone(StoreId::from("c"), "UTC");

        let universe = resolve_store_universe(&repo).await.unwrap();
        let ids: Vec<&str> = universe.iter().map(|id| id.value()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_reference_instant_is_the_max_poll_timestamp() {
        let repo = LocalRepository::new();
        for raw in ["2024-01-03T00:00:00Z", "2024-01-05T12:30:00Z", "2024-01-04T00:00:00Z"] {
            repo.insert_poll(Poll {
                store_id: StoreId::from("a"),
                timestamp: parse_utc_timestamp(raw).unwrap(),
                status: PollStatus::Active,
            });
        }

        let now = resolve_reference_instant(&repo).await.unwrap();
        assert_eq!(now, parse_utc_timestamp("2024-01-05T12:30:00Z").unwrap());
    }

    #[tokio::test]
    async fn test_reference_instant_fails_on_empty_poll_table() {
        let repo = LocalRepository::new();
        let err = resolve_reference_instant(&repo).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
