//! Integration tests for ProcessedAgentDataRepository against a migrated SQLite database.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use roadwatch::error::RepositoryError;
use roadwatch::models::{NewProcessedAgentRecord, ProcessedAgentRecord};
use roadwatch::repositories::{ListQuery, RecordFilter, SortDirection};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::setup_test_repository;

fn smooth_reading() -> NewProcessedAgentRecord {
    NewProcessedAgentRecord::new("smooth")
        .with_user_id(7)
        .with_acceleration(0.12, -0.03, 9.81)
        .with_location(37.77, -122.41)
        .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

#[tokio::test]
async fn insert_then_get_returns_identical_record() -> Result<()> {
    let repo = setup_test_repository().await?;

    let inserted = repo.insert(smooth_reading()).await?;
    let fetched = repo.get_by_id(inserted.id).await?;

    assert_eq!(inserted, fetched);
    Ok(())
}

#[tokio::test]
async fn smooth_scenario_echoes_every_field() -> Result<()> {
    let repo = setup_test_repository().await?;

    let stored = ProcessedAgentRecord::from(repo.insert(smooth_reading()).await?);

    assert!(stored.id > 0);
    assert_eq!(stored.road_state, "smooth");
    assert_eq!(stored.user_id, Some(7));
    assert_eq!(stored.x, Some(0.12));
    assert_eq!(stored.y, Some(-0.03));
    assert_eq!(stored.z, Some(9.81));
    assert_eq!(stored.latitude, Some(37.77));
    assert_eq!(stored.longitude, Some(-122.41));
    assert_eq!(
        stored.timestamp,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    Ok(())
}

#[tokio::test]
async fn only_road_state_leaves_other_fields_absent() -> Result<()> {
    let repo = setup_test_repository().await?;

    let inserted = repo.insert(NewProcessedAgentRecord::new("pothole")).await?;
    let fetched = repo.get_by_id(inserted.id).await?;

    assert_eq!(fetched.road_state, "pothole");
    assert_eq!(fetched.user_id, None);
    assert_eq!((fetched.x, fetched.y, fetched.z), (None, None, None));
    assert_eq!(fetched.latitude, None);
    assert_eq!(fetched.longitude, None);
    assert_eq!(fetched.timestamp, None);
    Ok(())
}

#[tokio::test]
async fn invalid_road_state_is_rejected_without_writing() -> Result<()> {
    let repo = setup_test_repository().await?;

    let candidates = [
        NewProcessedAgentRecord::new(""),
        NewProcessedAgentRecord::new("   "),
        NewProcessedAgentRecord::default(),
        NewProcessedAgentRecord {
            road_state: Some(String::new()),
            user_id: Some(7),
            ..Default::default()
        },
    ];

    for candidate in candidates {
        let result = repo.insert(candidate).await;
        assert!(
            matches!(result, Err(RepositoryError::Validation(_))),
            "expected validation error, got {result:?}"
        );
    }

    assert_eq!(repo.count(&RecordFilter::default()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_inserts_get_distinct_ids() -> Result<()> {
    let repo = setup_test_repository().await?;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.insert(NewProcessedAgentRecord::new("bumpy").with_user_id(i))
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let model = handle.await??;
        assert!(ids.insert(model.id), "duplicate id {}", model.id);
    }

    assert_eq!(ids.len(), 20);
    assert_eq!(repo.count(&RecordFilter::default()).await?, 20);
    Ok(())
}

#[tokio::test]
async fn get_by_id_reports_missing_record() -> Result<()> {
    let repo = setup_test_repository().await?;

    let result = repo.get_by_id(9999).await;

    assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn delete_returns_removed_record_and_forgets_it() -> Result<()> {
    let repo = setup_test_repository().await?;
    let inserted = repo.insert(smooth_reading()).await?;

    let removed = repo.delete(inserted.id).await?;
    assert_eq!(removed, inserted);

    assert!(matches!(
        repo.get_by_id(inserted.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        repo.delete(inserted.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn ids_are_not_reused_after_delete() -> Result<()> {
    let repo = setup_test_repository().await?;

    let first = repo.insert(NewProcessedAgentRecord::new("smooth")).await?;
    let second = repo.insert(NewProcessedAgentRecord::new("smooth")).await?;
    repo.delete(second.id).await?;

    let third = repo.insert(NewProcessedAgentRecord::new("smooth")).await?;

    assert!(second.id > first.id);
    assert!(third.id > second.id);
    Ok(())
}

#[tokio::test]
async fn list_filters_combine() -> Result<()> {
    let repo = setup_test_repository().await?;
    let jan = |day| Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();

    let fixtures = [
        NewProcessedAgentRecord::new("smooth")
            .with_user_id(1)
            .with_timestamp(jan(1))
            .with_location(1.0, 2.0),
        NewProcessedAgentRecord::new("pothole")
            .with_user_id(1)
            .with_timestamp(jan(5)),
        NewProcessedAgentRecord::new("pothole")
            .with_user_id(2)
            .with_timestamp(jan(5))
            .with_location(3.0, 4.0),
        NewProcessedAgentRecord::new("pothole")
            .with_user_id(1)
            .with_timestamp(jan(9))
            .with_location(5.0, 6.0),
    ];
    for fixture in fixtures {
        repo.insert(fixture).await?;
    }
    repo.insert(NewProcessedAgentRecord::new("pothole")).await?;

    let by_user = RecordFilter::for_user(1);
    assert_eq!(repo.count(&by_user).await?, 3);

    let potholes_for_user = RecordFilter {
        road_state: Some("pothole".to_string()),
        ..RecordFilter::for_user(1)
    };
    assert_eq!(repo.count(&potholes_for_user).await?, 2);

    // Inclusive on both ends
    let window = RecordFilter {
        timestamp_from: Some(jan(5)),
        timestamp_to: Some(jan(9)),
        ..Default::default()
    };
    assert_eq!(repo.count(&window).await?, 3);

    let located = RecordFilter {
        has_location: Some(true),
        ..Default::default()
    };
    assert_eq!(repo.count(&located).await?, 3);

    let unlocated = RecordFilter {
        has_location: Some(false),
        ..Default::default()
    };
    assert_eq!(repo.count(&unlocated).await?, 2);

    let page = repo
        .list(&ListQuery {
            filter: RecordFilter {
                has_location: Some(true),
                ..RecordFilter::for_user(1)
            },
            ..Default::default()
        })
        .await?;
    let states: Vec<_> = page.records.iter().map(|r| r.road_state.as_str()).collect();
    assert_eq!(states, ["smooth", "pothole"]);
    assert!(!page.has_more());
    Ok(())
}

#[tokio::test]
async fn list_orders_by_id_in_both_directions() -> Result<()> {
    let repo = setup_test_repository().await?;
    for _ in 0..5 {
        repo.insert(NewProcessedAgentRecord::new("smooth")).await?;
    }

    let ascending = repo.list(&ListQuery::default()).await?;
    let asc_ids: Vec<_> = ascending.records.iter().map(|r| r.id).collect();
    assert!(asc_ids.windows(2).all(|w| w[0] < w[1]));

    let descending = repo
        .list(&ListQuery {
            direction: SortDirection::Desc,
            ..Default::default()
        })
        .await?;
    let desc_ids: Vec<_> = descending.records.iter().map(|r| r.id).collect();
    assert!(desc_ids.windows(2).all(|w| w[0] > w[1]));

    let mut reversed = desc_ids.clone();
    reversed.reverse();
    assert_eq!(asc_ids, reversed);
    Ok(())
}

#[tokio::test]
async fn pagination_walks_every_record_once() -> Result<()> {
    let repo = setup_test_repository().await?;
    for i in 0..7 {
        repo.insert(NewProcessedAgentRecord::new("smooth").with_user_id(i))
            .await?;
    }

    let mut query = ListQuery {
        limit: 3,
        ..Default::default()
    };
    let mut seen = Vec::new();
    let mut pages = 0;

    loop {
        let page = repo.list(&query).await?;
        pages += 1;
        seen.extend(page.records.iter().map(|r| r.id));
        match page.next_cursor {
            Some(cursor) => query.after = Some(cursor),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 7);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 7);
    Ok(())
}

#[tokio::test]
async fn exact_multiple_of_limit_has_no_trailing_cursor() -> Result<()> {
    let repo = setup_test_repository().await?;
    for _ in 0..4 {
        repo.insert(NewProcessedAgentRecord::new("smooth")).await?;
    }

    let first = repo
        .list(&ListQuery {
            limit: 2,
            ..Default::default()
        })
        .await?;
    assert!(first.has_more());

    let second = repo
        .list(&ListQuery {
            limit: 2,
            after: first.next_cursor,
            ..Default::default()
        })
        .await?;
    assert_eq!(second.records.len(), 2);
    assert_eq!(second.next_cursor, None);
    Ok(())
}

#[tokio::test]
async fn scan_is_finite_and_restartable() -> Result<()> {
    let repo = setup_test_repository().await?;
    for _ in 0..5 {
        repo.insert(NewProcessedAgentRecord::new("smooth")).await?;
    }

    let mut scan = repo.scan(ListQuery {
        limit: 2,
        ..Default::default()
    });

    let first_pass = scan.collect_all().await?;
    assert_eq!(first_pass.len(), 5);
    assert!(scan.next_page().await?.is_none());

    scan.restart();
    assert_eq!(scan.cursor(), None);
    let second_pass = scan.collect_all().await?;
    assert_eq!(first_pass, second_pass);
    Ok(())
}

#[tokio::test]
async fn scan_restarts_from_its_initial_cursor() -> Result<()> {
    let repo = setup_test_repository().await?;
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(repo.insert(NewProcessedAgentRecord::new("smooth")).await?.id);
    }

    let mut scan = repo.scan(ListQuery {
        limit: 1,
        after: Some(ids[1]),
        ..Default::default()
    });

    let first = scan.next_page().await?.expect("a page after the cursor");
    assert_eq!(first[0].id, ids[2]);
    assert_eq!(scan.cursor(), Some(ids[2]));

    scan.restart();
    assert_eq!(scan.cursor(), Some(ids[1]));
    let replay = scan.collect_all().await?;
    assert_eq!(replay.iter().map(|r| r.id).collect::<Vec<_>>(), ids[2..]);
    Ok(())
}

#[tokio::test]
async fn batch_insert_is_atomic_and_ordered() -> Result<()> {
    let repo = setup_test_repository().await?;

    let stored = repo
        .insert_many(vec![
            NewProcessedAgentRecord::new("smooth").with_user_id(1),
            NewProcessedAgentRecord::new("pothole").with_user_id(1),
        ])
        .await?;

    assert_eq!(stored.len(), 2);
    assert!(stored[0].id < stored[1].id);
    assert_eq!(stored[1].road_state, "pothole");

    let rejected = repo
        .insert_many(vec![
            NewProcessedAgentRecord::new("smooth"),
            NewProcessedAgentRecord::new("   "),
        ])
        .await;
    assert!(matches!(rejected, Err(RepositoryError::Validation(_))));
    assert_eq!(repo.count(&RecordFilter::default()).await?, 2);
    Ok(())
}
