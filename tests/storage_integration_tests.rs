//! Integration tests for the storage layer
//!
//! Each test opens its own in-memory SQLite store, so the schema gate,
//! default levels and every invariant are exercised from scratch.

use std::time::Duration;

use scoreboard_server::storage::repository::*;
use scoreboard_server::storage::progress::MAX_TRIES;
use scoreboard_server::storage::reports::ReportFilter;
use scoreboard_server::{ScoreStore, StoreError};

async fn memory_store() -> ScoreStore {
    ScoreStore::connect("sqlite::memory:", 1, Duration::from_secs(5))
        .await
        .expect("Failed to open in-memory store")
}

fn new_user(initials: &str, group: &str, list: &str) -> NewUser {
    NewUser {
        initials: initials.to_string(),
        password: format!("{}-secret", initials),
        role: "student".to_string(),
        list: list.to_string(),
        group: group.to_string(),
        gender: "female".to_string(),
    }
}

async fn count(store: &ScoreStore, sql: &str, initials: &str) -> i64 {
    sqlx::query_scalar(sql)
        .bind(initials)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn row_counts(store: &ScoreStore, initials: &str) -> (i64, i64, i64, i64) {
    (
        count(store, "SELECT COUNT(*) FROM users WHERE initials = ?", initials).await,
        count(store, "SELECT COUNT(*) FROM statistics WHERE initials = ?", initials).await,
        count(store, "SELECT COUNT(*) FROM leaderboard WHERE student_id = ?", initials).await,
        count(store, "SELECT COUNT(*) FROM user_levels WHERE user_initials = ?", initials).await,
    )
}

async fn level_count(store: &ScoreStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM levels")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn attempt_count(store: &ScoreStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM objects")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

// ============================================================================
// Schema
// ============================================================================

#[tokio::test]
async fn test_schema_seeds_three_default_levels() {
    let store = memory_store().await;
    assert!(store.is_schema_ready());

    let levels = store.get_levels().await.unwrap();
    let seeded: Vec<(&str, i64)> = levels.iter().map(|l| (l.name.as_str(), l.max_score)).collect();
    assert_eq!(seeded, vec![("Level 1", 100), ("Level 2", 200), ("Level 3", 300)]);
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let store = memory_store().await;
    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();
    assert_eq!(level_count(&store).await, 3);
}

#[tokio::test]
async fn test_reopened_file_store_keeps_levels() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("scores.db").display());

    {
        let store = ScoreStore::connect(&url, 2, Duration::from_secs(5)).await.unwrap();
        store.register(&new_user("jd", "A", "list1")).await.unwrap();
        store.pool().close().await;
    }

    // A second process start runs the DDL again against existing tables.
    let store = ScoreStore::connect(&url, 2, Duration::from_secs(5)).await.unwrap();
    assert_eq!(level_count(&store).await, 3);
    assert!(store.exists("jd").await.unwrap());
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_seeds_all_related_rows() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "list1")).await.unwrap();

    assert_eq!(row_counts(&store, "jd").await, (1, 1, 1, 3));

    let stats = store.get_statistics("jd").await.unwrap().expect("statistics row");
    assert_eq!(stats.games_played, 0);
    assert_eq!(stats.average_score, 0.0);
    assert_eq!(stats.highest_score, 0.0);

    let levels = store.get_user_levels("jd").await.unwrap();
    assert!(levels.iter().all(|l| !l.completed && l.score == 0 && l.tries == 0));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts_without_writes() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "list1")).await.unwrap();

    let mut again = new_user("jd", "B", "list2");
    again.password = "different".to_string();
    let err = store.register(&again).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);

    assert_eq!(row_counts(&store, "jd").await, (1, 1, 1, 3));
    let user = store.find_user("jd").await.unwrap().unwrap();
    assert_eq!(user.group.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_concurrent_registration_yields_one_conflict() {
    let store = memory_store().await;
    let a = store.clone();
    let b = store.clone();

    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.register(&new_user("race", "A", "l")).await }),
        tokio::spawn(async move { b.register(&new_user("race", "A", "l")).await }),
    );
    let results = [first.unwrap(), second.unwrap()];

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::Conflict(_))))
        .count();
    assert_eq!((created, conflicts), (1, 1));
    assert_eq!(row_counts(&store, "race").await, (1, 1, 1, 3));
}

#[tokio::test]
async fn test_failed_fan_out_rolls_back_registration() {
    let store = memory_store().await;
    sqlx::query(
        "CREATE TRIGGER reject_user_levels BEFORE INSERT ON user_levels
         BEGIN SELECT RAISE(ABORT, 'user_levels insert rejected'); END",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let err = store.register(&new_user("jd", "A", "l")).await.unwrap_err();
    assert!(matches!(err, StoreError::Sqlx(_)), "got {:?}", err);

    assert_eq!(row_counts(&store, "jd").await, (0, 0, 0, 0));
    assert!(store.find_user("jd").await.unwrap().is_none());

    // The identity is still free once the fan-out works again.
    sqlx::query("DROP TRIGGER reject_user_levels")
        .execute(store.pool())
        .await
        .unwrap();
    store.register(&new_user("jd", "A", "l")).await.unwrap();
    assert_eq!(row_counts(&store, "jd").await, (1, 1, 1, 3));
}

#[tokio::test]
async fn test_identity_is_case_sensitive() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();
    store.register(&new_user("JD", "A", "l")).await.unwrap();

    assert!(store.exists("jd").await.unwrap());
    assert!(store.exists("JD").await.unwrap());
    assert!(!store.exists("Jd").await.unwrap());
}

#[tokio::test]
async fn test_fan_out_only_covers_levels_existing_at_registration() {
    let store = memory_store().await;
    store.register(&new_user("early", "A", "l")).await.unwrap();

    sqlx::query("INSERT INTO levels (name, max_score) VALUES ('Level 4', 400)")
        .execute(store.pool())
        .await
        .unwrap();

    store.register(&new_user("late", "A", "l")).await.unwrap();

    assert_eq!(row_counts(&store, "early").await.3, 3);
    assert_eq!(row_counts(&store, "late").await.3, 4);
}

#[tokio::test]
async fn test_password_is_stored_hashed() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();

    let user = store.find_user("jd").await.unwrap().unwrap();
    assert_ne!(user.password_hash, "jd-secret");
    assert!(user.password_hash.starts_with("$argon2"));
}

// ============================================================================
// Credentials
// ============================================================================

#[tokio::test]
async fn test_verify_credentials() {
    let store = memory_store().await;
    let mut user = new_user("prof", "A", "list1");
    user.role = "professor".to_string();
    store.register(&user).await.unwrap();

    let profile = store.verify_credentials("prof", "prof-secret").await.unwrap();
    assert_eq!(profile.initials, "prof");
    assert_eq!(profile.role, "professor");
    assert_eq!(profile.group.as_deref(), Some("A"));
    assert_eq!(profile.list.as_deref(), Some("list1"));
    assert_eq!(profile.gender.as_deref(), Some("female"));

    for wrong in ["", "prof-secreT", "prof-secret ", "PROF-SECRET", "x"] {
        let err = store.verify_credentials("prof", wrong).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCredentials), "{:?} accepted", wrong);
    }
}

#[tokio::test]
async fn test_unknown_user_looks_like_bad_password() {
    let store = memory_store().await;
    let err = store.verify_credentials("ghost", "anything").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidCredentials));
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_record_attempt_refreshes_statistics_and_leaderboard() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();

    store.record_attempt("jd", 40.0, 2).await.unwrap();
    store.record_attempt("jd", 80.0, 1).await.unwrap();

    let stats = store.get_statistics("jd").await.unwrap().unwrap();
    assert_eq!(stats.games_played, 2);
    assert!((stats.average_score - 60.0).abs() < 1e-9);
    assert_eq!(stats.highest_score, 80.0);

    let board = store.leaderboard().await.unwrap();
    assert_eq!(board[0].usuario_nombre, "jd");
    assert_eq!(board[0].highest_score, 80.0);
}

#[tokio::test]
async fn test_record_attempt_for_unknown_user_is_rejected() {
    let store = memory_store().await;
    let err = store.record_attempt("ghost", 10.0, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "got {:?}", err);
    assert_eq!(attempt_count(&store).await, 0);
}

#[tokio::test]
async fn test_record_attempt_rejects_negative_tries() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();
    let err = store.record_attempt("jd", 10.0, -1).await.unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
    assert_eq!(attempt_count(&store).await, 0);
}

#[tokio::test]
async fn test_record_attempt_bounds_tries() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();

    for too_many in [MAX_TRIES + 1, i64::MAX / 2, i64::MAX] {
        let err = store.record_attempt("jd", 1.0, too_many).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "{} accepted", too_many);
    }
    assert_eq!(attempt_count(&store).await, 0);

    store.record_attempt("jd", 1.0, MAX_TRIES).await.unwrap();
    let rows = store.time_report(&ReportFilter::default()).await.unwrap();
    assert_eq!(rows[0].total_tiempo, MAX_TRIES * 60);
}

#[tokio::test]
async fn test_update_user_level() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();

    let update = UserLevelUpdate { level_id: 2, score: 150, tries: 3, completed: true };
    store.update_user_level("jd", &update).await.unwrap();

    let levels = store.get_user_levels("jd").await.unwrap();
    let level2 = levels.iter().find(|l| l.level_id == 2).unwrap();
    assert!(level2.completed);
    assert_eq!((level2.score, level2.tries), (150, 3));
    assert!(levels.iter().filter(|l| l.level_id != 2).all(|l| !l.completed));
}

#[tokio::test]
async fn test_update_missing_user_level_inserts_nothing() {
    let store = memory_store().await;
    store.register(&new_user("jd", "A", "l")).await.unwrap();

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_levels")
        .fetch_one(store.pool())
        .await
        .unwrap();

    let missing_level = UserLevelUpdate { level_id: 99, score: 1, tries: 1, completed: true };
    let err = store.update_user_level("jd", &missing_level).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let missing_user = UserLevelUpdate { level_id: 1, score: 1, tries: 1, completed: true };
    let err = store.update_user_level("ghost", &missing_user).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_levels")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM user_levels WHERE user_initials = ?", "ghost").await, 0);
}

// ============================================================================
// Reports
// ============================================================================

async fn seeded_report_store() -> ScoreStore {
    let store = memory_store().await;
    for (initials, group, list) in [
        ("ana", "A", "list1"),
        ("ben", "A", "list2"),
        ("cam", "B", "list1"),
        ("dee", "E", "list3"),
    ] {
        store.register(&new_user(initials, group, list)).await.unwrap();
    }

    for (initials, score, tries) in [
        ("ana", 95.0, 1),
        ("cam", 85.0, 2),
        ("ana", 80.0, 3),
        ("ben", 75.0, 1),
        ("dee", 60.0, 4),
    ] {
        store.record_attempt(initials, score, tries).await.unwrap();
    }
    store
}

#[tokio::test]
async fn test_points_report_filters_by_group() {
    let store = seeded_report_store().await;
    let filter = ReportFilter::new(Some("A".into()), vec![]);
    let rows = store.points_report(&filter).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.grupo_nombre.as_deref() == Some("A")));

    let ana = rows.iter().find(|r| r.usuario_nombre == "ana").unwrap();
    assert_eq!(ana.total_puntuacion, 175.0);
    assert_eq!(ana.role, "student");
    let ben = rows.iter().find(|r| r.usuario_nombre == "ben").unwrap();
    assert_eq!(ben.total_puntuacion, 75.0);
}

#[tokio::test]
async fn test_points_report_list_membership() {
    let store = seeded_report_store().await;

    let filter = ReportFilter::new(None, vec!["list1".into(), "list3".into()]);
    let users: Vec<String> = store
        .points_report(&filter)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.usuario_nombre)
        .collect();
    assert_eq!(users, vec!["ana", "cam", "dee"]);

    let both = ReportFilter::new(Some("A".into()), vec!["list1".into()]);
    let rows = store.points_report(&both).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].usuario_nombre, "ana");
}

#[tokio::test]
async fn test_users_without_attempts_are_absent_from_reports() {
    let store = seeded_report_store().await;
    store.register(&new_user("idle", "A", "list1")).await.unwrap();

    let rows = store.points_report(&ReportFilter::default()).await.unwrap();
    assert!(rows.iter().all(|r| r.usuario_nombre != "idle"));
}

#[tokio::test]
async fn test_time_report_charges_sixty_per_try() {
    let store = seeded_report_store().await;
    let rows = store.time_report(&ReportFilter::default()).await.unwrap();

    let tiempo = |name: &str| rows.iter().find(|r| r.usuario_nombre == name).unwrap().total_tiempo;
    assert_eq!(tiempo("ana"), 240);
    assert_eq!(tiempo("ben"), 60);
    assert_eq!(tiempo("cam"), 120);
    assert_eq!(tiempo("dee"), 240);
}

#[tokio::test]
async fn test_groups_and_lists() {
    let store = seeded_report_store().await;

    let groups: Vec<String> = store.groups().await.unwrap().into_iter().map(|g| g.group_name).collect();
    assert_eq!(groups, vec!["A", "B", "E"]);

    let all: Vec<Option<String>> = store.lists(None).await.unwrap().into_iter().map(|l| l.list).collect();
    assert_eq!(all, vec![Some("list1".into()), Some("list2".into()), Some("list3".into())]);

    let in_a: Vec<Option<String>> = store.lists(Some("A")).await.unwrap().into_iter().map(|l| l.list).collect();
    assert_eq!(in_a, vec![Some("list1".into()), Some("list2".into())]);
}

#[tokio::test]
async fn test_leaderboard_is_non_increasing() {
    let store = memory_store().await;
    for (initials, score) in [("p1", 95.0), ("p2", 70.0), ("p3", 95.0), ("p4", 10.0)] {
        store.register(&new_user(initials, "A", "l")).await.unwrap();
        store.record_attempt(initials, score, 1).await.unwrap();
    }

    let board = store.leaderboard().await.unwrap();
    let scores: Vec<f64> = board.iter().map(|r| r.highest_score).collect();
    assert_eq!(scores, vec![95.0, 95.0, 70.0, 10.0]);

    let top_two: Vec<&str> = board[..2].iter().map(|r| r.usuario_nombre.as_str()).collect();
    assert!(top_two.contains(&"p1") && top_two.contains(&"p3"));
}

#[tokio::test]
async fn test_group_comparison_buckets_raw_scores() {
    let store = seeded_report_store().await;
    let comparison = store.group_comparison().await.unwrap();

    assert_eq!(comparison.len(), 2);
    assert_eq!(comparison[0].group, "A");
    assert_eq!(comparison[0].scores, vec![95.0, 80.0, 75.0]);
    assert_eq!(comparison[1].group, "B");
    assert_eq!(comparison[1].scores, vec![85.0]);
    assert!(comparison.iter().all(|g| g.group != "E"));
}
