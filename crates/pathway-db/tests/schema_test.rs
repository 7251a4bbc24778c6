//! Integration tests for the embedded migrations and schema constraints.
//!
//! Each test gets its own database from `pathway-test-utils` (a shared
//! testcontainers PostgreSQL, or `PATHWAY_TEST_PG_URL`).

use chrono::NaiveDate;
use sqlx::Row;

use pathway_db::models::NewPlan;
use pathway_db::pool;
use pathway_db::queries::plans;
use pathway_test_utils::{create_test_db, drop_test_db};

fn new_plan(owner: &str) -> NewPlan {
    let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
    NewPlan {
        owner_id: owner.to_string(),
        title: "Schema".to_string(),
        start_date: start,
        end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        parent_plan_id: None,
    }
}

#[tokio::test]
async fn migrations_create_all_tables() {
    let (pool, db_name) = create_test_db().await;

    let rows = sqlx::query(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .expect("query should succeed");
    let tables: Vec<String> = rows.iter().map(|r| r.get("table_name")).collect();

    for expected in pool::TABLES {
        assert!(
            tables.iter().any(|t| t == expected),
            "missing table {expected}; found {tables:?}"
        );
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    pool::run_migrations(&pool)
        .await
        .expect("second run should be a no-op");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn table_counts_reports_every_table() {
    let (pool, db_name) = create_test_db().await;

    plans::create_plan_with_milestones(&pool, &new_plan("owner-1"))
        .await
        .expect("create should succeed");

    let counts = pool::table_counts(&pool).await.expect("counts");
    assert_eq!(
        counts,
        vec![
            ("plans".to_string(), 1),
            ("milestones".to_string(), 12),
            ("canvases".to_string(), 0),
        ]
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plan_end_date_must_be_twelve_weeks_after_start() {
    let (pool, db_name) = create_test_db().await;

    let mut bad = new_plan("owner-1");
    bad.end_date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
    let result = plans::create_plan_with_milestones(&pool, &bad).await;
    assert!(result.is_err(), "check constraint should reject the dates");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn order_index_is_unique_within_a_plan() {
    let (pool, db_name) = create_test_db().await;

    let created = plans::create_plan_with_milestones(&pool, &new_plan("owner-1"))
        .await
        .unwrap();

    // Moving week 1 onto week 2's position collides.
    let result = sqlx::query("UPDATE milestones SET order_index = 1 WHERE id = $1")
        .bind(created.milestones[0].id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "duplicate order_index should be rejected");

    // A single statement swapping the two positions is legal.
    sqlx::query(
        "UPDATE milestones SET order_index = 1 - order_index \
         WHERE plan_id = $1 AND order_index IN (0, 1)",
    )
    .bind(created.plan.id)
    .execute(&pool)
    .await
    .expect("swap within one statement should succeed");

    pool.close().await;
    drop_test_db(&db_name).await;
}
