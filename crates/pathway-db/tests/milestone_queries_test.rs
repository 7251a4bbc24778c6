//! Tests for the `milestones` query module, including the
//! `reorder_milestones` SQL function.

use chrono::NaiveDate;
use uuid::Uuid;

use pathway_db::models::{MilestonePatch, MilestoneStatus, NewPlan, PlanWithMilestones};
use pathway_db::queries::milestones::{self, sqlstate};
use pathway_db::queries::plans;
use pathway_test_utils::{create_test_db, drop_test_db};

async fn seed_plan(pool: &sqlx::PgPool) -> PlanWithMilestones {
    let new_plan = NewPlan {
        owner_id: "owner-1".to_string(),
        title: "Reorder".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        parent_plan_id: None,
    };
    plans::create_plan_with_milestones(pool, &new_plan)
        .await
        .expect("seed plan")
}

#[tokio::test]
async fn update_milestone_patches_only_given_fields() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;
    let target = plan.milestones[4].id;

    let updated = milestones::update_milestone(&pool, target, &MilestonePatch::goal("Ship it"))
        .await
        .unwrap()
        .expect("milestone should exist");
    assert_eq!(updated.goal, "Ship it");
    assert_eq!(updated.status, MilestoneStatus::NotStarted);

    let updated = milestones::update_milestone(
        &pool,
        target,
        &MilestonePatch::status(MilestoneStatus::Completed),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.goal, "Ship it");
    assert_eq!(updated.status, MilestoneStatus::Completed);
    assert_eq!(updated.week_number, 5);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_milestone_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = milestones::update_milestone(&pool, Uuid::new_v4(), &MilestonePatch::notes("x"))
        .await
        .unwrap();
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn goal_over_two_hundred_chars_is_rejected_by_schema() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;

    let result = milestones::update_milestone(
        &pool,
        plan.milestones[0].id,
        &MilestonePatch::goal("a".repeat(201)),
    )
    .await;
    assert!(result.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn reorder_function_rewrites_every_position() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;

    let mut ordered = plan.ordered_ids();
    ordered.reverse();
    milestones::reorder_milestones(&pool, plan.plan.id, &ordered)
        .await
        .expect("reorder should succeed");

    let listed = milestones::list_milestones_for_plan(&pool, plan.plan.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|m| m.id).collect();
    assert_eq!(ids, ordered);
    let weeks: Vec<i32> = listed.iter().map(|m| m.week_number).collect();
    assert_eq!(weeks, (1..=12).rev().collect::<Vec<_>>());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn reorder_function_rejects_incomplete_ordering() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;

    let mut ordered = plan.ordered_ids();
    ordered[11] = ordered[0];
    let err = milestones::reorder_milestones(&pool, plan.plan.id, &ordered)
        .await
        .unwrap_err();
    assert_eq!(
        sqlstate(&err).as_deref(),
        Some(milestones::INVALID_ORDERING)
    );

    // Nothing moved.
    let listed = milestones::list_milestones_for_plan(&pool, plan.plan.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|m| m.id).collect();
    assert_eq!(ids, plan.ordered_ids());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn reorder_function_reports_missing_plan() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;

    let err = milestones::reorder_milestones(&pool, Uuid::new_v4(), &plan.ordered_ids())
        .await
        .unwrap_err();
    assert_eq!(sqlstate(&err).as_deref(), Some(milestones::PLAN_NOT_FOUND));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn missing_reorder_function_reports_undefined_function() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;

    sqlx::query("DROP FUNCTION reorder_milestones(uuid, uuid[])")
        .execute(&pool)
        .await
        .unwrap();

    let err = milestones::reorder_milestones(&pool, plan.plan.id, &plan.ordered_ids())
        .await
        .unwrap_err();
    assert_eq!(
        sqlstate(&err).as_deref(),
        Some(milestones::UNDEFINED_FUNCTION)
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn set_order_index_is_scoped_to_plan() {
    let (pool, db_name) = create_test_db().await;
    let plan = seed_plan(&pool).await;
    let other = seed_plan(&pool).await;

    // Park week 1 on its own position: no collision.
    assert!(
        milestones::set_order_index(&pool, plan.plan.id, plan.milestones[0].id, 0)
            .await
            .unwrap()
    );
    // A milestone of another plan is not touched.
    assert!(
        !milestones::set_order_index(&pool, plan.plan.id, other.milestones[0].id, 0)
            .await
            .unwrap()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}
