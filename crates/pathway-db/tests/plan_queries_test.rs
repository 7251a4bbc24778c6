//! Tests for the `plans` query module.

use chrono::NaiveDate;
use uuid::Uuid;

use pathway_db::models::{MilestoneStatus, NewPlan, PlanDetailsPatch, SubmissionStatus};
use pathway_db::queries::{canvases, plans};
use pathway_test_utils::{create_test_db, drop_test_db};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_plan(owner: &str, title: &str) -> NewPlan {
    NewPlan {
        owner_id: owner.to_string(),
        title: title.to_string(),
        start_date: date(2025, 1, 6),
        end_date: date(2025, 3, 31),
        parent_plan_id: None,
    }
}

#[tokio::test]
async fn create_plan_seeds_twelve_milestones() {
    let (pool, db_name) = create_test_db().await;

    let created = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "Data lead"))
        .await
        .expect("create should succeed");

    assert_eq!(created.plan.title, "Data lead");
    assert_eq!(created.plan.submission_status, SubmissionStatus::Draft);
    assert_eq!(created.milestones.len(), 12);
    for (i, m) in created.milestones.iter().enumerate() {
        assert_eq!(m.week_number, i as i32 + 1);
        assert_eq!(m.order_index, i as i32);
        assert_eq!(m.goal, "");
        assert_eq!(m.status, MilestoneStatus::NotStarted);
        assert_eq!(m.plan_id, created.plan.id);
    }

    let fetched = plans::get_plan_with_milestones(&pool, created.plan.id)
        .await
        .expect("get should succeed")
        .expect("plan should exist");
    assert_eq!(fetched, created);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_plan_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = plans::get_plan_with_milestones(&pool, Uuid::new_v4())
        .await
        .expect("get should not error");
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_plans_is_scoped_to_owner_newest_first() {
    let (pool, db_name) = create_test_db().await;

    let first = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "first"))
        .await
        .unwrap();
    let second = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "second"))
        .await
        .unwrap();
    plans::create_plan_with_milestones(&pool, &new_plan("owner-2", "other"))
        .await
        .unwrap();

    let listed = plans::list_plans_for_owner(&pool, "owner-1").await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.plan.id, first.plan.id]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_plan_details_patches_only_given_fields() {
    let (pool, db_name) = create_test_db().await;

    let created = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "before"))
        .await
        .unwrap();

    let renamed = plans::update_plan_details(
        &pool,
        created.plan.id,
        &PlanDetailsPatch {
            title: Some("after".to_string()),
            dates: None,
        },
    )
    .await
    .unwrap()
    .expect("plan should exist");
    assert_eq!(renamed.title, "after");
    assert_eq!(renamed.start_date, date(2025, 1, 6));

    let moved = plans::update_plan_details(
        &pool,
        created.plan.id,
        &PlanDetailsPatch {
            title: None,
            dates: Some((date(2025, 2, 3), date(2025, 4, 28))),
        },
    )
    .await
    .unwrap()
    .expect("plan should exist");
    assert_eq!(moved.title, "after");
    assert_eq!(moved.start_date, date(2025, 2, 3));
    assert_eq!(moved.end_date, date(2025, 4, 28));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn submission_status_accepts_any_transition() {
    let (pool, db_name) = create_test_db().await;

    let created = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "p"))
        .await
        .unwrap();

    for status in [
        SubmissionStatus::Approved,
        SubmissionStatus::Draft,
        SubmissionStatus::UnderReview,
        SubmissionStatus::Submitted,
    ] {
        let plan = plans::set_submission_status(&pool, created.plan.id, status)
            .await
            .unwrap()
            .expect("plan should exist");
        assert_eq!(plan.submission_status, status);
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_plan_removes_milestones_and_unlinks_canvases() {
    let (pool, db_name) = create_test_db().await;

    let created = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "p"))
        .await
        .unwrap();
    let canvas = canvases::insert_canvas(&pool, "owner-1", "c", 3)
        .await
        .unwrap()
        .unwrap();
    canvases::set_canvas_plan(&pool, canvas.id, Some(created.plan.id))
        .await
        .unwrap();

    assert!(plans::delete_plan(&pool, created.plan.id).await.unwrap());
    // Second delete finds nothing.
    assert!(!plans::delete_plan(&pool, created.plan.id).await.unwrap());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM milestones WHERE plan_id = $1")
        .bind(created.plan.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let canvas = canvases::get_canvas(&pool, canvas.id).await.unwrap().unwrap();
    assert_eq!(canvas.plan_id, None);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn continuation_records_parent() {
    let (pool, db_name) = create_test_db().await;

    let parent = plans::create_plan_with_milestones(&pool, &new_plan("owner-1", "one"))
        .await
        .unwrap();
    let child = plans::create_plan_with_milestones(
        &pool,
        &NewPlan {
            parent_plan_id: Some(parent.plan.id),
            start_date: date(2025, 3, 31),
            end_date: date(2025, 6, 23),
            ..new_plan("owner-1", "two")
        },
    )
    .await
    .unwrap();
    assert_eq!(child.plan.parent_plan_id, Some(parent.plan.id));

    // Deleting the parent leaves the child with no parent.
    plans::delete_plan(&pool, parent.plan.id).await.unwrap();
    let child = plans::get_plan(&pool, child.plan.id).await.unwrap().unwrap();
    assert_eq!(child.parent_plan_id, None);

    pool.close().await;
    drop_test_db(&db_name).await;
}
