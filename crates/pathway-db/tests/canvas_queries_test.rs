//! Tests for the `canvases` query module.

use chrono::NaiveDate;
use uuid::Uuid;

use pathway_db::models::{CanvasSection, CanvasSections, NewPlan};
use pathway_db::queries::{canvases, plans};
use pathway_test_utils::{create_test_db, drop_test_db};

async fn seed_plan_id(pool: &sqlx::PgPool) -> Uuid {
    let new_plan = NewPlan {
        owner_id: "owner-1".to_string(),
        title: "Linked".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        parent_plan_id: None,
    };
    plans::create_plan_with_milestones(pool, &new_plan)
        .await
        .unwrap()
        .plan
        .id
}

#[tokio::test]
async fn insert_canvas_enforces_owner_limit() {
    let (pool, db_name) = create_test_db().await;

    for i in 0..3 {
        let canvas = canvases::insert_canvas(&pool, "owner-1", &format!("c{i}"), 3)
            .await
            .unwrap()
            .expect("under the limit");
        assert_eq!(canvas.position, i);
        assert_eq!(canvas.completion_percentage, 0);
        assert_eq!(canvas.plan_id, None);
    }

    let fourth = canvases::insert_canvas(&pool, "owner-1", "c3", 3)
        .await
        .unwrap();
    assert!(fourth.is_none());

    // Another owner is unaffected.
    assert!(
        canvases::insert_canvas(&pool, "owner-2", "c0", 3)
            .await
            .unwrap()
            .is_some()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn sections_round_trip_through_flattened_row() {
    let (pool, db_name) = create_test_db().await;

    let canvas = canvases::insert_canvas(&pool, "owner-1", "c", 3)
        .await
        .unwrap()
        .unwrap();
    let mut sections = CanvasSections::default();
    sections.set(CanvasSection::TargetRole, "Staff engineer");
    sections.set(CanvasSection::SkillGaps, "Distributed systems");

    let updated = canvases::update_canvas_sections(&pool, canvas.id, &sections, 22)
        .await
        .unwrap()
        .expect("canvas should exist");
    assert_eq!(updated.sections, sections);
    assert_eq!(updated.completion_percentage, 22);

    let fetched = canvases::get_canvas(&pool, canvas.id).await.unwrap().unwrap();
    assert_eq!(fetched.sections.get(CanvasSection::TargetRole), "Staff engineer");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn positions_follow_requested_order() {
    let (pool, db_name) = create_test_db().await;

    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        ids.push(
            canvases::insert_canvas(&pool, "owner-1", name, 3)
                .await
                .unwrap()
                .unwrap()
                .id,
        );
    }
    ids.rotate_left(1);

    let updated = canvases::set_canvas_positions(&pool, "owner-1", &ids)
        .await
        .unwrap();
    assert_eq!(updated, 3);

    let listed = canvases::list_canvases_for_owner(&pool, "owner-1")
        .await
        .unwrap();
    let listed_ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
    assert_eq!(listed_ids, ids);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn conditional_link_only_fills_empty_reference() {
    let (pool, db_name) = create_test_db().await;
    let first = seed_plan_id(&pool).await;
    let second = seed_plan_id(&pool).await;

    let canvas = canvases::insert_canvas(&pool, "owner-1", "c", 3)
        .await
        .unwrap()
        .unwrap();

    let linked = canvases::link_canvas_plan_if_unlinked(&pool, canvas.id, first)
        .await
        .unwrap()
        .expect("empty reference is filled");
    assert_eq!(linked.plan_id, Some(first));

    let again = canvases::link_canvas_plan_if_unlinked(&pool, canvas.id, second)
        .await
        .unwrap();
    assert!(again.is_none());

    // The unconditional write overwrites.
    let overwritten = canvases::set_canvas_plan(&pool, canvas.id, Some(second))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(overwritten.plan_id, Some(second));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn deleting_canvas_keeps_plan() {
    let (pool, db_name) = create_test_db().await;
    let plan_id = seed_plan_id(&pool).await;

    let canvas = canvases::insert_canvas(&pool, "owner-1", "c", 3)
        .await
        .unwrap()
        .unwrap();
    canvases::set_canvas_plan(&pool, canvas.id, Some(plan_id))
        .await
        .unwrap();

    assert!(canvases::delete_canvas(&pool, canvas.id).await.unwrap());
    assert!(!canvases::delete_canvas(&pool, canvas.id).await.unwrap());
    assert!(plans::get_plan(&pool, plan_id).await.unwrap().is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}
