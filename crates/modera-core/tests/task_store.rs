use modera_core::domain::TaskStatus;
use modera_core::error::ModeraError;
use modera_core::store::{PostgresTaskStore, TaskStore};
use sqlx::PgPool;

async fn seed_listing(store: &PostgresTaskStore, seller_id: i64, item_id: i64) {
    store
        .create_user(seller_id, true)
        .await
        .expect("seed user");
    store
        .create_listing(seller_id, item_id, "name", "a description", 1, 3)
        .await
        .expect("seed listing");
}

#[sqlx::test]
async fn create_listing_fails_without_seller(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    let err = store
        .create_listing(999, 1, "name", "description", 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ModeraError::SellerNotFound(999)));
}

#[sqlx::test]
async fn create_listing_rejects_duplicate_item_id(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;

    let err = store
        .create_listing(1, 42, "other", "description", 2, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ModeraError::AlreadyExists(_)));
}

#[sqlx::test]
async fn create_pending_reuses_existing_pending_task(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;

    let first = store.create_pending(42).await.unwrap();
    let second = store.create_pending(42).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, TaskStatus::Pending);
}

#[sqlx::test]
async fn create_pending_reuses_completed_task_over_inserting_a_new_pending(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;

    let pending = store.create_pending(42).await.unwrap();
    let task_id = store
        .claim_and_complete(42, true, 0.9)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task_id, pending.id);

    let reused = store.create_pending(42).await.unwrap();
    assert_eq!(reused.id, pending.id);
    assert_eq!(reused.status, TaskStatus::Completed);
}

#[sqlx::test]
async fn claim_and_complete_is_exclusive_and_idempotent(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;
    let pending = store.create_pending(42).await.unwrap();

    let claimed = store
        .claim_and_complete(42, true, 0.75)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed, pending.id);

    let second_claim = store.claim_and_complete(42, true, 0.75).await.unwrap();
    assert_eq!(second_claim, None);

    let task = store.get_task(pending.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.is_violation, Some(true));
    assert_eq!(task.probability, Some(0.75));
    assert!(task.processed_at.is_some());
}

#[sqlx::test]
async fn claim_and_fail_sets_error_message_and_nulls_terminal_fields(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;
    let pending = store.create_pending(42).await.unwrap();

    let claimed = store
        .claim_and_fail(42, "Advertisement not found")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed, pending.id);

    let task = store.get_task(pending.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.is_violation, None);
    assert_eq!(task.probability, None);
    assert_eq!(task.error_message.as_deref(), Some("Advertisement not found"));
}

#[sqlx::test]
async fn claim_without_pending_row_returns_none(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;

    let claimed = store.claim_and_complete(42, false, 0.1).await.unwrap();
    assert_eq!(claimed, None);
}

#[sqlx::test]
async fn close_listing_cascades_its_tasks(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    seed_listing(&store, 1, 42).await;
    let pending = store.create_pending(42).await.unwrap();

    let (item_id, task_ids) = store.close_listing(42).await.unwrap().unwrap();
    assert_eq!(item_id, 42);
    assert_eq!(task_ids, vec![pending.id]);

    assert!(store.select_listing(42).await.unwrap().is_none());
    assert!(store.get_task(pending.id).await.unwrap().is_none());
}

#[sqlx::test]
async fn close_listing_is_none_for_an_absent_listing(pool: PgPool) {
    let store = PostgresTaskStore::from_pool(pool);
    assert_eq!(store.close_listing(12345).await.unwrap(), None);
}
