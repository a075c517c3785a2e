use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::domain::{truncate_error_message, Listing, Seller, Task, TaskStatus};
use crate::error::{DbErrorExt, ModeraError, Result};

use super::TaskStore;

/// `sqlx`/Postgres-backed [`TaskStore`].
///
/// Connections are pooled and acquired per operation; the claim and
/// closure operations each run inside a single transaction.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.connection_url())
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_preferred_task(&self, item_id: i64) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, item_id, status, is_violation, probability, error_message, created_at, processed_at
             FROM moderation_results
             WHERE item_id = $1 AND status IN ('pending', 'completed')
             ORDER BY (status = 'pending') DESC, id DESC
             LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_modera_error("failed to read moderation task"))?;

        row.map(row_to_task).transpose()
    }

    async fn insert_pending(&self, item_id: i64) -> sqlx::Result<Task> {
        let row = sqlx::query(
            "INSERT INTO moderation_results (item_id, status)
             VALUES ($1, 'pending')
             RETURNING id, item_id, status, is_violation, probability, error_message, created_at, processed_at",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_task(row).expect("freshly inserted row is well-formed"))
    }

}

fn row_to_task(row: sqlx::postgres::PgRow) -> Result<Task> {
    let status_str: String = row.get("status");
    let status = TaskStatus::from_str(&status_str)
        .map_err(|e| ModeraError::StorageUnavailable(anyhow::anyhow!(e)))?;
    Ok(Task {
        id: row.get("id"),
        item_id: row.get("item_id"),
        status,
        is_violation: row.get("is_violation"),
        probability: row.get("probability"),
        error_message: row.get("error_message"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        processed_at: row.get("processed_at"),
    })
}

#[async_trait::async_trait]
impl TaskStore for PostgresTaskStore {
    async fn create_user(&self, id: i64, is_verified_seller: bool) -> Result<Seller> {
        let row = sqlx::query("INSERT INTO users (id, is_verified_seller) VALUES ($1, $2) RETURNING id, is_verified_seller")
            .bind(id)
            .bind(is_verified_seller)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.into_modera_error("failed to create user"))?;
        Ok(Seller {
            id: row.get("id"),
            is_verified_seller: row.get("is_verified_seller"),
        })
    }

    async fn create_listing(
        &self,
        seller_id: i64,
        item_id: i64,
        name: &str,
        description: &str,
        category: i32,
        images_qty: i32,
    ) -> Result<Listing> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| e.into_modera_error("failed to acquire connection"))?;

        let seller_row = sqlx::query("SELECT is_verified_seller FROM users WHERE id = $1")
            .bind(seller_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| e.into_modera_error("failed to read seller"))?;
        let Some(seller_row) = seller_row else {
            return Err(ModeraError::SellerNotFound(seller_id));
        };
        let is_verified_seller: bool = seller_row.get("is_verified_seller");

        sqlx::query(
            "INSERT INTO advertisements (item_id, seller_id, name, description, category, images_qty)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item_id)
        .bind(seller_id)
        .bind(name)
        .bind(description)
        .bind(category)
        .bind(images_qty)
        .execute(&mut *conn)
        .await
        .map_err(|e| e.into_modera_error(format!("advertisement {item_id} already exists")))?;

        Ok(Listing {
            item_id,
            seller_id,
            name: name.to_string(),
            description: description.to_string(),
            category,
            images_qty,
            is_verified_seller,
        })
    }

    async fn select_listing(&self, item_id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query(
            "SELECT a.item_id, a.seller_id, a.name, a.description, a.category, a.images_qty, u.is_verified_seller
             FROM advertisements AS a
             JOIN users AS u ON u.id = a.seller_id
             WHERE a.item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_modera_error("failed to read listing"))?;

        Ok(row.map(|row| Listing {
            item_id: row.get("item_id"),
            seller_id: row.get("seller_id"),
            name: row.get("name"),
            description: row.get("description"),
            category: row.get("category"),
            images_qty: row.get("images_qty"),
            is_verified_seller: row.get("is_verified_seller"),
        }))
    }

    async fn create_pending(&self, item_id: i64) -> Result<Task> {
        if let Some(task) = self.find_preferred_task(item_id).await? {
            return Ok(task);
        }

        match self.insert_pending(item_id).await {
            Ok(task) => Ok(task),
            Err(e) if is_unique_violation(&e) => {
                if let Some(task) = self.find_preferred_task(item_id).await? {
                    return Ok(task);
                }
                // Rare: the conflicting row vanished (concurrently closed)
                // between our read and the retry. One bounded retry absorbs
                // the race.
                match self.insert_pending(item_id).await {
                    Ok(task) => Ok(task),
                    Err(e2) if is_unique_violation(&e2) => self
                        .find_preferred_task(item_id)
                        .await?
                        .ok_or_else(|| e2.into_modera_error("pending task race did not resolve")),
                    Err(e2) => Err(e2.into_modera_error("failed to create pending task")),
                }
            }
            Err(e) => Err(e.into_modera_error("failed to create pending task")),
        }
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, item_id, status, is_violation, probability, error_message, created_at, processed_at
             FROM moderation_results WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.into_modera_error("failed to read task"))?;

        row.map(row_to_task).transpose()
    }

    async fn claim_and_complete(
        &self,
        item_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<Option<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| e.into_modera_error("failed to begin transaction"))?;
        let row = sqlx::query(
            "WITH pending_task AS (
                SELECT id FROM moderation_results
                WHERE item_id = $1 AND status = 'pending'
                ORDER BY id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE moderation_results AS mr
            SET status = 'completed', is_violation = $2, probability = $3, error_message = NULL, processed_at = now()
            FROM pending_task
            WHERE mr.id = pending_task.id
            RETURNING mr.id",
        )
        .bind(item_id)
        .bind(is_violation)
        .bind(probability)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.into_modera_error("failed to claim pending task"))?;
        tx.commit()
            .await
            .map_err(|e| e.into_modera_error("failed to commit claim"))?;
        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    async fn claim_and_fail(&self, item_id: i64, error_message: &str) -> Result<Option<i64>> {
        let truncated = truncate_error_message(error_message);
        // error_message carries operator-authored text, never interpolated
        // into SQL text; it travels through a bound parameter instead.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| e.into_modera_error("failed to begin transaction"))?;
        let row = sqlx::query(
            "WITH pending_task AS (
                SELECT id FROM moderation_results
                WHERE item_id = $1 AND status = 'pending'
                ORDER BY id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE moderation_results AS mr
            SET status = 'failed', is_violation = NULL, probability = NULL, error_message = $2, processed_at = now()
            FROM pending_task
            WHERE mr.id = pending_task.id
            RETURNING mr.id",
        )
        .bind(item_id)
        .bind(&truncated)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.into_modera_error("failed to claim pending task"))?;
        tx.commit()
            .await
            .map_err(|e| e.into_modera_error("failed to commit claim"))?;
        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    async fn close_listing(&self, item_id: i64) -> Result<Option<(i64, Vec<i64>)>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| e.into_modera_error("failed to begin transaction"))?;

        let task_rows = sqlx::query("DELETE FROM moderation_results WHERE item_id = $1 RETURNING id")
            .bind(item_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| e.into_modera_error("failed to delete tasks"))?;
        let task_ids: Vec<i64> = task_rows.iter().map(|r| r.get::<i64, _>("id")).collect();

        let listing_row = sqlx::query("DELETE FROM advertisements WHERE item_id = $1 RETURNING item_id")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.into_modera_error("failed to delete listing"))?;

        tx.commit()
            .await
            .map_err(|e| e.into_modera_error("failed to commit closure"))?;

        Ok(listing_row.map(|_| (item_id, task_ids)))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
