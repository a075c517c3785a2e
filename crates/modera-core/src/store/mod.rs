mod postgres;

pub use postgres::PostgresTaskStore;

use crate::domain::{Listing, Seller, Task};
use crate::error::Result;

/// Relational persistence of listings and moderation tasks.
///
/// Implementations must honor the domain invariants: at most one pending
/// task per listing, terminal-state fields set jointly, and atomic
/// cascading delete on listing closure.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync + 'static {
    async fn create_user(&self, id: i64, is_verified_seller: bool) -> Result<Seller>;

    async fn create_listing(
        &self,
        seller_id: i64,
        item_id: i64,
        name: &str,
        description: &str,
        category: i32,
        images_qty: i32,
    ) -> Result<Listing>;

    async fn select_listing(&self, item_id: i64) -> Result<Option<Listing>>;

    /// Returns the preferred existing task (pending wins, ties broken by
    /// highest id) or inserts a new pending task.
    async fn create_pending(&self, item_id: i64) -> Result<Task>;

    async fn get_task(&self, task_id: i64) -> Result<Option<Task>>;

    /// Claims the oldest pending task for `item_id` and marks it
    /// completed. Returns `None` when no pending row is available (a
    /// concurrent worker already claimed it, or the listing was closed).
    async fn claim_and_complete(
        &self,
        item_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<Option<i64>>;

    /// Same claim discipline as [`TaskStore::claim_and_complete`], marking
    /// the claimed task failed with `error_message` (truncated to 1000
    /// chars).
    async fn claim_and_fail(&self, item_id: i64, error_message: &str) -> Result<Option<i64>>;

    /// Deletes the listing and all its task rows atomically. Returns
    /// `None` when the listing does not exist.
    async fn close_listing(&self, item_id: i64) -> Result<Option<(i64, Vec<i64>)>>;
}
