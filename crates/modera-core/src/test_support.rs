//! In-memory fakes for the trait seams, used to exercise the service
//! layer without a live Postgres/Redis/Kafka.
#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::bus::{BusProducer, DlqEnvelope};
use crate::cache::{PredictionCache, PredictionPayload, TaskCache, TaskStatusPayload};
use crate::domain::{truncate_error_message, Listing, Seller, Task, TaskStatus};
use crate::error::{ModeraError, Result};
use crate::scorer::Scorer;
use crate::store::TaskStore;

#[derive(Default)]
pub(crate) struct FakeTaskStore {
    next_id: AtomicI64,
    sellers: Mutex<HashMap<i64, Seller>>,
    listings: Mutex<HashMap<i64, Listing>>,
    tasks: Mutex<HashMap<i64, Task>>,
}

impl FakeTaskStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn preferred_task(&self, item_id: i64) -> Option<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .values()
            .filter(|t| t.item_id == item_id && matches!(t.status, TaskStatus::Pending | TaskStatus::Completed))
            .max_by_key(|t| (t.status == TaskStatus::Pending, t.id))
            .cloned()
    }

    fn claim_oldest_pending(&self, item_id: i64) -> Option<i64> {
        let mut tasks = self.tasks.lock().unwrap();
        let claimed_id = tasks
            .values()
            .filter(|t| t.item_id == item_id && t.status == TaskStatus::Pending)
            .min_by_key(|t| t.id)
            .map(|t| t.id);
        claimed_id
    }
}

#[async_trait::async_trait]
impl TaskStore for FakeTaskStore {
    async fn create_user(&self, id: i64, is_verified_seller: bool) -> Result<Seller> {
        let seller = Seller { id, is_verified_seller };
        self.sellers.lock().unwrap().insert(id, seller);
        Ok(seller)
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
        let is_verified_seller = self
            .sellers
            .lock()
            .unwrap()
            .get(&seller_id)
            .ok_or(ModeraError::SellerNotFound(seller_id))?
            .is_verified_seller;
        let mut listings = self.listings.lock().unwrap();
        if listings.contains_key(&item_id) {
            return Err(ModeraError::AlreadyExists(format!("advertisement {item_id}")));
        }
        let listing = Listing {
            item_id,
            seller_id,
            name: name.to_string(),
            description: description.to_string(),
            category,
            images_qty,
            is_verified_seller,
        };
        listings.insert(item_id, listing.clone());
        Ok(listing)
    }

    async fn select_listing(&self, item_id: i64) -> Result<Option<Listing>> {
        Ok(self.listings.lock().unwrap().get(&item_id).cloned())
    }

    async fn create_pending(&self, item_id: i64) -> Result<Task> {
        if let Some(task) = self.preferred_task(item_id) {
            return Ok(task);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Task {
            id,
            item_id,
            status: TaskStatus::Pending,
            is_violation: None,
            probability: None,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.tasks.lock().unwrap().insert(id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(&task_id).cloned())
    }

    async fn claim_and_complete(
        &self,
        item_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<Option<i64>> {
        let Some(task_id) = self.claim_oldest_pending(item_id) else {
            return Ok(None);
        };
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(&task_id).unwrap();
        task.status = TaskStatus::Completed;
        task.is_violation = Some(is_violation);
        task.probability = Some(probability);
        task.error_message = None;
        task.processed_at = Some(Utc::now());
        Ok(Some(task_id))
    }

    async fn claim_and_fail(&self, item_id: i64, error_message: &str) -> Result<Option<i64>> {
        let Some(task_id) = self.claim_oldest_pending(item_id) else {
            return Ok(None);
        };
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(&task_id).unwrap();
        task.status = TaskStatus::Failed;
        task.is_violation = None;
        task.probability = None;
        task.error_message = Some(truncate_error_message(error_message));
        task.processed_at = Some(Utc::now());
        Ok(Some(task_id))
    }

    async fn close_listing(&self, item_id: i64) -> Result<Option<(i64, Vec<i64>)>> {
        let removed_listing = self.listings.lock().unwrap().remove(&item_id);
        if removed_listing.is_none() {
            return Ok(None);
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task_ids: Vec<i64> = tasks
            .values()
            .filter(|t| t.item_id == item_id)
            .map(|t| t.id)
            .collect();
        for id in &task_ids {
            tasks.remove(id);
        }
        Ok(Some((item_id, task_ids)))
    }
}

#[derive(Default)]
pub(crate) struct FakeCache {
    predictions: Mutex<HashMap<i64, PredictionPayload>>,
    tasks: Mutex<HashMap<i64, TaskStatusPayload>>,
}

impl FakeCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PredictionCache for FakeCache {
    async fn get(&self, item_id: i64) -> Option<PredictionPayload> {
        self.predictions.lock().unwrap().get(&item_id).cloned()
    }

    async fn set(&self, item_id: i64, payload: &PredictionPayload) {
        self.predictions.lock().unwrap().insert(item_id, payload.clone());
    }

    async fn delete(&self, item_id: i64) {
        self.predictions.lock().unwrap().remove(&item_id);
    }
}

#[async_trait::async_trait]
impl TaskCache for FakeCache {
    async fn get(&self, task_id: i64) -> Option<TaskStatusPayload> {
        self.tasks.lock().unwrap().get(&task_id).cloned()
    }

    async fn set(&self, task_id: i64, payload: &TaskStatusPayload) {
        self.tasks.lock().unwrap().insert(task_id, payload.clone());
    }

    async fn delete(&self, task_id: i64) {
        self.tasks.lock().unwrap().remove(&task_id);
    }
}

#[derive(Default)]
pub(crate) struct FakeBus {
    pub(crate) requests: Mutex<Vec<i64>>,
    pub(crate) dlqs: Mutex<Vec<DlqEnvelope>>,
    pub(crate) fail_requests: std::sync::atomic::AtomicBool,
}

impl FakeBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BusProducer for FakeBus {
    async fn send_request(&self, item_id: i64) -> anyhow::Result<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            anyhow::bail!("simulated bus outage");
        }
        self.requests.lock().unwrap().push(item_id);
        Ok(())
    }

    async fn send_dlq(&self, envelope: &DlqEnvelope) -> anyhow::Result<()> {
        self.dlqs.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

pub(crate) struct FakeScorer {
    pub(crate) result: Mutex<std::result::Result<f64, String>>,
}

impl FakeScorer {
    pub(crate) fn returning(probability: f64) -> Self {
        Self {
            result: Mutex::new(Ok(probability)),
        }
    }

    pub(crate) fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Err(message.into())),
        }
    }
}

#[async_trait::async_trait]
impl Scorer for FakeScorer {
    async fn score(&self, _features: [f64; 4]) -> Result<f64> {
        match &*self.result.lock().unwrap() {
            Ok(p) => Ok(*p),
            Err(e) => Err(ModeraError::ScorerFailed(anyhow::anyhow!(e.clone()))),
        }
    }
}
