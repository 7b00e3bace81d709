use super::ports::{
    CostFilter, NewSubscription, Subscription, SubscriptionError, SubscriptionFilter,
    SubscriptionRepository, UpdateSubscription,
};
use crate::types::{SubscriptionId, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory subscription store for tests.
///
/// Mirrors the storage rules of the Postgres adapter: timestamps are assigned
/// on write, `end_date >= start_date` is enforced on every write, and missing
/// rows are reported as `NotFound`.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Mutex<Vec<Subscription>>,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls of any kind
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of create/update/delete statements that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a fully formed record, bypassing the counters
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .expect("lock subscriptions")
            .push(subscription);
    }

    pub fn snapshot(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions
            .lock()
            .expect("lock subscriptions")
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record_write(&self) {
        self.record_call();
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn matches(
        subscription: &Subscription,
        user_id: Option<UserId>,
        service_name: Option<&str>,
    ) -> bool {
        user_id.map_or(true, |u| subscription.user_id == u)
            && service_name.map_or(true, |n| subscription.service_name == n)
    }

    fn check_constraints(subscription: &Subscription) -> Result<(), SubscriptionError> {
        if let Some(end) = subscription.end_date {
            if end < subscription.start_date {
                return Err(SubscriptionError::Validation(
                    "end_date must not be before start_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, SubscriptionError> {
        self.record_write();
        let now = Utc::now();
        let record = Subscription {
            id: subscription.id,
            user_id: subscription.user_id,
            service_name: subscription.service_name,
            price: subscription.price,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            created_at: now,
            updated_at: now,
        };
        Self::check_constraints(&record)?;

        let mut guard = self.subscriptions.lock().expect("lock subscriptions");
        if guard.iter().any(|s| s.id == record.id) {
            return Err(SubscriptionError::DatabaseError(format!(
                "duplicate key value violates unique constraint: id={}",
                record.id
            )));
        }
        guard.push(record.clone());
        Ok(record)
    }

    async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Subscription, SubscriptionError> {
        self.record_call();
        self.snapshot(id).ok_or(SubscriptionError::NotFound)
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<(Vec<Subscription>, i64), SubscriptionError> {
        self.record_call();
        let mut matching: Vec<Subscription> = self
            .subscriptions
            .lock()
            .expect("lock subscriptions")
            .iter()
            .filter(|s| Self::matches(s, filter.user_id, filter.service_name.as_deref()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_subscriptions_for_cost(
        &self,
        filter: CostFilter,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        self.record_call();
        Ok(self
            .subscriptions
            .lock()
            .expect("lock subscriptions")
            .iter()
            .filter(|s| Self::matches(s, filter.user_id, filter.service_name.as_deref()))
            .cloned()
            .collect())
    }

    async fn update_subscription(
        &self,
        id: SubscriptionId,
        update: UpdateSubscription,
    ) -> Result<Subscription, SubscriptionError> {
        self.record_write();
        let mut guard = self.subscriptions.lock().expect("lock subscriptions");
        let stored = guard
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SubscriptionError::NotFound)?;

        let mut updated = stored.clone();
        if let Some(service_name) = update.service_name {
            updated.service_name = service_name;
        }
        if let Some(price) = update.price {
            updated.price = price;
        }
        if let Some(start_date) = update.start_date {
            updated.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            updated.end_date = end_date;
        }
        updated.updated_at = Utc::now().max(stored.updated_at);
        Self::check_constraints(&updated)?;

        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        self.record_write();
        let mut guard = self.subscriptions.lock().expect("lock subscriptions");
        let before = guard.len();
        guard.retain(|s| s.id != id);
        if guard.len() == before {
            return Err(SubscriptionError::NotFound);
        }
        Ok(())
    }
}
