use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::month_date::{MonthDate, MonthDateError};
use crate::context::RequestContext;
use crate::types::{SubscriptionId, UserId};

/// Format used for `created_at` / `updated_at` in API output
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest page a listing request may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size used when the caller's value is missing or out of range
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Persisted subscription record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub service_name: String,
    /// Monthly price in the smallest currency unit
    pub price: i32,
    pub start_date: MonthDate,
    /// `None` means open-ended
    pub end_date: Option<MonthDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully validated subscription ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub service_name: String,
    pub price: i32,
    pub start_date: MonthDate,
    pub end_date: Option<MonthDate>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSubscription {
    pub service_name: Option<String>,
    pub price: Option<i32>,
    pub start_date: Option<MonthDate>,
    /// `Some(None)` clears the end date
    pub end_date: Option<Option<MonthDate>>,
}

impl UpdateSubscription {
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.price.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Filter for paginated listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub user_id: Option<UserId>,
    pub service_name: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Filter for the unpaginated cost candidate fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostFilter {
    pub user_id: Option<UserId>,
    pub service_name: Option<String>,
}

/// Inclusive month window for cost aggregation; `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostWindow {
    pub from: Option<MonthDate>,
    pub to: Option<MonthDate>,
}

/// Error types for subscription operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription not found")]
    NotFound,
    #[error("Invalid date format, expected MM-YYYY: {0}")]
    InvalidDateFormat(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid {field}: {value}")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("end_date must not be before start_date (start: {start}, end: {end})")]
    OrderingViolation { start: MonthDate, end: MonthDate },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SubscriptionError {
    /// True for errors caused by the caller's input rather than by storage.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::NotFound | Self::DatabaseError(_))
    }

    /// Prefix a storage failure with the operation that produced it.
    pub fn with_context(self, operation: &str) -> Self {
        match self {
            Self::DatabaseError(msg) => Self::DatabaseError(format!("{operation}: {msg}")),
            other => other,
        }
    }
}

impl From<MonthDateError> for SubscriptionError {
    fn from(err: MonthDateError) -> Self {
        match err {
            MonthDateError::InvalidFormat(raw) => Self::InvalidDateFormat(raw),
            MonthDateError::InvalidDate(raw) => Self::InvalidDate(raw),
        }
    }
}

/// Input for creating a subscription, exactly as received from the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionParams {
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Input for a partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscriptionParams {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub price: Option<i32>,
    #[serde(default)]
    pub start_date: Option<String>,
    /// Absent: unchanged. `null`: cleared. `"MM-YYYY"`: set.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<Option<String>>,
}

/// Maps a present JSON key to `Some(..)` even when its value is `null`.
/// Pair with `#[serde(default)]` so a missing key stays `None`.
pub fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Listing input. `page` and `page_size` arrive already clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSubscriptionsParams {
    pub user_id: Option<String>,
    pub service_name: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

/// Cost query input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostParams {
    pub user_id: Option<String>,
    pub service_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// API response model for a single subscription
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOutput {
    pub id: String,
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    /// MM-YYYY
    pub start_date: String,
    /// MM-YYYY, or null for an open-ended subscription
    pub end_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Subscription> for SubscriptionOutput {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id.to_string(),
            service_name: subscription.service_name,
            price: subscription.price,
            user_id: subscription.user_id.to_string(),
            start_date: subscription.start_date.to_string(),
            end_date: subscription.end_date.map(|d| d.to_string()),
            created_at: subscription.created_at.format(TIMESTAMP_FORMAT).to_string(),
            updated_at: subscription.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Paginated listing response
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsPage {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub subscriptions: Vec<SubscriptionOutput>,
}

impl SubscriptionsPage {
    pub fn new(
        subscriptions: Vec<SubscriptionOutput>,
        total: i64,
        page: i64,
        page_size: i64,
    ) -> Self {
        Self {
            total,
            page,
            page_size,
            has_next_page: total > page.saturating_mul(page_size),
            has_prev_page: page > 1,
            subscriptions,
        }
    }
}

/// Repository trait for subscription records
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a subscription; storage assigns `created_at` / `updated_at`
    async fn create_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, SubscriptionError>;

    /// Get a subscription by ID, `NotFound` when absent
    async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Subscription, SubscriptionError>;

    /// Get one page of matching subscriptions plus the total match count
    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<(Vec<Subscription>, i64), SubscriptionError>;

    /// Get every matching subscription, unpaginated
    async fn list_subscriptions_for_cost(
        &self,
        filter: CostFilter,
    ) -> Result<Vec<Subscription>, SubscriptionError>;

    /// Apply a non-empty partial update and bump `updated_at`
    async fn update_subscription(
        &self,
        id: SubscriptionId,
        update: UpdateSubscription,
    ) -> Result<Subscription, SubscriptionError>;

    /// Delete a subscription, `NotFound` when nothing was deleted
    async fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError>;
}

/// Service trait for subscription management
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    async fn create_subscription(
        &self,
        ctx: &RequestContext,
        params: CreateSubscriptionParams,
    ) -> Result<SubscriptionOutput, SubscriptionError>;

    async fn subscription_by_id(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
    ) -> Result<SubscriptionOutput, SubscriptionError>;

    async fn subscriptions(
        &self,
        ctx: &RequestContext,
        params: ListSubscriptionsParams,
    ) -> Result<SubscriptionsPage, SubscriptionError>;

    /// Total spend of matching subscriptions inside the requested window
    async fn subscriptions_cost(
        &self,
        ctx: &RequestContext,
        params: CostParams,
    ) -> Result<i64, SubscriptionError>;

    /// Apply a partial update. With no fields supplied this is a plain read.
    async fn update_subscription(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
        params: UpdateSubscriptionParams,
    ) -> Result<SubscriptionOutput, SubscriptionError>;

    async fn delete_subscription(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
    ) -> Result<(), SubscriptionError>;
}
