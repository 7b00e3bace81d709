use serde::{Deserialize, Serialize};
use services::subscription::ports::deserialize_present;
use services::subscription::{
    CostParams, CreateSubscriptionParams, ListSubscriptionsParams, UpdateSubscriptionParams,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use utoipa::{IntoParams, ToSchema};

/// Request to create a subscription
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    #[schema(example = "Yandex Plus")]
    pub service_name: String,
    /// Monthly price, must be positive
    #[schema(example = 400)]
    pub price: i32,
    #[schema(example = "60601fee-2bf1-4721-ae6f-7636e79a0cba")]
    pub user_id: String,
    /// MM-YYYY
    #[schema(example = "07-2025")]
    pub start_date: String,
    /// MM-YYYY; omit for an open-ended subscription
    #[serde(default)]
    #[schema(example = "12-2025")]
    pub end_date: Option<String>,
}

impl From<CreateSubscriptionRequest> for CreateSubscriptionParams {
    fn from(req: CreateSubscriptionRequest) -> Self {
        Self {
            service_name: req.service_name,
            price: req.price,
            user_id: req.user_id,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}

/// Partial update; every field is optional
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    #[serde(default)]
    #[schema(example = "Spotify Premium")]
    pub service_name: Option<String>,
    #[serde(default)]
    #[schema(example = 599)]
    pub price: Option<i32>,
    /// MM-YYYY
    #[serde(default)]
    #[schema(example = "01-2026")]
    pub start_date: Option<String>,
    /// MM-YYYY to set, `null` to make the subscription open-ended
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, nullable, example = "06-2026")]
    pub end_date: Option<Option<String>>,
}

impl From<UpdateSubscriptionRequest> for UpdateSubscriptionParams {
    fn from(req: UpdateSubscriptionRequest) -> Self {
        Self {
            service_name: req.service_name,
            price: req.price,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}

/// Query parameters for listing subscriptions
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListSubscriptionsQuery {
    /// Filter by user ID (UUID)
    pub user_id: Option<String>,
    /// Filter by exact service name
    pub service_name: Option<String>,
    /// Page number, starting at 1 (default: 1)
    pub page: Option<i64>,
    /// Page size (default: 10, max: 100)
    pub page_size: Option<i64>,
}

impl ListSubscriptionsQuery {
    /// Out-of-range paging values fall back to defaults rather than failing.
    pub fn into_params(self) -> ListSubscriptionsParams {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = self
            .page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        ListSubscriptionsParams {
            user_id: self.user_id,
            service_name: self.service_name,
            page,
            page_size,
        }
    }
}

/// Query parameters for the cost endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CostQuery {
    /// Filter by user ID (UUID)
    pub user_id: Option<String>,
    /// Filter by exact service name
    pub service_name: Option<String>,
    /// Window start, MM-YYYY
    pub from: Option<String>,
    /// Window end, MM-YYYY
    pub to: Option<String>,
}

impl From<CostQuery> for CostParams {
    fn from(query: CostQuery) -> Self {
        Self {
            user_id: query.user_id,
            service_name: query.service_name,
            from: query.from,
            to: query.to,
        }
    }
}
