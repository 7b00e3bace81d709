pub mod cost;
pub mod month_date;
pub mod ports;
pub mod service;
pub mod test_helpers;

// Re-export commonly used types
pub use cost::calculate_total_cost;
pub use month_date::{MonthDate, MonthDateError};
pub use ports::{
    CostFilter, CostParams, CostWindow, CreateSubscriptionParams, ListSubscriptionsParams,
    NewSubscription, Subscription, SubscriptionError, SubscriptionFilter, SubscriptionOutput,
    SubscriptionRepository, SubscriptionService, SubscriptionsPage, UpdateSubscription,
    UpdateSubscriptionParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TIMESTAMP_FORMAT,
};
pub use service::SubscriptionServiceImpl;
