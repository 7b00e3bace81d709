use super::cost::calculate_total_cost;
use super::month_date::MonthDate;
use super::ports::{
    CostFilter, CostParams, CostWindow, CreateSubscriptionParams, ListSubscriptionsParams,
    NewSubscription, SubscriptionError, SubscriptionFilter, SubscriptionOutput,
    SubscriptionRepository, SubscriptionService, SubscriptionsPage, UpdateSubscription,
    UpdateSubscriptionParams,
};
use crate::context::RequestContext;
use crate::types::{SubscriptionId, UserId};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SubscriptionServiceImpl {
    repository: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionServiceImpl {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }
}

fn parse_month(
    ctx: &RequestContext,
    field: &'static str,
    raw: &str,
) -> Result<MonthDate, SubscriptionError> {
    raw.parse().map_err(|e| {
        tracing::warn!(request_id = %ctx, field, date = raw, "Invalid month date");
        SubscriptionError::from(e)
    })
}

fn parse_optional_month(
    ctx: &RequestContext,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<MonthDate>, SubscriptionError> {
    raw.map(|r| parse_month(ctx, field, r)).transpose()
}

fn parse_user_id(ctx: &RequestContext, raw: &str) -> Result<UserId, SubscriptionError> {
    raw.parse().map_err(|e| {
        tracing::warn!(request_id = %ctx, user_id = raw, error = %e, "Invalid user_id");
        SubscriptionError::InvalidIdentifier {
            field: "user_id",
            value: raw.to_string(),
        }
    })
}

fn parse_optional_user_id(
    ctx: &RequestContext,
    raw: Option<&str>,
) -> Result<Option<UserId>, SubscriptionError> {
    raw.map(|r| parse_user_id(ctx, r)).transpose()
}

fn check_ordering(start: MonthDate, end: MonthDate) -> Result<(), SubscriptionError> {
    if end < start {
        return Err(SubscriptionError::OrderingViolation { start, end });
    }
    Ok(())
}

fn validate_service_name(name: &str) -> Result<(), SubscriptionError> {
    if name.trim().is_empty() {
        return Err(SubscriptionError::Validation(
            "service_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: i32) -> Result<(), SubscriptionError> {
    if price <= 0 {
        return Err(SubscriptionError::Validation(format!(
            "price must be positive, got {price}"
        )));
    }
    Ok(())
}

#[async_trait]
impl SubscriptionService for SubscriptionServiceImpl {
    async fn create_subscription(
        &self,
        ctx: &RequestContext,
        params: CreateSubscriptionParams,
    ) -> Result<SubscriptionOutput, SubscriptionError> {
        let start_date = parse_month(ctx, "start_date", &params.start_date)?;
        let end_date = parse_optional_month(ctx, "end_date", params.end_date.as_deref())?;

        if let Some(end) = end_date {
            check_ordering(start_date, end).inspect_err(|_| {
                tracing::warn!(request_id = %ctx, %start_date, end_date = %end, "End date before start date");
            })?;
        }

        let user_id = parse_user_id(ctx, &params.user_id)?;

        validate_service_name(&params.service_name)
            .and_then(|_| validate_price(params.price))
            .inspect_err(|e| {
                tracing::warn!(request_id = %ctx, %user_id, error = %e, "Rejected subscription");
            })?;

        let new_subscription = NewSubscription {
            id: SubscriptionId::new(),
            user_id,
            service_name: params.service_name,
            price: params.price,
            start_date,
            end_date,
        };

        let subscription = self
            .repository
            .create_subscription(new_subscription)
            .await
            .map_err(|e| {
                tracing::error!(request_id = %ctx, %user_id, error = %e, "Failed to create subscription");
                e.with_context("failed to create subscription")
            })?;

        tracing::info!(
            request_id = %ctx,
            subscription_id = %subscription.id,
            %user_id,
            service_name = %subscription.service_name,
            "Subscription created"
        );
        Ok(subscription.into())
    }

    async fn subscription_by_id(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
    ) -> Result<SubscriptionOutput, SubscriptionError> {
        let subscription = self.repository.get_subscription(id).await.map_err(|e| {
            match &e {
                SubscriptionError::NotFound => {
                    tracing::warn!(request_id = %ctx, subscription_id = %id, "Subscription not found")
                }
                _ => {
                    tracing::error!(request_id = %ctx, subscription_id = %id, error = %e, "Failed to get subscription")
                }
            }
            e.with_context("failed to get subscription")
        })?;

        Ok(subscription.into())
    }

    async fn subscriptions(
        &self,
        ctx: &RequestContext,
        params: ListSubscriptionsParams,
    ) -> Result<SubscriptionsPage, SubscriptionError> {
        let user_id = parse_optional_user_id(ctx, params.user_id.as_deref())?;

        if params.page < 1 || params.page_size < 1 {
            return Err(SubscriptionError::Validation(format!(
                "page and page_size must be positive, got page={} page_size={}",
                params.page, params.page_size
            )));
        }

        let filter = SubscriptionFilter {
            user_id,
            service_name: params.service_name,
            limit: params.page_size,
            // Pages past the addressable range read as empty.
            offset: (params.page - 1).saturating_mul(params.page_size),
        };

        let (subscriptions, total) =
            self.repository
                .list_subscriptions(filter)
                .await
                .map_err(|e| {
                    tracing::error!(request_id = %ctx, error = %e, "Failed to fetch subscriptions");
                    e.with_context("failed to fetch subscriptions")
                })?;

        tracing::info!(
            request_id = %ctx,
            count = subscriptions.len(),
            total,
            "Subscriptions fetched"
        );

        let items = subscriptions.into_iter().map(Into::into).collect();
        Ok(SubscriptionsPage::new(
            items,
            total,
            params.page,
            params.page_size,
        ))
    }

    async fn subscriptions_cost(
        &self,
        ctx: &RequestContext,
        params: CostParams,
    ) -> Result<i64, SubscriptionError> {
        let user_id = parse_optional_user_id(ctx, params.user_id.as_deref())?;
        let window = CostWindow {
            from: parse_optional_month(ctx, "from", params.from.as_deref())?,
            to: parse_optional_month(ctx, "to", params.to.as_deref())?,
        };

        let candidates = self
            .repository
            .list_subscriptions_for_cost(CostFilter {
                user_id,
                service_name: params.service_name,
            })
            .await
            .map_err(|e| {
                tracing::error!(request_id = %ctx, error = %e, "Failed to fetch subscriptions for cost");
                e.with_context("failed to get subscriptions cost")
            })?;

        let total = calculate_total_cost(&candidates, window, MonthDate::now());

        tracing::info!(
            request_id = %ctx,
            candidates = candidates.len(),
            total,
            "Subscriptions cost calculated"
        );
        Ok(total)
    }

    async fn update_subscription(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
        params: UpdateSubscriptionParams,
    ) -> Result<SubscriptionOutput, SubscriptionError> {
        let start_date = parse_optional_month(ctx, "start_date", params.start_date.as_deref())?;
        let end_date = match params.end_date {
            Some(Some(raw)) => Some(Some(parse_month(ctx, "end_date", &raw)?)),
            Some(None) => Some(None),
            None => None,
        };

        // Only cross-checked when both ends arrive together; storage covers the rest.
        if let (Some(start), Some(Some(end))) = (start_date, end_date) {
            check_ordering(start, end).inspect_err(|_| {
                tracing::warn!(request_id = %ctx, subscription_id = %id, "End date before start date in update");
            })?;
        }

        if let Some(name) = params.service_name.as_deref() {
            validate_service_name(name)?;
        }
        if let Some(price) = params.price {
            validate_price(price)?;
        }

        let update = UpdateSubscription {
            service_name: params.service_name,
            price: params.price,
            start_date,
            end_date,
        };

        let log_failure = |e: SubscriptionError| {
            match &e {
                SubscriptionError::NotFound => {
                    tracing::warn!(request_id = %ctx, subscription_id = %id, "Subscription not found")
                }
                _ if e.is_client_error() => {
                    tracing::warn!(request_id = %ctx, subscription_id = %id, error = %e, "Update rejected by storage")
                }
                _ => {
                    tracing::error!(request_id = %ctx, subscription_id = %id, error = %e, "Failed to update subscription")
                }
            }
            e.with_context("failed to update subscription")
        };

        if update.is_empty() {
            tracing::debug!(request_id = %ctx, subscription_id = %id, "Empty update, returning stored state");
            let subscription = self
                .repository
                .get_subscription(id)
                .await
                .map_err(log_failure)?;
            return Ok(subscription.into());
        }

        let subscription = self
            .repository
            .update_subscription(id, update)
            .await
            .map_err(log_failure)?;

        tracing::info!(request_id = %ctx, subscription_id = %id, "Subscription updated");
        Ok(subscription.into())
    }

    async fn delete_subscription(
        &self,
        ctx: &RequestContext,
        id: SubscriptionId,
    ) -> Result<(), SubscriptionError> {
        self.repository.delete_subscription(id).await.map_err(|e| {
            match &e {
                SubscriptionError::NotFound => {
                    tracing::warn!(request_id = %ctx, subscription_id = %id, "Subscription not found")
                }
                _ => {
                    tracing::error!(request_id = %ctx, subscription_id = %id, error = %e, "Failed to delete subscription")
                }
            }
            e.with_context("failed to delete subscription")
        })?;

        tracing::info!(request_id = %ctx, subscription_id = %id, "Subscription deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::ports::{
        CostFilter, NewSubscription, Subscription, SubscriptionFilter, UpdateSubscription,
    };
    use crate::subscription::test_helpers::InMemorySubscriptionRepository;
    use chrono::{Duration, Utc};

    const USER: &str = "60601fee-2bf1-4721-ae6f-7636e79a0cba";

    fn setup() -> (Arc<InMemorySubscriptionRepository>, SubscriptionServiceImpl) {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let service = SubscriptionServiceImpl::new(repo.clone());
        (repo, service)
    }

    fn create_params(start: &str, end: Option<&str>) -> CreateSubscriptionParams {
        CreateSubscriptionParams {
            service_name: "Yandex Plus".to_string(),
            price: 400,
            user_id: USER.to_string(),
            start_date: start.to_string(),
            end_date: end.map(str::to_string),
        }
    }

    fn id_of(output: &SubscriptionOutput) -> SubscriptionId {
        output.id.parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_persisted_subscription() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();

        let created = service
            .create_subscription(&ctx, create_params("07-2025", Some("12-2025")))
            .await
            .unwrap();

        assert_eq!(created.service_name, "Yandex Plus");
        assert_eq!(created.price, 400);
        assert_eq!(created.user_id, USER);
        assert_eq!(created.start_date, "07-2025");
        assert_eq!(created.end_date.as_deref(), Some("12-2025"));
        assert_eq!(created.created_at, created.updated_at);
        assert!(repo.snapshot(id_of(&created)).is_some());
    }

    #[tokio::test]
    async fn test_create_generates_fresh_ids() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        let a = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        let b = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_create_end_before_start_never_reaches_storage() {
        let (repo, service) = setup();
        let err = service
            .create_subscription(
                &RequestContext::new(),
                create_params("07-2025", Some("06-2025")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::OrderingViolation { .. }));
        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_same_start_and_end_month_allowed() {
        let (_, service) = setup();
        let created = service
            .create_subscription(
                &RequestContext::new(),
                create_params("07-2025", Some("07-2025")),
            )
            .await
            .unwrap();
        assert_eq!(created.end_date.as_deref(), Some("07-2025"));
    }

    #[tokio::test]
    async fn test_create_validation_order() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();

        // Start date is checked first, even when every other field is bad too.
        let mut params = create_params("7/2025", Some("13-2025"));
        params.user_id = "nope".to_string();
        params.price = 0;
        let err = service
            .create_subscription(&ctx, params)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidDateFormat(_)));

        let mut params = create_params("07-2025", Some("13-2025"));
        params.user_id = "nope".to_string();
        let err = service
            .create_subscription(&ctx, params)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidDate(_)));

        let mut params = create_params("07-2025", Some("01-2025"));
        params.user_id = "nope".to_string();
        let err = service
            .create_subscription(&ctx, params)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::OrderingViolation { .. }));

        let mut params = create_params("07-2025", None);
        params.user_id = "nope".to_string();
        params.price = -1;
        let err = service
            .create_subscription(&ctx, params)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::InvalidIdentifier { field: "user_id", .. }
        ));

        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_structural_violations() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();

        let mut params = create_params("07-2025", None);
        params.price = 0;
        let err = service.create_subscription(&ctx, params).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Validation(_)));

        let mut params = create_params("07-2025", None);
        params.service_name = "   ".to_string();
        let err = service.create_subscription(&ctx, params).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Validation(_)));

        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_subscription_is_not_found() {
        let (_, service) = setup();
        let err = service
            .subscription_by_id(&RequestContext::new(), SubscriptionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        for _ in 0..3 {
            service
                .create_subscription(&ctx, create_params("01-2025", None))
                .await
                .unwrap();
        }
        let mut other = create_params("01-2025", None);
        other.user_id = UserId::new().to_string();
        service.create_subscription(&ctx, other).await.unwrap();

        let page = service
            .subscriptions(
                &ctx,
                ListSubscriptionsParams {
                    user_id: Some(USER.to_string()),
                    service_name: None,
                    page: 1,
                    page_size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.subscriptions.len(), 2);
        assert!(page.has_next_page);
        assert!(!page.has_prev_page);

        let page = service
            .subscriptions(
                &ctx,
                ListSubscriptionsParams {
                    user_id: Some(USER.to_string()),
                    service_name: None,
                    page: 2,
                    page_size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.subscriptions.len(), 1);
        assert!(!page.has_next_page);
        assert!(page.has_prev_page);

        let everyone = service
            .subscriptions(
                &ctx,
                ListSubscriptionsParams {
                    user_id: None,
                    service_name: Some("Yandex Plus".to_string()),
                    page: 1,
                    page_size: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(everyone.total, 4);
    }

    #[tokio::test]
    async fn test_list_pages_past_the_end_are_empty() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        for _ in 0..3 {
            service
                .create_subscription(&ctx, create_params("01-2025", None))
                .await
                .unwrap();
        }

        for page in [3, i64::MAX] {
            let result = service
                .subscriptions(
                    &ctx,
                    ListSubscriptionsParams {
                        user_id: Some(USER.to_string()),
                        service_name: None,
                        page,
                        page_size: 10,
                    },
                )
                .await
                .unwrap();
            assert_eq!(result.total, 3, "page {page}");
            assert!(result.subscriptions.is_empty(), "page {page}");
            assert!(!result.has_next_page, "page {page}");
            assert!(result.has_prev_page, "page {page}");
        }
    }

    #[tokio::test]
    async fn test_list_invalid_user_id_rejected_before_storage() {
        let (repo, service) = setup();
        let err = service
            .subscriptions(
                &RequestContext::new(),
                ListSubscriptionsParams {
                    user_id: Some("not-a-uuid".to_string()),
                    service_name: None,
                    page: 1,
                    page_size: 10,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidIdentifier { .. }));
        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cost_scenario_open_ended_three_month_window() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();

        let cost = service
            .subscriptions_cost(
                &ctx,
                CostParams {
                    user_id: Some(USER.to_string()),
                    service_name: None,
                    from: Some("07-2025".to_string()),
                    to: Some("09-2025".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cost, 800);
    }

    #[tokio::test]
    async fn test_cost_with_no_matches_is_zero() {
        let (_, service) = setup();
        let cost = service
            .subscriptions_cost(
                &RequestContext::new(),
                CostParams {
                    service_name: Some("Nothing".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cost, 0);
    }

    #[tokio::test]
    async fn test_cost_filters_by_service_name() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        service
            .create_subscription(&ctx, create_params("01-2025", Some("04-2025")))
            .await
            .unwrap();
        let mut other = create_params("01-2025", Some("04-2025"));
        other.service_name = "Spotify".to_string();
        other.price = 1000;
        service.create_subscription(&ctx, other).await.unwrap();

        let cost = service
            .subscriptions_cost(
                &ctx,
                CostParams {
                    service_name: Some("Spotify".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cost, 3000);
    }

    #[tokio::test]
    async fn test_cost_rejects_bad_input_before_fetch() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();

        let err = service
            .subscriptions_cost(
                &ctx,
                CostParams {
                    from: Some("2025-07".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidDate(_)));

        let err = service
            .subscriptions_cost(
                &ctx,
                CostParams {
                    to: Some("07.2025".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidDateFormat(_)));

        let err = service
            .subscriptions_cost(
                &ctx,
                CostParams {
                    user_id: Some("123".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidIdentifier { .. }));

        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_update_is_a_pure_read() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        let writes_before = repo.write_count();

        let read = service
            .update_subscription(&ctx, id_of(&created), UpdateSubscriptionParams::default())
            .await
            .unwrap();

        assert_eq!(read, created);
        assert_eq!(repo.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_empty_update_of_missing_subscription_is_not_found() {
        let (_, service) = setup();
        let err = service
            .update_subscription(
                &RequestContext::new(),
                SubscriptionId::new(),
                UpdateSubscriptionParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound));
    }

    #[tokio::test]
    async fn test_update_applies_only_supplied_fields_and_bumps_timestamp() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", Some("12-2025")))
            .await
            .unwrap();
        let id = id_of(&created);
        let before = repo.snapshot(id).unwrap();

        let updated = service
            .update_subscription(
                &ctx,
                id,
                UpdateSubscriptionParams {
                    price: Some(599),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, 599);
        assert_eq!(updated.service_name, created.service_name);
        assert_eq!(updated.end_date.as_deref(), Some("12-2025"));

        let after = repo.snapshot(id).unwrap();
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_update_can_clear_end_date() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", Some("12-2025")))
            .await
            .unwrap();

        let updated = service
            .update_subscription(
                &ctx,
                id_of(&created),
                UpdateSubscriptionParams {
                    end_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.end_date, None);
    }

    #[tokio::test]
    async fn test_update_with_both_dates_checks_ordering() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        let writes_before = repo.write_count();

        let err = service
            .update_subscription(
                &ctx,
                id_of(&created),
                UpdateSubscriptionParams {
                    start_date: Some("10-2025".to_string()),
                    end_date: Some(Some("09-2025".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::OrderingViolation { .. }));
        assert_eq!(repo.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_update_with_only_end_date_defers_to_storage() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        let writes_before = repo.write_count();

        let err = service
            .update_subscription(
                &ctx,
                id_of(&created),
                UpdateSubscriptionParams {
                    end_date: Some(Some("01-2025".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        // The write was attempted and the storage constraint refused it.
        assert_eq!(repo.write_count(), writes_before + 1);
        assert!(matches!(err, SubscriptionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_subscription_is_not_found() {
        let (_, service) = setup();
        let err = service
            .update_subscription(
                &RequestContext::new(),
                SubscriptionId::new(),
                UpdateSubscriptionParams {
                    service_name: Some("Spotify".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        let (repo, service) = setup();
        let ctx = RequestContext::new();
        let id = SubscriptionId::new();

        let err = service
            .update_subscription(
                &ctx,
                id,
                UpdateSubscriptionParams {
                    price: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Validation(_)));

        let err = service
            .update_subscription(
                &ctx,
                id,
                UpdateSubscriptionParams {
                    start_date: Some("1-2025".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidDate(_)));

        assert_eq!(repo.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_then_delete_again() {
        let (_, service) = setup();
        let ctx = RequestContext::new();
        let created = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap();
        let id = id_of(&created);

        service.delete_subscription(&ctx, id).await.unwrap();

        let err = service.delete_subscription(&ctx, id).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound));

        let err = service.subscription_by_id(&ctx, id).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound));
    }

    #[tokio::test]
    async fn test_cost_counts_open_ended_through_now() {
        let (repo, service) = setup();
        let start = MonthDate::from_datetime(Utc::now() - Duration::days(100));
        let now = Utc::now();
        repo.insert(Subscription {
            id: SubscriptionId::new(),
            user_id: USER.parse().unwrap(),
            service_name: "Kinopoisk".to_string(),
            price: 10,
            start_date: start,
            end_date: None,
            created_at: now,
            updated_at: now,
        });

        let cost = service
            .subscriptions_cost(&RequestContext::new(), CostParams::default())
            .await
            .unwrap();
        assert_eq!(cost, 10 * start.months_until(MonthDate::now()));
        assert!(cost > 0);
    }

    /// Repository whose every call fails like a broken connection
    struct BrokenRepository;

    #[async_trait]
    impl SubscriptionRepository for BrokenRepository {
        async fn create_subscription(
            &self,
            _: NewSubscription,
        ) -> Result<Subscription, SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
        async fn get_subscription(
            &self,
            _: SubscriptionId,
        ) -> Result<Subscription, SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
        async fn list_subscriptions(
            &self,
            _: SubscriptionFilter,
        ) -> Result<(Vec<Subscription>, i64), SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
        async fn list_subscriptions_for_cost(
            &self,
            _: CostFilter,
        ) -> Result<Vec<Subscription>, SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
        async fn update_subscription(
            &self,
            _: SubscriptionId,
            _: UpdateSubscription,
        ) -> Result<Subscription, SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
        async fn delete_subscription(&self, _: SubscriptionId) -> Result<(), SubscriptionError> {
            Err(SubscriptionError::DatabaseError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_failures_keep_kind_and_gain_context() {
        let service = SubscriptionServiceImpl::new(Arc::new(BrokenRepository));
        let ctx = RequestContext::new();

        let err = service
            .create_subscription(&ctx, create_params("07-2025", None))
            .await
            .unwrap_err();
        match err {
            SubscriptionError::DatabaseError(msg) => {
                assert_eq!(msg, "failed to create subscription: connection refused")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = service
            .delete_subscription(&ctx, SubscriptionId::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, SubscriptionError::DatabaseError(ref m) if m.starts_with("failed to delete subscription"))
        );

        let err = service
            .subscriptions_cost(&ctx, CostParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::DatabaseError(_)));
    }
}
