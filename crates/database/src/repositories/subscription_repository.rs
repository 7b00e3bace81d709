use crate::pool::DbPool;
use async_trait::async_trait;
use chrono::NaiveDate;
use services::subscription::ports::{
    CostFilter, NewSubscription, Subscription, SubscriptionError, SubscriptionFilter,
    SubscriptionRepository, UpdateSubscription,
};
use services::subscription::MonthDate;
use services::{SubscriptionId, UserId};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, service_name, price, start_date, end_date, created_at, updated_at";

pub struct PostgresSubscriptionRepository {
    pool: DbPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_subscription(row: &Row) -> Subscription {
        Subscription {
            id: row.get("id"),
            user_id: row.get("user_id"),
            service_name: row.get("service_name"),
            price: row.get("price"),
            start_date: MonthDate::from(row.get::<_, NaiveDate>("start_date")),
            end_date: row
                .get::<_, Option<NaiveDate>>("end_date")
                .map(MonthDate::from),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Equality filters shared by listing and cost queries.
struct FilterClause {
    conditions: Vec<String>,
    params: Vec<BoxedParam>,
}

impl FilterClause {
    fn new(user_id: Option<UserId>, service_name: Option<String>) -> Self {
        let mut clause = Self {
            conditions: Vec::new(),
            params: Vec::new(),
        };
        if let Some(user_id) = user_id {
            clause.push("user_id", user_id);
        }
        if let Some(service_name) = service_name {
            clause.push("service_name", service_name);
        }
        clause
    }

    fn next_param_idx(&self) -> usize {
        self.params.len() + 1
    }

    fn push<T: ToSql + Sync + Send + 'static>(&mut self, column: &str, value: T) {
        let idx = self.next_param_idx();
        self.conditions.push(format!("{column} = ${idx}"));
        self.params.push(Box::new(value));
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn param_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_ref() as _).collect()
    }
}

/// Build the `SET` list for a partial update; `$1` is reserved for the id.
fn update_assignments(update: &UpdateSubscription) -> (Vec<String>, Vec<BoxedParam>) {
    let mut assignments = Vec::new();
    let mut params: Vec<BoxedParam> = Vec::new();
    let mut param_idx = 2;

    if let Some(ref service_name) = update.service_name {
        assignments.push(format!("service_name = ${}", param_idx));
        params.push(Box::new(service_name.clone()));
        param_idx += 1;
    }

    if let Some(price) = update.price {
        assignments.push(format!("price = ${}", param_idx));
        params.push(Box::new(price));
        param_idx += 1;
    }

    if let Some(start_date) = update.start_date {
        assignments.push(format!("start_date = ${}", param_idx));
        params.push(Box::new(start_date.as_date()));
        param_idx += 1;
    }

    if let Some(end_date) = update.end_date {
        assignments.push(format!("end_date = ${}", param_idx));
        params.push(Box::new(end_date.map(|d| d.as_date())));
    }

    if !assignments.is_empty() {
        assignments.push("updated_at = NOW()".to_string());
    }

    (assignments, params)
}

/// Map driver errors onto the domain; check violations are caller errors.
fn map_db_error(err: tokio_postgres::Error) -> SubscriptionError {
    if let Some(db_err) = err.as_db_error() {
        if let Some(mapped) = map_server_error(db_err.code(), db_err.constraint(), db_err.message())
        {
            return mapped;
        }
    }
    SubscriptionError::DatabaseError(err.to_string())
}

fn map_server_error(
    code: &SqlState,
    constraint: Option<&str>,
    message: &str,
) -> Option<SubscriptionError> {
    if *code != SqlState::CHECK_VIOLATION {
        return None;
    }
    Some(SubscriptionError::Validation(
        constraint
            .map(|c| format!("constraint {c} violated"))
            .unwrap_or_else(|| message.to_string()),
    ))
}

fn map_pool_error(err: deadpool_postgres::PoolError) -> SubscriptionError {
    SubscriptionError::DatabaseError(format!("failed to get connection: {err}"))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn create_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, SubscriptionError> {
        tracing::info!(
            "Repository: Creating subscription subscription_id={}, user_id={}",
            subscription.id,
            subscription.user_id
        );

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let row = client
            .query_one(
                &format!(
                    "INSERT INTO subscriptions (id, user_id, service_name, price, start_date, end_date)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING {SUBSCRIPTION_COLUMNS}"
                ),
                &[
                    &subscription.id,
                    &subscription.user_id,
                    &subscription.service_name,
                    &subscription.price,
                    &subscription.start_date.as_date(),
                    &subscription.end_date.map(|d| d.as_date()),
                ],
            )
            .await
            .map_err(map_db_error)?;

        Ok(Self::row_to_subscription(&row))
    }

    async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Subscription, SubscriptionError> {
        tracing::debug!("Repository: Fetching subscription subscription_id={}", id);

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let row = client
            .query_opt(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"),
                &[&id],
            )
            .await
            .map_err(map_db_error)?;

        row.as_ref()
            .map(Self::row_to_subscription)
            .ok_or(SubscriptionError::NotFound)
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<(Vec<Subscription>, i64), SubscriptionError> {
        tracing::debug!(
            "Repository: Listing subscriptions user_id={:?}, service_name={:?}, limit={}, offset={}",
            filter.user_id,
            filter.service_name,
            filter.limit,
            filter.offset
        );

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let mut clause = FilterClause::new(filter.user_id, filter.service_name);
        let where_clause = clause.where_clause();

        let total: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) FROM subscriptions {where_clause}"),
                &clause.param_refs(),
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let limit_idx = clause.next_param_idx();
        let offset_idx = limit_idx + 1;
        clause.params.push(Box::new(filter.limit));
        clause.params.push(Box::new(filter.offset));

        let rows = client
            .query(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS}
                     FROM subscriptions
                     {where_clause}
                     ORDER BY created_at, id
                     LIMIT ${limit_idx} OFFSET ${offset_idx}"
                ),
                &clause.param_refs(),
            )
            .await
            .map_err(map_db_error)?;

        let subscriptions = rows.iter().map(Self::row_to_subscription).collect();
        Ok((subscriptions, total))
    }

    async fn list_subscriptions_for_cost(
        &self,
        filter: CostFilter,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        tracing::debug!(
            "Repository: Fetching cost candidates user_id={:?}, service_name={:?}",
            filter.user_id,
            filter.service_name
        );

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let clause = FilterClause::new(filter.user_id, filter.service_name);
        let rows = client
            .query(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions {}",
                    clause.where_clause()
                ),
                &clause.param_refs(),
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(Self::row_to_subscription).collect())
    }

    async fn update_subscription(
        &self,
        id: SubscriptionId,
        update: UpdateSubscription,
    ) -> Result<Subscription, SubscriptionError> {
        tracing::info!("Repository: Updating subscription subscription_id={}", id);

        let (assignments, values) = update_assignments(&update);
        if assignments.is_empty() {
            return self.get_subscription(id).await;
        }

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let query = format!(
            "UPDATE subscriptions SET {} WHERE id = $1 RETURNING {SUBSCRIPTION_COLUMNS}",
            assignments.join(", ")
        );

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(values.len() + 1);
        params.push(&id);
        params.extend(values.iter().map(|v| v.as_ref() as &(dyn ToSql + Sync)));

        let row = client
            .query_opt(&query, &params)
            .await
            .map_err(map_db_error)?;

        row.as_ref()
            .map(Self::row_to_subscription)
            .ok_or(SubscriptionError::NotFound)
    }

    async fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        tracing::info!("Repository: Deleting subscription subscription_id={}", id);

        let client = self.pool.get().await.map_err(map_pool_error)?;

        let rows_affected = client
            .execute("DELETE FROM subscriptions WHERE id = $1", &[&id])
            .await
            .map_err(map_db_error)?;

        if rows_affected == 0 {
            return Err(SubscriptionError::NotFound);
        }

        Ok(())
    }
}
