//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tutorhub_types::{
    OrderId, PageRequest, PendingPlanChange, Subscription, SubscriptionFilter, SubscriptionId,
    SubscriptionStatus, TutorId,
};

use crate::error::{DbError, DbResult};
use crate::models::{status_names, StatusChangeRow, SubscriptionRow, SUBSCRIPTION_SELECT};
use crate::repo::{CreateSubscription, StatusChange, SubscriptionRepository};

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SubscriptionFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(tutor_id) = filter.tutor_id {
        qb.push(" AND s.tutor_id = ").push_bind(tutor_id.0);
    }
    if let Some(plan_id) = filter.plan_id {
        qb.push(" AND s.plan_id = ").push_bind(plan_id.0);
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND s.created_at >= ").push_bind(from);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND s.created_at < ").push_bind(before);
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        let mut tx = self.pool.begin().await?;

        if let Some(old) = sub.supersedes {
            let superseded = sqlx::query(
                r#"
                UPDATE "TutorSubscriptions"
                SET status = 'canceled', updated_at = NOW()
                WHERE id = $1 AND tutor_id = $2 AND status = 'past_due'
                "#,
            )
            .bind(old.0)
            .bind(sub.tutor_id.0)
            .execute(&mut *tx)
            .await?;

            if superseded.rows_affected() == 0 {
                return Err(DbError::Conflict(format!(
                    "subscription {old} is no longer past due"
                )));
            }
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO "TutorSubscriptions" (tutor_id, plan_id, status, billing_cycle,
                                              current_period_start, current_period_end,
                                              payment_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(sub.tutor_id.0)
        .bind(sub.plan_id.0)
        .bind(sub.status.as_str())
        .bind(sub.billing_cycle.as_str())
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.payment_order_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(SubscriptionId(id))
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        let sql = format!("{SUBSCRIPTION_SELECT} WHERE s.id = $1");
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_tutor_id(&self, tutor_id: TutorId) -> DbResult<Option<Subscription>> {
        let sql = format!(
            "{SUBSCRIPTION_SELECT} WHERE s.tutor_id = $1 AND s.status <> 'canceled' \
             ORDER BY s.created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(tutor_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> DbResult<Option<Subscription>> {
        let sql = format!("{SUBSCRIPTION_SELECT} WHERE s.payment_order_id = $1");
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: &SubscriptionFilter,
        page: PageRequest,
    ) -> DbResult<(Vec<Subscription>, i64)> {
        let mut count =
            QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM "TutorSubscriptions" s"#);
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SUBSCRIPTION_SELECT);
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY s.created_at DESC, s.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select
            .build_query_as::<SubscriptionRow>()
            .fetch_all(&self.pool)
            .await?;

        let subs = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DbResult<Vec<Subscription>>>()?;

        Ok((subs, total))
    }

    async fn update(&self, sub: &Subscription) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE "TutorSubscriptions"
            SET plan_id = $2, status = $3, current_period_start = $4, current_period_end = $5,
                cancel_at_period_end = $6, billing_cycle = $7, payment_order_id = $8,
                pending_plan_id = $9, pending_billing_cycle = $10, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sub.id.0)
        .bind(sub.plan.id.0)
        .bind(sub.status.as_str())
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.cancel_at_period_end)
        .bind(sub.billing_cycle.as_str())
        .bind(sub.payment_order_id.as_ref().map(OrderId::as_str))
        .bind(sub.pending_change.map(|c| c.plan_id.0))
        .bind(sub.pending_change.map(|c| c.billing_cycle.as_str()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> DbResult<StatusChange> {
        let row = sqlx::query_as::<_, StatusChangeRow>(
            r#"
            WITH prev AS (
                SELECT id, status FROM "TutorSubscriptions" WHERE id = $1 FOR UPDATE
            )
            UPDATE "TutorSubscriptions" s
            SET status = $2,
                pending_plan_id = CASE WHEN $2 = 'active' THEN s.pending_plan_id END,
                pending_billing_cycle = CASE WHEN $2 = 'active' THEN s.pending_billing_cycle END,
                updated_at = NOW()
            FROM prev
            WHERE s.id = prev.id
            RETURNING s.id, prev.status AS previous_status, s.status AS current_status
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(DbError::NotFound)?.try_into()
    }

    async fn transition(
        &self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>> {
        let row = sqlx::query_as::<_, StatusChangeRow>(
            r#"
            WITH prev AS (
                SELECT id, status FROM "TutorSubscriptions"
                WHERE id = $1 AND status = ANY($2)
                FOR UPDATE
            )
            UPDATE "TutorSubscriptions" s
            SET status = $3, updated_at = NOW()
            FROM prev
            WHERE s.id = prev.id
            RETURNING s.id, prev.status AS previous_status, s.status AS current_status
            "#,
        )
        .bind(id.0)
        .bind(status_names(from))
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn transition_by_order_id(
        &self,
        order_id: &OrderId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
    ) -> DbResult<Option<StatusChange>> {
        let row = sqlx::query_as::<_, StatusChangeRow>(
            r#"
            WITH prev AS (
                SELECT id, status FROM "TutorSubscriptions"
                WHERE payment_order_id = $1 AND status = ANY($2)
                FOR UPDATE
            )
            UPDATE "TutorSubscriptions" s
            SET status = $3, updated_at = NOW()
            FROM prev
            WHERE s.id = prev.id
            RETURNING s.id, prev.status AS previous_status, s.status AS current_status
            "#,
        )
        .bind(order_id.as_str())
        .bind(status_names(from))
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_cancel_at_period_end(&self, id: SubscriptionId, cancel: bool) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "TutorSubscriptions"
            SET cancel_at_period_end = $2, updated_at = NOW()
            WHERE id = $1 AND cancel_at_period_end <> $2
            "#,
        )
        .bind(id.0)
        .bind(cancel)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stage_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        change: PendingPlanChange,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "TutorSubscriptions"
            SET payment_order_id = $2, pending_plan_id = $3, pending_billing_cycle = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id.0)
        .bind(order_id.as_str())
        .bind(change.plan_id.0)
        .bind(change.billing_cycle.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_plan_change(
        &self,
        id: SubscriptionId,
        order_id: &OrderId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "TutorSubscriptions"
            SET plan_id = pending_plan_id, billing_cycle = pending_billing_cycle,
                current_period_start = $3, current_period_end = $4, status = 'active',
                pending_plan_id = NULL, pending_billing_cycle = NULL, updated_at = NOW()
            WHERE id = $1 AND payment_order_id = $2 AND pending_plan_id IS NOT NULL
              AND status = 'active'
            "#,
        )
        .bind(id.0)
        .bind(order_id.as_str())
        .bind(period_start)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn discard_plan_change(&self, order_id: &OrderId) -> DbResult<Option<SubscriptionId>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE "TutorSubscriptions"
            SET pending_plan_id = NULL, pending_billing_cycle = NULL, updated_at = NOW()
            WHERE payment_order_id = $1 AND pending_plan_id IS NOT NULL
            RETURNING id
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(SubscriptionId))
    }

    async fn find_expiring_soon(&self, days: u32) -> DbResult<Vec<Subscription>> {
        let days = i32::try_from(days).map_err(|_| DbError::Decode(format!("{days} days")))?;
        let sql = format!(
            r#"
            {SUBSCRIPTION_SELECT}
            WHERE s.status = 'active'
              AND s.current_period_end BETWEEN NOW() AND NOW() + make_interval(days => $1)
            ORDER BY s.current_period_end ASC, s.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(days)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
