//! PostgreSQL plan catalog repository

use async_trait::async_trait;
use sqlx::PgPool;
use tutorhub_types::{PlanDraft, PlanId, SubscriptionPlan};

use crate::error::DbResult;
use crate::models::PlanRow;
use crate::repo::PlanRepository;

const PLAN_COLUMNS: &str = r#"
    id, name, description, price_monthly_cents, price_annually_cents, max_courses,
    commission_rate, features, is_active, created_at, updated_at
"#;

/// PostgreSQL plan repository
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<SubscriptionPlan>> {
        let sql = format!(
            r#"SELECT {PLAN_COLUMNS} FROM "SubscriptionPlan" WHERE id = $1 AND deleted_at IS NULL"#
        );
        let row = sqlx::query_as::<_, PlanRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
        let sql = format!(
            r#"
            SELECT {PLAN_COLUMNS} FROM "SubscriptionPlan"
            WHERE deleted_at IS NULL AND (is_active OR NOT $1)
            ORDER BY price_monthly_cents ASC, id ASC
            "#
        );
        let rows = sqlx::query_as::<_, PlanRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, plan: &PlanDraft) -> DbResult<SubscriptionPlan> {
        let sql = format!(
            r#"
            INSERT INTO "SubscriptionPlan" (name, description, price_monthly_cents,
                                            price_annually_cents, max_courses,
                                            commission_rate, features, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PLAN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PlanRow>(&sql)
            .bind(plan.name.trim())
            .bind(&plan.description)
            .bind(plan.price_monthly_cents)
            .bind(plan.price_annually_cents)
            .bind(plan.max_courses)
            .bind(plan.commission_rate)
            .bind(&plan.features)
            .bind(plan.is_active)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn update(&self, id: PlanId, plan: &PlanDraft) -> DbResult<Option<SubscriptionPlan>> {
        let sql = format!(
            r#"
            UPDATE "SubscriptionPlan"
            SET name = $2, description = $3, price_monthly_cents = $4,
                price_annually_cents = $5, max_courses = $6, commission_rate = $7,
                features = $8, is_active = $9, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PLAN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PlanRow>(&sql)
            .bind(id.0)
            .bind(plan.name.trim())
            .bind(&plan.description)
            .bind(plan.price_monthly_cents)
            .bind(plan.price_annually_cents)
            .bind(plan.max_courses)
            .bind(plan.commission_rate)
            .bind(&plan.features)
            .bind(plan.is_active)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn soft_delete(&self, id: PlanId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE "SubscriptionPlan"
            SET is_active = FALSE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
