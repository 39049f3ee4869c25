//! PostgreSQL subscription event log

use async_trait::async_trait;
use sqlx::PgPool;
use tutorhub_types::{NewSubscriptionEvent, SubscriptionEvent, SubscriptionId};

use crate::error::DbResult;
use crate::models::EventRow;
use crate::repo::EventRepository;

/// PostgreSQL event repository
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create a new event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn log_event(&self, event: &NewSubscriptionEvent) -> DbResult<SubscriptionEvent> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO "SubscriptionEvents" (subscription_id, event_type, previous_status,
                                              current_status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, subscription_id, event_type, previous_status, current_status,
                      notes, created_at
            "#,
        )
        .bind(event.subscription_id.0)
        .bind(event.event_type.as_str())
        .bind(event.previous_status.map(|s| s.as_str()))
        .bind(event.current_status.as_str())
        .bind(&event.notes)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_for_subscription(&self, id: SubscriptionId) -> DbResult<Vec<SubscriptionEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, subscription_id, event_type, previous_status, current_status,
                   notes, created_at
            FROM "SubscriptionEvents"
            WHERE subscription_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
