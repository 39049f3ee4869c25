//! Plan catalog administration

use std::sync::Arc;

use tracing::{info, instrument};
use tutorhub_db::PlanRepository;
use tutorhub_types::{PlanDraft, PlanId, SubscriptionPlan};

use crate::BillingError;

/// Plan catalog service
#[derive(Clone)]
pub struct PlanCatalog {
    plans: Arc<dyn PlanRepository>,
}

impl PlanCatalog {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Plans on offer, or every undeleted plan when `active_only` is false
    pub async fn list(&self, active_only: bool) -> Result<Vec<SubscriptionPlan>, BillingError> {
        Ok(self.plans.list(active_only).await?)
    }

    pub async fn get(&self, id: PlanId) -> Result<SubscriptionPlan, BillingError> {
        self.plans
            .find_by_id(id)
            .await?
            .ok_or(BillingError::PlanNotFound(id))
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: PlanDraft) -> Result<SubscriptionPlan, BillingError> {
        draft.validate()?;
        let plan = self.plans.create(&draft).await?;
        info!(plan_id = %plan.id, "Plan created");
        Ok(plan)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(
        &self,
        id: PlanId,
        draft: PlanDraft,
    ) -> Result<SubscriptionPlan, BillingError> {
        draft.validate()?;
        let plan = self
            .plans
            .update(id, &draft)
            .await?
            .ok_or(BillingError::PlanNotFound(id))?;
        info!("Plan updated");
        Ok(plan)
    }

    /// Soft delete: existing subscriptions keep the plan, new ones cannot pick it
    #[instrument(skip(self))]
    pub async fn delete(&self, id: PlanId) -> Result<(), BillingError> {
        if !self.plans.soft_delete(id).await? {
            return Err(BillingError::PlanNotFound(id));
        }
        info!("Plan deleted");
        Ok(())
    }
}
