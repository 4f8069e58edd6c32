use crate::domain::model::{
    AvailabilityStatus, Identity, IdentityKind, ProfessionalListing, ProfessionalProfile,
    ProfileUpdate,
};
use crate::domain::ports::MarketplaceStore;
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::require_positive;

/// 專業人員檔案：只有本人可以修改，評分欄位由評論推導不在此修改
pub struct ProfileService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> ProfileService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list_professionals(&self) -> Result<Vec<ProfessionalListing>> {
        self.store.list_professionals().await
    }

    pub async fn professional(&self, user_id: &str) -> Result<ProfessionalListing> {
        self.store
            .professional(user_id)
            .await?
            .ok_or_else(|| MarketError::not_found("professional", user_id))
    }

    pub async fn update_own_profile(
        &self,
        actor: &Identity,
        update: ProfileUpdate,
    ) -> Result<ProfessionalProfile> {
        if !actor.is(IdentityKind::Professional) {
            return Err(MarketError::authorization(
                "Only professionals have a professional profile",
            ));
        }
        if let Some(rate) = update.hourly_rate {
            require_positive("hourly_rate", rate)?;
        }

        let profile = self.store.update_professional(&actor.id, &update).await?;
        tracing::info!("Profile of {} updated", actor.display_name());
        Ok(profile)
    }

    pub async fn set_availability(
        &self,
        actor: &Identity,
        profile_id: &str,
        status: AvailabilityStatus,
    ) -> Result<ProfessionalProfile> {
        let own = self.store.professional(&actor.id).await?;
        match own {
            Some(listing) if listing.profile.id == profile_id => {}
            _ => {
                return Err(MarketError::authorization(
                    "Only the owner can change this availability",
                ))
            }
        }

        let profile = self.store.set_availability(profile_id, status).await?;
        tracing::info!(
            "Availability of {} set to {:?}",
            actor.display_name(),
            profile.availability_status
        );
        Ok(profile)
    }
}
