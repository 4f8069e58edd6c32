use crate::core::reviews::recompute_rating;
use crate::domain::model::{
    AvailabilityStatus, Identity, IdentityKind, ProfessionalListing, ProfessionalProfile, Profile,
    ProfileUpdate, Review, ReviewSubmission,
};
use crate::domain::ports::MarketplaceStore;
use crate::domain::request::{
    NewPayment, NewServiceDetails, NewServiceRequest, Payment, RequestStatus, ServiceDetails,
    ServiceRequest,
};
use crate::utils::error::{MarketError, Result, WorkflowError};
use crate::utils::validation::require_positive;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MarketState {
    identities: HashMap<String, Identity>,
    // 以 user_id 為鍵
    professionals: HashMap<String, ProfessionalProfile>,
    requests: HashMap<String, ServiceRequest>,
    // 以 service_request_id 為鍵，即唯一性約束
    payments: HashMap<String, Payment>,
    details: HashMap<String, ServiceDetails>,
    reviews: Vec<Review>,
}

impl MarketState {
    fn listing(&self, user_id: &str) -> Option<ProfessionalListing> {
        let profile = self.professionals.get(user_id)?;
        let user = self.identities.get(user_id)?;
        Some(ProfessionalListing {
            user: user.clone(),
            profile: profile.clone(),
        })
    }

    fn request(&self, id: &str) -> Result<&ServiceRequest> {
        self.requests
            .get(id)
            .ok_or_else(|| MarketError::not_found("service request", id))
    }
}

/// 行程內的資料層。所有檢查與寫入在同一把鎖內完成，
/// 提供每個請求「至多一個寫入者」的語意。
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MarketState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MarketState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 加入帳號；專業人員的檔案若附在 `identity.profile` 上也一併建立
    pub fn add_identity(&self, identity: Identity) -> Identity {
        let mut state = self.state();
        if let Some(Profile::Professional(profile)) = &identity.profile {
            state
                .professionals
                .insert(identity.id.clone(), profile.clone());
        } else if identity.kind == IdentityKind::Professional {
            state.professionals.insert(
                identity.id.clone(),
                ProfessionalProfile {
                    id: Uuid::new_v4().to_string(),
                    user_id: identity.id.clone(),
                    specialties: Default::default(),
                    experience_years: 0,
                    bio: String::new(),
                    education: String::new(),
                    certifications: vec![],
                    hourly_rate: None,
                    availability_status: AvailabilityStatus::Available,
                    skills: vec![],
                    areas_of_expertise: vec![],
                    average_rating: 0.0,
                    total_reviews: 0,
                },
            );
        }
        state.identities.insert(identity.id.clone(), identity.clone());
        identity
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn list_professionals(&self) -> Result<Vec<ProfessionalListing>> {
        let state = self.state();
        let mut listings: Vec<ProfessionalListing> = state
            .professionals
            .keys()
            .filter_map(|user_id| state.listing(user_id))
            .collect();
        listings.sort_by(|a, b| a.user.full_name.cmp(&b.user.full_name));
        Ok(listings)
    }

    async fn professional(&self, user_id: &str) -> Result<Option<ProfessionalListing>> {
        Ok(self.state().listing(user_id))
    }

    async fn update_professional(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfessionalProfile> {
        let mut state = self.state();
        let profile = state
            .professionals
            .get_mut(user_id)
            .ok_or_else(|| MarketError::not_found("professional", user_id))?;
        update.apply_to(profile);
        Ok(profile.clone())
    }

    async fn set_availability(
        &self,
        profile_id: &str,
        status: AvailabilityStatus,
    ) -> Result<ProfessionalProfile> {
        let mut state = self.state();
        let profile = state
            .professionals
            .values_mut()
            .find(|p| p.id == profile_id)
            .ok_or_else(|| MarketError::not_found("professional profile", profile_id))?;
        profile.availability_status = status;
        Ok(profile.clone())
    }

    async fn insert_request(
        &self,
        company_id: &str,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest> {
        let mut state = self.state();
        if !state.professionals.contains_key(&request.professional_id) {
            return Err(MarketError::not_found(
                "professional",
                &request.professional_id,
            ));
        }

        let created = ServiceRequest {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            professional_id: request.professional_id,
            service_type: request.service_type,
            message: request.message,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.requests.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn request(&self, id: &str) -> Result<Option<ServiceRequest>> {
        Ok(self.state().requests.get(id).cloned())
    }

    async fn requests_by_company(&self, company_id: &str) -> Result<Vec<ServiceRequest>> {
        Ok(self
            .state()
            .requests
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn requests_for_professional(
        &self,
        professional_id: &str,
    ) -> Result<Vec<ServiceRequest>> {
        Ok(self
            .state()
            .requests
            .values()
            .filter(|r| r.professional_id == professional_id)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        id: &str,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest> {
        let mut state = self.state();
        let request = state
            .requests
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("service request", id))?;

        if request.status != expected || !request.status.can_transition_to(next) {
            return Err(WorkflowError::AlreadyDecided.into());
        }
        request.status = next;
        request.updated_at = Some(Utc::now());
        Ok(request.clone())
    }

    async fn payment_for(&self, request_id: &str) -> Result<Option<Payment>> {
        Ok(self.state().payments.get(request_id).cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut state = self.state();
        let request = state.request(&payment.service_request_id)?;
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::NotApproved.into());
        }
        if state.payments.contains_key(&payment.service_request_id) {
            return Err(WorkflowError::AlreadyPaid.into());
        }
        require_positive("amount", payment.amount)?;

        let created = Payment {
            id: Uuid::new_v4().to_string(),
            service_request_id: payment.service_request_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            created_at: Utc::now(),
        };
        state
            .payments
            .insert(created.service_request_id.clone(), created.clone());
        Ok(created)
    }

    async fn details_for(&self, request_id: &str) -> Result<Option<ServiceDetails>> {
        Ok(self.state().details.get(request_id).cloned())
    }

    async fn insert_details(&self, details: NewServiceDetails) -> Result<ServiceDetails> {
        let mut state = self.state();
        let request = state.request(&details.service_request_id)?;
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::NotApproved.into());
        }
        if !state.payments.contains_key(&details.service_request_id) {
            return Err(WorkflowError::PaymentRequired.into());
        }
        if state.details.contains_key(&details.service_request_id) {
            return Err(WorkflowError::AlreadyDetailed.into());
        }
        details.form.validate()?;

        let created = ServiceDetails {
            id: Uuid::new_v4().to_string(),
            service_request_id: details.service_request_id,
            form: details.form,
            created_at: Utc::now(),
        };
        state
            .details
            .insert(created.service_request_id.clone(), created.clone());
        Ok(created)
    }

    async fn reviews_for(&self, user_id: &str) -> Result<Vec<Review>> {
        Ok(self
            .state()
            .reviews
            .iter()
            .filter(|r| r.reviewed_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_review(&self, review: ReviewSubmission) -> Result<Review> {
        let mut state = self.state();
        if !state.professionals.contains_key(&review.reviewed_user_id) {
            return Err(MarketError::not_found("professional", &review.reviewed_user_id));
        }

        let created = Review {
            id: Uuid::new_v4().to_string(),
            reviewed_user_id: review.reviewed_user_id,
            reviewer_user_id: review.reviewer_user_id,
            reviewer_name: review.reviewer_name,
            reviewer_kind: review.reviewer_kind,
            rating: review.rating,
            comment: review.comment,
            collaboration_type: review.collaboration_type,
            created_at: Utc::now(),
        };
        state.reviews.push(created.clone());

        let summary = {
            let reviews: Vec<Review> = state
                .reviews
                .iter()
                .filter(|r| r.reviewed_user_id == created.reviewed_user_id)
                .cloned()
                .collect();
            recompute_rating(&reviews)
        };
        if let Some(profile) = state.professionals.get_mut(&created.reviewed_user_id) {
            profile.apply_rating(summary);
        }

        Ok(created)
    }
}
