//! 服務請求的狀態機。
//!
//! ```text
//! (none) --company creates--> pending --professional approves--> approved
//!                                     --professional rejects---> rejected
//! approved: AWAITING_PAYMENT --payment--> AWAITING_DETAILS --details--> COORDINATED
//! ```
//!
//! 引擎先在本地檢查權限與狀態，再交給資料層寫入；資料層以唯一性約束與
//! compare-and-swap 再檢查一次，所以並行呼叫下也只有一方會成功。

use crate::domain::model::{ContactVisibility, Identity, IdentityKind};
use crate::domain::ports::MarketplaceStore;
use crate::domain::request::{
    Decision, NewPayment, NewServiceDetails, NewServiceRequest, Payment, RequestStatus,
    ServiceDetails, ServiceDetailsForm, ServiceRequest, WorkflowAction, WorkflowStage,
    SIMULATED_PAYMENT_METHOD,
};
use crate::utils::error::{MarketError, Result, WorkflowError};
use crate::utils::validation::{require_non_blank, require_positive};

pub struct WorkflowEngine<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> WorkflowEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_request(
        &self,
        company: &Identity,
        professional_id: &str,
        service_type: &str,
        message: &str,
    ) -> Result<ServiceRequest> {
        if !company.is(IdentityKind::Company) {
            return Err(MarketError::authorization(
                "Only company accounts can send service requests",
            ));
        }
        require_non_blank("service_type", service_type)?;
        require_non_blank("message", message)?;

        self.store
            .professional(professional_id)
            .await?
            .ok_or_else(|| MarketError::not_found("professional", professional_id))?;

        let request = self
            .store
            .insert_request(
                &company.id,
                NewServiceRequest {
                    professional_id: professional_id.to_string(),
                    service_type: service_type.trim().to_string(),
                    message: message.trim().to_string(),
                },
            )
            .await?;

        tracing::info!(
            "📨 {} sent service request {} ({}) to professional {}",
            company.display_name(),
            request.id,
            request.service_type,
            request.professional_id
        );
        Ok(request)
    }

    pub async fn decide(
        &self,
        request_id: &str,
        acting_professional_id: &str,
        decision: Decision,
    ) -> Result<ServiceRequest> {
        let request = self.load(request_id).await?;
        if request.professional_id != acting_professional_id {
            return Err(MarketError::authorization(
                "Only the professional who received this request can answer it",
            ));
        }
        if request.status.is_terminal() {
            return Err(WorkflowError::AlreadyDecided.into());
        }

        let updated = self
            .store
            .transition_status(request_id, RequestStatus::Pending, decision.target_status())
            .await?;

        tracing::info!(
            "Service request {}: {} -> {}",
            updated.id,
            RequestStatus::Pending,
            updated.status
        );
        Ok(updated)
    }

    /// 金融類操作：逾時回傳 `OutcomeUnknown` 時，先以 `stage` 重新查詢再決定是否重試
    pub async fn submit_payment(
        &self,
        request_id: &str,
        acting_company_id: &str,
        amount: f64,
    ) -> Result<Payment> {
        let request = self.load(request_id).await?;
        self.ensure_company(&request, acting_company_id)?;
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::NotApproved.into());
        }
        if self.store.payment_for(request_id).await?.is_some() {
            return Err(WorkflowError::AlreadyPaid.into());
        }
        require_positive("amount", amount)?;

        let payment = self
            .store
            .insert_payment(NewPayment {
                service_request_id: request_id.to_string(),
                amount,
                payment_method: SIMULATED_PAYMENT_METHOD.to_string(),
            })
            .await?;

        tracing::info!(
            "💳 Payment {} of {:.2} recorded in escrow for request {}",
            payment.id,
            payment.amount,
            request_id
        );
        Ok(payment)
    }

    pub async fn submit_details(
        &self,
        request_id: &str,
        acting_company_id: &str,
        form: ServiceDetailsForm,
    ) -> Result<ServiceDetails> {
        let request = self.load(request_id).await?;
        self.ensure_company(&request, acting_company_id)?;
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::NotApproved.into());
        }
        if self.store.payment_for(request_id).await?.is_none() {
            return Err(WorkflowError::PaymentRequired.into());
        }
        if self.store.details_for(request_id).await?.is_some() {
            return Err(WorkflowError::AlreadyDetailed.into());
        }
        form.validate()?;

        let details = self
            .store
            .insert_details(NewServiceDetails {
                service_request_id: request_id.to_string(),
                form,
            })
            .await?;

        tracing::info!(
            "📋 Service details sent for request {}; workflow coordinated",
            request_id
        );
        Ok(details)
    }

    /// 公司只有在寄給該專業人員的請求被核准後，才看得到聯絡資料
    pub async fn visible_contact_info(
        &self,
        professional_id: &str,
        viewer: &Identity,
    ) -> Result<ContactVisibility> {
        let listing = self
            .store
            .professional(professional_id)
            .await?
            .ok_or_else(|| MarketError::not_found("professional", professional_id))?;

        if !viewer.is(IdentityKind::Company) {
            return Ok(ContactVisibility::Visible(listing.user.contact()));
        }

        let approved = self
            .store
            .requests_by_company(&viewer.id)
            .await?
            .iter()
            .any(|r| r.professional_id == professional_id && r.status == RequestStatus::Approved);

        if approved {
            Ok(ContactVisibility::Visible(listing.user.contact()))
        } else {
            tracing::debug!(
                "Contact of {} redacted for company {}",
                professional_id,
                viewer.id
            );
            Ok(ContactVisibility::Redacted)
        }
    }

    pub async fn requests_sent_by(&self, company_id: &str) -> Result<Vec<ServiceRequest>> {
        let requests = self.store.requests_by_company(company_id).await?;
        Ok(newest_first(requests))
    }

    pub async fn requests_received_by(&self, professional_id: &str) -> Result<Vec<ServiceRequest>> {
        let requests = self.store.requests_for_professional(professional_id).await?;
        Ok(newest_first(requests))
    }

    pub async fn request(&self, request_id: &str) -> Result<ServiceRequest> {
        self.load(request_id).await
    }

    pub async fn stage(&self, request_id: &str) -> Result<WorkflowStage> {
        let request = self.load(request_id).await?;
        self.stage_of(&request).await
    }

    /// 付款 / 細節只在核准後才查詢；查不到（404）視為尚未建立
    pub async fn stage_of(&self, request: &ServiceRequest) -> Result<WorkflowStage> {
        if request.status != RequestStatus::Approved {
            return Ok(WorkflowStage::derive(request.status, false, false));
        }

        let has_payment = self.store.payment_for(&request.id).await?.is_some();
        let has_details = has_payment && self.store.details_for(&request.id).await?.is_some();
        Ok(WorkflowStage::derive(request.status, has_payment, has_details))
    }

    /// 依階段與檢視者列出可用動作，供介面隱藏不可用的按鈕
    pub async fn available_actions(
        &self,
        request: &ServiceRequest,
        viewer: &Identity,
    ) -> Result<Vec<WorkflowAction>> {
        let stage = self.stage_of(request).await?;
        Ok(actions_for(request, viewer, stage))
    }

    pub async fn payment_for(&self, request_id: &str, viewer: &Identity) -> Result<Option<Payment>> {
        let request = self.load(request_id).await?;
        ensure_party(&request, viewer)?;
        self.store.payment_for(request_id).await
    }

    pub async fn details_for(
        &self,
        request_id: &str,
        viewer: &Identity,
    ) -> Result<Option<ServiceDetails>> {
        let request = self.load(request_id).await?;
        ensure_party(&request, viewer)?;
        self.store.details_for(request_id).await
    }

    async fn load(&self, request_id: &str) -> Result<ServiceRequest> {
        self.store
            .request(request_id)
            .await?
            .ok_or_else(|| MarketError::not_found("service request", request_id))
    }

    fn ensure_company(&self, request: &ServiceRequest, acting_company_id: &str) -> Result<()> {
        if request.company_id != acting_company_id {
            return Err(MarketError::authorization(
                "Only the company that sent this request can perform this action",
            ));
        }
        Ok(())
    }
}

fn ensure_party(request: &ServiceRequest, viewer: &Identity) -> Result<()> {
    if !request.involves(&viewer.id) {
        return Err(MarketError::authorization(
            "Only the company and the professional of this request can see it",
        ));
    }
    Ok(())
}

fn newest_first(mut requests: Vec<ServiceRequest>) -> Vec<ServiceRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

pub fn actions_for(
    request: &ServiceRequest,
    viewer: &Identity,
    stage: WorkflowStage,
) -> Vec<WorkflowAction> {
    match stage {
        WorkflowStage::Pending if viewer.id == request.professional_id => {
            vec![WorkflowAction::Approve, WorkflowAction::Reject]
        }
        WorkflowStage::AwaitingPayment if viewer.id == request.company_id => {
            vec![WorkflowAction::SubmitPayment]
        }
        WorkflowStage::AwaitingDetails if viewer.id == request.company_id => {
            vec![WorkflowAction::SubmitDetails]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use chrono::{Duration, Utc};

    fn identity(id: &str, kind: IdentityKind) -> Identity {
        Identity {
            id: id.to_string(),
            kind,
            full_name: format!("User {}", id),
            email: format!("{}@example.com", id),
            phone: "3000000000".to_string(),
            location: "Bogotá".to_string(),
            profile: None,
        }
    }

    fn details_form() -> ServiceDetailsForm {
        ServiceDetailsForm {
            date_time: "2025-01-10T08:00".to_string(),
            location: "Calle 1".to_string(),
            access_authorization: "A1".to_string(),
            surgeon_name: "Dr. X".to_string(),
            operating_room: "3".to_string(),
            estimated_duration: "2h".to_string(),
            additional_notes: None,
        }
    }

    struct Fixture {
        engine: WorkflowEngine<InMemoryStore>,
        company: Identity,
        professional: Identity,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let company = store.add_identity(identity("comp", IdentityKind::Company));
        let professional = store.add_identity(identity("prof", IdentityKind::Professional));
        Fixture {
            engine: WorkflowEngine::new(store),
            company,
            professional,
        }
    }

    impl Fixture {
        async fn pending(&self) -> ServiceRequest {
            self.engine
                .create_request(&self.company, "prof", "Cirugía", "Apoyo en cirugía de rodilla")
                .await
                .unwrap()
        }

        async fn approved(&self) -> ServiceRequest {
            let request = self.pending().await;
            self.engine
                .decide(&request.id, "prof", Decision::Approve)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_request_starts_pending() {
        let f = fixture();
        let request = f.pending().await;

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.company_id, "comp");
        assert_eq!(f.engine.stage(&request.id).await.unwrap(), WorkflowStage::Pending);
    }

    #[tokio::test]
    async fn test_create_request_requires_message() {
        let f = fixture();
        let err = f
            .engine
            .create_request(&f.company, "prof", "Cirugía", "   ")
            .await
            .unwrap_err();

        match err {
            MarketError::Validation { field, .. } => assert_eq!(field, "message"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_only_companies_create_requests() {
        let f = fixture();
        let err = f
            .engine
            .create_request(&f.professional, "prof", "Cirugía", "hola")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Authorization { .. }));
    }

    #[tokio::test]
    async fn test_decide_only_by_target_professional() {
        let f = fixture();
        let request = f.pending().await;

        let err = f
            .engine
            .decide(&request.id, "comp", Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Authorization { .. }));

        let request = f.engine.request(&request.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_terminal_status_cannot_change() {
        let f = fixture();
        let request = f.approved().await;

        let err = f
            .engine
            .decide(&request.id, "prof", Decision::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Workflow(WorkflowError::AlreadyDecided)));
        assert_eq!(
            f.engine.request(&request.id).await.unwrap().status,
            RequestStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_payment_requires_approval() {
        let f = fixture();
        let request = f.pending().await;

        let err = f
            .engine
            .submit_payment(&request.id, "comp", 500000.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Workflow(WorkflowError::NotApproved)));
    }

    #[tokio::test]
    async fn test_payment_only_by_requesting_company() {
        let f = fixture();
        let request = f.approved().await;

        let err = f
            .engine
            .submit_payment(&request.id, "prof", 500000.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Authorization { .. }));
    }

    #[tokio::test]
    async fn test_payment_amount_must_be_positive() {
        let f = fixture();
        let request = f.approved().await;

        for amount in [0.0, -10.0] {
            let err = f
                .engine
                .submit_payment(&request.id, "comp", amount)
                .await
                .unwrap_err();
            assert!(matches!(err, MarketError::Validation { .. }));
        }
        assert_eq!(
            f.engine.stage(&request.id).await.unwrap(),
            WorkflowStage::AwaitingPayment
        );
    }

    #[tokio::test]
    async fn test_second_payment_fails_already_paid() {
        let f = fixture();
        let request = f.approved().await;

        let payment = f
            .engine
            .submit_payment(&request.id, "comp", 500000.0)
            .await
            .unwrap();
        assert_eq!(payment.payment_method, SIMULATED_PAYMENT_METHOD);

        let err = f
            .engine
            .submit_payment(&request.id, "comp", 500000.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Workflow(WorkflowError::AlreadyPaid)));
    }

    #[tokio::test]
    async fn test_details_before_payment_fails() {
        let f = fixture();
        let request = f.approved().await;

        let err = f
            .engine
            .submit_details(&request.id, "comp", details_form())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Workflow(WorkflowError::PaymentRequired)));
    }

    #[tokio::test]
    async fn test_details_required_fields() {
        let f = fixture();
        let request = f.approved().await;
        f.engine
            .submit_payment(&request.id, "comp", 1000.0)
            .await
            .unwrap();

        let form = ServiceDetailsForm {
            surgeon_name: String::new(),
            ..details_form()
        };
        let err = f
            .engine
            .submit_details(&request.id, "comp", form)
            .await
            .unwrap_err();
        match err {
            MarketError::Validation { field, .. } => assert_eq!(field, "surgeon_name"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_details_fails_already_detailed() {
        let f = fixture();
        let request = f.approved().await;
        f.engine
            .submit_payment(&request.id, "comp", 1000.0)
            .await
            .unwrap();
        f.engine
            .submit_details(&request.id, "comp", details_form())
            .await
            .unwrap();

        let err = f
            .engine
            .submit_details(&request.id, "comp", details_form())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Workflow(WorkflowError::AlreadyDetailed)));
        assert_eq!(
            f.engine.stage(&request.id).await.unwrap(),
            WorkflowStage::Coordinated
        );
    }

    #[tokio::test]
    async fn test_contact_redacted_until_approval() {
        let f = fixture();
        let request = f.pending().await;

        let before = f
            .engine
            .visible_contact_info("prof", &f.company)
            .await
            .unwrap();
        assert!(before.is_redacted());

        f.engine
            .decide(&request.id, "prof", Decision::Approve)
            .await
            .unwrap();

        let after = f
            .engine
            .visible_contact_info("prof", &f.company)
            .await
            .unwrap();
        assert_eq!(after, ContactVisibility::Visible(f.professional.contact()));
    }

    #[tokio::test]
    async fn test_contact_stays_redacted_after_rejection() {
        let f = fixture();
        let request = f.pending().await;
        f.engine
            .decide(&request.id, "prof", Decision::Reject)
            .await
            .unwrap();

        let visibility = f
            .engine
            .visible_contact_info("prof", &f.company)
            .await
            .unwrap();
        assert!(visibility.is_redacted());
    }

    #[tokio::test]
    async fn test_non_company_viewers_see_contact() {
        let f = fixture();
        let supplier = identity("sup", IdentityKind::Supplier);

        let visibility = f
            .engine
            .visible_contact_info("prof", &supplier)
            .await
            .unwrap();
        assert!(!visibility.is_redacted());
    }

    #[tokio::test]
    async fn test_available_actions_follow_stage_and_viewer() {
        let f = fixture();
        let request = f.pending().await;

        assert_eq!(
            f.engine
                .available_actions(&request, &f.professional)
                .await
                .unwrap(),
            vec![WorkflowAction::Approve, WorkflowAction::Reject]
        );
        assert!(f
            .engine
            .available_actions(&request, &f.company)
            .await
            .unwrap()
            .is_empty());

        let request = f
            .engine
            .decide(&request.id, "prof", Decision::Approve)
            .await
            .unwrap();
        assert_eq!(
            f.engine
                .available_actions(&request, &f.company)
                .await
                .unwrap(),
            vec![WorkflowAction::SubmitPayment]
        );
        assert!(f
            .engine
            .available_actions(&request, &f.professional)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_payment_and_details_hidden_from_outsiders() {
        let f = fixture();
        let request = f.approved().await;
        let outsider = identity("other", IdentityKind::Company);

        assert!(f
            .engine
            .payment_for(&request.id, &f.professional)
            .await
            .unwrap()
            .is_none());
        let err = f
            .engine
            .details_for(&request.id, &outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Authorization { .. }));
    }

    #[test]
    fn test_newest_first_ordering() {
        let now = Utc::now();
        let make = |id: &str, age_minutes: i64| ServiceRequest {
            id: id.to_string(),
            company_id: "comp".to_string(),
            professional_id: "prof".to_string(),
            service_type: "Cirugía".to_string(),
            message: "m".to_string(),
            status: RequestStatus::Pending,
            created_at: now - Duration::minutes(age_minutes),
            updated_at: None,
        };

        let ordered = newest_first(vec![make("old", 30), make("new", 1), make("mid", 10)]);
        let ids: Vec<&str> = ordered.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
