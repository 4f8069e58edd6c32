use crate::domain::model::{
    AuthResponse, AvailabilityStatus, Credential, Identity, ProfessionalListing,
    ProfessionalProfile, ProfileUpdate, RegistrationForm, Review, ReviewSubmission,
};
use crate::domain::request::{
    NewPayment, NewServiceDetails, NewServiceRequest, Payment, RequestStatus, ServiceDetails,
    ServiceRequest,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 持久化 bearer credential 的地方（瀏覽器的 localStorage 對應物）
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<Option<Credential>>> + Send;
    fn save(&self, credential: &Credential)
        -> impl std::future::Future<Output = Result<()>> + Send;
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn credential_path(&self) -> &str;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse>;
    async fn register(&self, form: &RegistrationForm) -> Result<AuthResponse>;
    /// 以指定 credential 取回目前帳號，不依賴 session 狀態
    async fn current_identity(&self, credential: &Credential) -> Result<Identity>;
}

/// 服務請求、付款、服務細節與評論的資料邊界。
///
/// 實作必須在寫入時自行保證不變式，呼叫端的事前檢查只是鏡像：
/// - `transition_status` 是 compare-and-swap，狀態不符回傳 `WorkflowError::AlreadyDecided`
/// - `insert_payment` 要求請求已核准（`NotApproved`），每個請求最多一筆（`AlreadyPaid`）
/// - `insert_details` 要求已有付款（`PaymentRequired`），每個請求最多一筆（`AlreadyDetailed`）
/// - `insert_review` 之後重新計算被評論者的評分
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn list_professionals(&self) -> Result<Vec<ProfessionalListing>>;
    async fn professional(&self, user_id: &str) -> Result<Option<ProfessionalListing>>;
    async fn update_professional(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfessionalProfile>;
    async fn set_availability(
        &self,
        profile_id: &str,
        status: AvailabilityStatus,
    ) -> Result<ProfessionalProfile>;

    /// 由資料層指派 id、建立時間與初始狀態 `pending`
    async fn insert_request(
        &self,
        company_id: &str,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest>;
    async fn request(&self, id: &str) -> Result<Option<ServiceRequest>>;
    async fn requests_by_company(&self, company_id: &str) -> Result<Vec<ServiceRequest>>;
    async fn requests_for_professional(&self, professional_id: &str)
        -> Result<Vec<ServiceRequest>>;
    async fn transition_status(
        &self,
        id: &str,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest>;

    async fn payment_for(&self, request_id: &str) -> Result<Option<Payment>>;
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment>;
    async fn details_for(&self, request_id: &str) -> Result<Option<ServiceDetails>>;
    async fn insert_details(&self, details: NewServiceDetails) -> Result<ServiceDetails>;

    async fn reviews_for(&self, user_id: &str) -> Result<Vec<Review>>;
    async fn insert_review(&self, review: ReviewSubmission) -> Result<Review>;
}
