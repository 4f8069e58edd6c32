use crate::core::session::SessionHandle;
use crate::domain::model::{
    AuthResponse, AvailabilityStatus, Credential, Identity, IdentityEnvelope, ProfessionalListing,
    ProfessionalProfile, ProfileUpdate, RegistrationForm, Review, ReviewSubmission, merge_profile,
};
use crate::domain::ports::{AuthBackend, ConfigProvider, MarketplaceStore};
use crate::domain::request::{
    NewPayment, NewServiceDetails, NewServiceRequest, Payment, RequestStatus, ServiceDetails,
    ServiceRequest,
};
use crate::utils::error::{AuthError, MarketError, Result, WorkflowError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

/// 呼叫的性質決定逾時如何回報：讀取可重試，寫入的結果未知
#[derive(Debug, Clone, Copy)]
enum Call {
    Read,
    Mutation(&'static str),
}

/// 寫入被拒絕時，依 HTTP 狀態對應到的流程錯誤
#[derive(Debug, Clone, Copy, Default)]
struct Rejections {
    conflict: Option<WorkflowError>,
    precondition: Option<WorkflowError>,
}

/// 以 REST API 為後端的實作。每次送出請求時從 `SessionHandle` 讀取 Authorization header。
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    session: SessionHandle,
}

impl RestBackend {
    pub fn new<C: ConfigProvider>(config: &C, session: SessionHandle) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.authorization_header().await {
            Some(header) => builder.header(reqwest::header::AUTHORIZATION, header),
            None => builder,
        }
    }

    async fn send(&self, call: Call, builder: RequestBuilder) -> Result<Response> {
        let builder = self.authorized(builder).await;
        builder.send().await.map_err(|e| transport_error(call, e))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("📡 GET {}", path);
        let response = self.send(Call::Read, self.client.get(self.url(path))).await?;
        let response = check(response, Rejections::default()).await?;
        Ok(response.json().await?)
    }

    /// 404 代表紀錄尚未建立，回傳 None 而不是錯誤
    async fn probe_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        tracing::debug!("📡 GET {} (probe)", path);
        let response = self.send(Call::Read, self.client.get(self.url(path))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response, Rejections::default()).await?;
        Ok(Some(response.json().await?))
    }

    async fn mutate<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        rejections: Rejections,
    ) -> Result<T> {
        tracing::debug!("📡 {}", operation);
        let response = self.send(Call::Mutation(operation), builder).await?;
        let response = check(response, rejections).await?;
        response.json().await.map_err(|e| {
            // 伺服器已接受寫入，只是回應無法解析
            tracing::warn!("{} succeeded but the response was unreadable: {}", operation, e);
            MarketError::OutcomeUnknown {
                operation: operation.to_string(),
            }
        })
    }
}

fn transport_error(call: Call, err: reqwest::Error) -> MarketError {
    match call {
        Call::Mutation(operation) if !err.is_connect() => {
            tracing::warn!("{} failed in flight: {}", operation, err);
            MarketError::OutcomeUnknown {
                operation: operation.to_string(),
            }
        }
        _ => MarketError::Transient {
            message: err.to_string(),
        },
    }
}

/// FastAPI 風格的 `{"detail": "..."}`，否則使用原始內容
async fn error_detail(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            }
        })
}

async fn check(response: Response, rejections: Rejections) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = error_detail(response).await;
    tracing::debug!("Backend answered {}: {}", status, detail);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketError::authorization(detail),
        StatusCode::NOT_FOUND => MarketError::not_found("resource", detail),
        StatusCode::CONFLICT => match rejections.conflict {
            Some(err) => err.into(),
            None => MarketError::validation("request", detail),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            match rejections.precondition {
                Some(err) => err.into(),
                None => MarketError::validation("request", detail),
            }
        }
        s if s.is_server_error() => MarketError::Transient {
            message: format!("{}: {}", s, detail),
        },
        _ => MarketError::validation("request", detail),
    })
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        tracing::debug!("📡 POST /auth/login");
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| transport_error(Call::Read, e))?;

        match response.status() {
            s if s.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidCredentials.into())
            }
            _ => Err(check(response, Rejections::default())
                .await
                .err()
                .unwrap_or(AuthError::InvalidCredentials.into())),
        }
    }

    async fn register(&self, form: &RegistrationForm) -> Result<AuthResponse> {
        tracing::debug!("📡 POST /auth/register");
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(form)
            .send()
            .await
            .map_err(|e| transport_error(Call::Mutation("register"), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let detail = error_detail(response).await;
            if detail.to_lowercase().contains("already registered") {
                return Err(AuthError::EmailAlreadyRegistered.into());
            }
            return Err(AuthError::ValidationFailed {
                field: "form".to_string(),
                reason: detail,
            }
            .into());
        }
        Err(check(response, Rejections::default())
            .await
            .err()
            .unwrap_or_else(|| MarketError::validation("form", status.to_string())))
    }

    async fn current_identity(&self, credential: &Credential) -> Result<Identity> {
        tracing::debug!("📡 GET /users/me");
        let response = self
            .client
            .get(self.url("/users/me"))
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
            .send()
            .await
            .map_err(|e| transport_error(Call::Read, e))?;
        let response = check(response, Rejections::default()).await?;
        let envelope: IdentityEnvelope = response.json().await?;
        Ok(merge_profile(envelope.user, envelope.profile)?)
    }
}

#[async_trait]
impl MarketplaceStore for RestBackend {
    async fn list_professionals(&self) -> Result<Vec<ProfessionalListing>> {
        self.get_json("/professionals").await
    }

    async fn professional(&self, user_id: &str) -> Result<Option<ProfessionalListing>> {
        self.probe_json(&format!("/professionals/{}", user_id)).await
    }

    /// 伺服器以 bearer 身分決定要更新哪一份檔案
    async fn update_professional(
        &self,
        _user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfessionalProfile> {
        let builder = self.client.put(self.url("/professionals/me")).json(update);
        self.mutate("update_profile", builder, Rejections::default())
            .await
    }

    async fn set_availability(
        &self,
        profile_id: &str,
        status: AvailabilityStatus,
    ) -> Result<ProfessionalProfile> {
        let builder = self
            .client
            .patch(self.url(&format!("/professionals/{}/availability", profile_id)))
            .json(&json!({ "status": status }));
        self.mutate("set_availability", builder, Rejections::default())
            .await
    }

    async fn insert_request(
        &self,
        _company_id: &str,
        request: NewServiceRequest,
    ) -> Result<ServiceRequest> {
        let builder = self
            .client
            .post(self.url("/service-requests"))
            .json(&request);
        self.mutate("create_request", builder, Rejections::default())
            .await
    }

    async fn request(&self, id: &str) -> Result<Option<ServiceRequest>> {
        self.probe_json(&format!("/service-requests/{}", id)).await
    }

    async fn requests_by_company(&self, company_id: &str) -> Result<Vec<ServiceRequest>> {
        let requests: Vec<ServiceRequest> = self.get_json("/service-requests/sent").await?;
        Ok(requests
            .into_iter()
            .filter(|r| r.company_id == company_id)
            .collect())
    }

    async fn requests_for_professional(
        &self,
        professional_id: &str,
    ) -> Result<Vec<ServiceRequest>> {
        let requests: Vec<ServiceRequest> = self.get_json("/service-requests/received").await?;
        Ok(requests
            .into_iter()
            .filter(|r| r.professional_id == professional_id)
            .collect())
    }

    /// 伺服器只接受 pending 的請求變更狀態，其餘回 409/400
    async fn transition_status(
        &self,
        id: &str,
        _expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<ServiceRequest> {
        let builder = self
            .client
            .patch(self.url(&format!("/service-requests/{}", id)))
            .json(&json!({ "status": next }));
        self.mutate(
            "decide",
            builder,
            Rejections {
                conflict: Some(WorkflowError::AlreadyDecided),
                precondition: Some(WorkflowError::AlreadyDecided),
            },
        )
        .await
    }

    async fn payment_for(&self, request_id: &str) -> Result<Option<Payment>> {
        self.probe_json(&format!("/payments/by-request/{}", request_id))
            .await
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let builder = self.client.post(self.url("/payments")).json(&payment);
        self.mutate(
            "submit_payment",
            builder,
            Rejections {
                conflict: Some(WorkflowError::AlreadyPaid),
                precondition: Some(WorkflowError::NotApproved),
            },
        )
        .await
    }

    async fn details_for(&self, request_id: &str) -> Result<Option<ServiceDetails>> {
        self.probe_json(&format!("/service-details/by-request/{}", request_id))
            .await
    }

    async fn insert_details(&self, details: NewServiceDetails) -> Result<ServiceDetails> {
        let builder = self
            .client
            .post(self.url("/service-details"))
            .json(&details);
        self.mutate(
            "submit_details",
            builder,
            Rejections {
                conflict: Some(WorkflowError::AlreadyDetailed),
                precondition: Some(WorkflowError::PaymentRequired),
            },
        )
        .await
    }

    async fn reviews_for(&self, user_id: &str) -> Result<Vec<Review>> {
        self.get_json(&format!("/reviews/professional/{}", user_id))
            .await
    }

    async fn insert_review(&self, review: ReviewSubmission) -> Result<Review> {
        let builder = self.client.post(self.url("/reviews")).json(&review);
        self.mutate("submit_review", builder, Rejections::default())
            .await
    }
}
