use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::Result;
use crate::utils::validation::require_non_blank;

pub const SIMULATED_PAYMENT_METHOD: &str = "simulated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// 只允許 pending → approved / rejected
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(format!("unknown decision '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: String,
    pub company_id: String,
    pub professional_id: String,
    pub service_type: String,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// 最後一次狀態變更的時間
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn involves(&self, identity_id: &str) -> bool {
        self.company_id == identity_id || self.professional_id == identity_id
    }

    /// 已決定的請求回傳決定時間；後端沒有記錄時為 `None`
    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.filter(|_| self.status.is_terminal())
    }
}

/// `POST /service-requests` 的內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewServiceRequest {
    pub professional_id: String,
    pub service_type: String,
    pub message: String,
}

/// 模擬的託管付款，不實際轉移金錢
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub service_request_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub service_request_id: String,
    pub amount: f64,
    pub payment_method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetailsForm {
    pub date_time: String,
    pub location: String,
    pub access_authorization: String,
    pub surgeon_name: String,
    pub operating_room: String,
    pub estimated_duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl ServiceDetailsForm {
    pub fn validate(&self) -> Result<()> {
        require_non_blank("date_time", &self.date_time)?;
        require_non_blank("location", &self.location)?;
        require_non_blank("surgeon_name", &self.surgeon_name)?;
        require_non_blank("operating_room", &self.operating_room)?;
        require_non_blank("access_authorization", &self.access_authorization)?;
        require_non_blank("estimated_duration", &self.estimated_duration)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub id: String,
    pub service_request_id: String,
    #[serde(flatten)]
    pub form: ServiceDetailsForm,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewServiceDetails {
    pub service_request_id: String,
    #[serde(flatten)]
    pub form: ServiceDetailsForm,
}

/// 請求狀態加上付款 / 細節是否存在所推導出的流程階段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowStage {
    Pending,
    Rejected,
    AwaitingPayment,
    AwaitingDetails,
    Coordinated,
}

impl WorkflowStage {
    pub fn derive(status: RequestStatus, has_payment: bool, has_details: bool) -> Self {
        match status {
            RequestStatus::Pending => WorkflowStage::Pending,
            RequestStatus::Rejected => WorkflowStage::Rejected,
            RequestStatus::Approved => match (has_payment, has_details) {
                (false, _) => WorkflowStage::AwaitingPayment,
                (true, false) => WorkflowStage::AwaitingDetails,
                (true, true) => WorkflowStage::Coordinated,
            },
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStage::Pending => "PENDING",
            WorkflowStage::Rejected => "REJECTED",
            WorkflowStage::AwaitingPayment => "AWAITING_PAYMENT",
            WorkflowStage::AwaitingDetails => "AWAITING_DETAILS",
            WorkflowStage::Coordinated => "COORDINATED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    Approve,
    Reject,
    SubmitPayment,
    SubmitDetails,
}
