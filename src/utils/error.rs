use thiserror::Error;

/// 身分驗證與 session 相關錯誤，可透過重新登入修復
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Registration field '{field}' is invalid: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    #[error("No active session")]
    SessionRequired,
}

/// 服務請求狀態機違規；只能重新查詢目前狀態後再決定下一步
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Service request has already been decided")]
    AlreadyDecided,

    #[error("Service request is not approved")]
    NotApproved,

    #[error("A payment already exists for this service request")]
    AlreadyPaid,

    #[error("A payment is required before service details can be sent")]
    PaymentRequired,

    #[error("Service details were already sent for this service request")]
    AlreadyDetailed,
}

impl WorkflowError {
    /// 所有變體都屬於「目前狀態不允許此動作」這一類
    pub fn is_invalid_state_for_action(&self) -> bool {
        true
    }
}

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Not authorized: {message}")]
    Authorization { message: String },

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("Outcome of '{operation}' is unknown")]
    OutcomeUnknown { operation: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field '{field}'")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Input,
    Authorization,
    Workflow,
    Network,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MarketError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MarketError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        MarketError::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        MarketError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MarketError::Auth(_) => ErrorCategory::Authentication,
            MarketError::Validation { .. } | MarketError::NotFound { .. } => ErrorCategory::Input,
            MarketError::Authorization { .. } => ErrorCategory::Authorization,
            MarketError::Workflow(_) => ErrorCategory::Workflow,
            MarketError::Transient { .. }
            | MarketError::OutcomeUnknown { .. }
            | MarketError::Http(_) => ErrorCategory::Network,
            MarketError::ConfigError { .. }
            | MarketError::InvalidConfigValueError { .. }
            | MarketError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MarketError::IoError(_) | MarketError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Workflow => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Authentication
            | ErrorCategory::Authorization
            | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// CLI 退出碼：2 只留給可重試的錯誤，3 為系統錯誤，其餘為 1
    pub fn exit_code(&self) -> i32 {
        if self.is_retryable() {
            return 2;
        }
        match self.severity() {
            ErrorSeverity::Critical => 3,
            _ => 1,
        }
    }

    /// 只有唯讀操作遇到暫時性失敗時可以直接重試
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::Transient { .. } => true,
            MarketError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            MarketError::Auth(AuthError::ValidationFailed { field, .. }) => {
                format!("Correct the '{}' field and submit the form again", field)
            }
            MarketError::Auth(AuthError::EmailAlreadyRegistered) => {
                "Log in with the existing account instead of registering".to_string()
            }
            MarketError::Auth(_) => "Log in again to start a new session".to_string(),
            MarketError::Validation { field, .. } => {
                format!("Correct the '{}' field and try again", field)
            }
            MarketError::Authorization { .. } => {
                "Switch to the account that owns this action".to_string()
            }
            MarketError::Workflow(_) => {
                "Reload the service request and choose an action available in its current state"
                    .to_string()
            }
            MarketError::NotFound { entity, .. } => {
                format!("Check that the {} still exists", entity)
            }
            MarketError::Transient { .. } | MarketError::Http(_) => {
                "Check the network connection and retry".to_string()
            }
            MarketError::OutcomeUnknown { .. } => {
                "Reload the service request before retrying; the action may already be applied"
                    .to_string()
            }
            MarketError::ConfigError { .. }
            | MarketError::InvalidConfigValueError { .. }
            | MarketError::MissingConfigError { .. } => {
                "Check the configuration file and command-line flags".to_string()
            }
            MarketError::IoError(_) | MarketError::SerializationError(_) => {
                "Check file permissions and the local session file".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MarketError::Auth(AuthError::InvalidCredentials) => {
                "Email or password is incorrect".to_string()
            }
            MarketError::Auth(AuthError::SessionRequired) => "Please log in first".to_string(),
            MarketError::Workflow(WorkflowError::AlreadyDecided) => {
                "This request was already answered".to_string()
            }
            MarketError::Workflow(WorkflowError::NotApproved) => {
                "This request has not been approved by the professional".to_string()
            }
            MarketError::Workflow(WorkflowError::AlreadyPaid) => {
                "This request has already been paid".to_string()
            }
            MarketError::Workflow(WorkflowError::PaymentRequired) => {
                "The payment must be made before sending service details".to_string()
            }
            MarketError::Workflow(WorkflowError::AlreadyDetailed) => {
                "Service details were already sent".to_string()
            }
            MarketError::OutcomeUnknown { operation } => format!(
                "We could not confirm whether '{}' was applied",
                operation
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_taxonomy() {
        assert_eq!(
            MarketError::from(AuthError::InvalidCredentials).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            MarketError::validation("amount", "must be positive").category(),
            ErrorCategory::Input
        );
        assert_eq!(
            MarketError::authorization("not yours").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            MarketError::from(WorkflowError::AlreadyPaid).category(),
            ErrorCategory::Workflow
        );
    }

    #[test]
    fn test_only_transient_failures_are_retryable() {
        assert!(MarketError::Transient {
            message: "502".to_string()
        }
        .is_retryable());
        assert!(!MarketError::OutcomeUnknown {
            operation: "submit_payment".to_string()
        }
        .is_retryable());
        assert!(!MarketError::from(WorkflowError::AlreadyDecided).is_retryable());
        assert!(!MarketError::authorization("x").is_retryable());
    }

    #[test]
    fn test_exit_code_two_only_for_retryable() {
        let transient = MarketError::Transient {
            message: "503".to_string(),
        };
        assert_eq!(transient.exit_code(), 2);

        let unknown = MarketError::OutcomeUnknown {
            operation: "submit_payment".to_string(),
        };
        assert_eq!(unknown.severity(), ErrorSeverity::Medium);
        assert_eq!(unknown.exit_code(), 1);

        let rejected = MarketError::Auth(AuthError::InvalidCredentials);
        assert_eq!(rejected.severity(), ErrorSeverity::High);
        assert_eq!(rejected.exit_code(), 1);
        assert_eq!(MarketError::Auth(AuthError::SessionRequired).exit_code(), 1);

        assert_eq!(MarketError::from(WorkflowError::AlreadyPaid).exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(MarketError::from(io).exit_code(), 3);
    }

    #[test]
    fn test_workflow_errors_are_invalid_state_for_action() {
        for err in [
            WorkflowError::AlreadyDecided,
            WorkflowError::NotApproved,
            WorkflowError::AlreadyPaid,
            WorkflowError::PaymentRequired,
            WorkflowError::AlreadyDetailed,
        ] {
            assert!(err.is_invalid_state_for_action());
        }
    }

    #[test]
    fn test_outcome_unknown_suggests_requery() {
        let err = MarketError::OutcomeUnknown {
            operation: "submit_payment".to_string(),
        };
        assert!(err.recovery_suggestion().contains("Reload"));
        assert!(err.user_friendly_message().contains("submit_payment"));
    }
}
