use crate::domain::model::{Credential, Identity, RegistrationDetails, RegistrationForm};
use crate::domain::ports::{AuthBackend, CredentialStore};
use crate::utils::error::{AuthError, MarketError, Result};
use crate::utils::validation::{require_email, require_non_blank, require_positive};
use std::sync::Arc;
use tokio::sync::RwLock;

const MIN_PASSWORD_LEN: usize = 6;

/// 一次 session 的帳號與 credential，兩者總是一起替換
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub identity: Identity,
    pub credential: Credential,
}

/// 共享的 session 狀態。REST adapter 從這裡讀取 Authorization header，
/// 帳號與 header 在同一把寫鎖下變更，不會出現不一致的時間窗。
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<ActiveSession>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.read().await.as_ref().map(|s| s.identity.clone())
    }

    pub async fn require_identity(&self) -> Result<Identity> {
        self.identity()
            .await
            .ok_or(MarketError::Auth(AuthError::SessionRequired))
    }

    pub async fn authorization_header(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|s| s.credential.bearer_header())
    }

    async fn install(&self, session: ActiveSession) {
        *self.inner.write().await = Some(session);
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

pub struct SessionManager<A: AuthBackend, C: CredentialStore> {
    backend: A,
    store: C,
    handle: SessionHandle,
}

impl<A: AuthBackend, C: CredentialStore> SessionManager<A, C> {
    pub fn new(backend: A, store: C, handle: SessionHandle) -> Self {
        Self {
            backend,
            store,
            handle,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.handle.identity().await
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        tracing::debug!("Authenticating {}", email.trim());
        let response = self.backend.login(email.trim(), password).await?;
        let (identity, credential) = response.into_parts()?;
        self.establish(identity, credential).await
    }

    pub async fn register(&self, form: &RegistrationForm) -> Result<Identity> {
        validate_registration(form)?;

        tracing::debug!("Registering new {} account", form.kind());
        let response = self.backend.register(form).await?;
        let (identity, credential) = response.into_parts()?;
        self.establish(identity, credential).await
    }

    /// 啟動時呼叫：以持久化的 credential 重新驗證。絕不回傳錯誤，失敗時只得到空 session。
    pub async fn restore_session(&self) -> Option<Identity> {
        let credential = match self.store.load().await {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Could not read stored credential: {}", e);
                return None;
            }
        };

        match self.backend.current_identity(&credential).await {
            Ok(identity) => {
                tracing::info!(
                    "🔑 Session restored for {} ({})",
                    identity.display_name(),
                    identity.kind
                );
                self.handle
                    .install(ActiveSession {
                        identity: identity.clone(),
                        credential,
                    })
                    .await;
                Some(identity)
            }
            Err(e @ (MarketError::Auth(_) | MarketError::Authorization { .. })) => {
                tracing::warn!("Stored credential rejected, discarding it: {}", e);
                if let Err(clear_err) = self.store.clear().await {
                    tracing::warn!("Could not discard stored credential: {}", clear_err);
                }
                None
            }
            Err(e) => {
                // 暫時性失敗：保留 credential，下次啟動再驗證
                tracing::warn!("Could not revalidate stored credential: {}", e);
                None
            }
        }
    }

    /// 無條件清除 credential 與帳號；可重複呼叫
    pub async fn end_session(&self) {
        self.handle.clear().await;
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Could not remove stored credential: {}", e);
        }
        tracing::info!("Session ended");
    }

    async fn establish(&self, identity: Identity, credential: Credential) -> Result<Identity> {
        self.store.save(&credential).await?;
        self.handle
            .install(ActiveSession {
                identity: identity.clone(),
                credential,
            })
            .await;

        tracing::info!(
            "✅ Signed in as {} ({})",
            identity.display_name(),
            identity.kind
        );
        Ok(identity)
    }
}

fn registration_error(err: MarketError) -> MarketError {
    match err {
        MarketError::Validation { field, message } => AuthError::ValidationFailed {
            field,
            reason: message,
        }
        .into(),
        other => other,
    }
}

pub fn validate_registration(form: &RegistrationForm) -> Result<()> {
    check_registration(form).map_err(registration_error)
}

fn check_registration(form: &RegistrationForm) -> Result<()> {
    require_email("email", &form.email)?;
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(MarketError::validation(
            "password",
            format!("Password must have at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    require_non_blank("full_name", &form.full_name)?;
    require_non_blank("phone", &form.phone)?;

    match &form.details {
        RegistrationDetails::Professional { hourly_rate, .. } => {
            if let Some(rate) = hourly_rate {
                require_positive("hourly_rate", *rate)?;
            }
        }
        RegistrationDetails::Company {
            company_name,
            company_type,
            ..
        } => {
            require_non_blank("company_name", company_name)?;
            require_non_blank("company_type", company_type)?;
        }
        RegistrationDetails::Supplier { company_name, .. } => {
            require_non_blank("company_name", company_name)?;
        }
    }

    Ok(())
}
