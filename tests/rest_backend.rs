use anyhow::Result;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use medmarket::domain::model::{
    ContactInfo, ContactVisibility, RatingSummary, RegistrationDetails, RegistrationForm,
};
use medmarket::domain::ports::MarketplaceStore;
use medmarket::domain::request::{Decision, WorkflowStage};
use medmarket::utils::error::{AuthError, WorkflowError};
use medmarket::{
    ClientConfig, MarketError, MemoryCredentialStore, RestBackend, ReviewService, SessionHandle,
    SessionManager, WorkflowEngine,
};
use serde_json::json;
use std::time::Duration;

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default().with_base_url(Some(server.base_url()))
}

fn company_json() -> serde_json::Value {
    json!({
        "id": "hosp-1",
        "user_type": "company",
        "full_name": "Laura Gómez",
        "email": "compras@hospital.co",
        "phone": "6011234567",
        "location": "Bogotá"
    })
}

fn approved_request_json() -> serde_json::Value {
    json!({
        "id": "req-7",
        "company_id": "hosp-1",
        "professional_id": "nurse-1",
        "service_type": "Instrumentación",
        "message": "Cirugía de cadera",
        "status": "approved",
        "created_at": "2025-01-20T10:00:00Z"
    })
}

async fn signed_in(server: &MockServer) -> Result<(RestBackend, SessionHandle)> {
    signed_in_with(server, config_for(server)).await
}

/// 後端在指定秒數內沒有回應就放棄
fn impatient_config(server: &MockServer) -> ClientConfig {
    let mut config = config_for(server);
    config.backend.timeout_seconds = 1;
    config
}

/// 後端 `{**user, **profile}` 合併後的扁平紀錄
fn flat_professional_json() -> serde_json::Value {
    json!({
        "id": "p-1",
        "user_id": "nurse-1",
        "user_type": "professional",
        "full_name": "María Torres",
        "email": "maria@example.com",
        "phone": "3015550000",
        "location": "Cali",
        "specialties": ["Instrumentación"],
        "experience_years": 8,
        "availability_status": "available",
        "average_rating": 4.7,
        "total_reviews": 12
    })
}

async fn signed_in_with(
    server: &MockServer,
    config: ClientConfig,
) -> Result<(RestBackend, SessionHandle)> {
    server.mock(|when, then| {
        when.method(POST).path("/auth/login");
        then.status(200).json_body(json!({
            "access_token": "tok-123",
            "token_type": "bearer",
            "user": company_json(),
            "profile": {
                "id": "c-1",
                "user_id": "hosp-1",
                "company_name": "Hospital Central",
                "company_type": "hospital"
            }
        }));
    });

    let handle = SessionHandle::new();
    let backend = RestBackend::new(&config, handle.clone())?;
    let sessions = SessionManager::new(
        backend.clone(),
        MemoryCredentialStore::new(),
        handle.clone(),
    );
    let identity = sessions
        .authenticate("compras@hospital.co", "secreto1")
        .await?;
    assert_eq!(identity.display_name(), "Hospital Central");
    Ok((backend, handle))
}

#[tokio::test]
async fn test_requests_carry_session_bearer() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    let professionals = server.mock(|when, then| {
        when.method(GET)
            .path("/professionals")
            .header("Authorization", "Bearer tok-123");
        then.status(200).json_body(json!([]));
    });

    let listings = backend.list_professionals().await?;
    assert!(listings.is_empty());
    professionals.assert();
    Ok(())
}

#[tokio::test]
async fn test_login_rejection_maps_to_invalid_credentials() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/login");
        then.status(401)
            .json_body(json!({ "detail": "Incorrect email or password" }));
    });

    let handle = SessionHandle::new();
    let backend = RestBackend::new(&config_for(&server), handle.clone())?;
    let sessions = SessionManager::new(backend, MemoryCredentialStore::new(), handle.clone());

    let err = sessions
        .authenticate("nadie@example.com", "incorrecta")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Auth(AuthError::InvalidCredentials)
    ));
    assert!(handle.identity().await.is_none());
    assert!(handle.authorization_header().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_email_on_register() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/auth/register")
            .json_body_partial(r#"{"user_type": "supplier"}"#);
        then.status(400)
            .json_body(json!({ "detail": "Email already registered" }));
    });

    let handle = SessionHandle::new();
    let backend = RestBackend::new(&config_for(&server), handle.clone())?;
    let sessions = SessionManager::new(backend, MemoryCredentialStore::new(), handle);

    let form = RegistrationForm {
        email: "ventas@insumos.co".to_string(),
        password: "secreto1".to_string(),
        full_name: "Pedro Díaz".to_string(),
        phone: "3109876543".to_string(),
        location: "Medellín".to_string(),
        details: RegistrationDetails::Supplier {
            company_name: "Insumos Médicos SAS".to_string(),
            products_services: vec!["Guantes".to_string()],
            description: String::new(),
            certifications: Vec::new(),
        },
    };

    let err = sessions.register(&form).await.unwrap_err();
    assert!(matches!(
        err,
        MarketError::Auth(AuthError::EmailAlreadyRegistered)
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_payment_reads_as_awaiting_payment() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/service-requests/req-7");
        then.status(200).json_body(approved_request_json());
    });
    let probe = server.mock(|when, then| {
        when.method(GET).path("/payments/by-request/req-7");
        then.status(404)
            .json_body(json!({ "detail": "Payment not found" }));
    });

    let engine = WorkflowEngine::new(backend);
    assert_eq!(
        engine.stage("req-7").await?,
        WorkflowStage::AwaitingPayment
    );
    probe.assert();
    Ok(())
}

#[tokio::test]
async fn test_duplicate_payment_conflict() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/service-requests/req-7");
        then.status(200).json_body(approved_request_json());
    });
    server.mock(|when, then| {
        when.method(GET).path("/payments/by-request/req-7");
        then.status(404);
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/payments")
            .json_body_partial(r#"{"service_request_id": "req-7", "payment_method": "simulated"}"#);
        then.status(409)
            .json_body(json!({ "detail": "Payment already exists" }));
    });

    let engine = WorkflowEngine::new(backend);
    let err = engine
        .submit_payment("req-7", "hosp-1", 800000.0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Workflow(WorkflowError::AlreadyPaid)
    ));
    create.assert();
    Ok(())
}

#[tokio::test]
async fn test_decision_on_decided_request_conflicts() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    let mut pending = approved_request_json();
    pending["status"] = json!("pending");
    server.mock(|when, then| {
        when.method(GET).path("/service-requests/req-7");
        then.status(200).json_body(pending);
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/service-requests/req-7");
        then.status(409)
            .json_body(json!({ "detail": "Request already processed" }));
    });

    let engine = WorkflowEngine::new(backend);
    let err = engine
        .decide("req-7", "nurse-1", Decision::Reject)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::Workflow(WorkflowError::AlreadyDecided)
    ));
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_transient() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/reviews/professional/nurse-1");
        then.status(503);
    });

    let err = backend.reviews_for("nurse-1").await.unwrap_err();
    assert!(matches!(err, MarketError::Transient { .. }));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_forbidden_maps_to_authorization() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/service-requests/received");
        then.status(403)
            .json_body(json!({ "detail": "Only professionals can view received requests" }));
    });

    let err = backend
        .requests_for_professional("hosp-1")
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Authorization { .. }));
    Ok(())
}

#[tokio::test]
async fn test_flat_professional_record_decodes() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/professionals/nurse-1");
        then.status(200).json_body(flat_professional_json());
    });

    let listing = backend
        .professional("nurse-1")
        .await?
        .expect("professional found");
    assert_eq!(listing.user.id, "nurse-1");
    assert_eq!(listing.user.full_name, "María Torres");
    assert_eq!(listing.user.location, "Cali");
    assert_eq!(listing.profile.id, "p-1");
    assert_eq!(listing.profile.experience_years, 8);
    Ok(())
}

#[tokio::test]
async fn test_flat_professional_list_decodes() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    let mut second = flat_professional_json();
    second["id"] = json!("p-2");
    second["user_id"] = json!("nurse-2");
    second["email"] = json!("jorge@example.com");
    server.mock(|when, then| {
        when.method(GET).path("/professionals");
        then.status(200)
            .json_body(json!([flat_professional_json(), second]));
    });

    let listings = backend.list_professionals().await?;
    let ids: Vec<&str> = listings.iter().map(|l| l.user.id.as_str()).collect();
    assert_eq!(ids, vec!["nurse-1", "nurse-2"]);
    assert_eq!(listings[1].profile.id, "p-2");
    Ok(())
}

#[tokio::test]
async fn test_contact_info_with_flat_professional() -> Result<()> {
    let server = MockServer::start();
    let (backend, handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/professionals/nurse-1");
        then.status(200).json_body(flat_professional_json());
    });
    server.mock(|when, then| {
        when.method(GET).path("/service-requests/sent");
        then.status(200).json_body(json!([approved_request_json()]));
    });

    let company = handle.identity().await.expect("signed in");
    let engine = WorkflowEngine::new(backend);
    let contact = engine.visible_contact_info("nurse-1", &company).await?;
    assert_eq!(
        contact,
        ContactVisibility::Visible(ContactInfo {
            email: "maria@example.com".to_string(),
            phone: "3015550000".to_string(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_rating_read_from_stored_profile() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in(&server).await?;

    server.mock(|when, then| {
        when.method(GET).path("/professionals/nurse-1");
        then.status(200).json_body(flat_professional_json());
    });
    let reviews = server.mock(|when, then| {
        when.method(GET).path("/reviews/professional/nurse-1");
        then.status(200).json_body(json!([]));
    });

    let summary = ReviewService::new(backend).rating_for("nurse-1").await?;
    assert_eq!(
        summary,
        RatingSummary {
            average: 4.7,
            count: 12
        }
    );
    reviews.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_payment_timeout_reports_unknown_outcome() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in_with(&server, impatient_config(&server)).await?;

    server.mock(|when, then| {
        when.method(GET).path("/service-requests/req-7");
        then.status(200).json_body(approved_request_json());
    });
    server.mock(|when, then| {
        when.method(GET).path("/payments/by-request/req-7");
        then.status(404);
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/payments");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({
                "id": "pay-1",
                "service_request_id": "req-7",
                "amount": 10.0,
                "payment_method": "simulated",
                "created_at": "2025-01-20T11:00:00Z"
            }));
    });

    let engine = WorkflowEngine::new(backend);
    let err = engine
        .submit_payment("req-7", "hosp-1", 10.0)
        .await
        .unwrap_err();
    match &err {
        MarketError::OutcomeUnknown { operation } => assert_eq!(operation, "submit_payment"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!err.is_retryable());
    create.assert();
    Ok(())
}

#[tokio::test]
async fn test_read_timeout_is_transient() -> Result<()> {
    let server = MockServer::start();
    let (backend, _handle) = signed_in_with(&server, impatient_config(&server)).await?;

    server.mock(|when, then| {
        when.method(GET).path("/reviews/professional/nurse-1");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!([]));
    });

    let err = backend.reviews_for("nurse-1").await.unwrap_err();
    assert!(matches!(err, MarketError::Transient { .. }));
    assert!(err.is_retryable());
    Ok(())
}
