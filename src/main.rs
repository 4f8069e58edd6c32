use clap::Parser;
use medmarket::config::cli::Command;
use medmarket::domain::model::NewReview;
use medmarket::domain::ports::ConfigProvider;
use medmarket::utils::{logger, validation::Validate};
use medmarket::{
    CliArgs, ClientConfig, Dashboard, FileCredentialStore, MarketError, NotificationFeed,
    ProfileService, RestBackend, ReviewService, SessionHandle, SessionManager, WorkflowEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => ClientConfig::from_file(path),
        None => Ok(ClientConfig::default()),
    };
    let config = match config {
        Ok(config) => config.with_base_url(args.base_url.clone()),
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(config.log_level());
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting medmarket CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(args.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run(command: Command, config: &ClientConfig) -> medmarket::Result<()> {
    let handle = SessionHandle::new();
    let backend = RestBackend::new(config, handle.clone())?;
    let sessions = SessionManager::new(
        backend.clone(),
        FileCredentialStore::new(config.credential_path()),
        handle.clone(),
    );

    let restored = sessions.restore_session().await;
    if command.requires_session() && restored.is_none() {
        return Err(MarketError::Auth(
            medmarket::utils::error::AuthError::SessionRequired,
        ));
    }

    let engine = WorkflowEngine::new(backend.clone());

    match command {
        Command::Login { email, password } => {
            let identity = sessions.authenticate(&email, &password).await?;
            println!("✅ Signed in as {} ({})", identity.display_name(), identity.kind);
        }
        Command::RegisterCompany(args) => {
            let identity = sessions.register(&args.into()).await?;
            println!("✅ Company account created: {}", identity.display_name());
        }
        Command::RegisterProfessional(args) => {
            let identity = sessions.register(&args.into()).await?;
            println!("✅ Professional account created: {}", identity.display_name());
        }
        Command::RegisterSupplier(args) => {
            let identity = sessions.register(&args.into()).await?;
            println!("✅ Supplier account created: {}", identity.display_name());
        }
        Command::Whoami => {
            let identity = handle.require_identity().await?;
            println!(
                "{} <{}> [{}] id={}",
                identity.display_name(),
                identity.email,
                identity.kind,
                identity.id
            );
        }
        Command::Logout => {
            sessions.end_session().await;
            println!("👋 Signed out");
        }
        Command::Dashboard => {
            let identity = handle.require_identity().await?;
            print!("{}", Dashboard::load(&engine, &identity).await?);
        }
        Command::Professionals => {
            let profiles = ProfileService::new(backend.clone());
            for listing in profiles.list_professionals().await? {
                println!(
                    "{}  {} - {:?} ★ {:.1} ({})",
                    listing.user.id,
                    listing.user.full_name,
                    listing.profile.availability_status,
                    listing.profile.average_rating,
                    listing.profile.total_reviews
                );
            }
        }
        Command::Request {
            professional_id,
            service_type,
            message,
        } => {
            let identity = handle.require_identity().await?;
            let request = engine
                .create_request(&identity, &professional_id, &service_type, &message)
                .await?;
            println!("📨 Request {} sent ({})", request.id, request.status);
        }
        Command::Decide {
            request_id,
            decision,
        } => {
            let identity = handle.require_identity().await?;
            let request = engine.decide(&request_id, &identity.id, decision).await?;
            println!("✅ Request {} is now {}", request.id, request.status);
        }
        Command::Status { request_id } => {
            let identity = handle.require_identity().await?;
            let request = engine.request(&request_id).await?;
            let stage = engine.stage_of(&request).await?;
            let actions = engine.available_actions(&request, &identity).await?;
            println!("{} [{}] next: {:?}", request.id, stage, actions);
        }
        Command::Pay { request_id, amount } => {
            let identity = handle.require_identity().await?;
            let payment = engine
                .submit_payment(&request_id, &identity.id, amount)
                .await?;
            println!(
                "💳 Payment {} of {:.2} held in escrow ({})",
                payment.id, payment.amount, payment.payment_method
            );
        }
        Command::Details(args) => {
            let identity = handle.require_identity().await?;
            let (request_id, form) = args.split();
            let details = engine
                .submit_details(&request_id, &identity.id, form)
                .await?;
            println!("📋 Service details {} sent", details.id);
        }
        Command::Contact { professional_id } => {
            let identity = handle.require_identity().await?;
            let contact = engine
                .visible_contact_info(&professional_id, &identity)
                .await?;
            println!("{}", contact);
        }
        Command::Review {
            professional_id,
            rating,
            comment,
            collaboration_type,
        } => {
            let identity = handle.require_identity().await?;
            let reviews = ReviewService::new(backend.clone());
            let review = reviews
                .submit_review(
                    &identity,
                    NewReview {
                        reviewed_user_id: professional_id,
                        rating,
                        comment,
                        collaboration_type,
                    },
                )
                .await?;
            println!("⭐ Review {} submitted", review.id);
        }
        Command::Availability { status } => {
            let identity = handle.require_identity().await?;
            let profiles = ProfileService::new(backend.clone());
            let profile_id = profiles.professional(&identity.id).await?.profile.id;
            let profile = profiles
                .set_availability(&identity, &profile_id, status)
                .await?;
            println!("Availability: {:?}", profile.availability_status);
        }
        Command::Notifications => {
            let identity = handle.require_identity().await?;
            let feed = NotificationFeed::load(&engine, &identity).await?;
            println!("🔔 {} unread", feed.unread_count());
            for item in feed.items() {
                println!(
                    "  {} {} - {}",
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    item.title,
                    item.message
                );
            }
        }
    }

    Ok(())
}
