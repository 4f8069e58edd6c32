use crate::core::workflow::{actions_for, WorkflowEngine};
use crate::domain::model::{
    Identity, IdentityKind, ProfessionalListing, ProfessionalProfile, Review,
};
use crate::domain::ports::MarketplaceStore;
use crate::domain::request::{RequestStatus, ServiceRequest, WorkflowAction, WorkflowStage};
use crate::utils::error::Result;
use std::fmt;

const FEATURED_PROFESSIONALS: usize = 3;
const RECENT_REVIEWS: usize = 5;

#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub request: ServiceRequest,
    pub stage: WorkflowStage,
    pub actions: Vec<WorkflowAction>,
}

#[derive(Debug, Clone)]
pub struct ProfessionalView {
    pub identity: Identity,
    pub profile: Option<ProfessionalProfile>,
    pub pending: Vec<RequestSummary>,
    pub history: Vec<RequestSummary>,
    pub recent_reviews: Vec<Review>,
}

#[derive(Debug, Clone)]
pub struct CompanyView {
    pub identity: Identity,
    pub sent: Vec<RequestSummary>,
    pub featured: Vec<ProfessionalListing>,
}

#[derive(Debug, Clone)]
pub struct SupplierView {
    pub identity: Identity,
    pub featured: Vec<ProfessionalListing>,
}

/// 依帳號類型只選一次的儀表板
#[derive(Debug, Clone)]
pub enum Dashboard {
    Professional(ProfessionalView),
    Company(CompanyView),
    Supplier(SupplierView),
}

impl Dashboard {
    pub async fn load<S: MarketplaceStore>(
        engine: &WorkflowEngine<S>,
        identity: &Identity,
    ) -> Result<Self> {
        match identity.kind {
            IdentityKind::Professional => {
                let received = engine.requests_received_by(&identity.id).await?;
                let summaries = summarize(engine, received, identity).await?;
                let (pending, history): (Vec<_>, Vec<_>) = summaries
                    .into_iter()
                    .partition(|s| s.request.status == RequestStatus::Pending);

                let mut recent_reviews = engine.store().reviews_for(&identity.id).await?;
                recent_reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                recent_reviews.truncate(RECENT_REVIEWS);

                let profile = match identity.professional_profile() {
                    Some(profile) => Some(profile.clone()),
                    None => engine
                        .store()
                        .professional(&identity.id)
                        .await?
                        .map(|listing| listing.profile),
                };

                Ok(Dashboard::Professional(ProfessionalView {
                    identity: identity.clone(),
                    profile,
                    pending,
                    history,
                    recent_reviews,
                }))
            }
            IdentityKind::Company => {
                let sent = engine.requests_sent_by(&identity.id).await?;
                Ok(Dashboard::Company(CompanyView {
                    identity: identity.clone(),
                    sent: summarize(engine, sent, identity).await?,
                    featured: featured(engine).await?,
                }))
            }
            IdentityKind::Supplier => Ok(Dashboard::Supplier(SupplierView {
                identity: identity.clone(),
                featured: featured(engine).await?,
            })),
        }
    }
}

async fn summarize<S: MarketplaceStore>(
    engine: &WorkflowEngine<S>,
    requests: Vec<ServiceRequest>,
    viewer: &Identity,
) -> Result<Vec<RequestSummary>> {
    let mut summaries = Vec::with_capacity(requests.len());
    for request in requests {
        let stage = engine.stage_of(&request).await?;
        let actions = actions_for(&request, viewer, stage);
        summaries.push(RequestSummary {
            request,
            stage,
            actions,
        });
    }
    Ok(summaries)
}

async fn featured<S: MarketplaceStore>(
    engine: &WorkflowEngine<S>,
) -> Result<Vec<ProfessionalListing>> {
    let mut listings = engine.store().list_professionals().await?;
    listings.sort_by(|a, b| {
        b.profile
            .average_rating
            .total_cmp(&a.profile.average_rating)
            .then(b.profile.total_reviews.cmp(&a.profile.total_reviews))
    });
    listings.truncate(FEATURED_PROFESSIONALS);
    Ok(listings)
}

fn write_requests(f: &mut fmt::Formatter<'_>, summaries: &[RequestSummary]) -> fmt::Result {
    if summaries.is_empty() {
        return writeln!(f, "  (none)");
    }
    for summary in summaries {
        writeln!(
            f,
            "  [{}] {} - {} ({})",
            summary.stage,
            summary.request.id,
            summary.request.service_type,
            summary.request.created_at.format("%Y-%m-%d %H:%M")
        )?;
        if !summary.actions.is_empty() {
            writeln!(f, "      next: {:?}", summary.actions)?;
        }
    }
    Ok(())
}

fn write_featured(f: &mut fmt::Formatter<'_>, listings: &[ProfessionalListing]) -> fmt::Result {
    writeln!(f, "Top rated professionals:")?;
    for listing in listings {
        writeln!(
            f,
            "  {} ({}) ★ {:.1} [{} reviews]",
            listing.user.full_name,
            listing.user.id,
            listing.profile.average_rating,
            listing.profile.total_reviews
        )?;
    }
    Ok(())
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dashboard::Professional(view) => {
                writeln!(f, "👩‍⚕️ {}", view.identity.display_name())?;
                if let Some(profile) = &view.profile {
                    writeln!(
                        f,
                        "Availability: {:?} | Rating: {:.1} ({} reviews)",
                        profile.availability_status, profile.average_rating, profile.total_reviews
                    )?;
                }
                writeln!(f, "New service requests:")?;
                write_requests(f, &view.pending)?;
                writeln!(f, "History:")?;
                write_requests(f, &view.history)?;
                writeln!(f, "Recent reviews:")?;
                for review in &view.recent_reviews {
                    writeln!(
                        f,
                        "  {}★ {} - {}",
                        review.rating, review.reviewer_name, review.comment
                    )?;
                }
                Ok(())
            }
            Dashboard::Company(view) => {
                writeln!(f, "🏥 {}", view.identity.display_name())?;
                writeln!(f, "Sent service requests:")?;
                write_requests(f, &view.sent)?;
                write_featured(f, &view.featured)
            }
            Dashboard::Supplier(view) => {
                writeln!(f, "📦 {}", view.identity.display_name())?;
                write_featured(f, &view.featured)
            }
        }
    }
}
