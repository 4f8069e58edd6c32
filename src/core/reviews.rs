use crate::domain::model::{
    Identity, IdentityKind, NewReview, RatingSummary, Review, ReviewSubmission,
};
use crate::domain::ports::MarketplaceStore;
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::require_non_blank;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// 由評論集合推導評分：平均值四捨五入到小數一位，加上評論數。
/// 評論集合每次變動後只呼叫一次。
pub fn recompute_rating(reviews: &[Review]) -> RatingSummary {
    if reviews.is_empty() {
        return RatingSummary::default();
    }

    let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let average = f64::from(total) / reviews.len() as f64;
    RatingSummary {
        average: (average * 10.0).round() / 10.0,
        count: reviews.len() as u32,
    }
}

pub struct ReviewService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn submit_review(&self, reviewer: &Identity, review: NewReview) -> Result<Review> {
        if !(MIN_RATING..=MAX_RATING).contains(&review.rating) {
            return Err(MarketError::validation(
                "rating",
                format!(
                    "Rating must be between {} and {} (got {})",
                    MIN_RATING, MAX_RATING, review.rating
                ),
            ));
        }
        require_non_blank("comment", &review.comment)?;
        if review.reviewed_user_id == reviewer.id {
            return Err(MarketError::validation(
                "reviewed_user_id",
                "You cannot review yourself",
            ));
        }

        let target = self
            .store
            .professional(&review.reviewed_user_id)
            .await?
            .ok_or_else(|| MarketError::not_found("professional", &review.reviewed_user_id))?;
        if !target.user.is(IdentityKind::Professional) {
            return Err(MarketError::validation(
                "reviewed_user_id",
                "Only professionals can be reviewed",
            ));
        }

        let created = self
            .store
            .insert_review(ReviewSubmission {
                reviewed_user_id: review.reviewed_user_id,
                reviewer_user_id: reviewer.id.clone(),
                reviewer_name: reviewer.display_name().to_string(),
                reviewer_kind: reviewer.kind,
                rating: review.rating,
                comment: review.comment.trim().to_string(),
                collaboration_type: review.collaboration_type,
            })
            .await?;

        tracing::info!(
            "⭐ {} reviewed professional {} with {} stars",
            reviewer.display_name(),
            created.reviewed_user_id,
            created.rating
        );
        Ok(created)
    }

    /// 最新的評論排在前面
    pub async fn reviews_for(&self, professional_id: &str) -> Result<Vec<Review>> {
        let mut reviews = self.store.reviews_for(professional_id).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    /// 讀取檔案上已存的評分，不重新計算
    pub async fn rating_for(&self, professional_id: &str) -> Result<RatingSummary> {
        let listing = self
            .store
            .professional(professional_id)
            .await?
            .ok_or_else(|| MarketError::not_found("professional", professional_id))?;
        Ok(RatingSummary {
            average: listing.profile.average_rating,
            count: listing.profile.total_reviews,
        })
    }
}
