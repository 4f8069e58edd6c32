use crate::core::workflow::WorkflowEngine;
use crate::domain::model::{Identity, IdentityKind};
use crate::domain::ports::MarketplaceStore;
use crate::domain::request::RequestStatus;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ServiceRequest,
    ServiceApproved,
    ServiceRejected,
    Payment,
    ServiceDetails,
    Review,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// 由來源紀錄推導，重新載入後保持穩定
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// 由請求、付款、服務細節與評論推導出的通知，沒有獨立的儲存
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
    read: HashSet<String>,
}

impl NotificationFeed {
    pub async fn load<S: MarketplaceStore>(
        engine: &WorkflowEngine<S>,
        identity: &Identity,
    ) -> Result<Self> {
        let mut items = Vec::new();

        match identity.kind {
            IdentityKind::Professional => {
                for request in engine.requests_received_by(&identity.id).await? {
                    if request.status == RequestStatus::Pending {
                        items.push(notification(
                            format!("request:{}", request.id),
                            NotificationKind::ServiceRequest,
                            "New service request",
                            format!("A company wants to hire you for {}", request.service_type),
                            request.created_at,
                        ));
                        continue;
                    }
                    if request.status != RequestStatus::Approved {
                        continue;
                    }
                    if let Some(payment) = engine.store().payment_for(&request.id).await? {
                        items.push(notification(
                            format!("payment:{}", payment.id),
                            NotificationKind::Payment,
                            "Payment received",
                            format!(
                                "A payment of ${:.0} is held in escrow for {}",
                                payment.amount, request.service_type
                            ),
                            payment.created_at,
                        ));
                        if let Some(details) = engine.store().details_for(&request.id).await? {
                            items.push(notification(
                                format!("details:{}", details.id),
                                NotificationKind::ServiceDetails,
                                "Service details received",
                                format!(
                                    "{} at {} on {}",
                                    request.service_type,
                                    details.form.location,
                                    details.form.date_time
                                ),
                                details.created_at,
                            ));
                        }
                    }
                }

                for review in engine.store().reviews_for(&identity.id).await? {
                    items.push(notification(
                        format!("review:{}", review.id),
                        NotificationKind::Review,
                        "New review",
                        format!(
                            "{} left you a {}-star review",
                            review.reviewer_name, review.rating
                        ),
                        review.created_at,
                    ));
                }
            }
            IdentityKind::Company => {
                for request in engine.requests_sent_by(&identity.id).await? {
                    let (kind, title) = match request.status {
                        RequestStatus::Approved => {
                            (NotificationKind::ServiceApproved, "Request approved")
                        }
                        RequestStatus::Rejected => {
                            (NotificationKind::ServiceRejected, "Request rejected")
                        }
                        RequestStatus::Pending => continue,
                    };
                    let (message, at) = match request.decided_at() {
                        Some(at) => (
                            format!(
                                "Your {} request was {}",
                                request.service_type, request.status
                            ),
                            at,
                        ),
                        // 沒有決定時間：以送出時間排序，並在訊息中註明
                        None => (
                            format!(
                                "Your {} request (sent {}) was {}",
                                request.service_type,
                                request.created_at.format("%Y-%m-%d %H:%M"),
                                request.status
                            ),
                            request.created_at,
                        ),
                    };
                    items.push(notification(
                        format!("decision:{}", request.id),
                        kind,
                        title,
                        message,
                        at,
                    ));
                }
            }
            IdentityKind::Supplier => {}
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self {
            items,
            read: HashSet::new(),
        })
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(item) => {
                item.read = true;
                self.read.insert(id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.read = true;
            self.read.insert(item.id.clone());
        }
    }

    /// 重新載入後沿用先前的已讀狀態
    pub fn carry_read_state(&mut self, previous: &NotificationFeed) {
        for item in &mut self.items {
            if previous.read.contains(&item.id) {
                item.read = true;
                self.read.insert(item.id.clone());
            }
        }
    }
}

fn notification(
    id: String,
    kind: NotificationKind,
    title: &str,
    message: String,
    created_at: DateTime<Utc>,
) -> Notification {
    Notification {
        id,
        kind,
        title: title.to_string(),
        message,
        created_at,
        read: false,
    }
}
