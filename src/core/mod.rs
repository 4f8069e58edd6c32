pub mod dashboard;
pub mod notifications;
pub mod profiles;
pub mod reviews;
pub mod session;
pub mod workflow;

pub use crate::domain::ports::{AuthBackend, ConfigProvider, CredentialStore, MarketplaceStore};
pub use crate::utils::error::Result;
