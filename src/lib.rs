pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::ClientConfig;

pub use adapters::{
    credentials::{FileCredentialStore, MemoryCredentialStore},
    memory::InMemoryStore,
    rest::RestBackend,
};
pub use core::{
    dashboard::Dashboard,
    notifications::NotificationFeed,
    profiles::ProfileService,
    reviews::ReviewService,
    session::{SessionHandle, SessionManager},
    workflow::WorkflowEngine,
};
pub use utils::error::{MarketError, Result};
