//! Data access for document spaces.
//! Every query is scoped to one organization; visibility listings are
//! computed from permission grants and group membership.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use context::RequestContext;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::space::{Space, SpaceLifecycle, SpaceType, SpaceValidationError};
pub use repo::space_repo::{
    SpaceRepoError, SpaceRepoResult, SpaceStore, SqliteSpaceStore, EVERYONE_ID,
};
pub use service::space_service::SpaceService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
