pub use chrono;

pub mod config;
pub mod domain;
pub mod errors;
pub mod phone;
pub mod session;
pub mod sync;

pub use config::{AppConfig, ConfigError, ConfigOverrides, CrmConfig, LoadOptions, LogFormat};
pub use domain::catalog::{Catalog, Course, Speaker};
pub use domain::lead::{ChatId, DealRef, LeadSession, SessionPatch};
pub use domain::profile::{ChatProfile, ProfileUpdate};
pub use errors::{CrmError, SyncError};
pub use phone::PhoneError;
pub use session::SessionStore;
pub use sync::{
    course_title, ChatNotifier, CrmGateway, LazyGateway, SyncCoordinator, SyncFlags, SyncOutcome,
    SyncState,
};
