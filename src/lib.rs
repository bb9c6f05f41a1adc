//! # pawcare-session
//!
//! Client-side authentication session lifecycle and route guarding shared by
//! the PawCare consumer app and admin dashboard.
//!
//! ARCHITECTURE
//! ============
//! Leaves first:
//! - `storage`: persists `{token, user}` under one well-known key.
//! - `api`: wraps the backend `/auth/*` REST contract and maps failures into
//!   the `error` taxonomy.
//! - `context`: owns the session, enforces single-flight and generation
//!   rules, and broadcasts snapshots to subscribers.
//! - `guard`: decides render / loading / redirect for a route.
//!
//! `validate` runs client-side form checks before any network call and
//! `config` resolves runtime settings from the environment.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod storage;
pub mod types;
pub mod validate;

pub use api::{AuthApi, HttpAuthApi};
pub use config::SessionConfig;
pub use context::{AuthContext, SubscriptionId};
pub use error::{AuthError, StorageError};
pub use guard::{GuardDecision, RouteRequirement};
pub use storage::SessionStorage;
pub use types::{Credentials, RegistrationFields, Session, SessionStatus, UserRecord};
