//! Auth hand-off types shared by both backends.

use realm_types::{AuthEvent, Session, User};
use serde::Deserialize;

/// Capacity of the auth change channel. Slow receivers lag, they never
/// block sign-in.
pub const AUTH_CHANNEL_CAPACITY: usize = 16;

/// One auth state change, broadcast to every receiver of
/// `Backend::auth_changes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    /// What happened.
    pub event: AuthEvent,
    /// The session after the change; `None` once signed out.
    pub session: Option<Session>,
}

/// Result of a sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    /// The authenticated or newly registered user.
    pub user: User,
    /// The new session. Sign-up leaves it empty when the account still
    /// needs confirmation.
    #[serde(default)]
    pub session: Option<Session>,
}
