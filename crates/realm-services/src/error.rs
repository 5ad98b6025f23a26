//! Error types for the service layer.
//!
//! Services return [`ServiceError`]: backend failures pass through
//! unchanged, malformed user input is rejected as
//! [`ServiceError::InvalidInput`] before any backend call.

use realm_backend::BackendError;
use realm_types::ListingId;

/// Errors returned by the domain services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// User input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation needs a signed-in user.
    #[error("sign in to continue")]
    NotSignedIn,

    /// The listing is gone or already sold.
    #[error("listing {0} is no longer available")]
    ListingUnavailable(ListingId),
}

impl ServiceError {
    /// Whether the backend reported that the queried row does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(error) if error.is_not_found())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Backend(BackendError::Decode(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_passes_through() {
        let error = ServiceError::from(BackendError::NotFound {
            table: "wallets".to_owned(),
        });
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "no row found in wallets");
        assert!(!ServiceError::NotSignedIn.is_not_found());
    }
}
