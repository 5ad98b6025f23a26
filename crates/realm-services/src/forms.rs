//! Validated input forms.
//!
//! Everything a user types (redeem codes, admin code definitions, listing
//! prices, credentials) passes through one of these before a backend call.

use chrono::{DateTime, Utc};
use realm_types::{CollectibleId, Rarity};
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::error::ServiceError;

/// Longest accepted redemption code.
pub const MAX_CODE_LEN: usize = 64;

/// Trim and uppercase a redemption code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn code_shape(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        return Err(ValidationError::new("empty").with_message("Enter a code".into()));
    }
    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::new("too_long").with_message("Code is too long".into()));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::new("charset")
            .with_message("Codes use letters, digits, dashes and underscores".into()));
    }
    Ok(())
}

/// A code typed into the redeem form.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct RedeemForm {
    /// Normalized code.
    #[validate(custom(function = "code_shape"))]
    pub code: String,
}

impl RedeemForm {
    /// Normalize and validate `raw`.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let form = Self {
            code: normalize_code(raw),
        };
        form.validate()?;
        Ok(form)
    }
}

fn metadata_object(metadata: &Value) -> Result<(), ValidationError> {
    if metadata.is_object() || metadata.is_null() {
        Ok(())
    } else {
        Err(ValidationError::new("metadata").with_message("Metadata must be a JSON object".into()))
    }
}

/// An admin's definition of a new redemption code.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct NewCodeForm {
    /// The code; normalized like redeemed codes.
    #[validate(custom(function = "code_shape"))]
    pub code: String,
    /// Rarity tier the code grants.
    #[serde(default)]
    pub rarity: Option<Rarity>,
    /// Redemption cap; `None` for unlimited.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_redemptions: Option<i64>,
    /// Expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Gold granted on redemption.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub reward_gold: i64,
    /// Gems granted on redemption.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub reward_gems: i64,
    /// Collectible granted on redemption.
    #[serde(default)]
    pub reward_collectible_id: Option<CollectibleId>,
    /// Free-form metadata object.
    #[serde(default)]
    #[validate(custom(function = "metadata_object"))]
    pub metadata: Value,
}

impl NewCodeForm {
    /// A form for `code` with no rewards.
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_owned(),
            rarity: None,
            max_redemptions: None,
            expires_at: None,
            reward_gold: 0,
            reward_gems: 0,
            reward_collectible_id: None,
            metadata: Value::Object(Map::new()),
        }
    }

    /// Decode a form from JSON typed by an admin.
    pub fn from_json(raw: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(raw).map_err(|e| ServiceError::InvalidInput(e.to_string()))
    }

    /// Normalize the code, then validate.
    pub fn normalized(mut self) -> Result<Self, ServiceError> {
        self.code = normalize_code(&self.code);
        if self.metadata.is_null() {
            self.metadata = Value::Object(Map::new());
        }
        self.validate()?;
        Ok(self)
    }
}

fn priced(form: &ListingForm) -> Result<(), ValidationError> {
    if form.price_gold > 0 || form.price_gems > 0 {
        Ok(())
    } else {
        Err(ValidationError::new("price").with_message("Set a price in gold or gems".into()))
    }
}

/// A new marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
#[validate(schema(function = "priced"))]
pub struct ListingForm {
    /// Collectible offered.
    pub collectible_id: CollectibleId,
    /// Asking price in gold.
    #[validate(range(min = 0))]
    pub price_gold: i64,
    /// Asking price in gems.
    #[validate(range(min = 0))]
    pub price_gems: i64,
    /// When the listing lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Email and password credentials.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct CredentialsForm {
    /// Sign-in email.
    #[validate(email)]
    pub email: String,
    /// Password.
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

impl CredentialsForm {
    /// Trim the email and validate.
    pub fn parse(email: &str, password: &str) -> Result<Self, ServiceError> {
        let form = Self {
            email: email.trim().to_owned(),
            password: password.to_owned(),
        };
        form.validate()?;
        Ok(form)
    }
}

/// Parse sign-up metadata typed as JSON. Blank input is an empty object.
pub fn parse_metadata(raw: &str) -> Result<Map<String, Value>, ServiceError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServiceError::InvalidInput(
            "metadata must be a JSON object".to_owned(),
        )),
        Err(e) => Err(ServiceError::InvalidInput(e.to_string())),
    }
}
