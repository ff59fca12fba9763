//! Delivery address aggregate.

use std::sync::LazyLock;

use common::{AddressId, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone pattern compiles"));

static POSTAL_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Z]{3,10}$").expect("postal code pattern compiles"));

static FULL_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-']{2,100}$").expect("full name pattern compiles"));

const MIN_STREET_LEN: usize = 5;
const MIN_REGION_LEN: usize = 2;

/// Errors raised when an address fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid user ID")]
    InvalidUserId,

    #[error("invalid full name")]
    InvalidFullName,

    #[error("invalid street address")]
    InvalidStreetAddress,

    #[error("invalid city")]
    InvalidCity,

    #[error("invalid state")]
    InvalidState,

    #[error("invalid postal code")]
    InvalidPostalCode,

    #[error("invalid country")]
    InvalidCountry,

    #[error("invalid phone number")]
    InvalidPhone,
}

/// Editable fields of an address, as supplied by the caller.
///
/// Values are trimmed before validation; an apartment that trims to an
/// empty string is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    pub full_name: String,
    pub street_address: String,
    #[serde(default)]
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

/// A shipping address owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    id: Option<AddressId>,
    user_id: UserId,
    full_name: String,
    street_address: String,
    apartment: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    phone: String,
    is_default: bool,
}

impl DeliveryAddress {
    /// Builds and validates a new address for `user_id`.
    pub fn new(user_id: UserId, fields: AddressFields, is_default: bool) -> Result<Self, AddressError> {
        let mut address = Self {
            id: None,
            user_id,
            full_name: String::new(),
            street_address: String::new(),
            apartment: None,
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: String::new(),
            phone: String::new(),
            is_default,
        };
        address.assign(fields);
        address.validate()?;
        Ok(address)
    }

    /// Replaces every editable field.
    ///
    /// Validation runs on the new values; on failure the address keeps its
    /// previous contents.
    pub fn update(&mut self, fields: AddressFields) -> Result<(), AddressError> {
        let mut candidate = self.clone();
        candidate.assign(fields);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Checks every field rule, in a fixed order.
    pub fn validate(&self) -> Result<(), AddressError> {
        if self.user_id.is_blank() {
            return Err(AddressError::InvalidUserId);
        }
        if !FULL_NAME_PATTERN.is_match(&self.full_name) {
            return Err(AddressError::InvalidFullName);
        }
        if self.street_address.chars().count() < MIN_STREET_LEN {
            return Err(AddressError::InvalidStreetAddress);
        }
        if self.city.chars().count() < MIN_REGION_LEN {
            return Err(AddressError::InvalidCity);
        }
        if self.state.chars().count() < MIN_REGION_LEN {
            return Err(AddressError::InvalidState);
        }
        if !POSTAL_CODE_PATTERN.is_match(&self.postal_code) {
            return Err(AddressError::InvalidPostalCode);
        }
        if self.country.chars().count() < MIN_REGION_LEN {
            return Err(AddressError::InvalidCountry);
        }
        if !PHONE_PATTERN.is_match(&self.phone) {
            return Err(AddressError::InvalidPhone);
        }
        Ok(())
    }

    pub fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    /// Renders the address on one line:
    /// `street, [apartment,] city, state, postal code, country`.
    ///
    /// Notification templates depend on this exact order.
    pub fn format_full(&self) -> String {
        let mut parts: Vec<&str> = vec![self.street_address.as_str()];
        if let Some(apartment) = &self.apartment {
            parts.push(apartment);
        }
        parts.extend([
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]);
        parts.join(", ")
    }

    /// Stamps the identity assigned by the store.
    pub fn persisted_as(mut self, id: AddressId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns the current editable fields.
    pub fn fields(&self) -> AddressFields {
        AddressFields {
            full_name: self.full_name.clone(),
            street_address: self.street_address.clone(),
            apartment: self.apartment.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
        }
    }

    fn assign(&mut self, fields: AddressFields) {
        self.full_name = fields.full_name.trim().to_string();
        self.street_address = fields.street_address.trim().to_string();
        self.apartment = fields
            .apartment
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        self.city = fields.city.trim().to_string();
        self.state = fields.state.trim().to_string();
        self.postal_code = fields.postal_code.trim().to_string();
        self.country = fields.country.trim().to_string();
        self.phone = fields.phone.trim().to_string();
    }
}

// Query methods
impl DeliveryAddress {
    pub fn id(&self) -> Option<AddressId> {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn street_address(&self) -> &str {
        &self.street_address
    }

    pub fn apartment(&self) -> Option<&str> {
        self.apartment.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }
}
