//! Local user account model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::normalize_email;

/// A unique identifier for a user, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new unique user ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A local account: beneficiary or back-office admin.
///
/// Admins acting as DS instructors carry the remote instructor id assigned
/// by the instructor-id sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Email, stored lowercased
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Phone number in international format, when known
    pub phone_number: Option<String>,
    /// Birth date as `YYYY-MM-DD`, when known
    pub birth_date: Option<String>,
    pub is_beneficiary: bool,
    pub is_admin: bool,
    /// Remote DS instructor id, set for admins matched by instructor sync
    pub ds_instructor_id: Option<String>,
}

impl User {
    /// Create a new beneficiary account
    #[must_use]
    pub fn new_beneficiary(
        email: impl AsRef<str>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: normalize_email(email.as_ref()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: None,
            birth_date: None,
            is_beneficiary: true,
            is_admin: false,
            ds_instructor_id: None,
        }
    }

    /// Create a new admin (back-office) account
    #[must_use]
    pub fn new_admin(
        email: impl AsRef<str>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: normalize_email(email.as_ref()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: None,
            birth_date: None,
            is_beneficiary: false,
            is_admin: true,
            ds_instructor_id: None,
        }
    }

    /// Full name for display and email substitution params
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
