//! Account-update request model
//!
//! One local record per remote dossier, reconciled on every sync pass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UserId;

/// Lifecycle status of a dossier, mirrored from the remote side.
///
/// The remote state is authoritative: local transitions only happen after a
/// successful remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierStatus {
    Draft,
    OnGoing,
    Accepted,
    Refused,
    WithoutContinuation,
}

impl DossierStatus {
    /// Statuses the remote side considers processed. Only these can be
    /// archived directly; draft/on_going dossiers must first be classified
    /// without continuation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Refused | Self::WithoutContinuation
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::OnGoing => "on_going",
            Self::Accepted => "accepted",
            Self::Refused => "refused",
            Self::WithoutContinuation => "without_continuation",
        }
    }
}

impl fmt::Display for DossierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DossierStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "on_going" => Ok(Self::OnGoing),
            "accepted" => Ok(Self::Accepted),
            "refused" => Ok(Self::Refused),
            "without_continuation" => Ok(Self::WithoutContinuation),
            other => Err(format!("unknown dossier status: {other}")),
        }
    }
}

/// What the applicant asked to change, derived from the multi-select form
/// field of the dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Email,
    PhoneNumber,
    FirstName,
    LastName,
    AccountHasSameInfo,
}

/// Diagnostic flags set during reconciliation.
///
/// Flags never abort the sync; they record why a request cannot be processed
/// as-is so instructors can follow up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    /// A field required by the detected update types is absent
    MissingValue,
    /// A present value failed format validation (phone number)
    InvalidValue,
    /// The proposed new email already belongs to another local account
    DuplicateNewEmail,
    /// The latest message carries an unresolved correction request
    WaitingForCorrection,
    /// The latest correction was resolved since the previous sync
    CorrectionResolved,
}

/// One remote dossier snapshot reconciled locally.
///
/// Keyed by the remote application number; at most one record per number.
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateRequest {
    /// Remote application number (public id, primary key)
    pub application_number: i64,
    /// Remote technical id, used as mutation input
    pub technical_id: String,
    pub status: DossierStatus,
    pub date_created: i64,
    pub date_last_status_update: i64,
    pub date_last_user_message: Option<i64>,
    pub date_last_instructor_message: Option<i64>,
    /// Last modification of the dossier's form fields
    pub date_last_fields_modification: Option<i64>,
    /// When this record was last reconciled from the remote side
    pub date_last_synced: i64,
    /// Requester identity as declared on the dossier
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Applicant's current email (the DS account email)
    pub email: Option<String>,
    pub birth_date: Option<String>,
    pub update_types: Vec<UpdateType>,
    pub new_email: Option<String>,
    pub new_phone_number: Option<String>,
    pub new_first_name: Option<String>,
    pub new_last_name: Option<String>,
    /// Previous email, stated on email-change requests
    pub old_email: Option<String>,
    pub has_consented: bool,
    pub flags: Vec<Flag>,
    /// Instructor who last acted on the dossier
    pub last_instructor_id: Option<UserId>,
    /// Matched local account, when identity matching found exactly one
    pub user_id: Option<UserId>,
}

impl AccountUpdateRequest {
    /// Whether the request declares the given update type.
    #[must_use]
    pub fn has_update_type(&self, update_type: UpdateType) -> bool {
        self.update_types.contains(&update_type)
    }

    /// Whether the request carries the given diagnostic flag.
    #[must_use]
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            DossierStatus::Draft,
            DossierStatus::OnGoing,
            DossierStatus::Accepted,
            DossierStatus::Refused,
            DossierStatus::WithoutContinuation,
        ] {
            let parsed: DossierStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!("archived".parse::<DossierStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!DossierStatus::Draft.is_terminal());
        assert!(!DossierStatus::OnGoing.is_terminal());
        assert!(DossierStatus::Accepted.is_terminal());
        assert!(DossierStatus::Refused.is_terminal());
        assert!(DossierStatus::WithoutContinuation.is_terminal());
    }

    #[test]
    fn update_types_serialize_screaming_snake() {
        let json = serde_json::to_string(&vec![UpdateType::Email, UpdateType::PhoneNumber]).unwrap();
        assert_eq!(json, r#"["EMAIL","PHONE_NUMBER"]"#);
    }

    #[test]
    fn flags_serialize_screaming_snake() {
        let json = serde_json::to_string(&vec![Flag::DuplicateNewEmail]).unwrap();
        assert_eq!(json, r#"["DUPLICATE_NEW_EMAIL"]"#);
    }
}
