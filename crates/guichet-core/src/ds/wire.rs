//! Wire types for the DS GraphQL API
//!
//! Field names follow the remote schema (French, camelCase); these types are
//! the deserialization boundary and never leak into the domain model except
//! through `ds::parse` and `ds::sync`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::DossierStatus;

/// Remote dossier state, as the DS API spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    EnConstruction,
    EnInstruction,
    Accepte,
    Refuse,
    SansSuite,
}

impl RemoteState {
    /// Map the remote state onto the local lifecycle status.
    #[must_use]
    pub const fn to_status(self) -> DossierStatus {
        match self {
            Self::EnConstruction => DossierStatus::Draft,
            Self::EnInstruction => DossierStatus::OnGoing,
            Self::Accepte => DossierStatus::Accepted,
            Self::Refuse => DossierStatus::Refused,
            Self::SansSuite => DossierStatus::WithoutContinuation,
        }
    }
}

/// An instructor assigned to the procedure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteInstructor {
    pub id: String,
    pub email: String,
}

/// The DS account that filed the dossier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProfile {
    pub email: String,
}

/// Civil identity declared on the dossier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApplicant {
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub prenom: Option<String>,
    #[serde(default)]
    pub date_de_naissance: Option<String>,
}

/// One form field of the dossier. Multi-selects populate `values`, scalar
/// fields populate `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteField {
    pub label: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Correction request attached to a message. `date_resolution` is set once
/// the applicant corrected the dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCorrection {
    #[serde(default)]
    pub date_resolution: Option<DateTime<Utc>>,
}

/// One message of the dossier thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub correction: Option<RemoteCorrection>,
}

/// One remote dossier snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDossier {
    /// Technical id, used as mutation input
    pub id: String,
    /// Public application number
    pub number: i64,
    pub state: RemoteState,
    #[serde(default)]
    pub archived: bool,
    pub date_depot: DateTime<Utc>,
    pub date_derniere_modification: DateTime<Utc>,
    #[serde(default)]
    pub date_derniere_modification_champs: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_passage_en_instruction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_traitement: Option<DateTime<Utc>>,
    pub usager: RemoteProfile,
    #[serde(default)]
    pub demandeur: Option<RemoteApplicant>,
    #[serde(default)]
    pub champs: Vec<RemoteField>,
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
}

impl RemoteDossier {
    /// The timestamp of the last status change, depending on the state.
    #[must_use]
    pub fn date_last_status_update(&self) -> DateTime<Utc> {
        match self.state {
            RemoteState::EnConstruction => self.date_depot,
            RemoteState::EnInstruction => {
                self.date_passage_en_instruction.unwrap_or(self.date_depot)
            }
            RemoteState::Accepte | RemoteState::Refuse | RemoteState::SansSuite => self
                .date_traitement
                .unwrap_or(self.date_derniere_modification),
        }
    }
}

/// Relay-style pagination info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// One page of dossiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DossierPage {
    #[serde(default)]
    pub nodes: Vec<RemoteDossier>,
    pub page_info: PageInfo,
}

/// Remote-provided error message, returned inside mutation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteError {
    pub message: String,
}

/// Partial dossier returned by state-transition mutations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDossier {
    pub state: RemoteState,
    #[serde(default)]
    pub date_depot: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_passage_en_instruction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_traitement: Option<DateTime<Utc>>,
}

/// Payload of every mutation: the updated dossier, or remote errors.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationPayload {
    #[serde(default)]
    pub dossier: Option<TransitionDossier>,
    #[serde(default)]
    pub errors: Option<Vec<RemoteError>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn remote_state_deserializes_snake_case() {
        let state: RemoteState = serde_json::from_str(r#""en_construction""#).unwrap();
        assert_eq!(state, RemoteState::EnConstruction);
        let state: RemoteState = serde_json::from_str(r#""sans_suite""#).unwrap();
        assert_eq!(state, RemoteState::SansSuite);
    }

    #[test]
    fn remote_state_maps_to_local_status() {
        assert_eq!(RemoteState::EnConstruction.to_status(), DossierStatus::Draft);
        assert_eq!(RemoteState::EnInstruction.to_status(), DossierStatus::OnGoing);
        assert_eq!(RemoteState::Accepte.to_status(), DossierStatus::Accepted);
        assert_eq!(RemoteState::Refuse.to_status(), DossierStatus::Refused);
        assert_eq!(
            RemoteState::SansSuite.to_status(),
            DossierStatus::WithoutContinuation
        );
    }

    #[test]
    fn dossier_deserializes_from_ds_payload() {
        let payload = r#"{
            "id": "RG9zc2llci0xMjM0NQ==",
            "number": 12345,
            "state": "accepte",
            "archived": false,
            "dateDepot": "2024-01-10T09:00:00Z",
            "dateDerniereModification": "2024-02-01T10:00:00Z",
            "dateTraitement": "2024-02-01T10:00:00Z",
            "usager": { "email": "jeune@example.com" },
            "demandeur": { "nom": "Retrouvé", "prenom": "Jeune", "dateDeNaissance": "2006-03-14" },
            "champs": [
                { "label": "Quelle est votre demande ?", "values": ["Changement d'adresse de mail"] },
                { "label": "Nouvelle adresse de mail", "value": "Nouveau@Example.com" }
            ],
            "messages": [
                { "email": "instructeur@passculture.app", "createdAt": "2024-01-20T12:00:00Z" }
            ]
        }"#;

        let dossier: RemoteDossier = serde_json::from_str(payload).unwrap();
        assert_eq!(dossier.number, 12345);
        assert_eq!(dossier.state, RemoteState::Accepte);
        assert_eq!(dossier.champs.len(), 2);
        assert_eq!(
            dossier.date_last_status_update(),
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn status_update_timestamp_follows_state() {
        let payload = r#"{
            "id": "RG9zc2llci0x",
            "number": 1,
            "state": "en_instruction",
            "dateDepot": "2024-01-10T09:00:00Z",
            "dateDerniereModification": "2024-01-15T10:00:00Z",
            "datePassageEnInstruction": "2024-01-12T08:30:00Z",
            "usager": { "email": "jeune@example.com" }
        }"#;

        let dossier: RemoteDossier = serde_json::from_str(payload).unwrap();
        assert_eq!(
            dossier.date_last_status_update(),
            Utc.with_ymd_and_hms(2024, 1, 12, 8, 30, 0).unwrap()
        );
    }
}
