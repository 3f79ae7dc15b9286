//! Test fakes for the DS API boundary.

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};

use super::client::{DsApi, TransitionInput, TransitionKind, TransitionOutcome};
use super::wire::{
    DossierPage, PageInfo, RemoteApplicant, RemoteCorrection, RemoteDossier, RemoteField,
    RemoteInstructor, RemoteMessage, RemoteProfile, RemoteState,
};

/// A fixed reference instant used by fake transition outcomes.
pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// `fixed_time` minus `days`, as a `DateTime`.
pub(crate) fn days_before(days: i64) -> DateTime<Utc> {
    fixed_time() - chrono::Duration::days(days)
}

/// In-memory `DsApi` serving canned pages and logging mutations.
///
/// Pages are cursor-addressed: `None` serves page 0, `cursor-N` serves
/// page N, mirroring the remote relay pagination.
#[derive(Default)]
pub(crate) struct FakeDsApi {
    pub instructors: Vec<RemoteInstructor>,
    pub pages: Vec<DossierPage>,
    pub deleted: Vec<i64>,
    /// When set, every transition mutation is rejected with this message
    pub reject_transitions_with: Option<String>,
    /// When set, every archive mutation is rejected with this message
    pub reject_archive_with: Option<String>,
    pub transitions: Mutex<Vec<TransitionInput>>,
    pub archived: Mutex<Vec<String>>,
}

impl FakeDsApi {
    pub fn single_page(nodes: Vec<RemoteDossier>) -> Self {
        Self {
            pages: vec![page(nodes, None)],
            ..Self::default()
        }
    }

    pub fn with_pages(pages: Vec<DossierPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn transition_log(&self) -> Vec<TransitionInput> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn archived_ids(&self) -> Vec<String> {
        self.archived.lock().unwrap().clone()
    }
}

impl DsApi for FakeDsApi {
    async fn instructors(&self, _procedure: i64) -> Result<Vec<RemoteInstructor>> {
        Ok(self.instructors.clone())
    }

    async fn applications_page(
        &self,
        _procedure: i64,
        cursor: Option<&str>,
    ) -> Result<DossierPage> {
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| Error::DsApi(format!("unknown cursor {cursor}")))?,
        };

        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| Error::DsApi(format!("no page at index {index}")))
    }

    async fn deleted_application_numbers(&self, _procedure: i64) -> Result<Vec<i64>> {
        Ok(self.deleted.clone())
    }

    async fn apply_transition(&self, input: &TransitionInput) -> Result<TransitionOutcome> {
        if let Some(message) = &self.reject_transitions_with {
            return Err(Error::DsRejected(message.clone()));
        }

        self.transitions.lock().unwrap().push(input.clone());

        Ok(match input.kind {
            TransitionKind::PassToInstruction => TransitionOutcome {
                state: RemoteState::EnInstruction,
                date_depot: Some(days_before(60)),
                date_passage_en_instruction: Some(fixed_time()),
                date_traitement: None,
            },
            TransitionKind::Accept => TransitionOutcome {
                state: RemoteState::Accepte,
                date_depot: Some(days_before(60)),
                date_passage_en_instruction: Some(fixed_time()),
                date_traitement: Some(fixed_time()),
            },
            TransitionKind::Refuse => TransitionOutcome {
                state: RemoteState::Refuse,
                date_depot: Some(days_before(60)),
                date_passage_en_instruction: Some(fixed_time()),
                date_traitement: Some(fixed_time()),
            },
            TransitionKind::ClassifyWithoutContinuation => TransitionOutcome {
                state: RemoteState::SansSuite,
                date_depot: Some(days_before(60)),
                date_passage_en_instruction: Some(fixed_time()),
                date_traitement: Some(fixed_time()),
            },
        })
    }

    async fn archive(&self, dossier_id: &str, _instructor_id: &str) -> Result<()> {
        if let Some(message) = &self.reject_archive_with {
            return Err(Error::DsRejected(message.clone()));
        }

        self.archived.lock().unwrap().push(dossier_id.to_string());
        Ok(())
    }
}

/// Build one page with an optional next cursor.
pub(crate) fn page(nodes: Vec<RemoteDossier>, next_cursor: Option<&str>) -> DossierPage {
    DossierPage {
        nodes,
        page_info: PageInfo {
            has_next_page: next_cursor.is_some(),
            end_cursor: next_cursor.map(ToString::to_string),
        },
    }
}

/// Fluent builder for remote dossier snapshots used across sync tests.
pub(crate) struct DossierBuilder {
    dossier: RemoteDossier,
}

impl DossierBuilder {
    pub fn new(number: i64) -> Self {
        Self {
            dossier: RemoteDossier {
                id: format!("RG9zc2llci0{number}"),
                number,
                state: RemoteState::EnConstruction,
                archived: false,
                date_depot: days_before(60),
                date_derniere_modification: days_before(45),
                date_derniere_modification_champs: None,
                date_passage_en_instruction: None,
                date_traitement: None,
                usager: RemoteProfile {
                    email: "jeune@example.com".to_string(),
                },
                demandeur: Some(RemoteApplicant {
                    nom: Some("Retrouvé".to_string()),
                    prenom: Some("Jeune".to_string()),
                    date_de_naissance: Some("2006-03-14".to_string()),
                }),
                champs: Vec::new(),
                messages: Vec::new(),
            },
        }
    }

    pub fn state(mut self, state: RemoteState) -> Self {
        self.dossier.state = state;
        if state == RemoteState::EnInstruction && self.dossier.date_passage_en_instruction.is_none()
        {
            self.dossier.date_passage_en_instruction = Some(days_before(40));
        }
        self
    }

    pub fn archived(mut self) -> Self {
        self.dossier.archived = true;
        self
    }

    pub fn applicant_email(mut self, email: &str) -> Self {
        self.dossier.usager.email = email.to_string();
        self
    }

    pub fn date_traitement(mut self, at: DateTime<Utc>) -> Self {
        self.dossier.date_traitement = Some(at);
        self
    }

    pub fn fields_modified(mut self, at: DateTime<Utc>) -> Self {
        self.dossier.date_derniere_modification_champs = Some(at);
        self
    }

    pub fn selections(mut self, values: &[&str]) -> Self {
        self.dossier.champs.push(RemoteField {
            label: super::parse::UPDATE_TYPES_LABEL.to_string(),
            value: None,
            values: values.iter().map(|v| (*v).to_string()).collect(),
        });
        self
    }

    pub fn field(mut self, label: &str, value: &str) -> Self {
        self.dossier.champs.push(RemoteField {
            label: label.to_string(),
            value: Some(value.to_string()),
            values: Vec::new(),
        });
        self
    }

    pub fn message(mut self, email: &str, at: DateTime<Utc>) -> Self {
        self.dossier.messages.push(RemoteMessage {
            email: email.to_string(),
            created_at: at,
            correction: None,
        });
        self
    }

    pub fn correction_message(
        mut self,
        email: &str,
        at: DateTime<Utc>,
        resolved: Option<DateTime<Utc>>,
    ) -> Self {
        self.dossier.messages.push(RemoteMessage {
            email: email.to_string(),
            created_at: at,
            correction: Some(RemoteCorrection {
                date_resolution: resolved,
            }),
        });
        self
    }

    pub fn build(self) -> RemoteDossier {
        self.dossier
    }
}
