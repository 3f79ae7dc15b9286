//! Form-field and message-thread parsing for account-update dossiers
//!
//! Malformed or missing values never raise here: they degrade to diagnostic
//! flags on the parsed result so one broken dossier cannot stall the batch.

use crate::models::{Flag, UpdateType};
use crate::util::{is_plausible_email, normalize_email, normalize_phone, normalize_text_option};

use super::wire::{RemoteField, RemoteMessage};

/// Label of the multi-select field encoding the request intent.
pub const UPDATE_TYPES_LABEL: &str = "Quelle est votre demande ?";
pub const OLD_EMAIL_LABEL: &str = "Ancienne adresse de mail";
pub const NEW_EMAIL_LABEL: &str = "Nouvelle adresse de mail";
pub const NEW_PHONE_LABEL: &str = "Nouveau numéro de téléphone";
pub const NEW_FIRST_NAME_LABEL: &str = "Nouveau prénom";
pub const NEW_LAST_NAME_LABEL: &str = "Nouveau nom";
pub const CONSENT_LABEL: &str = "Consentement à l'utilisation de mes données";

/// Structured view of a dossier's form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub update_types: Vec<UpdateType>,
    pub new_email: Option<String>,
    pub new_phone_number: Option<String>,
    pub new_first_name: Option<String>,
    pub new_last_name: Option<String>,
    pub old_email: Option<String>,
    pub has_consented: bool,
    pub flags: Vec<Flag>,
}

/// Parse a human-readable request-type selection into an update type.
///
/// Matching is case-insensitive; unknown selections yield `None` and are
/// reported as a missing value by `parse_fields`.
#[must_use]
pub fn parse_update_type(selection: &str) -> Option<UpdateType> {
    match selection.trim().to_lowercase().as_str() {
        "changement d'adresse de mail" => Some(UpdateType::Email),
        "changement de numéro de téléphone" => Some(UpdateType::PhoneNumber),
        "changement de prénom" => Some(UpdateType::FirstName),
        "changement de nom" => Some(UpdateType::LastName),
        "mon compte possède déjà les informations à jour" => {
            Some(UpdateType::AccountHasSameInfo)
        }
        _ => None,
    }
}

/// Extract the structured update intent and proposed new values from the
/// dossier's form fields.
#[must_use]
pub fn parse_fields(fields: &[RemoteField]) -> ParsedFields {
    let mut parsed = ParsedFields::default();
    let mut missing_value = false;

    let selections = field_values(fields, UPDATE_TYPES_LABEL);
    if selections.is_empty() {
        missing_value = true;
    }
    for selection in &selections {
        match parse_update_type(selection) {
            Some(update_type) if !parsed.update_types.contains(&update_type) => {
                parsed.update_types.push(update_type);
            }
            Some(_) => {}
            None => missing_value = true,
        }
    }

    parsed.old_email = field_value(fields, OLD_EMAIL_LABEL).map(|raw| normalize_email(&raw));
    parsed.has_consented = field_value(fields, CONSENT_LABEL)
        .is_some_and(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "oui"));

    for update_type in parsed.update_types.clone() {
        match update_type {
            UpdateType::Email => {
                match field_value(fields, NEW_EMAIL_LABEL).map(|raw| normalize_email(&raw)) {
                    Some(email) if is_plausible_email(&email) => parsed.new_email = Some(email),
                    Some(_) => parsed.flags.push(Flag::InvalidValue),
                    None => missing_value = true,
                }
            }
            UpdateType::PhoneNumber => match field_value(fields, NEW_PHONE_LABEL) {
                Some(raw) => match normalize_phone(&raw) {
                    Some(phone) => parsed.new_phone_number = Some(phone),
                    None => parsed.flags.push(Flag::InvalidValue),
                },
                None => missing_value = true,
            },
            UpdateType::FirstName => {
                parsed.new_first_name = field_value(fields, NEW_FIRST_NAME_LABEL);
                if parsed.new_first_name.is_none() {
                    missing_value = true;
                }
            }
            UpdateType::LastName => {
                parsed.new_last_name = field_value(fields, NEW_LAST_NAME_LABEL);
                if parsed.new_last_name.is_none() {
                    missing_value = true;
                }
            }
            UpdateType::AccountHasSameInfo => {}
        }
    }

    if missing_value {
        parsed.flags.insert(0, Flag::MissingValue);
    }

    parsed
}

fn field_value(fields: &[RemoteField], label: &str) -> Option<String> {
    fields
        .iter()
        .find(|field| field.label.eq_ignore_ascii_case(label))
        .and_then(|field| normalize_text_option(field.value.clone()))
}

fn field_values(fields: &[RemoteField], label: &str) -> Vec<String> {
    let Some(field) = fields.iter().find(|field| field.label == label) else {
        return Vec::new();
    };

    if field.values.is_empty() {
        normalize_text_option(field.value.clone())
            .into_iter()
            .collect()
    } else {
        field
            .values
            .iter()
            .filter_map(|value| normalize_text_option(Some(value.clone())))
            .collect()
    }
}

/// Derived view of a dossier's message thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSummary {
    /// Most recent message sent by the applicant (Unix ms)
    pub last_user_message: Option<i64>,
    /// Most recent message sent by anyone else (Unix ms)
    pub last_instructor_message: Option<i64>,
    /// Non-applicant sender emails, most recent message first, deduplicated
    pub instructor_emails: Vec<String>,
    /// The latest message carries an unresolved correction request
    pub waiting_for_correction: bool,
    /// Most recent correction resolution (Unix ms)
    pub last_correction_resolved: Option<i64>,
}

/// Classify the message thread: applicant messages vs instructor messages,
/// plus correction-request state.
#[must_use]
pub fn summarize_messages(messages: &[RemoteMessage], applicant_email: &str) -> MessageSummary {
    let mut summary = MessageSummary::default();
    let mut instructor_messages: Vec<(i64, &str)> = Vec::new();

    for message in messages {
        let at = message.created_at.timestamp_millis();
        if message.email.eq_ignore_ascii_case(applicant_email) {
            if summary.last_user_message.is_none_or(|prev| at > prev) {
                summary.last_user_message = Some(at);
            }
        } else {
            if summary.last_instructor_message.is_none_or(|prev| at > prev) {
                summary.last_instructor_message = Some(at);
            }
            instructor_messages.push((at, message.email.as_str()));
        }

        if let Some(correction) = &message.correction {
            if let Some(resolved) = correction.date_resolution {
                let resolved = resolved.timestamp_millis();
                if summary
                    .last_correction_resolved
                    .is_none_or(|prev| resolved > prev)
                {
                    summary.last_correction_resolved = Some(resolved);
                }
            }
        }
    }

    instructor_messages.sort_by_key(|(at, _)| std::cmp::Reverse(*at));
    for (_, email) in instructor_messages {
        if !summary
            .instructor_emails
            .iter()
            .any(|seen| seen.eq_ignore_ascii_case(email))
        {
            summary.instructor_emails.push(email.to_string());
        }
    }

    summary.waiting_for_correction = messages
        .iter()
        .max_by_key(|message| message.created_at)
        .is_some_and(|latest| {
            latest
                .correction
                .is_some_and(|correction| correction.date_resolution.is_none())
        });

    summary
}
