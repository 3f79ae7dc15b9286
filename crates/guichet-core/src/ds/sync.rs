//! Reconciliation between remote account-update dossiers and local records.
//!
//! `SyncService` owns every operation that crosses the DS boundary: the
//! polling sync, the inactivity sweep, manual state transitions, archiving
//! and the deleted-dossier cleanup. The remote side is authoritative for
//! dossier state; local records only change after a remote mutation
//! succeeded.

use crate::db::{
    AccountUpdateRequestRepository, Database, LibSqlAccountUpdateRequestRepository,
    LibSqlUserRepository, UserRepository,
};
use crate::email::{EmailOutbox, TransactionalEmail};
use crate::error::{Error, Result};
use crate::models::{AccountUpdateRequest, DossierStatus, Flag, User};
use crate::util::normalize_email;

use super::client::{DsApi, TransitionInput, TransitionOutcome};
use super::parse;
use super::transitions::{steps_to, Step};
use super::wire::RemoteDossier;

/// Inactivity threshold for the without-continuation sweep (30 days, ms).
pub const INACTIVITY_PERIOD_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Counters reported by one `sync_applications` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Dossiers reconciled into local records
    pub reconciled: usize,
    /// Local records removed because the dossier is archived remotely
    pub deleted: usize,
    /// Idle requests classified without continuation by the sweep
    pub marked_without_continuation: usize,
}

/// Whether a request qualifies for the inactivity sweep.
///
/// Only on-going requests qualify, and only when every recorded activity is
/// older than the threshold. A missing instructor-message or
/// fields-modification timestamp disqualifies the request (no evidence of
/// instruction ever starting); a missing user message does not, since an
/// applicant who never wrote is exactly the idle case.
#[must_use]
pub fn is_concerned_by_inactivity(request: &AccountUpdateRequest, now_ms: i64) -> bool {
    if request.status != DossierStatus::OnGoing {
        return false;
    }

    let idle = |at: i64| now_ms - at >= INACTIVITY_PERIOD_MS;

    request.date_last_instructor_message.is_some_and(idle)
        && request.date_last_user_message.is_none_or(idle)
        && request.date_last_fields_modification.is_some_and(idle)
}

/// Sync and transition orchestrator over one database and one DS procedure.
pub struct SyncService<'a, A, E> {
    db: &'a Database,
    api: &'a A,
    outbox: &'a E,
    procedure: i64,
}

impl<'a, A: DsApi, E: EmailOutbox> SyncService<'a, A, E> {
    /// Create a service bound to one procedure.
    pub const fn new(db: &'a Database, api: &'a A, outbox: &'a E, procedure: i64) -> Self {
        Self {
            db,
            api,
            outbox,
            procedure,
        }
    }

    /// Copy remote instructor ids onto the local admin accounts whose email
    /// matches. Returns how many accounts were updated.
    pub async fn sync_instructor_ids(&self) -> Result<usize> {
        let users = LibSqlUserRepository::new(self.db.connection());
        let remote = self.api.instructors(self.procedure).await?;

        let mut updated = 0;
        for instructor in remote {
            let Some(user) = users.find_by_email(&instructor.email).await? else {
                tracing::warn!(email = %instructor.email, "Remote instructor has no local account");
                continue;
            };
            if !user.is_admin {
                tracing::warn!(email = %user.email, "Remote instructor matches a non-admin account");
                continue;
            }
            if user.ds_instructor_id.as_deref() == Some(instructor.id.as_str()) {
                continue;
            }

            users.set_instructor_id(&user.id, &instructor.id).await?;
            updated += 1;
        }

        tracing::info!(updated, "Synced instructor ids");
        Ok(updated)
    }

    /// Poll every dossier page from `cursor` and reconcile each into its
    /// local record. Archived dossiers delete their record. When
    /// `sweep_instructor` is given, requests idle past the threshold are then
    /// classified without continuation on its behalf.
    pub async fn sync_applications(
        &self,
        cursor: Option<String>,
        sweep_instructor: Option<&User>,
        now_ms: i64,
    ) -> Result<SyncOutcome> {
        let requests = LibSqlAccountUpdateRequestRepository::new(self.db.connection());

        let mut cursor = cursor;
        let mut reconciled = Vec::new();
        let mut deleted = 0;
        loop {
            let page = self
                .api
                .applications_page(self.procedure, cursor.as_deref())
                .await?;

            for dossier in &page.nodes {
                if dossier.archived {
                    if requests.delete(dossier.number).await? {
                        deleted += 1;
                        tracing::info!(
                            application = dossier.number,
                            "Removed record of archived dossier"
                        );
                    }
                    continue;
                }
                reconciled.push(self.reconcile(dossier, now_ms).await?);
            }

            if !page.page_info.has_next_page {
                break;
            }
            cursor = Some(page.page_info.end_cursor.ok_or_else(|| {
                Error::DsApi("remote reported a next page without a cursor".to_string())
            })?);
        }

        let mut marked_without_continuation = 0;
        if let Some(instructor) = sweep_instructor {
            for request in &reconciled {
                if !is_concerned_by_inactivity(request, now_ms) {
                    continue;
                }
                self.mark_without_continuation(request, instructor).await?;
                marked_without_continuation += 1;
            }
        }

        let outcome = SyncOutcome {
            reconciled: reconciled.len(),
            deleted,
            marked_without_continuation,
        };
        tracing::info!(
            reconciled = outcome.reconciled,
            deleted = outcome.deleted,
            swept = outcome.marked_without_continuation,
            "Application sync finished"
        );
        Ok(outcome)
    }

    /// Delete the local records of dossiers deleted on the remote side.
    /// Numbers with no local record are ignored. Returns how many records
    /// were removed.
    pub async fn sync_deleted_applications(&self) -> Result<usize> {
        let requests = LibSqlAccountUpdateRequestRepository::new(self.db.connection());
        let numbers = self.api.deleted_application_numbers(self.procedure).await?;

        let mut deleted = 0;
        for number in numbers {
            if requests.delete(number).await? {
                deleted += 1;
                tracing::info!(application = number, "Removed record of deleted dossier");
            }
        }
        Ok(deleted)
    }

    /// Drive a request to `target` through the remote transition mutations,
    /// then update the local record from the remote outcome.
    ///
    /// Compound transitions (from draft) suppress notifications on the
    /// intermediate step; `motivation` is only attached to the final one.
    /// Any remote rejection aborts before the local record is touched.
    pub async fn update_state(
        &self,
        application_number: i64,
        target: DossierStatus,
        instructor: &User,
        motivation: Option<String>,
    ) -> Result<AccountUpdateRequest> {
        let requests = LibSqlAccountUpdateRequestRepository::new(self.db.connection());
        let record = requests
            .get(application_number)
            .await?
            .ok_or_else(|| Error::NotFound(format!("account-update request {application_number}")))?;
        let instructor_id = remote_instructor_id(instructor)?;

        let steps = steps_to(record.status, target)?;
        let outcome = self
            .run_steps(&record.technical_id, instructor_id, &steps, motivation)
            .await?;

        let mut updated = record;
        updated.status = outcome.state.to_status();
        if let Some(at) = outcome.date_depot {
            updated.date_created = at.timestamp_millis();
        }
        updated.date_last_status_update = status_update_timestamp(&outcome);
        updated.last_instructor_id = Some(instructor.id);
        requests.upsert(&updated).await?;

        tracing::info!(
            application = application_number,
            status = %updated.status,
            instructor = %instructor.email,
            "Applied state transition"
        );
        Ok(updated)
    }

    /// Archive a dossier remotely and delete its local record.
    ///
    /// The remote side only archives processed dossiers, so draft and
    /// on-going requests are first driven to without-continuation with
    /// notifications suppressed.
    pub async fn archive(
        &self,
        application_number: i64,
        instructor: &User,
        motivation: Option<String>,
    ) -> Result<()> {
        let requests = LibSqlAccountUpdateRequestRepository::new(self.db.connection());
        let record = requests
            .get(application_number)
            .await?
            .ok_or_else(|| Error::NotFound(format!("account-update request {application_number}")))?;
        let instructor_id = remote_instructor_id(instructor)?;

        if !record.status.is_terminal() {
            let steps: Vec<Step> = steps_to(record.status, DossierStatus::WithoutContinuation)?
                .into_iter()
                .map(|step| Step {
                    disable_notification: true,
                    ..step
                })
                .collect();
            self.run_steps(&record.technical_id, instructor_id, &steps, motivation)
                .await?;
        }

        self.api.archive(&record.technical_id, instructor_id).await?;
        requests.delete(application_number).await?;

        tracing::info!(
            application = application_number,
            instructor = %instructor.email,
            "Archived dossier"
        );
        Ok(())
    }

    /// Reconcile one remote dossier into its local record.
    async fn reconcile(
        &self,
        dossier: &RemoteDossier,
        now_ms: i64,
    ) -> Result<AccountUpdateRequest> {
        let users = LibSqlUserRepository::new(self.db.connection());
        let requests = LibSqlAccountUpdateRequestRepository::new(self.db.connection());

        let existing = requests.get(dossier.number).await?;
        let parsed = parse::parse_fields(&dossier.champs);
        let applicant_email = normalize_email(&dossier.usager.email);
        let messages = parse::summarize_messages(&dossier.messages, &applicant_email);

        let mut flags = parsed.flags.clone();
        let matched = match_user(&users, &parsed, &applicant_email).await?;

        if let Some(new_email) = &parsed.new_email {
            if let Some(other) = users.find_by_email(new_email).await? {
                if matched.as_ref().map(|user| user.id) != Some(other.id) {
                    flags.push(Flag::DuplicateNewEmail);
                }
            }
        }

        if messages.waiting_for_correction {
            flags.push(Flag::WaitingForCorrection);
        }
        if let Some(resolved) = messages.last_correction_resolved {
            // Only flag resolutions that happened since the previous sync;
            // re-flagging old resolutions on every pass would be noise.
            if existing
                .as_ref()
                .is_some_and(|previous| resolved > previous.date_last_synced)
            {
                flags.push(Flag::CorrectionResolved);
            }
        }

        // Attribution goes to the most recent sender that is a known
        // instructor; other non-applicant senders (support staff) are
        // skipped rather than shadowing older instructor messages.
        let mut last_instructor_id = None;
        for email in &messages.instructor_emails {
            let sender = users.find_by_email(email).await?;
            if let Some(user) = sender.filter(|user| user.is_admin && user.ds_instructor_id.is_some())
            {
                last_instructor_id = Some(user.id);
                break;
            }
        }
        let last_instructor_id = last_instructor_id
            .or_else(|| existing.as_ref().and_then(|previous| previous.last_instructor_id));

        // Notify the applicant once when matching fails on a request that
        // declares an intent; a repeat failure on an already-unmatched
        // record stays silent.
        if matched.is_none()
            && !parsed.update_types.is_empty()
            && existing
                .as_ref()
                .is_none_or(|previous| previous.user_id.is_some())
        {
            self.outbox
                .enqueue(TransactionalEmail::NoUserFound {
                    recipient: applicant_email.clone(),
                    application_number: dossier.number,
                })
                .await?;
            tracing::info!(
                application = dossier.number,
                "No local account matches account-update request"
            );
        }

        let record = AccountUpdateRequest {
            application_number: dossier.number,
            technical_id: dossier.id.clone(),
            status: dossier.state.to_status(),
            date_created: dossier.date_depot.timestamp_millis(),
            date_last_status_update: dossier.date_last_status_update().timestamp_millis(),
            date_last_user_message: messages.last_user_message,
            date_last_instructor_message: messages.last_instructor_message,
            date_last_fields_modification: dossier
                .date_derniere_modification_champs
                .map(|at| at.timestamp_millis()),
            date_last_synced: now_ms,
            first_name: dossier
                .demandeur
                .as_ref()
                .and_then(|applicant| applicant.prenom.clone()),
            last_name: dossier
                .demandeur
                .as_ref()
                .and_then(|applicant| applicant.nom.clone()),
            email: Some(applicant_email),
            birth_date: dossier
                .demandeur
                .as_ref()
                .and_then(|applicant| applicant.date_de_naissance.clone()),
            update_types: parsed.update_types,
            new_email: parsed.new_email,
            new_phone_number: parsed.new_phone_number,
            new_first_name: parsed.new_first_name,
            new_last_name: parsed.new_last_name,
            old_email: parsed.old_email,
            has_consented: parsed.has_consented,
            flags,
            last_instructor_id,
            user_id: matched.map(|user| user.id),
        };

        requests.upsert(&record).await?;
        Ok(record)
    }

    /// Classify one idle request without continuation and notify its user.
    async fn mark_without_continuation(
        &self,
        request: &AccountUpdateRequest,
        instructor: &User,
    ) -> Result<()> {
        let updated = self
            .update_state(
                request.application_number,
                DossierStatus::WithoutContinuation,
                instructor,
                None,
            )
            .await?;

        if let Some(user_id) = updated.user_id {
            let users = LibSqlUserRepository::new(self.db.connection());
            if let Some(user) = users.get(&user_id).await? {
                self.outbox
                    .enqueue(TransactionalEmail::MarkedWithoutContinuation {
                        recipient: user.email,
                        application_number: request.application_number,
                    })
                    .await?;
            }
        }

        tracing::info!(
            application = request.application_number,
            "Classified idle request without continuation"
        );
        Ok(())
    }

    /// Run a transition sequence; `motivation` goes on the last step only.
    async fn run_steps(
        &self,
        dossier_id: &str,
        instructor_id: &str,
        steps: &[Step],
        motivation: Option<String>,
    ) -> Result<TransitionOutcome> {
        let mut outcome = None;
        for (index, step) in steps.iter().enumerate() {
            let motivation = if index + 1 == steps.len() {
                motivation.clone()
            } else {
                None
            };
            outcome = Some(
                self.api
                    .apply_transition(&TransitionInput {
                        kind: step.kind,
                        dossier_id: dossier_id.to_string(),
                        instructor_id: instructor_id.to_string(),
                        disable_notification: step.disable_notification,
                        motivation,
                    })
                    .await?,
            );
        }

        outcome.ok_or_else(|| Error::InvalidInput("empty transition sequence".to_string()))
    }
}

/// Require the remote instructor id on the acting admin.
fn remote_instructor_id(instructor: &User) -> Result<&str> {
    instructor
        .ds_instructor_id
        .as_deref()
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} has no DS instructor id; run the instructor sync first",
                instructor.email
            ))
        })
}

/// Identity matching: exactly one local account or none.
///
/// Email-change requests match on the declared previous email first, since
/// the DS account email is the one being abandoned; every other request
/// matches on the applicant's current email. Email uniqueness in the users
/// table guarantees at most one hit.
async fn match_user(
    users: &LibSqlUserRepository<'_>,
    parsed: &parse::ParsedFields,
    applicant_email: &str,
) -> Result<Option<User>> {
    if parsed
        .update_types
        .contains(&crate::models::UpdateType::Email)
    {
        if let Some(old_email) = &parsed.old_email {
            if let Some(user) = users.find_by_email(old_email).await? {
                return Ok(Some(user));
            }
        }
    }

    users.find_by_email(applicant_email).await
}

/// Local timestamp of the status change reported by a transition outcome.
fn status_update_timestamp(outcome: &TransitionOutcome) -> i64 {
    let remote = match outcome.state.to_status() {
        DossierStatus::OnGoing => outcome.date_passage_en_instruction,
        DossierStatus::Accepted | DossierStatus::Refused | DossierStatus::WithoutContinuation => {
            outcome.date_traitement
        }
        DossierStatus::Draft => None,
    };
    remote.map_or_else(
        || chrono::Utc::now().timestamp_millis(),
        |at| at.timestamp_millis(),
    )
}
