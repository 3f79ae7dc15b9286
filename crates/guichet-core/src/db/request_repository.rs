//! Account-update request repository implementation

use crate::error::{Error, Result};
use crate::models::{AccountUpdateRequest, Flag, UpdateType};
use libsql::Connection;

/// Trait for account-update request storage operations (async)
#[allow(async_fn_in_trait)]
pub trait AccountUpdateRequestRepository {
    /// Insert or replace the record keyed by its application number
    async fn upsert(&self, request: &AccountUpdateRequest) -> Result<()>;

    /// Get a record by remote application number
    async fn get(&self, application_number: i64) -> Result<Option<AccountUpdateRequest>>;

    /// List all records, ordered by application number
    async fn list(&self) -> Result<Vec<AccountUpdateRequest>>;

    /// Delete a record by application number.
    ///
    /// Returns whether a record existed; unmatched numbers are not an error
    /// (the deleted-applications sync ignores them).
    async fn delete(&self, application_number: i64) -> Result<bool>;
}

const REQUEST_COLUMNS: &str = "application_number, technical_id, status, date_created, \
     date_last_status_update, date_last_user_message, date_last_instructor_message, \
     date_last_fields_modification, date_last_synced, first_name, last_name, email, \
     birth_date, update_types, new_email, new_phone_number, new_first_name, \
     new_last_name, old_email, has_consented, flags, last_instructor_id, user_id";

/// libSQL implementation of `AccountUpdateRequestRepository`
pub struct LibSqlAccountUpdateRequestRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAccountUpdateRequestRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_request(row: &libsql::Row) -> Result<AccountUpdateRequest> {
        let status: String = row.get(2)?;
        let update_types: String = row.get(13)?;
        let update_types: Vec<UpdateType> = serde_json::from_str(&update_types)?;
        let flags: String = row.get(20)?;
        let flags: Vec<Flag> = serde_json::from_str(&flags)?;

        let last_instructor_id: Option<String> = row.get(21)?;
        let user_id: Option<String> = row.get(22)?;

        Ok(AccountUpdateRequest {
            application_number: row.get(0)?,
            technical_id: row.get(1)?,
            status: status
                .parse()
                .map_err(|e: String| Error::Database(e))?,
            date_created: row.get(3)?,
            date_last_status_update: row.get(4)?,
            date_last_user_message: row.get(5)?,
            date_last_instructor_message: row.get(6)?,
            date_last_fields_modification: row.get(7)?,
            date_last_synced: row.get(8)?,
            first_name: row.get(9)?,
            last_name: row.get(10)?,
            email: row.get(11)?,
            birth_date: row.get(12)?,
            update_types,
            new_email: row.get(14)?,
            new_phone_number: row.get(15)?,
            new_first_name: row.get(16)?,
            new_last_name: row.get(17)?,
            old_email: row.get(18)?,
            has_consented: row.get::<i32>(19)? != 0,
            flags,
            last_instructor_id: last_instructor_id
                .map(|id| {
                    id.parse()
                        .map_err(|_| Error::Database(format!("invalid instructor id: {id}")))
                })
                .transpose()?,
            user_id: user_id
                .map(|id| {
                    id.parse()
                        .map_err(|_| Error::Database(format!("invalid user id: {id}")))
                })
                .transpose()?,
        })
    }
}

impl AccountUpdateRequestRepository for LibSqlAccountUpdateRequestRepository<'_> {
    async fn upsert(&self, request: &AccountUpdateRequest) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO account_update_requests ({REQUEST_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                libsql::params![
                    request.application_number,
                    request.technical_id.clone(),
                    request.status.as_str(),
                    request.date_created,
                    request.date_last_status_update,
                    request.date_last_user_message,
                    request.date_last_instructor_message,
                    request.date_last_fields_modification,
                    request.date_last_synced,
                    request.first_name.clone(),
                    request.last_name.clone(),
                    request.email.clone(),
                    request.birth_date.clone(),
                    serde_json::to_string(&request.update_types)?,
                    request.new_email.clone(),
                    request.new_phone_number.clone(),
                    request.new_first_name.clone(),
                    request.new_last_name.clone(),
                    request.old_email.clone(),
                    i32::from(request.has_consented),
                    serde_json::to_string(&request.flags)?,
                    request.last_instructor_id.map(|id| id.as_str()),
                    request.user_id.map(|id| id.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, application_number: i64) -> Result<Option<AccountUpdateRequest>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM account_update_requests
                     WHERE application_number = ?"
                ),
                [application_number],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_request(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<AccountUpdateRequest>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM account_update_requests
                     ORDER BY application_number"
                ),
                (),
            )
            .await?;

        let mut requests = Vec::new();
        while let Some(row) = rows.next().await? {
            requests.push(Self::parse_request(&row)?);
        }
        Ok(requests)
    }

    async fn delete(&self, application_number: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM account_update_requests WHERE application_number = ?",
                [application_number],
            )
            .await?;
        Ok(rows > 0)
    }
}
