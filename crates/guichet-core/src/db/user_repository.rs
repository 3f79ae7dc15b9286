//! User repository implementation

use crate::error::{Error, Result};
use crate::models::{User, UserId};
use crate::util::normalize_email;
use libsql::Connection;

/// Trait for user storage operations (async)
#[allow(async_fn_in_trait)]
pub trait UserRepository {
    /// Insert a new user
    async fn create(&self, user: &User) -> Result<()>;

    /// Get a user by ID
    async fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List admin accounts
    async fn list_admins(&self) -> Result<Vec<User>>;

    /// List admins carrying a remote instructor id
    async fn list_instructors(&self) -> Result<Vec<User>>;

    /// Store the remote instructor id on a user
    async fn set_instructor_id(&self, id: &UserId, instructor_id: &str) -> Result<()>;
}

/// libSQL implementation of `UserRepository`
pub struct LibSqlUserRepository<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone_number, birth_date, \
     is_beneficiary, is_admin, ds_instructor_id";

impl<'a> LibSqlUserRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_user(row: &libsql::Row) -> Result<User> {
        let id: String = row.get(0)?;
        Ok(User {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid user id: {id}")))?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            phone_number: row.get(4)?,
            birth_date: row.get(5)?,
            is_beneficiary: row.get::<i32>(6)? != 0,
            is_admin: row.get::<i32>(7)? != 0,
            ds_instructor_id: row.get(8)?,
        })
    }

    async fn query_users(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<User>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::parse_user(&row)?);
        }
        Ok(users)
    }
}

impl UserRepository for LibSqlUserRepository<'_> {
    async fn create(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, email, first_name, last_name, phone_number, birth_date,
                                    is_beneficiary, is_admin, ds_instructor_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    user.id.as_str(),
                    user.email.clone(),
                    user.first_name.clone(),
                    user.last_name.clone(),
                    user.phone_number.clone(),
                    user.birth_date.clone(),
                    i32::from(user.is_beneficiary),
                    i32::from(user.is_admin),
                    user.ds_instructor_id.clone(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>> {
        let users = self
            .query_users(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id.as_str()],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self
            .query_users(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"),
                [normalize_email(email)],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn list_admins(&self) -> Result<Vec<User>> {
        self.query_users(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE is_admin = 1 ORDER BY email"),
            (),
        )
        .await
    }

    async fn list_instructors(&self) -> Result<Vec<User>> {
        self.query_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE is_admin = 1 AND ds_instructor_id IS NOT NULL
                 ORDER BY email"
            ),
            (),
        )
        .await
    }

    async fn set_instructor_id(&self, id: &UserId, instructor_id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE users SET ds_instructor_id = ? WHERE id = ?",
                [instructor_id.to_string(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let user = User::new_beneficiary("jeune@example.com", "Jeune", "Retrouvé");
        repo.create(&user).await.unwrap();

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_email_is_case_insensitive() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let user = User::new_beneficiary("jeune@example.com", "Jeune", "Retrouvé");
        repo.create(&user).await.unwrap();

        let fetched = repo
            .find_by_email("Jeune@Example.COM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, user.id);

        assert!(repo
            .find_by_email("missing@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_admins_and_instructors() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let beneficiary = User::new_beneficiary("jeune@example.com", "Jeune", "Retrouvé");
        let admin = User::new_admin("a.instructor@example.com", "Ad", "Min");
        let mut instructor = User::new_admin("b.instructor@example.com", "Ins", "Tructeur");
        instructor.ds_instructor_id = Some("SW5zdHJ1Y3RldXItMQ==".to_string());

        repo.create(&beneficiary).await.unwrap();
        repo.create(&admin).await.unwrap();
        repo.create(&instructor).await.unwrap();

        let admins = repo.list_admins().await.unwrap();
        assert_eq!(admins.len(), 2);

        let instructors = repo.list_instructors().await.unwrap();
        assert_eq!(instructors.len(), 1);
        assert_eq!(instructors[0].id, instructor.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_instructor_id() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let admin = User::new_admin("instructor@example.com", "Ins", "Tructeur");
        repo.create(&admin).await.unwrap();

        repo.set_instructor_id(&admin.id, "SW5zdHJ1Y3RldXItMg==")
            .await
            .unwrap();

        let fetched = repo.get(&admin.id).await.unwrap().unwrap();
        assert_eq!(
            fetched.ds_instructor_id.as_deref(),
            Some("SW5zdHJ1Y3RldXItMg==")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_instructor_id_missing_user() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let error = repo
            .set_instructor_id(&UserId::new(), "SW5zdHJ1Y3RldXItMw==")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
