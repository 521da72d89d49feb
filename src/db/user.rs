use super::DBClient;
use crate::dtos::{NewUserDto, PaginationDto, PasswordUpdateDto};
use crate::error::DbError;
use crate::models::{User, UserRole};
use crate::utils::password;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// User database operations trait
pub trait UserExt {
    /// Validate, hash the password and insert a new user
    async fn create_user(&self, user: &NewUserDto) -> Result<User, DbError>;

    /// Get single user by ID, username or email (first supplied key wins)
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DbError>;

    /// Get paginated list of all users, oldest account first
    async fn get_users(&self, pagination: &PaginationDto) -> Result<Vec<User>, DbError>;

    /// Get total count of all users
    async fn get_user_count(&self) -> Result<i64, DbError>;

    /// Update user's role (Admin or User)
    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<User, DbError>;

    /// Update the staff and superuser statuses
    async fn update_user_flags(
        &self,
        user_id: Uuid,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<User, DbError>;

    /// Replace the stored password hash
    async fn update_user_password(
        &self,
        user_id: Uuid,
        update: &PasswordUpdateDto,
    ) -> Result<User, DbError>;

    /// Check a plain-text password against the user's stored hash.
    /// An empty candidate or an unreadable stored hash never matches.
    fn verify_user_password(&self, user: &User, candidate: &str) -> bool;

    /// Delete user by ID; every row referencing the user goes with it
    async fn delete_user(&self, user_id: Uuid) -> Result<(), DbError>;
}

impl UserExt for DBClient {
    #[instrument(skip(self, user), fields(username = %user.username, email = %user.email))]
    async fn create_user(&self, user: &NewUserDto) -> Result<User, DbError> {
        user.validate()?;

        let hashed_password = password::hash(&user.password)?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, first_name, last_name, role, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&hashed_password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            tracing::warn!("DB error, saving user: {}", err);
            err
        })?;

        tracing::info!(user_id = %created.id, "User created");
        Ok(created)
    }

    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(
                r#"SELECT id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined FROM users WHERE id = $1"#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(
                r#"SELECT id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined FROM users WHERE username = $1"#,
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(
                r#"SELECT id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined FROM users WHERE email = $1"#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, pagination: &PaginationDto) -> Result<Vec<User>, DbError> {
        pagination.validate()?;

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined
            FROM users
            ORDER BY date_joined ASC, username ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM users"#)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self))]
    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $1
            WHERE id = $2
            RETURNING id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(role)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(role = role.to_str(), "User role updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn update_user_flags(
        &self,
        user_id: Uuid,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_staff = $1, is_superuser = $2
            WHERE id = $3
            RETURNING id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(is_staff)
        .bind(is_superuser)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, update))]
    async fn update_user_password(
        &self,
        user_id: Uuid,
        update: &PasswordUpdateDto,
    ) -> Result<User, DbError> {
        update.validate()?;

        let hashed_password = password::hash(&update.new_password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password = $1
            WHERE id = $2
            RETURNING id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(&hashed_password)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    fn verify_user_password(&self, user: &User, candidate: &str) -> bool {
        password::compare(candidate, &user.password).unwrap_or_else(|e| {
            tracing::debug!(user_id = %user.id, "Password check failed: {}", e);
            false
        })
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        // Check if user actually existed
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tracing::info!("User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::Utc;
    use sqlx::PgPool;

    fn offline_client() -> DBClient {
        // connect_lazy never touches the network until a query runs
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        DBClient::new(pool)
    }

    #[tokio::test]
    async fn out_of_range_pagination_is_a_validation_error() {
        let db = offline_client();

        for pagination in [
            PaginationDto::new(usize::MAX, 10),
            PaginationDto::new(usize::MAX / 4, 50),
            PaginationDto::new(1, usize::MAX),
            PaginationDto::new(0, 10),
        ] {
            let err = db.get_users(&pagination).await.unwrap_err();
            assert!(err.is_validation(), "{pagination:?} gave {err}");
        }
    }

    #[tokio::test]
    async fn unreadable_hash_never_verifies() {
        let db = offline_client();
        let user = User {
            id: Uuid::new_v4(),
            username: "julia".to_string(),
            email: "julia@example.com".to_string(),
            password: "not-a-phc-string".to_string(),
            first_name: "Julia".to_string(),
            last_name: "Child".to_string(),
            role: UserRole::User,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
        };
        assert!(!db.verify_user_password(&user, "password123"));
        assert!(!db.verify_user_password(&user, ""));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_and_lookup(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = fixtures::user(&db, "julia").await;

        assert_eq!(user.role, UserRole::User);
        assert!(!user.is_admin());
        assert_ne!(user.password, "password123");
        assert!(db.verify_user_password(&user, "password123"));

        let by_email = db
            .get_user(None, None, Some("julia@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.get_user(None, Some("nobody"), None).await.unwrap().is_none());
        assert_eq!(db.get_user_count().await.unwrap(), 1);

        fixtures::user(&db, "jacques").await;
        let all = db.get_users(&PaginationDto::new(1, 10)).await.unwrap();
        assert_eq!(all.len(), 2);
        let first = db.get_users(&PaginationDto::new(1, 1)).await.unwrap();
        let second = db.get_users(&PaginationDto::new(2, 1)).await.unwrap();
        assert_eq!(first[0].id, all[0].id);
        assert_eq!(second[0].id, all[1].id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn username_and_email_are_unique(pool: PgPool) {
        let db = DBClient::new(pool);
        fixtures::user(&db, "julia").await;

        let mut dup = NewUserDto {
            username: "julia".to_string(),
            email: "other@example.com".to_string(),
            password: "password123".to_string(),
            first_name: "J".to_string(),
            last_name: "C".to_string(),
            ..Default::default()
        };
        assert!(db.create_user(&dup).await.unwrap_err().is_unique_violation());

        dup.username = "other".to_string();
        dup.email = "julia@example.com".to_string();
        assert!(db.create_user(&dup).await.unwrap_err().is_unique_violation());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admin_status_follows_role_and_flags(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = fixtures::user(&db, "julia").await;

        let staff = db.update_user_flags(user.id, true, false).await.unwrap();
        assert!(staff.is_admin());

        let plain = db.update_user_flags(user.id, false, false).await.unwrap();
        assert!(!plain.is_admin());

        let admin = db.update_user_role(user.id, UserRole::Admin).await.unwrap();
        assert!(admin.is_admin());
        assert!(!admin.is_user());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn invalid_input_never_reaches_the_database(pool: PgPool) {
        let db = DBClient::new(pool);
        let err = db
            .create_user(&NewUserDto {
                username: "u".repeat(41),
                email: "julia@example.com".to_string(),
                password: "password123".to_string(),
                first_name: "J".to_string(),
                last_name: "C".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(db.get_user_count().await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn password_update_rehashes(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = fixtures::user(&db, "julia").await;

        let updated = db
            .update_user_password(
                user.id,
                &PasswordUpdateDto {
                    new_password: "brand-new".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(db.verify_user_password(&updated, "brand-new"));
        assert!(!db.verify_user_password(&updated, "password123"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_missing_user(pool: PgPool) {
        let db = DBClient::new(pool);
        let err = db.delete_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
