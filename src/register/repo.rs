use axum::async_trait;
use sqlx::PgPool;

use crate::register::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Backend(e.into())
    }
}

/// Persistent collection of user records, unique by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken, even if a
    /// preceding `find_by_email` saw nothing.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, gender, age, bio,
                   profile_picture, referrer, terms_accepted, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, gender, age, bio,
                               profile_picture, referrer, terms_accepted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, email, password, gender, age, bio,
                      profile_picture, referrer, terms_accepted, created_at
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password)
        .bind(user.gender)
        .bind(user.age)
        .bind(user.bio)
        .bind(user.profile_picture)
        .bind(user.referrer)
        .bind(user.terms_accepted)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
