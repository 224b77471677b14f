use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // bcrypt hash, not exposed in JSON
    pub gender: String,
    pub age: i32,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub referrer: Option<String>,
    pub terms_accepted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Everything needed to insert a user; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub age: i32,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub referrer: Option<String>,
    pub terms_accepted: bool,
}
