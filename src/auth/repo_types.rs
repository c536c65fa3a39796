use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub handle: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never serialized
    pub profile_pic: Option<String>,
    pub password_reset_token: Option<String>, // SHA-256 hex of the reset secret
    pub password_reset_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Insert payload; only built by the credential store after hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub handle: Option<String>,
    pub email: Option<String>,
    /// Setting a new hash also clears any outstanding reset token.
    pub password_hash: Option<String>,
}
