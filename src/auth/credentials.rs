use std::sync::Arc;

use lazy_static::lazy_static;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::{
    password::{generate_reset_token, hash_password, hash_reset_token, verify_password},
    repo::UserRepo,
    repo_types::{NewUser, User},
};
use crate::{
    config::AppConfig,
    db::UniqueField,
    error::{AppError, AppResult},
    validators::FieldErrors,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResetTokenError {
    #[error("no user holds this reset token")]
    NotFound,
    #[error("reset token expired")]
    Expired,
}

lazy_static! {
    /// Verified against when the login matches nobody, so both failure paths
    /// pay for one Argon2 verification.
    static ref DUMMY_HASH: Option<String> = hash_password("dummy-password-for-timing").ok();
}

/// Plaintext registration fields, already validated.
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub handle: String,
    pub email: String,
    pub password: String,
}

/// Password and reset-token lifecycle on top of a [`UserRepo`].
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepo>,
    reset_ttl: Duration,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepo>, config: &AppConfig) -> Self {
        Self::with_reset_ttl(users, Duration::minutes(config.reset_token_ttl_minutes))
    }

    pub fn with_reset_ttl(users: Arc<dyn UserRepo>, reset_ttl: Duration) -> Self {
        Self { users, reset_ttl }
    }

    /// The lookup only chooses the friendlier message; the repository's unique
    /// constraint decides concurrent races.
    pub async fn register(&self, reg: Registration) -> AppResult<User> {
        let email = reg.email.trim().to_lowercase();
        let handle = reg.handle.trim().to_string();

        if let Some(existing) = self.users.find_conflicting(&email, &handle).await? {
            let field = if existing.email == email {
                UniqueField::Email
            } else {
                UniqueField::Handle
            };
            warn!(field = field.field(), "registration conflict");
            return Err(AppError::Conflict(FieldErrors::single(
                field.field(),
                field.message(),
            )));
        }

        let password_hash = hash_password(&reg.password)?;
        let user = self
            .users
            .create(NewUser {
                first_name: reg.first_name.trim().to_string(),
                last_name: reg.last_name.trim().to_string(),
                handle,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Unknown login and wrong password both come back as
    /// [`AppError::InvalidCredentials`].
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<User> {
        let login = login.trim();
        let Some(user) = self.users.find_by_login(login).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            warn!("login for unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        debug!(user_id = %user.id, "credentials verified");
        Ok(user)
    }

    pub async fn issue_reset_token(&self, user: &User) -> AppResult<String> {
        self.issue_reset_token_at(user, OffsetDateTime::now_utc())
            .await
    }

    /// Stores only the digest; the plaintext goes back to the caller for delivery.
    pub async fn issue_reset_token_at(
        &self,
        user: &User,
        now: OffsetDateTime,
    ) -> AppResult<String> {
        let token = generate_reset_token();
        let expires_at = now + self.reset_ttl;
        let stored = self
            .users
            .set_reset_token(user.id, &hash_reset_token(&token), expires_at)
            .await?;
        if !stored {
            return Err(AppError::NotFound("user"));
        }

        info!(user_id = %user.id, %expires_at, "password reset token issued");
        Ok(token)
    }

    pub async fn consume_reset_token(&self, token: &str, new_password: &str) -> AppResult<User> {
        self.consume_reset_token_at(token, new_password, OffsetDateTime::now_utc())
            .await
    }

    pub async fn consume_reset_token_at(
        &self,
        token: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> AppResult<User> {
        let digest = hash_reset_token(token.trim());

        let holder = self
            .users
            .find_by_reset_token(&digest)
            .await?
            .ok_or(ResetTokenError::NotFound)?;
        let live = holder
            .password_reset_token_expires
            .is_some_and(|expires| now < expires);
        if !live {
            warn!(user_id = %holder.id, "expired reset token presented");
            return Err(ResetTokenError::Expired.into());
        }

        let password_hash = hash_password(new_password)?;
        // A concurrent consumer may have won between the lookup and here.
        let user = self
            .users
            .consume_reset_token(&digest, now, &password_hash)
            .await?
            .ok_or(ResetTokenError::NotFound)?;

        info!(user_id = %user.id, "password reset");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_memory::MemoryUserRepo;

    fn store() -> CredentialStore {
        CredentialStore::with_reset_ttl(Arc::new(MemoryUserRepo::new()), Duration::hours(1))
    }

    fn registration(email: &str, handle: &str, password: &str) -> Registration {
        Registration {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            handle: handle.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn reset_error(err: AppError) -> ResetTokenError {
        match err {
            AppError::ResetToken(e) => e,
            other => panic!("expected reset token error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_then_login_by_email_or_handle() {
        let store = store();
        let user = store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();
        assert_ne!(user.password_hash, "pw1");
        assert!(!user.password_hash.is_empty());

        assert_eq!(store.authenticate("a@x.com", "pw1").await.unwrap().id, user.id);
        assert_eq!(store.authenticate("ax", "pw1").await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn email_login_reaches_the_email_owner_over_a_lookalike_handle() {
        let store = store();
        store
            .register(registration("m@x.com", "alice@x.com", "mallory-pw"))
            .await
            .unwrap();
        let alice = store
            .register(registration("alice@x.com", "alice", "alice-pw"))
            .await
            .unwrap();

        let user = store.authenticate("alice@x.com", "alice-pw").await.unwrap();
        assert_eq!(user.id, alice.id);
    }

    #[tokio::test]
    async fn email_is_normalized_on_register() {
        let store = store();
        let user = store
            .register(registration("  A@X.com ", "ax", "pw1"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_login_look_the_same() {
        let store = store();
        store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();

        let wrong = store.authenticate("a@x.com", "wrong").await.unwrap_err();
        let unknown = store.authenticate("nobody@x.com", "pw1").await.unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn duplicate_registration_names_the_field() {
        let store = store();
        store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();

        match store.register(registration("a@x.com", "other", "pw")).await {
            Err(AppError::Conflict(errors)) => assert!(errors.get("email").is_some()),
            other => panic!("expected conflict, got {other:?}"),
        }
        match store.register(registration("b@x.com", "ax", "pw")).await {
            Err(AppError::Conflict(errors)) => assert!(errors.get("handle").is_some()),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_registrations_with_same_handle_admit_one() {
        let store = store();
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.register(registration("a@x.com", "ax", "pw")).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.register(registration("b@x.com", "ax", "pw")).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let store = store();
        let user = store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();

        let token = store.issue_reset_token(&user).await.unwrap();
        let updated = store.consume_reset_token(&token, "pw2").await.unwrap();
        assert_eq!(updated.id, user.id);
        assert!(updated.password_reset_token.is_none());
        assert!(updated.password_reset_token_expires.is_none());

        assert!(store.authenticate("a@x.com", "pw2").await.is_ok());
        assert!(store.authenticate("a@x.com", "pw1").await.is_err());

        let again = store.consume_reset_token(&token, "pw3").await.unwrap_err();
        assert_eq!(reset_error(again), ResetTokenError::NotFound);
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let store = store();
        let user = store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();

        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = store.issue_reset_token_at(&user, issued).await.unwrap();
        let err = store.consume_reset_token(&token, "pw2").await.unwrap_err();
        assert_eq!(reset_error(err), ResetTokenError::Expired);

        // The old password still works.
        assert!(store.authenticate("a@x.com", "pw1").await.is_ok());
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_token() {
        let store = store();
        let user = store
            .register(registration("a@x.com", "ax", "pw1"))
            .await
            .unwrap();

        let first = store.issue_reset_token(&user).await.unwrap();
        let second = store.issue_reset_token(&user).await.unwrap();
        assert_ne!(first, second);

        let err = store.consume_reset_token(&first, "pw2").await.unwrap_err();
        assert_eq!(reset_error(err), ResetTokenError::NotFound);
        assert!(store.consume_reset_token(&second, "pw2").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_reset_token_is_not_found() {
        let store = store();
        let err = store
            .consume_reset_token("made-up-token", "pw")
            .await
            .unwrap_err();
        assert_eq!(reset_error(err), ResetTokenError::NotFound);
    }
}
