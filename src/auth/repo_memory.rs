use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{
    repo::UserRepo,
    repo_types::{NewUser, User, UserChanges},
};
use crate::db::{RepoError, UniqueField};

/// Process-local user store. Every operation runs under one lock, which gives
/// the same uniqueness and single-use guarantees as the database constraints.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(
    users: &[User],
    skip: Option<Uuid>,
    email: Option<&str>,
    handle: Option<&str>,
) -> Result<(), RepoError> {
    for u in users.iter().filter(|u| Some(u.id) != skip) {
        if email == Some(u.email.as_str()) {
            return Err(RepoError::Duplicate(UniqueField::Email));
        }
        if handle == Some(u.handle.as_str()) {
            return Err(RepoError::Duplicate(UniqueField::Handle));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, RepoError> {
        let email = login.to_lowercase();
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|u| u.email == email)
            .or_else(|| users.iter().find(|u| u.handle == login))
            .cloned())
    }

    async fn find_conflicting(
        &self,
        email: &str,
        handle: &str,
    ) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|u| u.email == email || u.handle == handle)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepoError> {
        Ok(self.users.lock().await.clone())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.lock().await;
        check_unique(
            &users,
            None,
            Some(&new_user.email),
            Some(&new_user.handle),
        )?;

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            handle: new_user.handle,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile_pic: None,
            password_reset_token: None,
            password_reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().await;
        check_unique(
            &users,
            Some(id),
            changes.email.as_deref(),
            changes.handle.as_deref(),
        )?;

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.handle {
            user.handle = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
            user.password_reset_token = None;
            user.password_reset_token_expires = None;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_profile_pic(&self, id: Uuid, url: &str) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.profile_pic = Some(url.to_string());
            user.updated_at = OffsetDateTime::now_utc();
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().await;
        Ok(users
            .iter()
            .position(|u| u.id == id)
            .map(|pos| users.remove(pos)))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let mut users = self.users.lock().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        user.password_reset_token = Some(token_hash.to_string());
        user.password_reset_token_expires = Some(expires_at);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, RepoError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|u| u.password_reset_token.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().await;
        let holder = users.iter_mut().find(|u| {
            u.password_reset_token.as_deref() == Some(token_hash)
                && u.password_reset_token_expires.is_some_and(|exp| now < exp)
        });
        Ok(holder.map(|user| {
            user.password_hash = password_hash.to_string();
            user.password_reset_token = None;
            user.password_reset_token_expires = None;
            user.updated_at = now;
            user.clone()
        }))
    }
}
