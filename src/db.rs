use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

/// Columns guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Handle,
    CampaignName,
}

impl UniqueField {
    fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "users_email_key" => Some(Self::Email),
            "users_handle_key" => Some(Self::Handle),
            "campaigns_name_key" => Some(Self::CampaignName),
            _ => None,
        }
    }

    /// Request field the conflict is reported under.
    pub fn field(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Handle => "handle",
            Self::CampaignName => "name",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Email => "Email already in use.",
            Self::Handle => "Handle already in use.",
            Self::CampaignName => "Name already in use.",
        }
    }
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{} already in use", .0.field())]
    Duplicate(UniqueField),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                if let Some(field) = db_err.constraint().and_then(UniqueField::from_constraint) {
                    return RepoError::Duplicate(field);
                }
            }
        }
        RepoError::Other(err.into())
    }
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}
