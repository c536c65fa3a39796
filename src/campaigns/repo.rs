use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{
    repo_types::{Campaign, CampaignChanges, Monster},
    services::{toggle_monster, MonsterToggle},
};
use crate::db::RepoError;

/// Persistence seam for campaigns. Every mutating call is scoped to the
/// owner: a row created by someone else behaves as if it did not exist.
#[async_trait]
pub trait CampaignRepo: Send + Sync {
    async fn create(&self, name: &str, created_by: Uuid) -> Result<Campaign, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, RepoError>;

    async fn list_all(&self) -> Result<Vec<Campaign>, RepoError>;

    async fn list_by_owners(&self, owners: &[Uuid]) -> Result<Vec<Campaign>, RepoError>;

    async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: CampaignChanges,
    ) -> Result<Option<Campaign>, RepoError>;

    /// Adds or removes `monster` by slug as one atomic step.
    async fn toggle_monster(
        &self,
        id: Uuid,
        owner: Uuid,
        monster: Monster,
    ) -> Result<Option<(Campaign, MonsterToggle)>, RepoError>;

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<Option<Campaign>, RepoError>;
}

const CAMPAIGN_COLUMNS: &str = "id, name, monsters, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct PgCampaignRepo {
    db: PgPool,
}

impl PgCampaignRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CampaignRepo for PgCampaignRepo {
    async fn create(&self, name: &str, created_by: Uuid) -> Result<Campaign, RepoError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            INSERT INTO campaigns (id, name, created_by)
            VALUES ($1, $2, $3)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;
        Ok(campaign)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, RepoError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(campaign)
    }

    async fn list_all(&self) -> Result<Vec<Campaign>, RepoError> {
        let rows = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_by_owners(&self, owners: &[Uuid]) -> Result<Vec<Campaign>, RepoError> {
        let rows = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
              FROM campaigns
             WHERE created_by = ANY($1)
             ORDER BY created_at ASC
            "#
        ))
        .bind(owners)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: CampaignChanges,
    ) -> Result<Option<Campaign>, RepoError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                monsters = COALESCE($4, monsters),
                updated_at = now()
            WHERE id = $1 AND created_by = $2
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(changes.name)
        .bind(changes.monsters.map(Json))
        .fetch_optional(&self.db)
        .await?;
        Ok(campaign)
    }

    /// The row lock serializes concurrent toggles on one campaign.
    async fn toggle_monster(
        &self,
        id: Uuid,
        owner: Uuid,
        monster: Monster,
    ) -> Result<Option<(Campaign, MonsterToggle)>, RepoError> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 AND created_by = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };

        let mut monsters = current.monsters.0;
        let toggle = toggle_monster(&mut monsters, monster);

        let updated = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns SET monsters = $2, updated_at = now()
            WHERE id = $1
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(monsters))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((updated, toggle)))
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<Option<Campaign>, RepoError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "DELETE FROM campaigns WHERE id = $1 AND created_by = $2 RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(campaign)
    }
}
