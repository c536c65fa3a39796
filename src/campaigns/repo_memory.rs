use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    repo::CampaignRepo,
    repo_types::{Campaign, CampaignChanges, Monster},
    services::{toggle_monster, MonsterToggle},
};
use crate::db::{RepoError, UniqueField};

/// Process-local campaign store. One lock covers every operation, standing in
/// for the name constraint and the row lock the database provides.
#[derive(Default)]
pub struct MemoryCampaignRepo {
    campaigns: Mutex<Vec<Campaign>>,
}

impl MemoryCampaignRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_name(campaigns: &[Campaign], skip: Option<Uuid>, name: &str) -> Result<(), RepoError> {
    if campaigns
        .iter()
        .any(|c| Some(c.id) != skip && c.name == name)
    {
        return Err(RepoError::Duplicate(UniqueField::CampaignName));
    }
    Ok(())
}

#[async_trait]
impl CampaignRepo for MemoryCampaignRepo {
    async fn create(&self, name: &str, created_by: Uuid) -> Result<Campaign, RepoError> {
        let mut campaigns = self.campaigns.lock().await;
        check_name(&campaigns, None, name)?;

        let now = OffsetDateTime::now_utc();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: name.to_string(),
            monsters: Json(Vec::new()),
            created_by,
            created_at: now,
            updated_at: now,
        };
        campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, RepoError> {
        let campaigns = self.campaigns.lock().await;
        Ok(campaigns.iter().find(|c| c.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Campaign>, RepoError> {
        Ok(self.campaigns.lock().await.clone())
    }

    async fn list_by_owners(&self, owners: &[Uuid]) -> Result<Vec<Campaign>, RepoError> {
        let campaigns = self.campaigns.lock().await;
        Ok(campaigns
            .iter()
            .filter(|c| owners.contains(&c.created_by))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: CampaignChanges,
    ) -> Result<Option<Campaign>, RepoError> {
        let mut campaigns = self.campaigns.lock().await;
        if let Some(name) = changes.name.as_deref() {
            check_name(&campaigns, Some(id), name)?;
        }

        let Some(campaign) = campaigns
            .iter_mut()
            .find(|c| c.id == id && c.created_by == owner)
        else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            campaign.name = name;
        }
        if let Some(monsters) = changes.monsters {
            campaign.monsters = Json(monsters);
        }
        campaign.updated_at = OffsetDateTime::now_utc();
        Ok(Some(campaign.clone()))
    }

    async fn toggle_monster(
        &self,
        id: Uuid,
        owner: Uuid,
        monster: Monster,
    ) -> Result<Option<(Campaign, MonsterToggle)>, RepoError> {
        let mut campaigns = self.campaigns.lock().await;
        Ok(campaigns
            .iter_mut()
            .find(|c| c.id == id && c.created_by == owner)
            .map(|campaign| {
                let toggle = toggle_monster(&mut campaign.monsters.0, monster);
                campaign.updated_at = OffsetDateTime::now_utc();
                (campaign.clone(), toggle)
            }))
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<Option<Campaign>, RepoError> {
        let mut campaigns = self.campaigns.lock().await;
        Ok(campaigns
            .iter()
            .position(|c| c.id == id && c.created_by == owner)
            .map(|pos| campaigns.remove(pos)))
    }
}
