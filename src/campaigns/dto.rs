use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{Campaign, Monster};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateCampaignRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub monsters: Option<Vec<Monster>>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleMonsterRequest {
    pub monster: Monster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignQuery {
    pub id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CampaignsResponse {
    One(Campaign),
    Many(Vec<Campaign>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCampaignResponse {
    pub new_campaign: Campaign,
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UpdatedCampaignResponse {
    pub updated: Campaign,
    pub success: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedCampaignResponse {
    pub deleted: Campaign,
    pub success: &'static str,
}
