use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// A creature entry on a campaign. Only `slug` and `name` are interpreted;
/// everything else the client sends is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub slug: String,
    pub name: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub monsters: Json<Vec<Monster>>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields a campaign update may replace; `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct CampaignChanges {
    pub name: Option<String>,
    pub monsters: Option<Vec<Monster>>,
}
