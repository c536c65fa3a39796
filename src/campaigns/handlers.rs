use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        CampaignQuery, CampaignsResponse, CreateCampaignRequest, CreatedCampaignResponse,
        DeletedCampaignResponse, ToggleMonsterRequest, UpdateCampaignRequest,
        UpdatedCampaignResponse,
    },
    repo_types::CampaignChanges,
    services::toggle_message,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
    validators::{validate_campaign, validate_campaign_update, FieldErrors},
};

pub fn campaign_routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/:campaign_id",
            put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/:campaign_id/monsters", put(toggle_campaign_monster))
}

#[instrument(skip(state, payload))]
pub async fn create_campaign(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<CreateCampaignRequest>,
) -> AppResult<Json<CreatedCampaignResponse>> {
    validate_campaign(&payload)?;

    let campaign = state.campaigns.create(payload.name.trim(), user_id).await?;

    info!(campaign_id = %campaign.id, %user_id, "campaign created");
    Ok(Json(CreatedCampaignResponse {
        new_campaign: campaign,
        success: "Campaign created successfully!",
    }))
}

#[instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<CampaignQuery>,
) -> AppResult<Json<CampaignsResponse>> {
    let response = if let Some(owner) = q.created_by {
        CampaignsResponse::Many(state.campaigns.list_by_owners(&[owner]).await?)
    } else if let Some(id) = q.id {
        let campaign = state
            .campaigns
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("campaign"))?;
        CampaignsResponse::One(campaign)
    } else {
        CampaignsResponse::Many(state.campaigns.list_all().await?)
    };
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn update_campaign(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateCampaignRequest>,
) -> AppResult<Json<UpdatedCampaignResponse>> {
    validate_campaign_update(&payload)?;

    let changes = CampaignChanges {
        name: payload.name.map(|n| n.trim().to_string()),
        monsters: payload.monsters,
    };
    let updated = state
        .campaigns
        .update(campaign_id, user_id, changes)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    Ok(Json(UpdatedCampaignResponse {
        updated,
        success: "Campaign updated successfully!".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn toggle_campaign_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<Uuid>,
    JsonBody(payload): JsonBody<ToggleMonsterRequest>,
) -> AppResult<Json<UpdatedCampaignResponse>> {
    if payload.monster.slug.trim().is_empty() {
        return Err(FieldErrors::single("monster", "Monster needs a slug!").into());
    }
    if payload.monster.name.trim().is_empty() {
        return Err(FieldErrors::single("monster", "Monster needs a name!").into());
    }

    let monster_name = payload.monster.name.clone();
    let (updated, toggle) = state
        .campaigns
        .toggle_monster(campaign_id, user_id, payload.monster)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    info!(%campaign_id, ?toggle, "campaign monsters toggled");
    let success = toggle_message(toggle, &monster_name, &updated.name);
    Ok(Json(UpdatedCampaignResponse { updated, success }))
}

#[instrument(skip(state))]
pub async fn delete_campaign(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(campaign_id): Path<Uuid>,
) -> AppResult<Json<DeletedCampaignResponse>> {
    let deleted = state
        .campaigns
        .delete(campaign_id, user_id)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    info!(%campaign_id, %user_id, "campaign deleted");
    Ok(Json(DeletedCampaignResponse {
        deleted,
        success: "Campaign deleted successfully!",
    }))
}
