use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::dto::PublicUser;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub id: Option<Uuid>,
}

/// Every field is optional; omitted ones keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub handle: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UsersResponse {
    One(PublicUser),
    Many(Vec<PublicUser>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedUserResponse {
    pub updated_user: PublicUser,
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfilePicResponse {
    pub user: PublicUser,
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub deleted: PublicUser,
    pub success: &'static str,
}
