//! Profile endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{AppJson, CurrentUser};
use crate::domain::aggregates::Profile;
use crate::error::Result;
use crate::services::ProfileUpdate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView { pub full_name: String, pub email: String, pub phone: String }

impl From<Profile> for ProfileView {
    fn from(p: Profile) -> Self { Self { full_name: p.full_name, email: p.email, phone: p.phone } }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[validate(length(max = 256))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: String,
}

pub async fn get_profile(State(s): State<AppState>, CurrentUser(who): CurrentUser) -> Result<Json<ProfileView>> {
    Ok(Json(s.profiles.get(who).await?.into()))
}

pub async fn update_profile(State(s): State<AppState>, CurrentUser(who): CurrentUser, AppJson(r): AppJson<ProfileRequest>) -> Result<Json<ProfileView>> {
    r.validate()?;
    let update = ProfileUpdate { full_name: r.full_name, email: r.email, phone: r.phone };
    Ok(Json(s.profiles.update(who, update).await?.into()))
}
