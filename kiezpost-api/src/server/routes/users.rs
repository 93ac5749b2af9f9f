use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use kiezpost_common::model::{
    Id,
    user::{Profile, ProfileUpdate, User, UserMarker, Username},
};
use kiezpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_put(update_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Profile>> {
    let profile = db
        .fetch_profile(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UpdateUserPath {
    id: Id<UserMarker>,
}

async fn update_user(
    UpdateUserPath { id }: UpdateUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    if user.user_id() != id {
        return Err(ServerError::NotProfileOwner);
    }

    // empty strings leave the stored value unchanged, like absent fields
    let username = update
        .username
        .filter(|username| !username.is_empty())
        .map(Username::new)
        .transpose()?;
    let bio = update.bio.filter(|bio| !bio.is_empty());

    let updated = db
        .update_user(id, username.as_ref(), bio.as_deref())
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(updated))
}
