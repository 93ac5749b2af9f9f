use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use kiezpost_common::model::{
    Id,
    post::PostMarker,
    reply::{PartialReply, Reply, ReplyContent},
};
use kiezpost_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_reply)
        .typed_get(get_replies)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/reply/create", rejection(ServerError))]
struct CreateReplyPath();

async fn create_reply(
    CreateReplyPath(): CreateReplyPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(reply): Json<ReplyContent>,
) -> Result<(StatusCode, Json<PartialReply>)> {
    if reply.text.is_empty() {
        return Err(ServerError::EmptyField("text"));
    }

    let created = db
        .create_reply(reply.post, user.user_id(), &reply.text)
        .await?
        .ok_or(ServerError::PostByIdNotFound(reply.post))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/reply/{post_id}", rejection(ServerError))]
struct GetRepliesPath {
    post_id: Id<PostMarker>,
}

async fn get_replies(
    GetRepliesPath { post_id }: GetRepliesPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Reply>>> {
    let replies = db
        .fetch_replies(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    Ok(Json(replies))
}
