use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use kiezpost_common::model::{
    Id,
    post::{PartialPost, Post, PostContent, PostKind, PostMarker},
    reaction::{ReactionKind, ReactionOutcome},
    reply::PartialReply,
};
use kiezpost_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_posts)
        .typed_get(get_post)
        .typed_post(create_post)
        .typed_post(react_to_post)
        .typed_post(reply_to_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct GetPostsPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct FeedQuery {
    location: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl FeedQuery {
    // the web client sends empty strings for unset filters
    fn normalize(self) -> Result<(Option<String>, Option<PostKind>)> {
        let location = self.location.filter(|location| !location.is_empty());
        let kind = self
            .kind
            .filter(|kind| !kind.is_empty())
            .map(|kind| kind.parse::<PostKind>())
            .transpose()?;

        Ok((location, kind))
    }
}

async fn get_posts(
    GetPostsPath(): GetPostsPath,
    Query(query): Query<FeedQuery>,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Vec<Post>>> {
    let (location, kind) = query.normalize()?;

    let posts = db
        .fetch_posts(
            location.as_deref(),
            kind,
            viewer.map(AuthenticatedUser::user_id),
        )
        .await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id, viewer.map(AuthenticatedUser::user_id))
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<(StatusCode, Json<PartialPost>)> {
    if post.text.is_empty() {
        return Err(ServerError::EmptyField("text"));
    }
    if post.location.is_empty() {
        return Err(ServerError::EmptyField("location"));
    }

    let post = db.create_post(&post, user.user_id()).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/react", rejection(ServerError))]
struct ReactPath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
struct ReactRequest {
    #[serde(rename = "type")]
    kind: ReactionKind,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ReactResponse {
    outcome: ReactionOutcome,
    message: String,
}

async fn react_to_post(
    ReactPath { id }: ReactPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(reaction): Json<ReactRequest>,
) -> Result<Json<ReactResponse>> {
    let outcome = db
        .upsert_reaction(user.user_id(), id, reaction.kind)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    let message = match outcome {
        ReactionOutcome::Created => format!("Post {}d", reaction.kind),
        ReactionOutcome::Updated => format!("Reaction updated to {}", reaction.kind),
        ReactionOutcome::Unchanged => format!("Already reacted with {}", reaction.kind),
    };

    Ok(Json(ReactResponse { outcome, message }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/reply", rejection(ServerError))]
struct ReplyToPostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ReplyRequest {
    text: String,
}

async fn reply_to_post(
    ReplyToPostPath { id }: ReplyToPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(reply): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<PartialReply>)> {
    if reply.text.is_empty() {
        return Err(ServerError::EmptyField("text"));
    }

    let reply = db
        .create_reply(id, user.user_id(), &reply.text)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok((StatusCode::CREATED, Json(reply)))
}
