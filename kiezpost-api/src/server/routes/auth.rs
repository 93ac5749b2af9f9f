use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use kiezpost_common::{
    model::{
        Id,
        auth::{AuthToken, Authentication, LoginRequest, SignupRequest},
        user::UserMarker,
    },
    util::PositiveDuration,
};
use kiezpost_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, UtcDateTime};

/// Sessions are valid this long after signup or login.
const TOKEN_TTL_DAYS: i64 = 30;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(signup).typed_post(login)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup", rejection(ServerError))]
struct SignupPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct TokenResponse {
    token: String,
}

async fn signup(
    SignupPath(): SignupPath,
    State(db): State<Arc<DbClient>>,
    Json(signup): Json<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    let password_hash = signup.password.hash()?;
    let bio = signup.bio.filter(|bio| !bio.is_empty());

    let user_id = db
        .create_user(&signup.username, &password_hash, bio.as_deref())
        .await?;
    let token = issue_token(&db, user_id).await?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    Json(login): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let (user_id, password_hash) = db
        .fetch_credentials(&login.username)
        .await?
        .ok_or(ServerError::WrongCredentials)?;

    if !login.password.verify(&password_hash)? {
        return Err(ServerError::WrongCredentials);
    }

    let token = issue_token(&db, user_id).await?;

    Ok(Json(TokenResponse { token }))
}

async fn issue_token(db: &DbClient, user_id: Id<UserMarker>) -> Result<String> {
    let token = AuthToken::generate_random(user_id);

    let authentication = Authentication {
        user: user_id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: Some(PositiveDuration::new_unchecked(Duration::days(
            TOKEN_TTL_DAYS,
        ))),
    };
    db.create_auth(&authentication).await?;

    Ok(token.as_token_str())
}
