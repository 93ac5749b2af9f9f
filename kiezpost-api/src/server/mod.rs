use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use kiezpost_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
    post::{InvalidPostKindError, PostMarker},
    user::{InvalidUsernameError, UserMarker},
};
use kiezpost_db::client::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Unknown username or wrong password")]
    WrongCredentials,
    #[error("Password could not be processed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error("Only the profile owner may edit it")]
    NotProfileOwner,
    #[error("The {0} field must not be empty")]
    EmptyField(&'static str),
    #[error(transparent)]
    InvalidUsername(#[from] InvalidUsernameError),
    #[error(transparent)]
    InvalidPostKind(#[from] InvalidPostKindError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::WrongCredentials => StatusCode::UNAUTHORIZED,
            ServerError::NotProfileOwner => StatusCode::FORBIDDEN,
            ServerError::Database(DbError::UsernameTaken) => StatusCode::CONFLICT,
            ServerError::JsonRejection(_)
            | ServerError::EmptyField(_)
            | ServerError::InvalidUsername(_)
            | ServerError::InvalidPostKind(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use kiezpost_common::model::user::Username;
    use kiezpost_db::client::DbError;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            ServerError::InvalidToken.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::WrongCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ServerError::NotProfileOwner.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServerError::PostByIdNotFound(1_u64.into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::EmptyField("text").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Database(DbError::UsernameTaken).status(),
            StatusCode::CONFLICT
        );

        let invalid_row = Username::new(String::new()).unwrap_err();
        assert_eq!(
            ServerError::Database(DbError::Data(invalid_row.into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
