use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use kiezpost_common::model::{Id, auth::AuthToken, user::UserMarker};
use kiezpost_db::client::DbClient;
use std::sync::Arc;
use time::UtcDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The verified subject of the request's bearer token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }

    async fn verify<S>(token: &str, state: &S) -> Result<Self, ServerError>
    where
        Arc<DbClient>: FromRef<S>,
    {
        let request_token: AuthToken = token.parse()?;
        let token_hash = request_token.hash()?;

        let authentication = Arc::<DbClient>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        // the hash only covers core and salt, so the embedded user id has
        // to be checked against the stored owner
        if authentication.user != request_token.user_id {
            return Err(ServerError::InvalidToken);
        }

        if authentication.is_expired_at(UtcDateTime::now()) {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
        })
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        Self::verify(header.token(), state).await
    }
}

/// Routes that work for anonymous callers but enrich their response for
/// known ones extract `Option<AuthenticatedUser>`: a missing header is
/// anonymous, a present but bad token is still an error.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(header) => Self::verify(header.token(), state).await.map(Some),
            Err(rejection) if rejection.is_missing() => Ok(None),
            Err(rejection) => Err(ServerError::InvalidAuthorizationHeader(rejection)),
        }
    }
}
