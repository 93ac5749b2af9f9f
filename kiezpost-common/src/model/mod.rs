pub mod auth;
pub mod post;
pub mod reaction;
pub mod reply;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError, post::InvalidPostKindError,
        reaction::InvalidReactionKindError, user::InvalidUsernameError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

/// A row read back from the store failed domain validation.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    PostKind(#[from] InvalidPostKindError),
    #[error(transparent)]
    ReactionKind(#[from] InvalidReactionKindError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct KiezpostEpoch;
impl Epoch for KiezpostEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type KiezpostSnowflake = Snowflake<KiezpostEpoch>;
pub type KiezpostSnowflakeGenerator = SnowflakeGenerator<KiezpostEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(KiezpostSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: KiezpostSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> KiezpostSnowflake {
        self.0
    }

    /// The creation time embedded in the id's snowflake.
    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        self.0.timestamp().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<KiezpostSnowflake> for Id<Marker> {
    fn from(value: KiezpostSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for KiezpostSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(KiezpostSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
