use crate::model::{Id, post::PartialPost};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A stored user, minus credential material.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub bio: Option<String>,
}

/// The public identity embedded in posts and replies.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Author {
    pub id: Id<UserMarker>,
    pub username: Username,
}

/// The public profile page: the user's fields plus everything they posted.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Profile {
    pub username: Username,
    pub bio: Option<String>,
    pub posts: Vec<PartialPost>,
}

/// Profile edit request. Fields that are absent or empty leave the stored
/// value unchanged, so the raw strings are validated by the handler.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0:?}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
            Err(InvalidUsernameError(username))
        } else {
            Ok(Username(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{USERNAME_MAX_LEN, Username};

    #[test]
    fn username_rejects_empty() {
        assert!(Username::new(String::new()).is_err());
        assert!(Username::new("alice".to_owned()).is_ok());
    }

    #[test]
    fn username_rejects_overlong() {
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn username_validates_on_deserialize() {
        assert!(serde_json::from_str::<Username>("\"alice\"").is_ok());
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }
}
