use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// A user's vote on a post. At most one per (user, post) pair.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl Display for ReactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unrecognized reaction type: {0:?}")]
pub struct InvalidReactionKindError(String);

impl FromStr for ReactionKind {
    type Err = InvalidReactionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            _ => Err(InvalidReactionKindError(s.to_owned())),
        }
    }
}

/// Which branch a reaction write took: a net new vote, a flip to the other
/// kind, or a repeat of the current kind (left untouched).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionOutcome {
    Created,
    Updated,
    Unchanged,
}

#[cfg(test)]
mod tests {
    use crate::model::reaction::{ReactionKind, ReactionOutcome};

    #[test]
    fn reaction_kind_parses() {
        assert_eq!("like".parse::<ReactionKind>().unwrap(), ReactionKind::Like);
        assert_eq!(
            "dislike".parse::<ReactionKind>().unwrap(),
            ReactionKind::Dislike
        );
        assert!("meh".parse::<ReactionKind>().is_err());
    }

    #[test]
    fn wire_values_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReactionKind::Dislike).unwrap(),
            "\"dislike\""
        );
        assert_eq!(
            serde_json::to_string(&ReactionOutcome::Unchanged).unwrap(),
            "\"unchanged\""
        );
        assert_eq!(
            serde_json::from_str::<ReactionKind>("\"like\"").unwrap(),
            ReactionKind::Like
        );
    }
}
