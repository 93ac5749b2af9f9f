use crate::model::{
    Id,
    reaction::ReactionKind,
    reply::Reply,
    user::{Author, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// The category a post is filed under.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Recommend,
    Help,
    Update,
    Event,
}

impl PostKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Recommend => "recommend",
            PostKind::Help => "help",
            PostKind::Update => "update",
            PostKind::Event => "event",
        }
    }
}

impl Display for PostKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unrecognized post type: {0:?}")]
pub struct InvalidPostKindError(String);

impl FromStr for PostKind {
    type Err = InvalidPostKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommend" => Ok(PostKind::Recommend),
            "help" => Ok(PostKind::Help),
            "update" => Ok(PostKind::Update),
            "event" => Ok(PostKind::Event),
            _ => Err(InvalidPostKindError(s.to_owned())),
        }
    }
}

/// A feed post with everything the client renders: author, replies,
/// aggregated reaction counts, and the viewer's own reaction if known.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    #[serde(rename = "user")]
    pub author: Author,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub location: String,
    pub created_at: UtcDateTime,
    pub replies: Vec<Reply>,
    pub likes: u64,
    pub dislikes: u64,
    pub user_reaction: Option<ReactionKind>,
}

/// A post without its feed enrichment, as returned from creation and on
/// profile pages.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    #[serde(rename = "userId")]
    pub author_id: Id<UserMarker>,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub location: String,
    pub created_at: UtcDateTime,
}

/// Post creation request.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PostContent {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use crate::model::post::{PartialPost, PostContent, PostKind};
    use serde_json::json;

    #[test]
    fn post_kind_parses_all_categories() {
        for (text, kind) in [
            ("recommend", PostKind::Recommend),
            ("help", PostKind::Help),
            ("update", PostKind::Update),
            ("event", PostKind::Event),
        ] {
            assert_eq!(text.parse::<PostKind>().unwrap(), kind);
            assert_eq!(kind.as_str(), text);
        }

        assert!("banana".parse::<PostKind>().is_err());
        assert!("Help".parse::<PostKind>().is_err());
    }

    #[test]
    fn post_content_uses_the_wire_field_names() {
        let content: PostContent = serde_json::from_value(json!({
            "text": "hi",
            "type": "update",
            "location": "NYC",
        }))
        .unwrap();

        assert_eq!(content.kind, PostKind::Update);
        assert!(serde_json::from_value::<PostContent>(json!({
            "text": "hi",
            "type": "banana",
            "location": "NYC",
        }))
        .is_err());
    }

    #[test]
    fn partial_post_serializes_camel_case() {
        let id: crate::model::Id<crate::model::post::PostMarker> = 1_u64.into();
        let post = PartialPost {
            id,
            author_id: 2_u64.into(),
            text: "hi".to_owned(),
            kind: PostKind::Event,
            location: "east london".to_owned(),
            created_at: id.created_at(),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["userId"], 2);
        assert_eq!(value["type"], "event");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
    }
}
