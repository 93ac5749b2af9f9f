use crate::model::{
    Id,
    post::PostMarker,
    user::{Author, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ReplyMarker;

/// A reply as listed under a post, enriched with its author.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: Id<ReplyMarker>,
    #[serde(rename = "postId")]
    pub post: Id<PostMarker>,
    #[serde(rename = "user")]
    pub author: Author,
    pub text: String,
    pub created_at: UtcDateTime,
}

/// A reply as returned from creation, before author enrichment.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialReply {
    pub id: Id<ReplyMarker>,
    #[serde(rename = "postId")]
    pub post: Id<PostMarker>,
    #[serde(rename = "userId")]
    pub author_id: Id<UserMarker>,
    pub text: String,
    pub created_at: UtcDateTime,
}

/// Reply creation request for the standalone reply route.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ReplyContent {
    #[serde(rename = "postId")]
    pub post: Id<PostMarker>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use crate::model::reply::ReplyContent;
    use serde_json::json;

    #[test]
    fn reply_content_uses_the_wire_field_names() {
        let content: ReplyContent = serde_json::from_value(json!({
            "postId": 7,
            "text": "nice!",
        }))
        .unwrap();

        assert_eq!(u64::from(content.post), 7);
        assert_eq!(content.text, "nice!");
    }
}
