use kiezpost_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, AuthTokenHash},
    post::{PartialPost, Post, PostMarker},
    reply::{PartialReply, Reply},
    user::{Author, User, Username},
};
use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub bio: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PartialPostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub body: String,
    pub kind: String,
    pub location: String,
}

/// One row of the feed query: a post joined with its author and aggregated
/// over its reactions. `viewer_kind` is the requesting user's own reaction,
/// if any was asked for.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct FeedPostRecord {
    pub post_snowflake: i64,
    pub body: String,
    pub kind: String,
    pub location: String,
    pub user_snowflake: i64,
    pub username: String,
    pub likes: i64,
    pub dislikes: i64,
    pub viewer_kind: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct ReplyRecord {
    pub reply_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub username: String,
    pub body: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PartialReplyRecord {
    pub reply_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub body: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            username: Username::new(value.username)?,
            bio: value.bio,
        })
    }
}

impl TryFrom<PartialPostRecord> for PartialPost {
    type Error = ModelValidationError;

    fn try_from(value: PartialPostRecord) -> Result<Self, Self::Error> {
        let id: Id<PostMarker> = value.post_snowflake.cast_unsigned().into();

        Ok(Self {
            id,
            author_id: value.user_snowflake.cast_unsigned().into(),
            text: value.body,
            kind: value.kind.parse()?,
            location: value.location,
            created_at: id.created_at(),
        })
    }
}

impl FeedPostRecord {
    pub(crate) fn into_post(self, replies: Vec<Reply>) -> Result<Post, ModelValidationError> {
        let id: Id<PostMarker> = self.post_snowflake.cast_unsigned().into();

        Ok(Post {
            id,
            author: Author {
                id: self.user_snowflake.cast_unsigned().into(),
                username: Username::new(self.username)?,
            },
            text: self.body,
            kind: self.kind.parse()?,
            location: self.location,
            created_at: id.created_at(),
            replies,
            likes: self.likes.cast_unsigned(),
            dislikes: self.dislikes.cast_unsigned(),
            user_reaction: self.viewer_kind.as_deref().map(str::parse).transpose()?,
        })
    }
}

impl TryFrom<ReplyRecord> for Reply {
    type Error = ModelValidationError;

    fn try_from(value: ReplyRecord) -> Result<Self, Self::Error> {
        let id: Id<_> = value.reply_snowflake.cast_unsigned().into();

        Ok(Self {
            id,
            post: value.post_snowflake.cast_unsigned().into(),
            author: Author {
                id: value.user_snowflake.cast_unsigned().into(),
                username: Username::new(value.username)?,
            },
            text: value.body,
            created_at: id.created_at(),
        })
    }
}

impl From<PartialReplyRecord> for PartialReply {
    fn from(value: PartialReplyRecord) -> Self {
        let id: Id<_> = value.reply_snowflake.cast_unsigned().into();

        Self {
            id,
            post: value.post_snowflake.cast_unsigned().into(),
            author_id: value.user_snowflake.cast_unsigned().into(),
            text: value.body,
            created_at: id.created_at(),
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            token_hash: AuthTokenHash::try_from(value.token_hash.into_boxed_slice())?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{
        AuthenticationRecord, FeedPostRecord, PartialPostRecord, ReplyRecord, UserRecord,
    };
    use kiezpost_common::model::{
        ModelValidationError,
        auth::Authentication,
        post::{PartialPost, Post, PostKind},
        reaction::ReactionKind,
        reply::Reply,
        user::User,
    };
    use time::macros::datetime;

    #[test]
    fn user_record_converts() {
        let user = User::try_from(UserRecord {
            user_snowflake: 5,
            username: "alice".to_owned(),
            bio: None,
        })
        .unwrap();

        assert_eq!(u64::from(user.id), 5);
        assert_eq!(user.username.get(), "alice");

        let invalid = User::try_from(UserRecord {
            user_snowflake: 5,
            username: String::new(),
            bio: None,
        });
        assert!(matches!(invalid, Err(ModelValidationError::Username(_))));
    }

    #[test]
    fn partial_post_record_converts() {
        let record = PartialPostRecord {
            post_snowflake: 10,
            user_snowflake: 5,
            body: "hi".to_owned(),
            kind: "help".to_owned(),
            location: "NYC".to_owned(),
        };

        let post = PartialPost::try_from(record.clone()).unwrap();
        assert_eq!(post.kind, PostKind::Help);
        assert_eq!(post.text, "hi");
        assert_eq!(post.created_at, post.id.created_at());

        let invalid = PartialPost::try_from(PartialPostRecord {
            kind: "banana".to_owned(),
            ..record
        });
        assert!(matches!(invalid, Err(ModelValidationError::PostKind(_))));
    }

    #[test]
    fn feed_record_carries_counts_and_viewer_reaction() {
        let record = FeedPostRecord {
            post_snowflake: 10,
            body: "hi".to_owned(),
            kind: "update".to_owned(),
            location: "east london".to_owned(),
            user_snowflake: 5,
            username: "alice".to_owned(),
            likes: 3,
            dislikes: 1,
            viewer_kind: Some("dislike".to_owned()),
        };

        let post: Post = record.clone().into_post(Vec::new()).unwrap();
        assert_eq!(post.likes, 3);
        assert_eq!(post.dislikes, 1);
        assert_eq!(post.user_reaction, Some(ReactionKind::Dislike));
        assert_eq!(post.author.username.get(), "alice");

        let anonymous = FeedPostRecord {
            viewer_kind: None,
            ..record.clone()
        };
        assert_eq!(
            anonymous.into_post(Vec::new()).unwrap().user_reaction,
            None
        );

        let corrupt = FeedPostRecord {
            viewer_kind: Some("meh".to_owned()),
            ..record
        };
        assert!(matches!(
            corrupt.into_post(Vec::new()),
            Err(ModelValidationError::ReactionKind(_))
        ));
    }

    #[test]
    fn reply_record_converts() {
        let reply = Reply::try_from(ReplyRecord {
            reply_snowflake: 20,
            post_snowflake: 10,
            user_snowflake: 5,
            username: "bob".to_owned(),
            body: "nice!".to_owned(),
        })
        .unwrap();

        assert_eq!(u64::from(reply.post), 10);
        assert_eq!(reply.author.username.get(), "bob");
        assert_eq!(reply.created_at, reply.id.created_at());
    }

    #[test]
    fn authentication_record_converts() {
        let record = AuthenticationRecord {
            user_snowflake: 5,
            token_hash: vec![0; 32],
            created_at: datetime!(2025-03-01 12:00),
            expires_after_seconds: Some(3600),
        };

        let authentication = Authentication::try_from(record.clone()).unwrap();
        assert_eq!(u64::from(authentication.user), 5);
        assert_eq!(
            authentication.expires_after.unwrap().get().whole_seconds(),
            3600
        );

        let bad_hash = AuthenticationRecord {
            token_hash: vec![0; 3],
            ..record.clone()
        };
        assert!(matches!(
            Authentication::try_from(bad_hash),
            Err(ModelValidationError::TokenHash(_))
        ));

        let bad_expiry = AuthenticationRecord {
            expires_after_seconds: Some(0),
            ..record
        };
        assert!(matches!(
            Authentication::try_from(bad_expiry),
            Err(ModelValidationError::NonPositiveDuration(_))
        ));
    }
}
