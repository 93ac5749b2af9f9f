use crate::record::{
    AuthenticationRecord, CredentialsRecord, FeedPostRecord, PartialPostRecord,
    PartialReplyRecord, ReplyRecord, UserRecord,
};
use kiezpost_common::model::{
    Id, KiezpostSnowflake, KiezpostSnowflakeGenerator, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    post::{PartialPost, Post, PostContent, PostKind, PostMarker},
    reaction::{ReactionKind, ReactionOutcome},
    reply::{PartialReply, Reply},
    user::{Profile, User, UserMarker, Username},
};
use kiezpost_common::snowflake::{ProcessId, WorkerId};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{collections::HashMap, sync::Mutex, time::Duration};
use thiserror::Error;
use time::{PrimitiveDateTime, UtcDateTime};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const USERNAME_UNIQUE: &str = "users_username_key";
const REPLIES_POST_FKEY: &str = "replies_post_snowflake_fkey";
const REACTIONS_POST_FKEY: &str = "reactions_post_snowflake_fkey";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The username is already taken")]
    UsernameTaken,
    #[error("Error running migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<KiezpostSnowflakeGenerator>,
}

impl DbClient {
    /// Connects with a bounded acquire timeout and brings the schema up to
    /// date before handing out the client.
    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(KiezpostSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    fn generate_snowflake(&self) -> KiezpostSnowflake {
        self.snowflake_generator
            .lock()
            .expect("Snowflake generator lock was poisoned")
            .generate()
    }

    pub async fn create_user(
        &self,
        username: &Username,
        password_hash: &str,
        bio: Option<&str>,
    ) -> Result<Id<UserMarker>> {
        let user_snowflake = self.generate_snowflake();

        let result = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO users.users (user_snowflake, username, password_hash, bio)
            VALUES ($1, $2, $3, $4)
            RETURNING user_snowflake
            ",
        )
        .bind(user_snowflake.get().cast_signed())
        .bind(username.get())
        .bind(password_hash)
        .bind(bio)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(returned_snowflake) => Ok(returned_snowflake.cast_unsigned().into()),
            Err(err) if is_unique_violation(&err, USERNAME_UNIQUE) => Err(DbError::UsernameTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_snowflake, username, bio
            FROM users.users
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    pub async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(Id<UserMarker>, String)>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "
            SELECT user_snowflake, password_hash
            FROM users.users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|record| (record.user_snowflake.cast_unsigned().into(), record.password_hash)))
    }

    /// Applies a partial profile edit. `None` fields keep their stored value.
    pub async fn update_user(
        &self,
        user_id: Id<UserMarker>,
        username: Option<&Username>,
        bio: Option<&str>,
    ) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, UserRecord>(
            "
            UPDATE users.users
            SET username = COALESCE($2, username), bio = COALESCE($3, bio)
            WHERE user_snowflake = $1
            RETURNING user_snowflake, username, bio
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .bind(username.map(Username::get))
        .bind(bio)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.map(User::try_from).transpose()?),
            Err(err) if is_unique_violation(&err, USERNAME_UNIQUE) => Err(DbError::UsernameTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn fetch_profile(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>> {
        let Some(user) = self.fetch_user(user_id).await? else {
            return Ok(None);
        };

        let records = sqlx::query_as::<_, PartialPostRecord>(
            "
            SELECT post_snowflake, user_snowflake, body, kind, location
            FROM posts.posts
            WHERE user_snowflake = $1
            ORDER BY post_snowflake DESC
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(PartialPost::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Some(Profile {
            username: user.username,
            bio: user.bio,
            posts,
        }))
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO auth.tokens (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.as_bytes())
        .bind(authentication.user.snowflake().get().cast_signed())
        .bind(to_primitive(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = sqlx::query_as::<_, AuthenticationRecord>(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM auth.tokens
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Authentication::try_from).transpose()?)
    }

    pub async fn create_post(
        &self,
        post: &PostContent,
        author: Id<UserMarker>,
    ) -> Result<PartialPost> {
        let post_snowflake = self.generate_snowflake();

        let record = sqlx::query_as::<_, PartialPostRecord>(
            "
            INSERT INTO posts.posts (post_snowflake, user_snowflake, body, kind, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_snowflake, user_snowflake, body, kind, location
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(author.snowflake().get().cast_signed())
        .bind(&post.text)
        .bind(post.kind.as_str())
        .bind(&post.location)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    /// The feed: posts joined with their authors, reaction counts, the
    /// viewer's own reaction, and replies. Newest first.
    pub async fn fetch_posts(
        &self,
        location: Option<&str>,
        kind: Option<PostKind>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Vec<Post>> {
        let records = sqlx::query_as::<_, FeedPostRecord>(FEED_QUERY)
            .bind(location)
            .bind(kind.map(PostKind::as_str))
            .bind(viewer.map(|viewer| viewer.snowflake().get().cast_signed()))
            .bind(None::<i64>)
            .fetch_all(&self.pool)
            .await?;

        self.attach_replies(records).await
    }

    pub async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Post>> {
        let record = sqlx::query_as::<_, FeedPostRecord>(FEED_QUERY)
            .bind(None::<&str>)
            .bind(None::<&str>)
            .bind(viewer.map(|viewer| viewer.snowflake().get().cast_signed()))
            .bind(Some(post_id.snowflake().get().cast_signed()))
            .fetch_optional(&self.pool)
            .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let mut posts = self.attach_replies(vec![record]).await?;
        Ok(posts.pop())
    }

    async fn attach_replies(&self, records: Vec<FeedPostRecord>) -> Result<Vec<Post>> {
        let post_snowflakes: Vec<i64> = records.iter().map(|record| record.post_snowflake).collect();

        let reply_records = sqlx::query_as::<_, ReplyRecord>(
            "
            SELECT reply_snowflake, post_snowflake, user_snowflake, username, body
            FROM posts.replies NATURAL JOIN users.users
            WHERE post_snowflake = ANY($1)
            ORDER BY reply_snowflake
            ",
        )
        .bind(&post_snowflakes)
        .fetch_all(&self.pool)
        .await?;

        let mut replies_by_post: HashMap<i64, Vec<Reply>> = HashMap::new();
        for record in reply_records {
            let post_snowflake = record.post_snowflake;
            replies_by_post
                .entry(post_snowflake)
                .or_default()
                .push(record.try_into()?);
        }

        records
            .into_iter()
            .map(|record| {
                let replies = replies_by_post
                    .remove(&record.post_snowflake)
                    .unwrap_or_default();
                record.into_post(replies).map_err(DbError::from)
            })
            .collect()
    }

    /// Replies for one post, oldest first. `None` if the post does not exist.
    pub async fn fetch_replies(&self, post_id: Id<PostMarker>) -> Result<Option<Vec<Reply>>> {
        let post_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts.posts WHERE post_snowflake = $1)",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .fetch_one(&self.pool)
        .await?;

        if !post_exists {
            return Ok(None);
        }

        let records = sqlx::query_as::<_, ReplyRecord>(
            "
            SELECT reply_snowflake, post_snowflake, user_snowflake, username, body
            FROM posts.replies NATURAL JOIN users.users
            WHERE post_snowflake = $1
            ORDER BY reply_snowflake
            ",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let replies = records
            .into_iter()
            .map(Reply::try_from)
            .collect::<Result<_, ModelValidationError>>()?;

        Ok(Some(replies))
    }

    /// Stores a reply under a post. `None` if the post does not exist.
    pub async fn create_reply(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &str,
    ) -> Result<Option<PartialReply>> {
        let reply_snowflake = self.generate_snowflake();

        let result = sqlx::query_as::<_, PartialReplyRecord>(
            "
            INSERT INTO posts.replies (reply_snowflake, post_snowflake, user_snowflake, body)
            VALUES ($1, $2, $3, $4)
            RETURNING reply_snowflake, post_snowflake, user_snowflake, body
            ",
        )
        .bind(reply_snowflake.get().cast_signed())
        .bind(post_id.snowflake().get().cast_signed())
        .bind(author.snowflake().get().cast_signed())
        .bind(text)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(Some(record.into())),
            Err(err) if is_foreign_key_violation(&err, REPLIES_POST_FKEY) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a reaction through the composite-key upsert. A single
    /// conditional statement, so there is no window between existence check
    /// and write. `None` if the post does not exist.
    pub async fn upsert_reaction(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
        kind: ReactionKind,
    ) -> Result<Option<ReactionOutcome>> {
        let result = sqlx::query_scalar::<_, bool>(
            "
            INSERT INTO posts.reactions (user_snowflake, post_snowflake, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_snowflake, post_snowflake)
            DO UPDATE SET kind = excluded.kind
            WHERE reactions.kind IS DISTINCT FROM excluded.kind
            RETURNING (xmax = 0) AS created
            ",
        )
        .bind(user.snowflake().get().cast_signed())
        .bind(post.snowflake().get().cast_signed())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(true)) => Ok(Some(ReactionOutcome::Created)),
            Ok(Some(false)) => Ok(Some(ReactionOutcome::Updated)),
            // the conditional update matched nothing: same kind already stored
            Ok(None) => Ok(Some(ReactionOutcome::Unchanged)),
            Err(err) if is_foreign_key_violation(&err, REACTIONS_POST_FKEY) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

const FEED_QUERY: &str = "
    SELECT
        posts.post_snowflake,
        posts.body,
        posts.kind,
        posts.location,
        users.user_snowflake,
        users.username,
        COUNT(*) FILTER (WHERE reactions.kind = 'like') AS likes,
        COUNT(*) FILTER (WHERE reactions.kind = 'dislike') AS dislikes,
        MAX(reactions.kind) FILTER (WHERE reactions.user_snowflake = $3) AS viewer_kind
    FROM
        posts.posts
        NATURAL JOIN users.users
        LEFT JOIN posts.reactions ON reactions.post_snowflake = posts.post_snowflake
    WHERE
        ($1::text IS NULL OR position(lower($1) IN lower(posts.location)) > 0)
        AND ($2::text IS NULL OR posts.kind = $2)
        AND ($4::bigint IS NULL OR posts.post_snowflake = $4)
    GROUP BY
        posts.post_snowflake, users.user_snowflake
    ORDER BY
        posts.post_snowflake DESC
";

fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
    )
}

fn is_foreign_key_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_foreign_key_violation() && db_err.constraint() == Some(constraint)
    )
}
