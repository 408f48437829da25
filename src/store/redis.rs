//! The production [`Store`]: documents in redis.
//!
/*
Schema overview

chirp:users:records        list of {User Record} blobs, registration order
chirp:users:avatars        hash of username -> avatar URL
chirp:tweet:{TWEET_ID}:blob {Tweet Record}
chirp:tweets:ids           set of tweet IDs
chirp:tweets:next-id       id counter (INCR)

Records are packed with MessagePack. The avatars hash is an index over the
registration log: it answers the existence check on tweet creation and
feeds the list-time join, and under duplicate registrations the latest
write wins. Tweet blobs don't include their own id; the id lives in the
key and in the membership set.
*/

use std::collections::HashMap;

use itertools::Itertools as _;
use redis::{self, aio::MultiplexedConnection, ErrorKind as RedisErrorKind, RedisError};
use url::Url;

use super::{Store, StoreError, TweetId, TweetRecord, UserRecord};

mod schema {
    use std::fmt::Display;

    use lazy_format::lazy_format;

    pub const USER_RECORDS: &str = "chirp:users:records";
    pub const USER_AVATARS: &str = "chirp:users:avatars";
    pub const TWEET_IDS: &str = "chirp:tweets:ids";
    pub const TWEET_COUNTER: &str = "chirp:tweets:next-id";

    pub fn tweet_blob_key(tweet_id: impl Display) -> impl Display {
        lazy_format!("chirp:tweet:{}:blob", tweet_id)
    }
}

/// A handle on the redis-backed document store. Cheap to clone; all clones
/// share one multiplexed connection, so every handler can hold its own
/// handle without a pool.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Open the shared connection. Called once at process start; the
    /// returned handle is what gets injected into the route filters.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let blob = rmp_serde::to_vec(user)?;

        // One pipeline: append the registration record and refresh the
        // avatar index. Not transactional, but both writes are idempotent
        // with respect to the index's last-write-wins contract.
        let mut conn = self.conn.clone();
        redis::pipe()
            .rpush(schema::USER_RECORDS, blob)
            .ignore()
            .hset(schema::USER_AVATARS, &user.username, user.avatar.as_str())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists = redis::cmd("HEXISTS")
            .arg(schema::USER_AVATARS)
            .arg(username)
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn avatars(&self) -> Result<HashMap<String, Url>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(schema::USER_AVATARS)
            .query_async(&mut conn)
            .await?;

        raw.into_iter()
            .map(|(username, avatar)| {
                Url::parse(&avatar)
                    .map(|avatar| (username, avatar))
                    .map_err(StoreError::from)
            })
            .try_collect()
    }

    async fn insert_tweet(&self, tweet: &TweetRecord) -> Result<TweetId, StoreError> {
        let mut conn = self.conn.clone();

        let id: u64 = redis::cmd("INCR")
            .arg(schema::TWEET_COUNTER)
            .query_async(&mut conn)
            .await?;
        let id = match id.try_into() {
            Ok(id) => TweetId(id),
            Err(_) => {
                return Err(StoreError::Redis(RedisError::from((
                    RedisErrorKind::TypeError,
                    "tweet id counter returned zero",
                ))))
            }
        };

        let blob = rmp_serde::to_vec(tweet)?;
        redis::pipe()
            .set(schema::tweet_blob_key(id).to_string(), blob)
            .ignore()
            .sadd(schema::TWEET_IDS, id.0.get())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(id)
    }

    async fn tweet_exists(&self, id: TweetId) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists = redis::cmd("EXISTS")
            .arg(schema::tweet_blob_key(id).to_string())
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn put_tweet(&self, id: TweetId, tweet: &TweetRecord) -> Result<(), StoreError> {
        let blob = rmp_serde::to_vec(tweet)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(schema::tweet_blob_key(id).to_string())
            .arg(blob)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_tweet(&self, id: TweetId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .del(schema::tweet_blob_key(id).to_string())
            .ignore()
            .srem(schema::TWEET_IDS, id.0.get())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn all_tweets(&self) -> Result<Vec<(TweetId, TweetRecord)>, StoreError> {
        let mut conn = self.conn.clone();

        let mut ids: Vec<u64> = redis::cmd("SMEMBERS")
            .arg(schema::TWEET_IDS)
            .query_async(&mut conn)
            .await?;

        // MGET rejects an empty key list, and there's nothing to join anyway.
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Set members come back unordered; newest-first means id-descending.
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut request = redis::cmd("MGET");
        let blobs: Vec<Option<Vec<u8>>> = ids
            .iter()
            .map(|&id| schema::tweet_blob_key(id).to_string())
            .fold(&mut request, |request, key| request.arg(key))
            .query_async(&mut conn)
            .await?;

        // A member with no blob means a delete raced between SMEMBERS and
        // MGET; skip it rather than failing the whole listing.
        ids.into_iter()
            .zip(blobs)
            .filter_map(|(id, blob)| {
                let id = TweetId(id.try_into().ok()?);
                let blob = blob?;
                Some(
                    rmp_serde::from_slice(&blob)
                        .map(|record| (id, record))
                        .map_err(StoreError::Decode),
                )
            })
            .try_collect()
    }
}
