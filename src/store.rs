//! Persistent records and the storage seam.
//!
//! Handlers talk to a [`Store`]: a handful of single-document operations
//! over two independent collections ("users" and "tweets"). The production
//! implementation lives in [`redis`]; [`memory`] is an in-process
//! implementation with the same semantics, used by the test suite.

pub mod memory;
pub mod redis;

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    num::NonZeroU64,
    str::FromStr,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use self::{memory::MemoryStore, redis::RedisStore};

/// Identifier of a stored tweet. Allocated from a monotonically increasing
/// counter at creation time, so descending id order is a proxy for recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TweetId(pub NonZeroU64);

impl Display for TweetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TweetId {
    type Err = <NonZeroU64 as FromStr>::Err;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A registered user. Usernames are unique by convention only; registering
/// the same username twice creates a second, distinct record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub avatar: Url,
}

/// The mutable content of a tweet. The id is not part of the record; it's
/// the key the record is stored under, and it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub username: String,
    pub tweet: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error from redis")]
    Redis(#[from] ::redis::RedisError),

    #[error("error decoding a stored record")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("error encoding a record for storage")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("malformed avatar URL in storage")]
    BadUrl(#[from] url::ParseError),
}

/// The storage operations the handlers need, one method per document
/// round-trip. Existence checks and mutations are deliberately separate
/// calls: the service mirrors the original check-then-mutate flow, with no
/// cross-document transaction between the two.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a registration. Unconditional: duplicate usernames create
    /// distinct records.
    async fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Whether any registration exists for this username.
    async fn user_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// The username → avatar mapping used by the feed join. Under duplicate
    /// registrations, the most recent avatar wins.
    async fn avatars(&self) -> Result<HashMap<String, Url>, StoreError>;

    /// Store a new tweet under a freshly allocated id and return the id.
    async fn insert_tweet(&self, tweet: &TweetRecord) -> Result<TweetId, StoreError>;

    /// Whether a tweet is stored under this id.
    async fn tweet_exists(&self, id: TweetId) -> Result<bool, StoreError>;

    /// Overwrite the record stored under `id`. The id itself is unchanged.
    async fn put_tweet(&self, id: TweetId, tweet: &TweetRecord) -> Result<(), StoreError>;

    /// Remove the tweet stored under `id`.
    async fn remove_tweet(&self, id: TweetId) -> Result<(), StoreError>;

    /// Every stored tweet, ordered by id descending (newest first).
    async fn all_tweets(&self) -> Result<Vec<(TweetId, TweetRecord)>, StoreError>;
}
