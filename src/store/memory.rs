//! An in-process [`Store`] with the same semantics as the redis one.
//!
//! The test suite drives the full HTTP stack against this implementation,
//! so the contract it must match is the trait documentation: append-only
//! registration log, last-write-wins avatar index, monotonically increasing
//! tweet ids, newest-first listing.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use url::Url;

use super::{Store, StoreError, TweetId, TweetRecord, UserRecord};

#[derive(Debug, Default)]
struct State {
    users: Vec<UserRecord>,
    tweets: BTreeMap<TweetId, TweetRecord>,
    next_id: u64,
}

/// Thread-safe and cheap to clone, like the redis handle it stands in for.
/// The mutex is held only for synchronous map operations, never across an
/// await point.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned mutex means a panic mid-operation; tests should fail
        // loudly rather than observe half-written state.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.lock().users.push(user.clone());
        Ok(())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .any(|user| user.username == username))
    }

    async fn avatars(&self) -> Result<HashMap<String, Url>, StoreError> {
        // Registration order, so later duplicates overwrite earlier ones.
        Ok(self
            .lock()
            .users
            .iter()
            .map(|user| (user.username.clone(), user.avatar.clone()))
            .collect())
    }

    async fn insert_tweet(&self, tweet: &TweetRecord) -> Result<TweetId, StoreError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = match state.next_id.try_into() {
            Ok(id) => TweetId(id),
            Err(_) => unreachable!("id counter starts at 1"),
        };
        state.tweets.insert(id, tweet.clone());
        Ok(id)
    }

    async fn tweet_exists(&self, id: TweetId) -> Result<bool, StoreError> {
        Ok(self.lock().tweets.contains_key(&id))
    }

    async fn put_tweet(&self, id: TweetId, tweet: &TweetRecord) -> Result<(), StoreError> {
        self.lock().tweets.insert(id, tweet.clone());
        Ok(())
    }

    async fn remove_tweet(&self, id: TweetId) -> Result<(), StoreError> {
        self.lock().tweets.remove(&id);
        Ok(())
    }

    async fn all_tweets(&self) -> Result<Vec<(TweetId, TweetRecord)>, StoreError> {
        Ok(self
            .lock()
            .tweets
            .iter()
            .rev()
            .map(|(&id, record)| (id, record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(username: &str, text: &str) -> TweetRecord {
        TweetRecord {
            username: username.to_owned(),
            tweet: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_listing_is_newest_first() {
        let store = MemoryStore::new();

        let first = store.insert_tweet(&tweet("ana", "one")).await.unwrap();
        let second = store.insert_tweet(&tweet("ana", "two")).await.unwrap();
        let third = store.insert_tweet(&tweet("bob", "three")).await.unwrap();
        assert!(first < second && second < third);

        let listed: Vec<TweetId> = store
            .all_tweets()
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(listed, vec![third, second, first]);
    }

    #[tokio::test]
    async fn put_overwrites_in_place_and_keeps_the_id() {
        let store = MemoryStore::new();

        let id = store.insert_tweet(&tweet("ana", "first draft")).await.unwrap();
        store.put_tweet(id, &tweet("bob", "rewritten")).await.unwrap();

        let all = store.all_tweets().await.unwrap();
        assert_eq!(all, vec![(id, tweet("bob", "rewritten"))]);
    }

    #[tokio::test]
    async fn duplicate_registrations_keep_distinct_records_but_latest_avatar_wins() {
        let store = MemoryStore::new();

        let old = UserRecord {
            username: "ana".to_owned(),
            avatar: Url::parse("https://x.test/old.png").unwrap(),
        };
        let new = UserRecord {
            username: "ana".to_owned(),
            avatar: Url::parse("https://x.test/new.png").unwrap(),
        };
        store.insert_user(&old).await.unwrap();
        store.insert_user(&new).await.unwrap();

        assert_eq!(store.lock().users.len(), 2);
        let avatars = store.avatars().await.unwrap();
        assert_eq!(avatars["ana"].as_str(), "https://x.test/new.png");
    }
}
