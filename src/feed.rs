//! The read-time join that turns stored tweets into a display-ready feed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::store::{TweetId, TweetRecord};

/// One entry of the feed: a tweet plus the avatar of whoever is currently
/// registered under its username, or `null` when nobody is. There is no
/// stored relation between tweets and users; this join is the only link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: TweetId,
    pub username: String,
    pub avatar: Option<Url>,
    pub tweet: String,
}

/// Join tweets with the username → avatar map. Order is preserved, so
/// callers pass tweets newest-first and get the feed newest-first. Eagerly
/// materialized; linear in tweets + users.
pub fn assemble(
    tweets: Vec<(TweetId, TweetRecord)>,
    avatars: &HashMap<String, Url>,
) -> Vec<FeedItem> {
    tweets
        .into_iter()
        .map(|(id, record)| FeedItem {
            avatar: avatars.get(&record.username).cloned(),
            id,
            username: record.username,
            tweet: record.tweet,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    fn id(n: u64) -> TweetId {
        TweetId(NonZeroU64::new(n).unwrap())
    }

    fn record(username: &str, text: &str) -> TweetRecord {
        TweetRecord {
            username: username.to_owned(),
            tweet: text.to_owned(),
        }
    }

    #[test]
    fn resolves_avatars_and_leaves_unknown_usernames_null() {
        let avatars = HashMap::from([(
            "ana".to_owned(),
            Url::parse("https://x.test/a.png").unwrap(),
        )]);

        let feed = assemble(
            vec![(id(2), record("ghost", "boo")), (id(1), record("ana", "hi"))],
            &avatars,
        );

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].username, "ghost");
        assert_eq!(feed[0].avatar, None);
        assert_eq!(feed[1].username, "ana");
        assert_eq!(
            feed[1].avatar.as_ref().map(Url::as_str),
            Some("https://x.test/a.png")
        );
    }

    #[test]
    fn preserves_input_order() {
        let feed = assemble(
            vec![
                (id(3), record("ana", "three")),
                (id(2), record("ana", "two")),
                (id(1), record("ana", "one")),
            ],
            &HashMap::new(),
        );

        let ids: Vec<TweetId> = feed.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![id(3), id(2), id(1)]);
    }

    #[test]
    fn serializes_missing_avatar_as_null() {
        let feed = assemble(vec![(id(1), record("ghost", "boo"))], &HashMap::new());
        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"id": 1, "username": "ghost", "avatar": null, "tweet": "boo"}
            ])
        );
    }
}
