pub mod feed;
pub mod routes;
pub mod store;
pub mod validate;

pub use feed::FeedItem;
pub use routes::app;
pub use store::{MemoryStore, RedisStore, Store, TweetId, TweetRecord, UserRecord};
