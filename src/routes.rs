//! The HTTP surface: one warp filter per route, and the mapping from the
//! error taxonomy to response statuses.
//!
//! Every handler follows the same flow: validate the body against its
//! shape, perform one or two store round-trips, reply with JSON. Errors
//! never propagate past this module; each is converted to its status at
//! the handler boundary.

use std::error::Error as _;

use serde_json::{json, Value};
use thiserror::Error;
use warp::{
    http::StatusCode,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::{
    feed,
    store::{Store, StoreError, TweetId, TweetRecord, UserRecord},
    validate::{self, ValidationError},
};

/// Everything a handler can fail with. The variants are exactly the
/// client-visible failure cases; the status mapping lives in
/// [`ApiError::into_response`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("user {0:?} is not registered")]
    Unauthorized(String),

    #[error("no tweet with id {0}")]
    NotFound(TweetId),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => reply::with_status(
                reply::json(&json!({
                    "error": "invalid format",
                    "details": err.violations,
                })),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
            .into_response(),

            ApiError::Unauthorized(username) => reply::with_status(
                reply::json(&json!({
                    "message": format!("user {username:?} is not registered"),
                })),
                StatusCode::UNAUTHORIZED,
            )
            .into_response(),

            ApiError::NotFound(id) => reply::with_status(
                reply::json(&json!({
                    "message": format!("tweet {id} not found"),
                })),
                StatusCode::NOT_FOUND,
            )
            .into_response(),

            ApiError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                let message = match err.source() {
                    Some(source) => format!("{err}: {source}"),
                    None => err.to_string(),
                };
                reply::with_status(
                    reply::json(&json!({
                        "error": "server error",
                        "message": message,
                    })),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
                .into_response()
            }
        }
    }
}

/// Build the whole route tree around one store handle. The handle is
/// cloned into each request; nothing else is shared across requests.
pub fn app<S>(store: S) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    S: Store + Clone + Send + Sync + 'static,
{
    let with_store = warp::any().map(move || store.clone());

    let sign_up = warp::path!("sign-up")
        .and(warp::post())
        .and(with_store.clone())
        .and(warp::body::json())
        .then(sign_up);

    let create = warp::path!("tweets")
        .and(warp::post())
        .and(with_store.clone())
        .and(warp::body::json())
        .then(create_tweet);

    let list = warp::path!("tweets")
        .and(warp::get())
        .and(with_store.clone())
        .then(list_tweets);

    let update = warp::path!("tweets" / TweetId)
        .and(warp::put())
        .and(with_store.clone())
        .and(warp::body::json())
        .then(update_tweet);

    let delete = warp::path!("tweets" / TweetId)
        .and(warp::delete())
        .and(with_store)
        .then(delete_tweet);

    // Every handler extracts a plain Response, so the alternation unifies
    // into one concrete extract type.
    sign_up
        .or(create)
        .unify()
        .or(list)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
}

#[tracing::instrument(skip_all)]
async fn sign_up<S: Store>(store: S, body: Value) -> Response {
    let result = async {
        let user: UserRecord = validate::parse(&validate::REGISTRATION, body)?;
        store.insert_user(&user).await?;
        tracing::info!(username = %user.username, "registered user");
        Ok(reply::with_status("registered", StatusCode::CREATED).into_response())
    }
    .await;

    result.unwrap_or_else(ApiError::into_response)
}

#[tracing::instrument(skip_all)]
async fn create_tweet<S: Store>(store: S, body: Value) -> Response {
    let result = async {
        let draft: TweetRecord = validate::parse(&validate::TWEET, body)?;

        // Check-then-insert, two round trips; there is no user-deletion
        // path, so nothing can vanish in between.
        if !store.user_exists(&draft.username).await? {
            return Err(ApiError::Unauthorized(draft.username));
        }

        let id = store.insert_tweet(&draft).await?;
        tracing::info!(%id, username = %draft.username, "stored tweet");

        Ok(reply::with_status(
            reply::json(&json!({ "message": "tweet created" })),
            StatusCode::CREATED,
        )
        .into_response())
    }
    .await;

    result.unwrap_or_else(ApiError::into_response)
}

#[tracing::instrument(skip_all)]
async fn list_tweets<S: Store>(store: S) -> Response {
    let result = async {
        let tweets = store.all_tweets().await?;
        let avatars = store.avatars().await?;
        let feed = feed::assemble(tweets, &avatars);
        Ok::<_, ApiError>(reply::json(&feed).into_response())
    }
    .await;

    result.unwrap_or_else(ApiError::into_response)
}

#[tracing::instrument(skip(store, body))]
async fn update_tweet<S: Store>(id: TweetId, store: S, body: Value) -> Response {
    let result = async {
        let draft: TweetRecord = validate::parse(&validate::TWEET, body)?;

        if !store.tweet_exists(id).await? {
            return Err(ApiError::NotFound(id));
        }

        // Unlike create, the new username is not checked against the
        // registry. That asymmetry is inherited behavior, kept on purpose.
        store.put_tweet(id, &draft).await?;
        tracing::info!(%id, "updated tweet");

        Ok(StatusCode::NO_CONTENT.into_response())
    }
    .await;

    result.unwrap_or_else(ApiError::into_response)
}

#[tracing::instrument(skip(store))]
async fn delete_tweet<S: Store>(id: TweetId, store: S) -> Response {
    let result = async {
        if !store.tweet_exists(id).await? {
            return Err(ApiError::NotFound(id));
        }

        store.remove_tweet(id).await?;
        tracing::info!(%id, "deleted tweet");

        Ok::<_, ApiError>(StatusCode::NO_CONTENT.into_response())
    }
    .await;

    result.unwrap_or_else(ApiError::into_response)
}
