//! Declarative request shapes and non-short-circuiting validation.
//!
//! A [`Shape`] lists the fields a request body must carry and the
//! constraints on each. Checking a record against a shape collects *every*
//! violation in a single pass, so a client gets the full list of problems
//! at once rather than one per round trip.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// A constraint on a single field. `Required` governs presence; the rest
/// apply to a field that is present (and, implicitly, must be a string --
/// every field in this service is one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    NonEmpty,
    MaxChars(usize),
    Uri,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

/// A declarative description of a request body: which fields it has and
/// what each must satisfy. Keys not declared here are violations.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    pub fields: &'static [Field],
}

/// Shape of a registration body: `{username, avatar}`.
pub const REGISTRATION: Shape = Shape {
    fields: &[
        Field {
            name: "username",
            rules: &[Rule::Required, Rule::NonEmpty],
        },
        Field {
            name: "avatar",
            rules: &[Rule::Required, Rule::NonEmpty, Rule::Uri],
        },
    ],
};

/// Shape of a tweet body: `{username, tweet}`, tweet capped at 280
/// characters.
pub const TWEET: Shape = Shape {
    fields: &[
        Field {
            name: "username",
            rules: &[Rule::Required, Rule::NonEmpty],
        },
        Field {
            name: "tweet",
            rules: &[Rule::Required, Rule::NonEmpty, Rule::MaxChars(280)],
        },
    ],
};

/// A single failed constraint: which field, which rule, and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub rule: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, rule: &'static str, message: String) -> Self {
        Self {
            field: field.into(),
            rule,
            message,
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid request payload ({} violations)", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// A record that passed its shape check but still failed to
    /// deserialize into the typed form. Shapes are written to make this
    /// unreachable, but the decoder's word is final.
    fn decode(err: serde_json::Error) -> Self {
        Self {
            violations: vec![Violation::new("body", "decode", err.to_string())],
        }
    }
}

impl Shape {
    /// Check `record` against this shape, collecting all violations rather
    /// than stopping at the first. No side effects.
    pub fn check(&self, record: &Value) -> Result<(), ValidationError> {
        let object = match record.as_object() {
            Some(object) => object,
            None => {
                return Err(ValidationError {
                    violations: vec![Violation::new(
                        "body",
                        "object",
                        "request body must be an object".to_owned(),
                    )],
                })
            }
        };

        let mut violations = Vec::new();

        for field in self.fields {
            let required = field.rules.contains(&Rule::Required);

            let value = match object.get(field.name) {
                Some(value) => value,
                None => {
                    if required {
                        violations.push(Violation::new(
                            field.name,
                            "required",
                            format!("\"{}\" is required", field.name),
                        ));
                    }
                    continue;
                }
            };

            // Everything below operates on string content, so a non-string
            // short-circuits the rest of this field (but not other fields).
            let text = match value.as_str() {
                Some(text) => text,
                None => {
                    violations.push(Violation::new(
                        field.name,
                        "string",
                        format!("\"{}\" must be a string", field.name),
                    ));
                    continue;
                }
            };

            for rule in field.rules {
                match *rule {
                    Rule::Required => {}
                    Rule::NonEmpty => {
                        if text.is_empty() {
                            violations.push(Violation::new(
                                field.name,
                                "non-empty",
                                format!("\"{}\" is not allowed to be empty", field.name),
                            ));
                        }
                    }
                    Rule::MaxChars(max) => {
                        if text.chars().count() > max {
                            violations.push(Violation::new(
                                field.name,
                                "max-chars",
                                format!(
                                    "\"{}\" length must be less than or equal to {} characters long",
                                    field.name, max,
                                ),
                            ));
                        }
                    }
                    Rule::Uri => {
                        if Url::parse(text).is_err() {
                            violations.push(Violation::new(
                                field.name,
                                "uri",
                                format!("\"{}\" must be a valid uri", field.name),
                            ));
                        }
                    }
                }
            }
        }

        // Undeclared keys are rejected, not silently dropped.
        for key in object.keys() {
            if !self.fields.iter().any(|field| field.name == key) {
                violations.push(Violation::new(
                    key.clone(),
                    "unknown",
                    format!("\"{key}\" is not allowed"),
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// Check `record` against `shape`, then deserialize it into its typed form.
pub fn parse<T: DeserializeOwned>(shape: &Shape, record: Value) -> Result<T, ValidationError> {
    shape.check(&record)?;
    serde_json::from_value(record).map_err(ValidationError::decode)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{TweetRecord, UserRecord};

    fn rules(err: &ValidationError) -> Vec<(&str, &str)> {
        err.violations
            .iter()
            .map(|v| (v.field.as_str(), v.rule))
            .collect()
    }

    #[test]
    fn registration_accepts_well_formed_record() {
        let record = json!({"username": "ana", "avatar": "https://x.test/a.png"});
        let user: UserRecord = parse(&REGISTRATION, record).unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(user.avatar.as_str(), "https://x.test/a.png");
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let err = REGISTRATION.check(&json!({})).unwrap_err();
        assert_eq!(
            rules(&err),
            vec![("username", "required"), ("avatar", "required")]
        );
    }

    #[test]
    fn avatar_must_be_a_uri() {
        let err = REGISTRATION
            .check(&json!({"username": "ana", "avatar": "not a uri"}))
            .unwrap_err();
        assert_eq!(rules(&err), vec![("avatar", "uri")]);
    }

    #[test]
    fn empty_strings_are_rejected() {
        let err = TWEET
            .check(&json!({"username": "", "tweet": ""}))
            .unwrap_err();
        assert_eq!(
            rules(&err),
            vec![("username", "non-empty"), ("tweet", "non-empty")]
        );
    }

    #[test]
    fn non_string_fields_are_rejected() {
        let err = TWEET
            .check(&json!({"username": 7, "tweet": ["hi"]}))
            .unwrap_err();
        assert_eq!(rules(&err), vec![("username", "string"), ("tweet", "string")]);
    }

    #[test]
    fn tweet_length_boundary_is_280_characters() {
        let at_limit = "x".repeat(280);
        let record = json!({"username": "ana", "tweet": at_limit});
        assert!(TWEET.check(&record).is_ok());

        let over = "x".repeat(281);
        let err = TWEET
            .check(&json!({"username": "ana", "tweet": over}))
            .unwrap_err();
        assert_eq!(rules(&err), vec![("tweet", "max-chars")]);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 280 multi-byte scalar values are within the limit.
        let tweet = "é".repeat(280);
        assert!(tweet.len() > 280);
        let record = json!({"username": "ana", "tweet": tweet});
        assert!(TWEET.check(&record).is_ok());
    }

    #[test]
    fn undeclared_keys_are_violations() {
        let err = TWEET
            .check(&json!({"username": "ana", "tweet": "hi", "pinned": true}))
            .unwrap_err();
        assert_eq!(rules(&err), vec![("pinned", "unknown")]);
    }

    #[test]
    fn non_object_body_is_a_violation() {
        let err = TWEET.check(&json!("just a string")).unwrap_err();
        assert_eq!(rules(&err), vec![("body", "object")]);
    }

    #[test]
    fn violations_accumulate_across_fields_and_rules() {
        let long = "x".repeat(300);
        let err = TWEET
            .check(&json!({"username": "", "tweet": long, "extra": 1}))
            .unwrap_err();
        assert_eq!(
            rules(&err),
            vec![
                ("username", "non-empty"),
                ("tweet", "max-chars"),
                ("extra", "unknown"),
            ]
        );
    }

    #[test]
    fn parse_produces_typed_tweet() {
        let record = json!({"username": "ana", "tweet": "hello"});
        let draft: TweetRecord = parse(&TWEET, record).unwrap();
        assert_eq!(draft.username, "ana");
        assert_eq!(draft.tweet, "hello");
    }
}
