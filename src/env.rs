//! Environment variable configuration
//!
//! Typed accessors for the `FREEZE_DRY_*` variables that can override a snapshot's options.

use std::env;

use thiserror::Error;

/// A variable that is set but holds an unusable value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("environment variable '{variable}': {message}")]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

pub type EnvResult<T> = Result<T, EnvError>;

pub trait EnvVar<T> {
    const NAME: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// `Ok(None)` when the variable is not set.
    fn get() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }
}

fn parse_bool(value: &str, name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EnvError {
            variable: name.to_string(),
            message: "Must be a boolean (true/false, 1/0, yes/no, on/off)".to_string(),
        }),
    }
}

fn parse_non_empty(value: &str, name: &str) -> EnvResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EnvError {
            variable: name.to_string(),
            message: "Must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Snapshot options
pub mod snapshot {
    use super::*;

    /// Time budget for fetching and inlining subresources, in milliseconds
    pub struct TimeoutMs;
    impl EnvVar<u64> for TimeoutMs {
        const NAME: &'static str = "FREEZE_DRY_TIMEOUT_MS";

        fn parse(value: &str) -> EnvResult<u64> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a whole number of milliseconds".to_string(),
            })
        }
    }

    /// User-Agent header sent by the default fetcher
    pub struct UserAgent;
    impl EnvVar<String> for UserAgent {
        const NAME: &'static str = "FREEZE_DRY_USER_AGENT";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// Record the snapshot time and the original URL in the snapshot
    pub struct AddMetadata;
    impl EnvVar<bool> for AddMetadata {
        const NAME: &'static str = "FREEZE_DRY_ADD_METADATA";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// Keep pre-inlining attribute values in data-original-* attributes
    pub struct KeepOriginalAttributes;
    impl EnvVar<bool> for KeepOriginalAttributes {
        const NAME: &'static str = "FREEZE_DRY_KEEP_ORIGINAL_ATTRIBUTES";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// Content-Security-Policy injected into the snapshot
    pub struct ContentSecurityPolicy;
    impl EnvVar<String> for ContentSecurityPolicy {
        const NAME: &'static str = "FREEZE_DRY_CONTENT_SECURITY_POLICY";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }
}
