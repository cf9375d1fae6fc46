//! Typed environment variable lookups
//!
//! Unset variables are `Ok(None)`; set-but-unparseable variables are errors
//! so a typo in `DCL_CONCURRENCY` never silently falls back to a default.

use crate::error::{DclError, Result};
use std::str::FromStr;

/// Read and parse an environment variable
pub fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| DclError::InvalidEnv {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(DclError::InvalidEnv {
            key: key.to_string(),
            value: "<non-unicode>".to_string(),
            reason: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Read a boolean flag, accepting `1/0`, `true/false`, `yes/no`
pub fn parse_flag(key: &str) -> Result<Option<bool>> {
    let Some(raw) = parse_var::<String>(key)? else {
        return Ok(None);
    };

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(DclError::InvalidEnv {
            key: key.to_string(),
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
}
