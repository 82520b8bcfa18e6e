//! Parsing of Redis and Sentinel `INFO` output.
//!
//! All functions are pure and operate on the raw text returned by the
//! server, so they are tested without a live node.

use regex::Regex;
use thiserror::Error;

/// Errors that can occur during parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to compile regex: {0}")]
    RegexCompilation(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Sentinel not ready: status={0}")]
    SentinelNotReady(String),
}

/// Whether `INFO replication` reports the node as a master.
pub fn is_master_role(info: &str) -> bool {
    info.lines().any(|line| line.trim() == "role:master")
}

/// Master address a replica follows, empty when the node is itself a master.
///
/// A replica that does not report `master_host` is treated as following
/// nobody, which also yields an empty string.
pub fn parse_master_host(info: &str) -> Result<String, ParseError> {
    let re = Regex::new(r"(?m)^master_host:([0-9A-Za-z.\-]+)\s*$")
        .map_err(|e| ParseError::RegexCompilation(e.to_string()))?;

    Ok(re
        .captures(info)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

/// Number of Sentinels the queried Sentinel knows about for its master.
///
/// Reads the `sentinels=N` field of `INFO sentinel`. The master entry must
/// also report `status=ok`; any other status means the Sentinel has not
/// settled and the count is not trusted.
pub fn parse_sentinel_count(info: &str) -> Result<i32, ParseError> {
    let status_re = Regex::new(r"status=([a-z_]+)")
        .map_err(|e| ParseError::RegexCompilation(e.to_string()))?;
    let count_re = Regex::new(r"sentinels=([0-9]+)")
        .map_err(|e| ParseError::RegexCompilation(e.to_string()))?;

    let status = status_re
        .captures(info)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::MissingField("status".to_string()))?;
    if status != "ok" {
        return Err(ParseError::SentinelNotReady(status.to_string()));
    }

    count_re
        .captures(info)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ParseError::MissingField("sentinels".to_string()))
}
