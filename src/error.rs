//! Error types.

use thiserror::Error;

/// Errors that can occur while fetching a snapshot from a feed.
///
/// A fetch error never clears what is already on screen; the app shows it in
/// a banner until the next successful fetch of the same feed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Reading the underlying file or socket failed.
    #[error("Read error: {0}")]
    Read(String),

    /// The payload was not a valid snapshot.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The producer side went away.
    #[error("Feed disconnected: {0}")]
    Disconnected(String),

    /// The fetch did not complete in time.
    #[error("Fetch timed out")]
    Timeout,
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Read(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

/// Errors from administrative commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The receiving side refused the command.
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// There is nothing connected that could execute the command.
    #[error("No command handler available")]
    Unavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A record id was folded into more than one session.
///
/// This is a bug in reconstruction, not a data problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("record {id} consumed twice (second time by session {session})")]
pub struct PartitionViolation {
    pub id: String,
    pub session: String,
}
