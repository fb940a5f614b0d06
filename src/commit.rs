//! Commit events and where they come from.

pub mod diff;
pub mod event;
pub mod source;

pub use diff::{placeholder_diff, DiffExtractor, GitDiffExtractor};
pub use event::{CommitEvent, FileChange};
pub use source::{
    parse_push_payload, BatchTrigger, CommitSource, EventFileSource, LocalHeadSource, WebhookSource,
};

/// Number of hex characters shown in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 7;
