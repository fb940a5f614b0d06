//! # commit-mailer
//!
//! Reviews commits with a language model and emails the author a report with
//! corrected code attached.
//!
//! Commits arrive from a push webhook ([`server`]), a CI event file or the
//! local HEAD ([`commit`]). For each changed file the [`pipeline`] fetches the
//! diff, asks the completion service for a review ([`analysis`]), stages the
//! corrected code as an attachment ([`staging`]) and finally delivers one
//! report per commit ([`notify`]).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod commit;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod staging;

pub use crate::cli::Cli;
pub use crate::config::Config;
pub use crate::pipeline::{BatchSummary, Orchestrator};

/// The current version of commit-mailer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
