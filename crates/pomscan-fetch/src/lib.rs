//! Artifact acquisition for pomscan.
//!
//! Resolves each artifact through an ordered three-tier search (local caches,
//! project-declared remotes, public fallback) with retry/backoff, partial
//! download resume, disk-space preflight, and an optional bounded-concurrency
//! parallel download manager.

pub mod download;
pub mod engine;
pub mod local;
pub mod retry;
pub mod source;

pub use engine::{ArtifactFetcher, FetchSummary};
pub use source::{DownloadOutcome, DownloadSource, RemoteRepo};
