//! diffpin - patch parsing and review-comment anchoring for pull request diffs
//!
//! The library holds everything except the `init` command so that benches
//! and integration tests can reach the core directly.

pub mod app;
pub mod config;
pub mod diff;
pub mod github;
pub mod loader;
pub mod thread;

// Re-export commonly used types for benchmarks
pub use diff::{classify_line, parse_patch, LineType, ParsedPatch, PatchRow, Side};
pub use thread::{build_threads, CommentThread};
