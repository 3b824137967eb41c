//! Two-tier cache for lg.
//!
//! L1 is an in-memory LRU of token counts for the current process. L2 is a
//! content-addressed file cache under `<repo>/.lg-cache/` shared between
//! processes:
//!
//! ```text
//! .lg-cache/
//!   tokens/<ab>/<cd>/<sha1>.json     model → token count
//!   processed/<ab>/<cd>/<sha1>.json  processed text + adapter meta
//!   cfg_state/<ab>/<cd>/<sha1>.json  migration state
//!   sections/<scope-hash>.index      section index
//!   locks/<scope-hash>/lock.json     migration advisory lock
//! ```
//!
//! Every write is temp-file + atomic rename. Every I/O failure degrades to
//! a miss; the cache never surfaces errors to the pipeline.

#![warn(missing_docs)]

mod freeze;
mod store;
mod tokens;

pub use freeze::freeze_json;
pub use store::{Cache, CacheSnapshot, ProcessedEntry};
pub use tokens::SMALL_TEXT_THRESHOLD;
