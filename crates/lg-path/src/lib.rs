//! Path utilities for lg.
//!
//! Every path that crosses a crate boundary in lg is a POSIX-style relative
//! string (`/`-separated, no leading slash). This crate is the single source
//! of truth for that convention, plus repo-root discovery, SHA-1 hashing,
//! and mtime+size file fingerprints.

#![warn(missing_docs)]

mod fingerprint;
mod hash;
mod posix;
mod scope;

pub use fingerprint::FileFingerprint;
pub use hash::{sha1_bytes, sha1_hex};
pub use posix::{join_posix, parent_posix, rel_posix, split_components, strip_prefix_posix};
pub use scope::{CFG_DIR, SECTIONS_FILE, cfg_root, find_repo_root, is_cfg_relpath, is_scope};
