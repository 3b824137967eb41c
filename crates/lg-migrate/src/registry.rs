//! Migration registry.
//!
//! Migrations are plain values constructed at start-up into an id-ordered
//! table; there is no global mutable registration.

use crate::error::MigrationError;
use crate::fs::CfgFs;
use crate::migrations;

/// One versioned transformation of the `lg-cfg/` directory.
///
/// Implementations must be idempotent: running against an already-migrated
/// directory returns `Ok(false)` and changes nothing.
pub trait Migration {
    /// Ordering id; migrations run in ascending id order.
    fn id(&self) -> u32;

    /// Human-readable title for state records and error messages.
    fn title(&self) -> &'static str;

    /// Applies the migration.
    ///
    /// Returns whether anything changed. `allow_side_effects` tells the
    /// migration whether a backup exists (Git) or was explicitly waived;
    /// destructive migrations must return
    /// [`MigrationError::PreflightRequired`] when it is false.
    fn run(&self, cfg_fs: &CfgFs, allow_side_effects: bool) -> Result<bool, MigrationError>;
}

/// The built-in migrations, sorted by id.
pub fn builtin_migrations() -> Vec<Box<dyn Migration>> {
    let mut all: Vec<Box<dyn Migration>> = vec![
        Box::new(migrations::LegacyAdaptiveFiles),
        Box::new(migrations::SkipEmptyToPolicy),
        Box::new(migrations::FlattenContexts),
        Box::new(migrations::DropSchemaVersion),
    ];
    all.sort_by_key(|m| m.id());
    all
}
