// wikisync - wiki synchronization of game entity prototypes
// Exposes all modules for use in the CLI binary and tests

pub mod db;
pub mod entity;
pub mod generate;
pub mod loader;
pub mod publisher;
pub mod resolution;
pub mod segments;
pub mod updater;

// Re-export commonly used types
pub use db::{get_segment_hash, open_database, setup_database, upsert_segment_hash};
pub use entity::{Component, EntityError, EntityPrototype, RawRecord, SourceLocation};
pub use generate::{categories_segment, infobox_segment};
pub use loader::load_entities;
pub use publisher::MediaWikiPublisher;
pub use resolution::{detect_cycles, resolve_all, InheritanceCycleError, ResolveReport};
pub use segments::{fingerprint, replace_segment, ApplyOutcome, SegmentUpdate};
pub use updater::{EntityFailure, EntityUpdater, UpdateReport, WikiPublisher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
