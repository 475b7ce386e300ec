use crate::db;
use anyhow::Result;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

pub const SEGMENT_FOOTER: &str = "<!-- End auto-generated segment -->";

pub fn segment_header(name: &str) -> String {
    format!("<!-- Begin auto-generated segment: {name} -->")
}

/// Lowercase-hex SHA-256 of the segment text. Stored per (page, segment)
/// so unchanged fragments never trigger a remote write.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// How `apply` changed the page body. The append fallback is legal but
/// degraded (no markers were found), so callers log it distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Page had no body; segment written with trailing blank lines reserved
    /// for manual content.
    CreatedPage,
    /// The delimited region was replaced in place.
    ReplacedSegment,
    /// No delimited region found; segment appended to the end verbatim.
    AppendedSegment,
}

/// One pending segment replacement for one page.
#[derive(Debug, Clone)]
pub struct SegmentUpdate {
    pub page_name: String,
    pub segment_name: String,
    pub new_segment: String,
    pub new_hash: String,
}

impl SegmentUpdate {
    pub fn new(page_name: &str, segment_name: &str, new_segment: String) -> Self {
        let new_hash = fingerprint(&new_segment);
        SegmentUpdate {
            page_name: page_name.to_string(),
            segment_name: segment_name.to_string(),
            new_segment,
            new_hash,
        }
    }

    /// True when no fingerprint is recorded for this (page, segment) or the
    /// recorded one differs from the new content. Read-only.
    pub fn should_update(&self, conn: &Connection) -> Result<bool> {
        let stored = db::get_segment_hash(conn, &self.page_name, &self.segment_name)?;
        Ok(match stored {
            Some(hash) => hash != self.new_hash,
            None => true,
        })
    }

    /// Produce the updated page body. Does not touch the fingerprint store;
    /// call `record` inside the caller's transaction once the page write is
    /// under way.
    pub fn apply(&self, body: &str) -> (String, ApplyOutcome) {
        if body.is_empty() {
            return (
                format!("{}\n\n\n\n", self.new_segment),
                ApplyOutcome::CreatedPage,
            );
        }

        match replace_segment(body, &self.segment_name, &self.new_segment) {
            Some(updated) => (updated, ApplyOutcome::ReplacedSegment),
            None => (
                format!("{body}{}", self.new_segment),
                ApplyOutcome::AppendedSegment,
            ),
        }
    }

    /// Persist the new fingerprint. The caller scopes the transaction.
    pub fn record(&self, conn: &Connection) -> Result<()> {
        db::upsert_segment_hash(conn, &self.page_name, &self.segment_name, &self.new_hash)
    }
}

/// Splice the delimited region for `name` out of `haystack` and put
/// `new_segment` in its place, markers included. `None` when either marker
/// is missing. Lookup is first header occurrence, then first footer after
/// it; segment names must be unique per page and marker-safe.
pub fn replace_segment(haystack: &str, name: &str, new_segment: &str) -> Option<String> {
    let header = segment_header(name);
    let start = haystack.find(&header)?;
    let footer_offset = haystack[start..].find(SEGMENT_FOOTER)?;
    let end = start + footer_offset + SEGMENT_FOOTER.len();
    Some(format!(
        "{}{}{}",
        &haystack[..start],
        new_segment,
        &haystack[end..]
    ))
}

// ============================================================================
// TESTS
// ============================================================================
