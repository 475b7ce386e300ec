use crate::entity::EntityPrototype;
use crate::generate::{categories_segment, infobox_segment, CATEGORIES_SEGMENT, INFOBOX_SEGMENT};
use crate::segments::{ApplyOutcome, SegmentUpdate};
use anyhow::Result;
use indexmap::IndexMap;
use rusqlite::Connection;
use tracing::{debug, error, warn};

/// Remote page store. Injected so the orchestrator never touches ambient
/// site state, and so tests can run against an in-memory wiki.
pub trait WikiPublisher {
    /// Current page body; empty string when the page does not exist.
    fn fetch_page(&mut self, title: &str) -> Result<String>;

    fn publish_page(&mut self, title: &str, text: &str, summary: &str) -> Result<()>;
}

/// One entity that could not be published. The batch carries on regardless.
#[derive(Debug)]
pub struct EntityFailure {
    pub entity_id: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct UpdateReport {
    pub updated: usize,
    pub skipped: usize,
    pub failures: Vec<EntityFailure>,
}

pub struct EntityUpdater<'a, P: WikiPublisher> {
    conn: &'a mut Connection,
    publisher: &'a mut P,
    edit_summary: String,
}

impl<'a, P: WikiPublisher> EntityUpdater<'a, P> {
    pub fn new(conn: &'a mut Connection, publisher: &'a mut P, edit_summary: &str) -> Self {
        EntityUpdater {
            conn,
            publisher,
            edit_summary: edit_summary.to_string(),
        }
    }

    /// Publish every entity whose generated segments changed since the last
    /// run. Iterates the store in its insertion order; a failure on one
    /// entity is recorded and the loop continues.
    pub fn run(&mut self, entities: &IndexMap<String, EntityPrototype>) -> UpdateReport {
        let mut report = UpdateReport::default();

        for (entity_id, entity) in entities {
            match self.update_entity(entity_id, entity) {
                Ok(true) => report.updated += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    error!(entity = %entity_id, error = %e, "failed to update page, skipping");
                    report.failures.push(EntityFailure {
                        entity_id: entity_id.clone(),
                        error: e,
                    });
                }
            }
        }

        report
    }

    /// Returns true when the page was (re)published, false when every
    /// segment fingerprint already matched and all remote calls were
    /// skipped.
    fn update_entity(&mut self, entity_id: &str, entity: &EntityPrototype) -> Result<bool> {
        // capitalize the first letter or the wiki will reject the title
        let page_name = format!("Entity:{}", normalize_title(entity_id));

        let updates = [
            SegmentUpdate::new(&page_name, INFOBOX_SEGMENT, infobox_segment(entity)),
            SegmentUpdate::new(&page_name, CATEGORIES_SEGMENT, categories_segment(entity)?),
        ];

        let mut needs_update = false;
        for update in &updates {
            if update.should_update(self.conn)? {
                needs_update = true;
            }
        }
        if !needs_update {
            return Ok(false);
        }

        debug!(page = %page_name, "updating page");
        let mut text = self.publisher.fetch_page(&page_name)?;

        // one transaction per entity: fingerprints commit only after the
        // page write went through
        let tx = self.conn.transaction()?;
        for update in &updates {
            let (updated, outcome) = update.apply(&text);
            if outcome == ApplyOutcome::AppendedSegment {
                warn!(
                    page = %page_name, segment = %update.segment_name,
                    "segment markers not found, appended to end of page"
                );
            }
            text = updated;
            update.record(&tx)?;
        }

        self.publisher.publish_page(&page_name, &text, &self.edit_summary)?;
        tx.commit()?;

        Ok(true)
    }
}

fn normalize_title(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
