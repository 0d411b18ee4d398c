//! In-memory evidence queue
//!
//! Pure bookkeeping: no file is opened here. Ids are never reused while the
//! queue lives, and the `revision` counter moves on every add or remove so a
//! cached validation can be matched against the queue it was made for.

use super::{EvidenceItem, EvidenceSource, EvidenceStatus, IntakeError, IntakeResult, MediaKind};

#[derive(Debug, Default)]
pub struct EvidenceQueue {
    items: Vec<EvidenceItem>,
    revision: u64,
}

impl EvidenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every source under the caller-chosen classification
    pub fn add(&mut self, sources: impl IntoIterator<Item = EvidenceSource>, kind: MediaKind) -> Vec<EvidenceItem> {
        let added: Vec<EvidenceItem> = sources
            .into_iter()
            .map(|source| EvidenceItem {
                id: format!("ev-{}", uuid::Uuid::new_v4().simple()),
                case_id: None,
                source,
                kind,
                status: EvidenceStatus::Queued,
                progress: 0,
            })
            .collect();

        if !added.is_empty() {
            self.revision += 1;
            tracing::debug!(count = added.len(), kind = kind.as_str(), "Evidence queued");
        }
        self.items.extend(added.iter().cloned());
        added
    }

    pub fn remove(&mut self, id: &str) -> IntakeResult<EvidenceItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| IntakeError::UnknownItem(id.to_string()))?;
        self.revision += 1;
        Ok(self.items.remove(index))
    }

    /// Snapshot in insertion order
    pub fn list(&self) -> Vec<EvidenceItem> {
        self.items.clone()
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Update lifecycle state of every item; does not change the revision
    pub fn set_status_all(&mut self, status: EvidenceStatus, progress: u8) {
        for item in &mut self.items {
            item.status = status;
            item.progress = progress.min(100);
        }
    }

    /// Tag every item with the case it was committed to
    pub fn assign_case(&mut self, case_id: &str) {
        for item in &mut self.items {
            item.case_id = Some(case_id.to_string());
        }
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            self.revision += 1;
        }
        self.items.clear();
    }
}
