use crate::domain::entities::{DomainRecord, ServerRecord};
use crate::domain::value_objects::RecordId;
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The provisional record was promoted in place.
    Applied { index: usize },
    /// No provisional record with that id (already reconciled or rolled back).
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted { index: usize },
    Updated { index: usize },
}

/// Ordered records currently rendered by one view.
///
/// Every effective mutation bumps [`revision`](Self::revision), which is the
/// re-render signal observed by the view layer. Mutations that find nothing
/// to do leave the revision untouched.
///
/// The store also remembers the revision at which each authoritative record
/// last changed and at which ids were removed, so that
/// [`reset_with`](Self::reset_with) can tell a stale listing apart from local
/// knowledge gained while the listing was in flight.
#[derive(Debug, Default)]
pub struct LocalProjectionStore {
    records: Vec<DomainRecord>,
    revision: u64,
    changed_at: HashMap<RecordId, u64>,
    removed_at: HashMap<RecordId, u64>,
}

impl LocalProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record at the end. The id must not be present yet.
    pub fn append(&mut self, record: DomainRecord) -> Result<(), AppError> {
        if self.contains(&record.id) {
            return Err(AppError::Conflict(format!(
                "Record {} is already present in the projection",
                record.id
            )));
        }
        let id = (!record.is_provisional).then(|| record.id.clone());
        self.records.push(record);
        self.touch();
        if let Some(id) = id {
            self.mark_changed(id);
        }
        Ok(())
    }

    /// Promotes the provisional record `id` to `next` without moving it.
    ///
    /// If the authoritative row already reached the store (a realtime echo of
    /// our own write), the echo is dropped so the id stays unique and the
    /// provisional slot wins.
    pub fn replace(&mut self, id: &RecordId, next: &ServerRecord) -> ReplaceOutcome {
        let Some(mut index) = self
            .records
            .iter()
            .position(|record| &record.id == id && record.is_provisional)
        else {
            return ReplaceOutcome::Missing;
        };

        let promoted = self.records[index].promoted(next);
        if &promoted.id != id {
            if let Some(echo) = self.position(&promoted.id) {
                self.records.remove(echo);
                if echo < index {
                    index -= 1;
                }
            }
        }

        let promoted_id = promoted.id.clone();
        self.records[index] = promoted;
        self.touch();
        self.mark_changed(promoted_id);
        ReplaceOutcome::Applied { index }
    }

    /// Removes `id`, returning the record and the slot it occupied.
    pub fn remove(&mut self, id: &RecordId) -> Option<(usize, DomainRecord)> {
        let index = self.position(id)?;
        let record = self.records.remove(index);
        self.touch();
        self.changed_at.remove(&record.id);
        self.removed_at.insert(record.id.clone(), self.revision);
        Some((index, record))
    }

    /// Puts back a record taken out by an optimistic delete.
    pub fn restore(&mut self, index: usize, record: DomainRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        let index = index.min(self.records.len());
        let id = record.id.clone();
        self.records.insert(index, record);
        self.touch();
        self.removed_at.remove(&id);
        self.mark_changed(id);
        true
    }

    /// Merges a row pushed by another actor. Known ids are updated in place;
    /// new ones are inserted before the first record created strictly later.
    pub fn merge_remote(&mut self, row: ServerRecord) -> MergeOutcome {
        let id = row.id.clone();
        let outcome = match self.position(&row.id) {
            Some(index) => {
                self.records[index].apply_remote(&row);
                MergeOutcome::Updated { index }
            }
            None => {
                let index = self.insertion_point(&row.created_at);
                self.records.insert(index, row.into_domain_record());
                MergeOutcome::Inserted { index }
            }
        };
        self.touch();
        self.mark_changed(id);
        outcome
    }

    /// Re-fetch convergence against a listing requested at revision `since`.
    ///
    /// Authoritative records take the server order of `rows`, merged into
    /// what is already known about each id. Local knowledge newer than
    /// `since` wins over the listing: records promoted or pushed after it
    /// are kept even when `rows` misses them, and ids removed after it are
    /// not brought back. Provisional records are kept after everything else.
    pub fn reset_with(&mut self, rows: Vec<ServerRecord>, since: u64) {
        let (provisional, mut known): (Vec<DomainRecord>, Vec<DomainRecord>) = self
            .records
            .drain(..)
            .partition(|record| record.is_provisional);

        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            if !seen.insert(row.id.clone()) || self.removed_after(&row.id, since) {
                continue;
            }
            let record = match known.iter().position(|record| record.id == row.id) {
                Some(index) => {
                    let mut record = known.remove(index);
                    record.apply_remote(&row);
                    record
                }
                None => row.into_domain_record(),
            };
            self.records.push(record);
        }

        for record in known {
            if self.changed_after(&record.id, since) {
                let index = self.insertion_point(&record.created_at);
                self.records.insert(index, record);
            }
        }
        self.records.extend(provisional);

        let records = &self.records;
        self.changed_at
            .retain(|id, _| records.iter().any(|record| &record.id == id));
        self.removed_at.retain(|_, at| *at > since);
        self.touch();
    }

    pub fn clear(&mut self) {
        self.changed_at.clear();
        self.removed_at.clear();
        if !self.records.is_empty() {
            self.records.clear();
            self.touch();
        }
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            records: &self.records,
            revision: self.revision,
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&DomainRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    /// True iff the record exists and is still flagged provisional.
    pub fn is_provisional(&self, id: &RecordId) -> bool {
        self.get(id).is_some_and(|record| record.is_provisional)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn mark_changed(&mut self, id: RecordId) {
        self.changed_at.insert(id, self.revision);
    }

    fn changed_after(&self, id: &RecordId, since: u64) -> bool {
        self.changed_at.get(id).is_some_and(|at| *at > since)
    }

    fn removed_after(&self, id: &RecordId, since: u64) -> bool {
        self.removed_at.get(id).is_some_and(|at| *at > since)
    }

    fn insertion_point(&self, created_at: &DateTime<Utc>) -> usize {
        self.records
            .iter()
            .position(|record| &record.created_at > created_at)
            .unwrap_or(self.records.len())
    }
}

/// Read-only view over the store at one revision. Iterating it is lazy and
/// can be restarted any number of times.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    records: &'a [DomainRecord],
    revision: u64,
}

impl<'a> Snapshot<'a> {
    pub fn iter(&self) -> std::slice::Iter<'a, DomainRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a DomainRecord> {
        self.records.get(index)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn ids(&self) -> impl Iterator<Item = &'a RecordId> + 'a {
        self.records.iter().map(|record| &record.id)
    }

    pub fn to_vec(&self) -> Vec<DomainRecord> {
        self.records.to_vec()
    }
}

impl<'a> IntoIterator for Snapshot<'a> {
    type Item = &'a DomainRecord;
    type IntoIter = std::slice::Iter<'a, DomainRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &Snapshot<'a> {
    type Item = &'a DomainRecord;
    type IntoIter = std::slice::Iter<'a, DomainRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
