//! Append-only change log
//!
//! Every edit ever applied to a session model is recorded here as an
//! immutable [`Change`] keyed by a strictly increasing serial. Undo moves
//! a split pointer backward over whole transactions; the changes beyond
//! the pointer stay in the log for redo until the next append discards
//! them. Segments reference changes by serial and read payload bytes
//! through [`ChangeLog::bytes_at`], so payload storage stays private to
//! the log.

use std::sync::Arc;

use crate::error::{EditError, Result};

/// Unique sequential identifier for each change. Serials start at 1;
/// verbs report 0 when no change was appended.
pub type Serial = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Overwrite,
    Delete,
}

/// One atomic edit, immutable once appended.
#[derive(Debug)]
pub struct Change {
    serial: Serial,
    transaction_bit: u8,
    kind: ChangeKind,
    offset: u64,
    length: u64,
    bytes: Arc<[u8]>,
}

impl Change {
    #[must_use]
    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// One bit, alternated per transaction, shared by every change in the
    /// same transaction.
    #[must_use]
    pub fn transaction_bit(&self) -> u8 {
        self.transaction_bit
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Logical offset at which the change applied, at the moment it was
    /// applied.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes inserted, overwritten, or deleted.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Payload for insert/overwrite; empty for delete.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Transaction state machine: `Idle -> begin -> Opened -> first edit ->
/// InProgress -> end -> Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    /// `begin_transaction` called, no change appended yet.
    Opened,
    /// At least one change appended inside the open transaction.
    InProgress,
}

/// Tail-appended ordered sequence of changes with an undo split pointer.
#[derive(Debug, Default)]
pub struct ChangeLog {
    changes: Vec<Arc<Change>>,
    /// Changes at indexes below this are applied; the rest are undone but
    /// retained for redo.
    applied: usize,
    state: TransactionState,
    current_bit: u8,
    applied_transactions: u64,
    undone_transactions: u64,
    dirty: bool,
}

impl ChangeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, discarding any redo history first. Returns the
    /// assigned serial.
    pub fn append(
        &mut self,
        kind: ChangeKind,
        offset: u64,
        length: u64,
        bytes: Arc<[u8]>,
    ) -> Serial {
        self.truncate_undone();
        match self.state {
            TransactionState::Idle => {
                self.current_bit = self.next_bit();
                self.applied_transactions += 1;
            }
            TransactionState::Opened => {
                self.current_bit = self.next_bit();
                self.applied_transactions += 1;
                self.state = TransactionState::InProgress;
            }
            TransactionState::InProgress => {}
        }
        let serial = self.changes.len() as Serial + 1;
        self.changes.push(Arc::new(Change {
            serial,
            transaction_bit: self.current_bit,
            kind,
            offset,
            length,
            bytes,
        }));
        self.applied = self.changes.len();
        self.dirty = true;
        serial
    }

    /// Open a transaction so subsequent changes share one transaction bit.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.state != TransactionState::Idle {
            return Err(EditError::TransactionState("begin inside an open transaction"));
        }
        self.state = TransactionState::Opened;
        Ok(())
    }

    /// Close the open transaction.
    pub fn end_transaction(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Idle => {
                Err(EditError::TransactionState("end without an open transaction"))
            }
            TransactionState::Opened | TransactionState::InProgress => {
                self.state = TransactionState::Idle;
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    /// Move the split pointer back over the most recent transaction.
    /// Returns the undone changes in application order, or `None` when
    /// nothing is applied.
    pub fn undo(&mut self) -> Option<Vec<Arc<Change>>> {
        if self.applied == 0 {
            return None;
        }
        let bit = self.changes[self.applied - 1].transaction_bit;
        let mut first = self.applied;
        while first > 0 && self.changes[first - 1].transaction_bit == bit {
            first -= 1;
        }
        let undone = self.changes[first..self.applied].to_vec();
        self.applied = first;
        self.applied_transactions -= 1;
        self.undone_transactions += 1;
        self.dirty = true;
        Some(undone)
    }

    /// Move the split pointer forward over the next undone transaction.
    /// Returns the redone changes in application order, or `None` when
    /// nothing is undone.
    pub fn redo(&mut self) -> Option<Vec<Arc<Change>>> {
        if self.applied == self.changes.len() {
            return None;
        }
        let bit = self.changes[self.applied].transaction_bit;
        let mut end = self.applied;
        while end < self.changes.len() && self.changes[end].transaction_bit == bit {
            end += 1;
        }
        let redone = self.changes[self.applied..end].to_vec();
        self.applied = end;
        self.applied_transactions += 1;
        self.undone_transactions -= 1;
        self.dirty = true;
        Some(redone)
    }

    /// Drop every change and reset counters.
    pub fn clear(&mut self) {
        self.changes.clear();
        self.applied = 0;
        self.applied_transactions = 0;
        self.undone_transactions = 0;
        self.current_bit = 0;
        self.dirty = true;
    }

    /// Changes in the applied prefix, in application order.
    #[must_use]
    pub fn applied_changes(&self) -> &[Arc<Change>] {
        &self.changes[..self.applied]
    }

    /// The most recent applied (not undone) change.
    #[must_use]
    pub fn last_change(&self) -> Option<&Arc<Change>> {
        self.applied.checked_sub(1).map(|i| &self.changes[i])
    }

    /// The most recently undone change, i.e. the head of the redo queue.
    #[must_use]
    pub fn last_undone_change(&self) -> Option<&Arc<Change>> {
        self.changes.get(self.applied)
    }

    /// Look up a change by serial, applied or undone.
    #[must_use]
    pub fn change(&self, serial: Serial) -> Option<&Arc<Change>> {
        if serial < 1 {
            return None;
        }
        self.changes.get(serial as usize - 1)
    }

    /// Payload bytes of change `serial` at `offset..offset+len`.
    ///
    /// Segments only reference ranges they were created from, so a miss
    /// here is an internal invariant violation and panics.
    #[must_use]
    pub fn bytes_at(&self, serial: Serial, offset: u64, len: u64) -> &[u8] {
        let change = &self.changes[serial as usize - 1];
        &change.bytes[offset as usize..(offset + len) as usize]
    }

    #[must_use]
    pub fn num_changes(&self) -> usize {
        self.applied
    }

    #[must_use]
    pub fn num_undone_changes(&self) -> usize {
        self.changes.len() - self.applied
    }

    #[must_use]
    pub fn num_transactions(&self) -> u64 {
        self.applied_transactions
    }

    #[must_use]
    pub fn num_undone_transactions(&self) -> u64 {
        self.undone_transactions
    }

    /// Whether the log has mutated since the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Roll the applied prefix back to `count` changes, dropping the rest
    /// outright as if they never happened. Used to unwind a partially
    /// emitted transform.
    pub(crate) fn truncate_applied_to(&mut self, count: usize) {
        self.truncate_undone();
        self.changes.truncate(count);
        self.applied = self.changes.len();
        let mut transactions = 0;
        let mut last_bit = None;
        for change in &self.changes {
            if last_bit != Some(change.transaction_bit) {
                transactions += 1;
                last_bit = Some(change.transaction_bit);
            }
        }
        self.applied_transactions = transactions;
        self.dirty = true;
    }

    fn truncate_undone(&mut self) {
        if self.applied < self.changes.len() {
            self.changes.truncate(self.applied);
            self.undone_transactions = 0;
        }
    }

    fn next_bit(&self) -> u8 {
        match self.changes[..self.applied].last() {
            Some(last) => last.transaction_bit ^ 1,
            None => 0,
        }
    }
}
