//! Edit session: owns the model stack, viewports, and event dispatch
//!
//! A session is a stack of models, each pairing a byte source with a
//! change log and segment map. The base model reads the backing file;
//! every checkpoint pushes a model whose source is a spill file holding
//! the logical bytes at the moment the checkpoint was taken. Edits, undo,
//! and redo operate on the top model; `destroy_last_checkpoint` pops a
//! layer and with it every change made since that checkpoint.
//!
//! Mutating verbs run to completion before returning: validate, append to
//! the log, patch the segment map, adjust floating viewports, reload
//! affected windows, then dispatch events. Event callbacks run with a
//! dispatching flag raised; a callback that re-enters a mutating verb gets
//! `Reentrancy` instead of a torn session.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::byte_source::ByteSource;
use crate::change::{Change, ChangeKind, ChangeLog, Serial, TransactionState};
use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::constants::{IO_CHUNK, TRANSFORM_WINDOW, VIEWPORT_CAPACITY_MAX};
use crate::error::{EditError, Result};
use crate::event::{SessionEvent, ViewportEvent};
use crate::profile::{
    accumulate_frequency, ByteFrequencyProfile, ByteOrderMark, CharacterCounter, CharacterCounts,
};
use crate::save::{self, SaveFlags};
use crate::search::{SearchContext, SearchDirection};
use crate::segment::{Segment, SegmentMap, SegmentSource};
use crate::viewport::{Viewport, ViewportCallback, ViewportId};

/// Callback fired on session events. The change is `None` for events that
/// no single change triggered (create, save, clear, transform).
pub type SessionCallback = Box<dyn FnMut(SessionEvent, Option<&Arc<Change>>)>;

/// One layer of the model stack.
struct Model {
    source: ByteSource,
    log: ChangeLog,
    map: SegmentMap,
    checkpoint: Option<Checkpoint>,
}

impl Model {
    fn new(source: ByteSource) -> Self {
        let len = source.len();
        Model {
            source,
            log: ChangeLog::new(),
            map: SegmentMap::new(len),
            checkpoint: None,
        }
    }

    /// Append the logical bytes of `[offset, offset + length)` to `out`.
    fn read_range(&self, offset: u64, length: u64, out: &mut Vec<u8>) -> Result<()> {
        let mut failed = None;
        self.map.walk_range(offset..offset + length, &mut |_, seg| {
            if failed.is_some() {
                return;
            }
            match seg.source {
                SegmentSource::Backing { offset } => {
                    let start = out.len();
                    out.resize(start + seg.len as usize, 0);
                    if let Err(e) = self.source.read_at(offset, &mut out[start..]) {
                        failed = Some(e);
                    }
                }
                SegmentSource::Change { serial, offset } => {
                    out.extend_from_slice(self.log.bytes_at(serial, offset, seg.len));
                }
            }
        });
        match failed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream `[offset, offset + length)` to `out`, reading backing
    /// segments in fixed chunks and checking for cancellation between
    /// them.
    fn write_range(
        &self,
        offset: u64,
        length: u64,
        out: &mut dyn Write,
        cancel: &Cell<bool>,
    ) -> Result<()> {
        let mut failed = None;
        self.map.walk_range(offset..offset + length, &mut |_, seg| {
            if failed.is_some() {
                return;
            }
            if cancel.get() {
                failed = Some(EditError::Cancelled);
                return;
            }
            let result = match seg.source {
                SegmentSource::Backing { offset } => {
                    self.copy_backing_chunked(offset, seg.len, out, cancel)
                }
                SegmentSource::Change { serial, offset } => out
                    .write_all(self.log.bytes_at(serial, offset, seg.len))
                    .map_err(EditError::from),
            };
            if let Err(e) = result {
                failed = Some(e);
            }
        });
        match failed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn copy_backing_chunked(
        &self,
        mut offset: u64,
        mut remaining: u64,
        out: &mut dyn Write,
        cancel: &Cell<bool>,
    ) -> Result<()> {
        let mut buf = vec![0u8; IO_CHUNK.min(remaining as usize)];
        while remaining > 0 {
            if cancel.get() {
                return Err(EditError::Cancelled);
            }
            let n = (IO_CHUNK as u64).min(remaining) as usize;
            self.source.read_at(offset, &mut buf[..n])?;
            out.write_all(&buf[..n])?;
            offset += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Patch the segment map for one change.
    fn apply_change(map: &mut SegmentMap, change: &Change) {
        let offset = change.offset();
        let length = change.length();
        match change.kind() {
            ChangeKind::Insert => {
                map.insert(offset, Segment::change(change.serial(), 0, length));
            }
            ChangeKind::Delete => {
                map.delete(offset, length);
            }
            ChangeKind::Overwrite => {
                // An overwrite past the current end extends the file; only
                // the covered prefix is replaced.
                let covered = length.min(map.len() - offset);
                map.delete(offset, covered);
                map.insert(offset, Segment::change(change.serial(), 0, length));
            }
        }
    }

    /// Rebuild the map by replaying the applied prefix of the log.
    fn rebuild_map(&mut self) {
        let mut map = SegmentMap::new(self.source.len());
        for change in self.log.applied_changes() {
            Self::apply_change(&mut map, change);
        }
        self.map = map;
    }
}

/// An edit session over an optional backing file.
pub struct Session {
    file_path: Option<PathBuf>,
    models: Vec<Model>,
    checkpoints: CheckpointManager,
    viewports: Vec<Viewport>,
    next_viewport_id: ViewportId,
    callback: Option<SessionCallback>,
    event_mask: SessionEvent,
    /// Raised while a callback runs; mutating verbs refuse to re-enter.
    dispatching: Cell<bool>,
    cancel: Cell<bool>,
    /// Raised while a transform emits its windows so per-window edits stay
    /// unobservable.
    quiet: bool,
    last_error: RefCell<Option<String>>,
}

impl Session {
    /// Open a session with no event delivery.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        Self::with_callback(path, None, SessionEvent::NO_EVENTS, None)
    }

    /// Open a session with a subscriber. Checkpoint spill files go to
    /// `checkpoint_dir`, defaulting to the backing file's directory, or
    /// the system temp directory for file-less sessions.
    pub fn with_callback(
        path: Option<&Path>,
        callback: Option<SessionCallback>,
        event_mask: SessionEvent,
        checkpoint_dir: Option<&Path>,
    ) -> Result<Self> {
        let source = match path {
            Some(p) => ByteSource::open(p)?,
            None => ByteSource::empty(),
        };
        let checkpoint_dir = checkpoint_dir
            .map(Path::to_path_buf)
            .or_else(|| {
                path.and_then(Path::parent)
                    .filter(|d| !d.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .unwrap_or_else(std::env::temp_dir);

        let mut session = Session {
            file_path: path.map(Path::to_path_buf),
            models: vec![Model::new(source)],
            checkpoints: CheckpointManager::new(checkpoint_dir),
            viewports: Vec::new(),
            next_viewport_id: 1,
            callback,
            event_mask,
            dispatching: Cell::new(false),
            cancel: Cell::new(false),
            quiet: false,
            last_error: RefCell::new(None),
        };
        session.fire_session_event(SessionEvent::CREATE, None);
        Ok(session)
    }

    // --- Accessors ---

    /// Computed logical file size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.top().map.len()
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Directory receiving checkpoint spill files.
    #[must_use]
    pub fn checkpoint_directory(&self) -> &Path {
        self.checkpoints.directory()
    }

    /// Applied changes across the whole model stack.
    #[must_use]
    pub fn num_changes(&self) -> usize {
        self.models.iter().map(|m| m.log.num_changes()).sum()
    }

    /// Undone-but-redoable changes across the stack.
    #[must_use]
    pub fn num_undone_changes(&self) -> usize {
        self.models.iter().map(|m| m.log.num_undone_changes()).sum()
    }

    /// Applied transaction groups across the stack.
    #[must_use]
    pub fn num_change_transactions(&self) -> u64 {
        self.models.iter().map(|m| m.log.num_transactions()).sum()
    }

    /// Undone transaction groups across the stack.
    #[must_use]
    pub fn num_undone_change_transactions(&self) -> u64 {
        self.models
            .iter()
            .map(|m| m.log.num_undone_transactions())
            .sum()
    }

    /// Checkpoints currently stacked.
    #[must_use]
    pub fn num_checkpoints(&self) -> usize {
        self.models.len() - 1
    }

    /// The most recent checkpoint, if any.
    #[must_use]
    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.top().checkpoint.as_ref()
    }

    #[must_use]
    pub fn num_viewports(&self) -> usize {
        self.viewports.len()
    }

    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.top().log.transaction_state()
    }

    /// Most recent applied change of the current (top) model.
    #[must_use]
    pub fn last_change(&self) -> Option<Arc<Change>> {
        self.top().log.last_change().cloned()
    }

    /// Most recently undone change of the current model — the head of
    /// the redo queue.
    #[must_use]
    pub fn last_undo(&self) -> Option<Arc<Change>> {
        self.top().log.last_undone_change().cloned()
    }

    /// Look up a change of the current model by serial.
    #[must_use]
    pub fn change(&self, serial: Serial) -> Option<Arc<Change>> {
        self.top().log.change(serial).cloned()
    }

    /// Whether any model mutated since the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.models.iter().any(|m| m.log.is_dirty())
    }

    /// Diagnostic string of the most recent failure.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Request cooperative cancellation; save and search observe it
    /// between chunks and return `Cancelled`.
    pub fn request_cancel(&self) {
        self.cancel.set(true);
    }

    pub fn clear_cancel(&self) {
        self.cancel.set(false);
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.get()
    }

    /// Read `length` logical bytes at `offset`.
    pub fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let size = self.size();
        if offset > size || length > size - offset {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        let mut out = Vec::with_capacity(length as usize);
        self.top().read_range(offset, length, &mut out)?;
        Ok(out)
    }

    // --- Edit verbs ---

    /// Insert `bytes` at `offset`, shifting the tail right. Returns the
    /// change serial, or 0 for an empty payload.
    pub fn insert(&mut self, offset: u64, bytes: &[u8]) -> Result<Serial> {
        self.check_mutable()?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let size = self.size();
        if offset > size {
            return self.fail(EditError::Range {
                offset,
                length: bytes.len() as u64,
                size,
            });
        }
        let length = bytes.len() as u64;
        let model = self.top_mut();
        let serial = model
            .log
            .append(ChangeKind::Insert, offset, length, bytes.into());
        model
            .map
            .insert(offset, Segment::change(serial, 0, length));
        let change = model.log.last_change().expect("just appended").clone();
        self.after_edit(&change)?;
        Ok(serial)
    }

    /// Overwrite bytes starting at `offset`. Writing past the current end
    /// extends the file; the past-end suffix behaves as an insert.
    /// Returns the change serial, or 0 for an empty payload.
    pub fn overwrite(&mut self, offset: u64, bytes: &[u8]) -> Result<Serial> {
        self.check_mutable()?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let size = self.size();
        if offset > size {
            return self.fail(EditError::Range {
                offset,
                length: bytes.len() as u64,
                size,
            });
        }
        let length = bytes.len() as u64;
        let model = self.top_mut();
        let serial = model
            .log
            .append(ChangeKind::Overwrite, offset, length, bytes.into());
        let change = model.log.last_change().expect("just appended").clone();
        Model::apply_change(&mut model.map, &change);
        self.after_edit(&change)?;
        Ok(serial)
    }

    /// Delete `length` bytes at `offset`, shifting the tail left. Returns
    /// the change serial, or 0 for a zero-length delete.
    pub fn delete(&mut self, offset: u64, length: u64) -> Result<Serial> {
        self.check_mutable()?;
        if length == 0 {
            return Ok(0);
        }
        let size = self.size();
        if offset >= size || length > size - offset {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        let model = self.top_mut();
        let serial = model
            .log
            .append(ChangeKind::Delete, offset, length, Arc::from(Vec::new()));
        model.map.delete(offset, length);
        let change = model.log.last_change().expect("just appended").clone();
        self.after_edit(&change)?;
        Ok(serial)
    }

    /// Undo the most recent transaction of the current model. Returns the
    /// negative serial of the final change undone, or 0 when nothing is
    /// applied.
    pub fn undo(&mut self) -> Result<Serial> {
        self.check_mutable()?;
        let model = self.top_mut();
        let Some(undone) = model.log.undo() else {
            return Ok(0);
        };
        model.rebuild_map();

        // Floating viewports track content back through the inverse of
        // each undone change, newest first.
        for change in undone.iter().rev() {
            for vp in &mut self.viewports {
                match change.kind() {
                    ChangeKind::Insert => vp.shift_for_delete(change.offset(), change.length()),
                    ChangeKind::Delete => vp.shift_for_insert(change.offset(), change.length()),
                    ChangeKind::Overwrite => {}
                }
            }
        }
        let trigger = if undone.len() == 1 {
            Some(undone[0].clone())
        } else {
            None
        };
        self.refresh_all_viewports(ViewportEvent::EDIT, trigger.as_ref())?;
        for change in undone.iter().rev() {
            self.fire_session_event(SessionEvent::UNDO, Some(change));
        }
        Ok(-undone[0].serial())
    }

    /// Redo the most recently undone transaction. Returns the serial of
    /// the final change redone, or 0 when nothing is undone.
    pub fn redo(&mut self) -> Result<Serial> {
        self.check_mutable()?;
        let model = self.top_mut();
        let Some(redone) = model.log.redo() else {
            return Ok(0);
        };
        for change in &redone {
            Model::apply_change(&mut model.map, change);
        }
        for change in &redone {
            for vp in &mut self.viewports {
                match change.kind() {
                    ChangeKind::Insert => vp.shift_for_insert(change.offset(), change.length()),
                    ChangeKind::Delete => vp.shift_for_delete(change.offset(), change.length()),
                    ChangeKind::Overwrite => {}
                }
            }
        }
        let trigger = if redone.len() == 1 {
            Some(redone[0].clone())
        } else {
            None
        };
        self.refresh_all_viewports(ViewportEvent::EDIT, trigger.as_ref())?;
        for change in &redone {
            self.fire_session_event(SessionEvent::REDO, Some(change));
        }
        Ok(redone[redone.len() - 1].serial())
    }

    /// Group subsequent edits into one transaction until
    /// `end_transaction`.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.check_mutable()?;
        match self.top_mut().log.begin_transaction() {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    pub fn end_transaction(&mut self) -> Result<()> {
        self.check_mutable()?;
        match self.top_mut().log.end_transaction() {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Drop every change of the current model, reverting it to its base
    /// bytes.
    pub fn clear_changes(&mut self) -> Result<()> {
        self.check_mutable()?;
        let model = self.top_mut();
        model.log.clear();
        model.rebuild_map();
        self.refresh_all_viewports(ViewportEvent::EDIT, None)?;
        self.fire_session_event(SessionEvent::CLEAR, None);
        Ok(())
    }

    // --- Transforms and checkpoints ---

    /// Apply a per-byte transform to `[offset, offset + length)`;
    /// `length == 0` spans through end of file. The transform is emitted
    /// as overwrite changes inside one transaction so undo reverts it
    /// atomically. A checkpoint is taken first unless the range is still
    /// pristine backing bytes.
    pub fn apply_transform(
        &mut self,
        transform: impl Fn(u8) -> u8,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        self.check_mutable()?;
        let size = self.size();
        if offset > size {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        let length = if length == 0 { size - offset } else { length };
        if length > size - offset {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        if length == 0 {
            return Ok(());
        }
        let end = offset + length;

        if !self.top().map.is_range_backing(offset..end) {
            self.push_checkpoint()?;
        }

        let touched: Vec<usize> = (0..self.viewports.len())
            .filter(|&i| self.viewports[i].intersects(offset, length))
            .collect();
        for &i in &touched {
            self.fire_viewport_event(i, ViewportEvent::TRANSFORM_START, None);
        }

        let in_transaction = self.transaction_state() != TransactionState::Idle;
        if !in_transaction {
            self.top_mut().log.begin_transaction()?;
        }
        let applied_before = self.top().log.num_changes();
        self.quiet = true;

        let mut pos = offset;
        let result = loop {
            if pos >= end {
                break Ok(());
            }
            if self.cancel.get() {
                break Err(EditError::Cancelled);
            }
            let window = (TRANSFORM_WINDOW as u64).min(end - pos);
            let mut bytes = match self.read(pos, window) {
                Ok(b) => b,
                Err(e) => break Err(e),
            };
            for b in bytes.iter_mut() {
                *b = transform(*b);
            }
            if let Err(e) = self.overwrite(pos, &bytes) {
                break Err(e);
            }
            pos += window;
        };

        self.quiet = false;
        if !in_transaction {
            self.top_mut().log.end_transaction()?;
        }

        if let Err(e) = result {
            // Roll the partial transform back out of the log entirely.
            let model = self.top_mut();
            model.log.truncate_applied_to(applied_before);
            model.rebuild_map();
            return self.fail(e);
        }

        self.refresh_all_viewports(ViewportEvent::NO_EVENTS, None)?;
        for &i in &touched {
            self.fire_viewport_event(i, ViewportEvent::TRANSFORM_END, None);
        }
        self.fire_session_event(SessionEvent::TRANSFORM, None);
        log::debug!("transformed [{offset}, {end}) in {} byte windows", TRANSFORM_WINDOW);
        Ok(())
    }

    /// Pop the most recent checkpoint, discarding every change made since
    /// it was taken. Returns false when no checkpoint exists or a
    /// callback is in flight.
    pub fn destroy_last_checkpoint(&mut self) -> bool {
        if self.dispatching.get() || self.models.len() <= 1 {
            return false;
        }
        self.models.pop();
        log::debug!("checkpoint popped, {} remain", self.num_checkpoints());
        let _ = self.refresh_all_viewports(ViewportEvent::EDIT, None);
        true
    }

    /// Spill the logical file and push a fresh model on top of it.
    fn push_checkpoint(&mut self) -> Result<()> {
        let size = self.size();
        let spill = self.checkpoints.create_spill()?;
        self.top()
            .write_range(0, size, &mut spill.as_file(), &self.cancel)?;
        spill.as_file().sync_all()?;

        let source = ByteSource::open(spill.path())?;
        let serial = self
            .top()
            .log
            .last_change()
            .map(|c| c.serial())
            .unwrap_or(0);
        let mut model = Model::new(source);
        model.checkpoint = Some(Checkpoint::new(spill, 0, size, serial));
        self.models.push(model);
        Ok(())
    }

    // --- Viewports ---

    /// Create a viewport over `[offset, offset + capacity)`. Floating
    /// viewports track their content when edits land before them.
    pub fn create_viewport(
        &mut self,
        offset: u64,
        capacity: usize,
        floating: bool,
        callback: Option<ViewportCallback>,
        event_mask: ViewportEvent,
    ) -> Result<ViewportId> {
        self.check_mutable()?;
        if capacity == 0 || capacity > VIEWPORT_CAPACITY_MAX {
            return self.fail(EditError::Range {
                offset,
                length: capacity as u64,
                size: VIEWPORT_CAPACITY_MAX as u64,
            });
        }
        let id = self.next_viewport_id;
        self.next_viewport_id += 1;
        let mut viewport = Viewport::new(id, offset, capacity, floating, callback, event_mask);
        viewport.set_data(self.read_clamped(offset, capacity as u64)?);
        self.viewports.push(viewport);
        self.fire_viewport_event(self.viewports.len() - 1, ViewportEvent::CREATE, None);
        self.fire_session_event(SessionEvent::CREATE_VIEWPORT, None);
        Ok(id)
    }

    /// Destroy a viewport. Returns false for an unknown handle or when a
    /// callback is in flight.
    pub fn destroy_viewport(&mut self, id: ViewportId) -> bool {
        if self.dispatching.get() {
            return false;
        }
        let Some(idx) = self.viewport_index(id) else {
            return false;
        };
        self.fire_viewport_event(idx, ViewportEvent::DESTROY, None);
        self.viewports.remove(idx);
        true
    }

    /// Move or resize a viewport, reloading its cache.
    pub fn update_viewport(
        &mut self,
        id: ViewportId,
        offset: u64,
        capacity: usize,
        floating: bool,
    ) -> Result<()> {
        self.check_mutable()?;
        if capacity == 0 || capacity > VIEWPORT_CAPACITY_MAX {
            return self.fail(EditError::Range {
                offset,
                length: capacity as u64,
                size: VIEWPORT_CAPACITY_MAX as u64,
            });
        }
        let Some(idx) = self.viewport_index(id) else {
            return self.fail(EditError::Range {
                offset: id,
                length: 0,
                size: 0,
            });
        };
        self.viewports[idx].set_window(offset, capacity, floating);
        let data = self.read_clamped(offset, capacity as u64)?;
        self.viewports[idx].set_data(data);
        self.fire_viewport_event(idx, ViewportEvent::UPDATED, None);
        Ok(())
    }

    /// Cached bytes of a viewport.
    #[must_use]
    pub fn viewport_data(&self, id: ViewportId) -> Option<&[u8]> {
        self.viewport(id).map(Viewport::data)
    }

    #[must_use]
    pub fn viewport_offset(&self, id: ViewportId) -> Option<u64> {
        self.viewport(id).map(Viewport::offset)
    }

    #[must_use]
    pub fn viewport_length(&self, id: ViewportId) -> Option<usize> {
        self.viewport(id).map(Viewport::length)
    }

    /// Bytes of the logical file beyond the viewport's window.
    #[must_use]
    pub fn viewport_following_byte_count(&self, id: ViewportId) -> Option<u64> {
        let size = self.size();
        self.viewport(id).map(|vp| vp.following_byte_count(size))
    }

    fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.iter().find(|vp| vp.id() == id)
    }

    fn viewport_index(&self, id: ViewportId) -> Option<usize> {
        self.viewports.iter().position(|vp| vp.id() == id)
    }

    // --- Search ---

    /// Create a search context over `[offset, offset + length)`;
    /// `length == 0` spans through end of file.
    pub fn create_search_context(
        &self,
        pattern: &[u8],
        case_insensitive: bool,
        offset: u64,
        length: u64,
        direction: SearchDirection,
    ) -> Result<SearchContext<'_>> {
        SearchContext::new(self, pattern, case_insensitive, offset, length, direction)
    }

    // --- Profiling ---

    /// Identify a byte-order mark at `offset`.
    pub fn detect_bom(&self, offset: u64) -> Result<ByteOrderMark> {
        let size = self.size();
        if offset >= size {
            return Ok(ByteOrderMark::None);
        }
        let prefix = self.read(offset, 4.min(size - offset))?;
        Ok(ByteOrderMark::detect(&prefix))
    }

    /// Per-byte-value occurrence counts over `[offset, offset + length)`;
    /// `length == 0` spans through end of file.
    pub fn byte_frequency_profile(&self, offset: u64, length: u64) -> Result<ByteFrequencyProfile> {
        let (offset, length) = self.resolve_range(offset, length)?;
        let mut profile = [0u64; 256];
        self.scan_range(offset, length, |chunk| {
            accumulate_frequency(&mut profile, chunk);
        })?;
        Ok(profile)
    }

    /// Character-width histogram over `[offset, offset + length)` decoded
    /// under `bom`; `length == 0` spans through end of file.
    pub fn character_counts(
        &self,
        offset: u64,
        length: u64,
        bom: ByteOrderMark,
    ) -> Result<CharacterCounts> {
        let (offset, length) = self.resolve_range(offset, length)?;
        let mut counter = CharacterCounter::new(bom);
        self.scan_range(offset, length, |chunk| counter.push(chunk))?;
        Ok(counter.finish())
    }

    fn resolve_range(&self, offset: u64, length: u64) -> Result<(u64, u64)> {
        let size = self.size();
        if offset > size {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        let length = if length == 0 { size - offset } else { length };
        if length > size - offset {
            return self.fail(EditError::Range {
                offset,
                length,
                size,
            });
        }
        Ok((offset, length))
    }

    fn scan_range(&self, offset: u64, length: u64, mut f: impl FnMut(&[u8])) -> Result<()> {
        let mut pos = offset;
        let end = offset + length;
        while pos < end {
            let n = (IO_CHUNK as u64).min(end - pos);
            let chunk = self.read(pos, n)?;
            f(&chunk);
            pos += n;
        }
        Ok(())
    }

    // --- Save ---

    /// Save the whole logical file to `path` under `flags`, returning the
    /// path actually written.
    pub fn save(&mut self, path: &Path, flags: SaveFlags) -> Result<PathBuf> {
        let size = self.size();
        self.save_segment(path, flags, 0, size)
    }

    /// Save `[start, start + length)` of the logical file;
    /// `length == 0` spans through end of file.
    pub fn save_segment(
        &mut self,
        path: &Path,
        flags: SaveFlags,
        start: u64,
        length: u64,
    ) -> Result<PathBuf> {
        let (start, length) = self.resolve_range(start, length)?;

        if flags == SaveFlags::Overwrite {
            if let Some(backing) = self.file_path.as_deref() {
                if save::paths_equivalent(path, backing)
                    && self.models[0].source.externally_modified()
                {
                    return self.fail(EditError::OriginalModified);
                }
            }
        }
        let dest = match flags {
            SaveFlags::None => save::available_path(path),
            SaveFlags::Overwrite | SaveFlags::ForceOverwrite => path.to_path_buf(),
        };

        let dir = dest
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        match self
            .top()
            .write_range(start, length, &mut tmp.as_file(), &self.cancel)
        {
            Ok(()) => {}
            // The temp file is dropped here, so no partial output survives.
            Err(e) => return self.fail(e),
        }
        tmp.as_file().sync_all()?;

        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        tmp.persist(&dest).map_err(|e| EditError::Io(e.error))?;

        // When the save replaced the backing file, recapture its metadata
        // so only later external writes trip `OriginalModified`.
        if let Some(backing) = self.file_path.as_deref() {
            if save::paths_equivalent(&dest, backing) {
                self.models[0].source.recapture_metadata();
            }
        }
        for model in &mut self.models {
            model.log.mark_clean();
        }
        self.fire_session_event(SessionEvent::SAVE, None);
        log::debug!("saved {length} bytes to {}", dest.display());
        Ok(dest)
    }

    // --- Internal plumbing ---

    fn top(&self) -> &Model {
        self.models.last().expect("model stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Model {
        self.models.last_mut().expect("model stack is never empty")
    }

    fn check_mutable(&self) -> Result<()> {
        if self.dispatching.get() {
            return self.fail(EditError::Reentrancy);
        }
        Ok(())
    }

    fn fail<T>(&self, err: EditError) -> Result<T> {
        *self.last_error.borrow_mut() = Some(err.to_string());
        Err(err)
    }

    fn read_clamped(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let size = self.size();
        if offset >= size {
            return Ok(Vec::new());
        }
        self.read(offset, length.min(size - offset))
    }

    /// Viewport bookkeeping and events after a single applied change.
    fn after_edit(&mut self, change: &Arc<Change>) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        let offset = change.offset();
        let length = change.length();
        let mut affected = Vec::new();
        for (i, vp) in self.viewports.iter_mut().enumerate() {
            let before = vp.offset();
            match change.kind() {
                ChangeKind::Insert => vp.shift_for_insert(offset, length),
                ChangeKind::Delete => vp.shift_for_delete(offset, length),
                ChangeKind::Overwrite => {}
            }
            // Inserts and deletes shift everything at and beyond the edit,
            // so any window not entirely before it is affected.
            let reaches_window = match change.kind() {
                ChangeKind::Overwrite => vp.intersects(offset, length),
                ChangeKind::Insert | ChangeKind::Delete => {
                    vp.offset() + vp.capacity() as u64 > offset
                }
            };
            if reaches_window || vp.offset() != before {
                affected.push(i);
            }
        }
        for i in affected {
            self.reload_viewport(i)?;
            self.fire_viewport_event(i, ViewportEvent::EDIT, Some(change));
        }
        self.fire_session_event(SessionEvent::EDIT, Some(change));
        Ok(())
    }

    /// Reload every viewport; fire `event` per viewport unless it is the
    /// empty mask.
    fn refresh_all_viewports(
        &mut self,
        event: ViewportEvent,
        change: Option<&Arc<Change>>,
    ) -> Result<()> {
        for i in 0..self.viewports.len() {
            self.reload_viewport(i)?;
            if !event.is_empty() {
                self.fire_viewport_event(i, event, change);
            }
        }
        Ok(())
    }

    fn reload_viewport(&mut self, idx: usize) -> Result<()> {
        let offset = self.viewports[idx].offset();
        let capacity = self.viewports[idx].capacity() as u64;
        let data = self.read_clamped(offset, capacity)?;
        self.viewports[idx].set_data(data);
        Ok(())
    }

    fn fire_session_event(&mut self, event: SessionEvent, change: Option<&Arc<Change>>) {
        if self.quiet || !self.event_mask.contains(event) {
            return;
        }
        if let Some(mut cb) = self.callback.take() {
            self.dispatching.set(true);
            cb(event, change);
            self.dispatching.set(false);
            self.callback = Some(cb);
        }
    }

    fn fire_viewport_event(
        &mut self,
        idx: usize,
        event: ViewportEvent,
        change: Option<&Arc<Change>>,
    ) {
        if self.quiet || !self.viewports[idx].event_mask().contains(event) {
            return;
        }
        if let Some(mut cb) = self.viewports[idx].callback.take() {
            self.dispatching.set(true);
            cb(&self.viewports[idx], event, change);
            self.dispatching.set(false);
            self.viewports[idx].callback = Some(cb);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for i in 0..self.viewports.len() {
            self.fire_viewport_event(i, ViewportEvent::DESTROY, None);
        }
        self.fire_session_event(SessionEvent::DESTROY, None);
    }
}
