use std::collections::VecDeque;

use crate::image::DrawableId;
use crate::region::Rect;
use crate::tiles::TileManager;

// ============================================================================
// UNDO STEP – "before" pixels of one drawable rectangle
// ============================================================================

/// Pixel snapshot of `rect` on `drawable`. Undoing swaps `tiles` with the
/// drawable's current content, so the same step then serves as the redo step.
#[derive(Debug, Clone)]
pub struct UndoStep {
    pub drawable: DrawableId,
    pub rect: Rect,
    pub tiles: TileManager,
    pub description: String,
}

impl UndoStep {
    pub fn memory_size(&self) -> usize {
        self.rect.width as usize * self.rect.height as usize * self.tiles.bpp()
    }
}

// ============================================================================
// UNDO STACK – freeze counter, bounded undo list, redo list
// ============================================================================

#[derive(Debug)]
pub struct UndoStack {
    undo: VecDeque<UndoStep>,
    redo: VecDeque<UndoStep>,
    max_steps: usize,
    freeze_count: u32,
    total_memory: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(50)
    }
}

impl UndoStack {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_steps: max_steps.max(1),
            freeze_count: 0,
            total_memory: 0,
        }
    }

    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps.max(1);
        self.prune();
    }

    // ---- freeze / thaw ------------------------------------------------------

    pub fn freeze(&mut self) {
        self.freeze_count += 1;
    }

    pub fn thaw(&mut self) {
        debug_assert!(self.freeze_count > 0, "undo thawed more often than frozen");
        self.freeze_count = self.freeze_count.saturating_sub(1);
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_count > 0
    }

    pub fn freeze_count(&self) -> u32 {
        self.freeze_count
    }

    // ---- recording ----------------------------------------------------------

    /// Record a step. Returns `false` (and drops the step) while frozen.
    pub fn push(&mut self, step: UndoStep) -> bool {
        if self.is_frozen() {
            crate::log_info!("undo frozen, dropping step '{}'", step.description);
            return false;
        }
        for old in self.redo.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(old.memory_size());
        }
        self.total_memory += step.memory_size();
        self.undo.push_back(step);
        self.prune();
        true
    }

    /// Pop the newest step, let `swap` exchange its pixels with the drawable,
    /// and move it to the redo list. `swap` returns `false` if the drawable is
    /// gone, in which case the step is discarded.
    pub fn undo(&mut self, swap: impl FnOnce(&mut UndoStep) -> bool) -> Option<String> {
        let mut step = self.undo.pop_back()?;
        let description = step.description.clone();
        if swap(&mut step) {
            self.redo.push_back(step);
        } else {
            self.total_memory = self.total_memory.saturating_sub(step.memory_size());
        }
        Some(description)
    }

    pub fn redo(&mut self, swap: impl FnOnce(&mut UndoStep) -> bool) -> Option<String> {
        let mut step = self.redo.pop_back()?;
        let description = step.description.clone();
        if swap(&mut step) {
            self.undo.push_back(step);
        } else {
            self.total_memory = self.total_memory.saturating_sub(step.memory_size());
        }
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo.back().map(|s| s.description.as_str())
    }

    /// Snapshot bytes held by both lists.
    pub fn memory_size(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.total_memory = 0;
    }

    fn prune(&mut self) {
        while self.undo.len() > self.max_steps {
            if let Some(removed) = self.undo.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }
}
