// ============================================================================
// IDLE LOOP – single-threaded cooperative scheduler
// ============================================================================
//
// Sources are plain `FnMut() -> bool` closures run once per `iterate()`.
// Returning `false` retires a source; dropping its `IdleHandle` cancels it.
// The loop never holds a borrow of its own state while a source runs, so a
// source may add sources or cancel handles (including its own).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Source = Box<dyn FnMut() -> bool>;

struct Entry {
    alive: Rc<Cell<bool>>,
    source: Source,
}

#[derive(Clone, Default)]
pub struct IdleLoop {
    entries: Rc<RefCell<Vec<Entry>>>,
}

impl std::fmt::Debug for IdleLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleLoop").field("pending", &self.pending()).finish()
    }
}

/// Cancellation token for one idle source. Dropping it cancels the source.
#[derive(Debug)]
pub struct IdleHandle {
    alive: Rc<Cell<bool>>,
}

impl IdleHandle {
    pub fn is_active(&self) -> bool {
        self.alive.get()
    }

    /// Explicit form of dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for IdleHandle {
    fn drop(&mut self) {
        self.alive.set(false);
    }
}

impl IdleLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: impl FnMut() -> bool + 'static) -> IdleHandle {
        let alive = Rc::new(Cell::new(true));
        self.entries.borrow_mut().push(Entry {
            alive: Rc::clone(&alive),
            source: Box::new(source),
        });
        IdleHandle { alive }
    }

    /// Number of live sources.
    pub fn pending(&self) -> usize {
        self.entries.borrow().iter().filter(|e| e.alive.get()).count()
    }

    /// Run every live source once, in registration order. Returns whether
    /// any source remains afterwards.
    pub fn iterate(&self) -> bool {
        let mut batch = std::mem::take(&mut *self.entries.borrow_mut());
        for entry in batch.iter_mut() {
            if !entry.alive.get() {
                continue;
            }
            if !(entry.source)() {
                entry.alive.set(false);
            }
        }
        batch.retain(|e| e.alive.get());

        // Sources added during this iteration go after the survivors.
        let mut entries = self.entries.borrow_mut();
        let added = std::mem::take(&mut *entries);
        batch.extend(added.into_iter().filter(|e| e.alive.get()));
        *entries = batch;
        !entries.is_empty()
    }

    /// Iterate until no source is left or `max_iterations` passes ran.
    /// Returns the number of passes.
    pub fn run_until_idle(&self, max_iterations: usize) -> usize {
        let mut passes = 0;
        while passes < max_iterations && self.pending() > 0 {
            self.iterate();
            passes += 1;
        }
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_runs_until_it_returns_false() {
        let idle = IdleLoop::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _handle = idle.add(move || {
            c.set(c.get() + 1);
            c.get() < 3
        });
        assert_eq!(idle.run_until_idle(100), 3);
        assert_eq!(count.get(), 3);
        assert_eq!(idle.pending(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let idle = IdleLoop::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let handle = idle.add(move || {
            c.set(c.get() + 1);
            true
        });
        idle.iterate();
        drop(handle);
        idle.iterate();
        assert_eq!(count.get(), 1);
        assert_eq!(idle.pending(), 0);
    }

    #[test]
    fn source_may_cancel_a_later_source() {
        let idle = IdleLoop::new();
        let victim_ran = Rc::new(Cell::new(false));
        let slot: Rc<RefCell<Option<IdleHandle>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&slot);
        let _first = idle.add(move || {
            s.borrow_mut().take();
            false
        });
        let v = Rc::clone(&victim_ran);
        *slot.borrow_mut() = Some(idle.add(move || {
            v.set(true);
            false
        }));

        idle.iterate();
        assert!(!victim_ran.get());
    }

    #[test]
    fn source_may_add_sources() {
        let idle = IdleLoop::new();
        let inner_ran = Rc::new(Cell::new(false));
        let held: Rc<RefCell<Vec<IdleHandle>>> = Rc::new(RefCell::new(Vec::new()));

        let (l, r, h) = (idle.clone(), Rc::clone(&inner_ran), Rc::clone(&held));
        let _outer = idle.add(move || {
            let r = Rc::clone(&r);
            h.borrow_mut().push(l.add(move || {
                r.set(true);
                false
            }));
            false
        });
        assert!(idle.iterate());
        assert!(!inner_ran.get());
        assert!(!idle.iterate());
        assert!(inner_ran.get());
    }
}
