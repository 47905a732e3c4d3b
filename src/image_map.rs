// ============================================================================
// IMAGE MAP – incremental, revertible per-pixel transform of a drawable
// ============================================================================
//
// Construction freezes the image's undo stack. Each `apply` restores (or
// captures) the "before" snapshot of the selection bounds, then schedules the
// transform chunk by chunk on the idle loop: snapshot chunk → shadow chunk →
// merged into the drawable through the selection. `commit` drains the pass
// and records one undo step; `abort` restores the snapshot. Both consume the
// map, and either one (or a depth-mismatch `clear`) thaws undo exactly once.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::ImageMapError;
use crate::idle::{IdleHandle, IdleLoop};
use crate::image::{DrawableRef, SampledColor};
use crate::region::{PixelChunk, PixelChunkMut, PixelRegion, PixelRegionIterator, Rect, copy_region};
use crate::tiles::TileManager;
use crate::{log_info, log_warn};

/// Per-chunk pixel transform: read `src`, write `dst` (same size and depth).
pub type ChunkTransform = dyn Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>);

type FlushCallback = Rc<RefCell<Option<Box<dyn FnMut()>>>>;

/// An in-flight preview pass.
struct Pass {
    iter: PixelRegionIterator,
    /// Over the snapshot, origin (0, 0).
    src: PixelRegion,
    /// Over the shadow buffer, at the selection bounds.
    dst: PixelRegion,
    _idle: IdleHandle,
}

struct MapState {
    drawable: DrawableRef,
    interactive: bool,
    undo_tiles: Option<TileManager>,
    undo_offset: (u32, u32),
    transform: Option<Rc<ChunkTransform>>,
    pass: Option<Pass>,
    chunks_per_tick: usize,
    description: String,
    terminated: bool,
}

impl MapState {
    fn undo_bounds(&self) -> Option<Rect> {
        self.undo_tiles
            .as_ref()
            .map(|t| Rect::new(self.undo_offset.0, self.undo_offset.1, t.width(), t.height()))
    }

    /// Thaw undo on the owning image, once.
    fn terminate(&mut self) {
        self.pass = None;
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Some(image) = self.drawable.owner() {
            image.borrow_mut().undo_thaw();
        }
    }
}

pub struct ImageMap {
    state: Rc<RefCell<MapState>>,
    flush: FlushCallback,
    idle: IdleLoop,
}

impl std::fmt::Debug for ImageMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("ImageMap")
            .field("drawable", &st.drawable.id())
            .field("interactive", &st.interactive)
            .field("undo_bounds", &st.undo_bounds())
            .field("busy", &st.pass.is_some())
            .finish()
    }
}

impl ImageMap {
    /// Bind a map to `drawable` and freeze its image's undo recording.
    pub fn new(drawable: DrawableRef, interactive: bool, idle: &IdleLoop) -> Result<Self, ImageMapError> {
        let image = drawable.image().ok_or(ImageMapError::ImageGone)?;
        image.borrow_mut().undo_freeze();
        log_info!("image map created on drawable {}", drawable.id());
        Ok(Self {
            state: Rc::new(RefCell::new(MapState {
                drawable,
                interactive,
                undo_tiles: None,
                undo_offset: (0, 0),
                transform: None,
                pass: None,
                chunks_per_tick: 1,
                description: "Image Map".to_string(),
                terminated: false,
            })),
            flush: Rc::new(RefCell::new(None)),
            idle: idle.clone(),
        })
    }

    // ---- configuration ------------------------------------------------------

    /// Chunks handled per idle tick (at least one).
    pub fn set_chunks_per_tick(&mut self, n: usize) {
        self.state.borrow_mut().chunks_per_tick = n.max(1);
    }

    /// Label of the undo step recorded on commit.
    pub fn set_description(&mut self, description: &str) {
        self.state.borrow_mut().description = description.to_string();
    }

    /// Called after every processed chunk of an interactive map.
    pub fn connect_flush(&mut self, callback: impl FnMut() + 'static) {
        *self.flush.borrow_mut() = Some(Box::new(callback));
    }

    pub fn drawable(&self) -> DrawableRef {
        self.state.borrow().drawable.clone()
    }

    pub fn is_interactive(&self) -> bool {
        self.state.borrow().interactive
    }

    /// Whether a preview pass still has chunks left.
    pub fn is_busy(&self) -> bool {
        self.state.borrow().pass.is_some()
    }

    /// Offset and size of the "before" snapshot, if one was taken.
    pub fn undo_bounds(&self) -> Option<Rect> {
        self.state.borrow().undo_bounds()
    }

    /// Copy of the "before" snapshot.
    pub fn undo_snapshot(&self) -> Option<TileManager> {
        self.state.borrow().undo_tiles.clone()
    }

    // ---- apply --------------------------------------------------------------

    /// Start a preview pass of `transform` over the current selection bounds.
    /// A pass already in flight is cancelled first. Does nothing when the
    /// drawable no longer resolves.
    pub fn apply<F>(&mut self, transform: F)
    where
        F: Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static,
    {
        let mut st = self.state.borrow_mut();
        let st = &mut *st;
        st.pass = None;
        st.transform = Some(Rc::new(transform));

        let Some(image) = st.drawable.image() else { return };
        let id = st.drawable.id();
        let mut img = image.borrow_mut();
        let Some(bounds) = img.mask_bounds(id) else { return };
        let Some(d) = img.drawable_mut(id) else { return };
        let bpp = d.bpp();

        let snapshot_fits = st.undo_tiles.as_ref().is_some_and(|t| {
            st.undo_offset == (bounds.x, bounds.y)
                && t.width() == bounds.width
                && t.height() == bounds.height
                && t.bpp() == bpp
        });

        if snapshot_fits {
            // Same bounds as last time: put the untouched pixels back.
            if let Some(tiles) = st.undo_tiles.as_ref() {
                restore(tiles, bounds, d.tiles_mut());
            }
        } else {
            let mut tiles = TileManager::new(bounds.width, bounds.height, bpp);
            let src = PixelRegion::new(d.tiles(), bounds, false);
            let dst = PixelRegion::new(&tiles, tiles.bounds(), true);
            copy_region(d.tiles(), &src, &mut tiles, &dst);
            st.undo_tiles = Some(tiles);
            st.undo_offset = (bounds.x, bounds.y);
        }

        let Some(shadow) = img.shadow_for(id) else { return };
        let dst = PixelRegion::new(shadow, bounds, true);
        let src = PixelRegion {
            rect: Rect::new(0, 0, bounds.width, bounds.height),
            bpp,
            writable: false,
        };
        let iter = PixelRegionIterator::register(&[src, dst]);
        if iter.is_done() {
            return;
        }

        let weak: Weak<RefCell<MapState>> = Rc::downgrade(&self.state);
        let flush = Rc::clone(&self.flush);
        let handle = self.idle.add(move || {
            let Some(state) = weak.upgrade() else { return false };
            let n = state.borrow().chunks_per_tick;
            for _ in 0..n {
                if !process_chunk(&state, &flush) {
                    return false;
                }
            }
            true
        });
        st.pass = Some(Pass { iter, src, dst, _idle: handle });
    }

    // ---- termination --------------------------------------------------------

    /// Finish the pending pass synchronously, thaw undo and record one undo
    /// step holding the "before" pixels.
    pub fn commit(self) {
        self.drain();
        let mut st = self.state.borrow_mut();
        st.terminate();
        let Some(tiles) = st.undo_tiles.take() else { return };
        let Some(image) = st.drawable.image() else { return };
        let rect = Rect::new(st.undo_offset.0, st.undo_offset.1, tiles.width(), tiles.height());
        let mut img = image.borrow_mut();
        img.push_undo(st.drawable.id(), rect, tiles, &st.description);
        img.free_shadow();
        log_info!("image map committed '{}' over {:?}", st.description, rect);
    }

    /// Cancel the pending pass and restore the drawable from the snapshot.
    /// The map stays usable. If the drawable's depth changed since the
    /// snapshot was taken nothing is restored, undo is thawed and the map is
    /// disposed; the error reports both depths.
    pub fn clear(self) -> Result<ImageMap, ImageMapError> {
        self.restore_snapshot()?;
        Ok(self)
    }

    fn restore_snapshot(&self) -> Result<(), ImageMapError> {
        let mut st = self.state.borrow_mut();
        let st = &mut *st;
        st.pass = None;
        let Some(image) = st.drawable.image() else { return Ok(()) };
        let Some(tiles) = st.undo_tiles.take() else { return Ok(()) };
        let id = st.drawable.id();
        let mut img = image.borrow_mut();
        let Some(d) = img.drawable_mut(id) else { return Ok(()) };

        if d.bpp() != tiles.bpp() {
            let err = ImageMapError::DepthMismatch { snapshot: tiles.bpp(), drawable: d.bpp() };
            img.message("image depth change, unable to restore original image");
            img.free_shadow();
            drop(img);
            st.terminate();
            return Err(err);
        }

        let bounds = Rect::new(st.undo_offset.0, st.undo_offset.1, tiles.width(), tiles.height());
        restore(&tiles, bounds, d.tiles_mut());
        img.update(id, bounds);
        Ok(())
    }

    /// `clear`, then thaw undo and dispose.
    pub fn abort(self) {
        match self.clear() {
            Ok(map) => {
                map.state.borrow_mut().terminate();
                if let Some(image) = map.drawable().image() {
                    image.borrow_mut().free_shadow();
                }
                log_info!("image map aborted");
            }
            Err(_) => {
                log_warn!("image map abort: disposed without restoring");
            }
        }
    }

    /// Run every remaining chunk of the pending pass now.
    fn drain(&self) {
        while process_chunk(&self.state, &self.flush) {}
    }

    // ---- colour sampling ------------------------------------------------------

    /// Colour at drawable pixel `(x, y)`. Inside the snapshot this is the
    /// pre-preview pixel, elsewhere the live one.
    pub fn get_color_at(&self, x: u32, y: u32) -> Option<SampledColor> {
        let st = self.state.borrow();
        let image = st.drawable.image()?;
        let img = image.try_borrow().ok()?;
        let id = st.drawable.id();
        let d = img.drawable(id)?;
        if x >= d.width() || y >= d.height() {
            return None;
        }
        if let (Some(tiles), Some(bounds)) = (st.undo_tiles.as_ref(), st.undo_bounds())
            && bounds.contains(x, y)
            && tiles.bpp() == d.bpp()
        {
            let px = tiles.read_pixel(x - bounds.x, y - bounds.y)?;
            return Some(img.convert_color(d.kind(), px));
        }
        img.get_color_at(id, x, y)
    }
}

impl Drop for ImageMap {
    fn drop(&mut self) {
        if let Ok(mut st) = self.state.try_borrow_mut()
            && !st.terminated
        {
            log_warn!("image map on {} dropped without commit or abort", st.drawable.id());
            st.terminate();
        }
    }
}

/// Copy the snapshot back over `bounds` of the drawable.
fn restore(snapshot: &TileManager, bounds: Rect, target: &mut TileManager) {
    let src = PixelRegion::new(snapshot, snapshot.bounds(), false);
    let dst = PixelRegion::new(target, bounds, true);
    copy_region(snapshot, &src, target, &dst);
}

/// Process one chunk of the pending pass. Returns whether chunks remain.
fn process_chunk(state: &Rc<RefCell<MapState>>, flush: &FlushCallback) -> bool {
    let (image, interactive, more) = {
        let mut st = state.borrow_mut();
        let st = &mut *st;
        let Some((chunk, src, dst)) = st
            .pass
            .as_ref()
            .and_then(|p| p.iter.current().map(|c| (c, p.src, p.dst)))
        else {
            st.pass = None;
            return false;
        };
        let (Some(image), Some(snapshot), Some(transform)) =
            (st.drawable.image(), st.undo_tiles.as_ref(), st.transform.clone())
        else {
            st.pass = None;
            return false;
        };

        let id = st.drawable.id();
        let dst_rect = chunk.rect_in(&dst);
        {
            let mut img = image.borrow_mut();
            let transformed = match img.shadow_for(id) {
                Some(shadow) if shadow.bpp() == snapshot.bpp() => {
                    let from = snapshot.chunk(chunk.rect_in(&src));
                    let mut to = shadow.chunk_mut(dst_rect);
                    (*transform)(&from, &mut to);
                    true
                }
                _ => false,
            };
            if !transformed {
                st.pass = None;
                return false;
            }
            img.apply_shadow(id, dst_rect);
            img.update(id, dst_rect);
        }

        let more = st.pass.as_mut().is_some_and(|p| p.iter.process().is_some());
        if !more {
            st.pass = None;
        }
        (image, st.interactive, more)
    };

    if interactive {
        // Taken out so the callback may reconnect or re-enter the map.
        let callback = flush.borrow_mut().take();
        if let Some(mut cb) = callback {
            cb();
            let mut slot = flush.borrow_mut();
            if slot.is_none() {
                *slot = Some(cb);
            }
        }
        if !more {
            image.borrow_mut().flush();
        }
    }
    more
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Image, ImageType};
    use std::cell::Cell;

    fn add_one(src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>) {
        for row in 0..src.height() as usize {
            for (o, i) in dst.row_mut(row).iter_mut().zip(src.row(row)) {
                *o = i.saturating_add(1);
            }
        }
    }

    #[test]
    fn construction_freezes_and_drop_thaws() {
        let image = Image::new(8, 8, ImageType::Gray);
        let d = Image::add_drawable(&image, "bg", ImageType::Gray, (0, 0));
        let idle = IdleLoop::new();
        let map = ImageMap::new(d, true, &idle).unwrap();
        assert!(image.borrow().undo_stack().is_frozen());
        drop(map);
        assert!(!image.borrow().undo_stack().is_frozen());
    }

    #[test]
    fn apply_schedules_one_chunk_per_tick() {
        let image = Image::new(130, 10, ImageType::Gray);
        let d = Image::add_drawable(&image, "bg", ImageType::Gray, (0, 0));
        let idle = IdleLoop::new();
        let mut map = ImageMap::new(d.clone(), true, &idle).unwrap();
        let flushes = Rc::new(Cell::new(0));
        let f = Rc::clone(&flushes);
        map.connect_flush(move || f.set(f.get() + 1));

        map.apply(add_one);
        assert!(map.is_busy());
        assert_eq!(image.borrow().get_color_at(d.id(), 0, 0).unwrap().rgba.0[0], 0);
        assert_eq!(idle.run_until_idle(100), 3);
        assert!(!map.is_busy());
        assert_eq!(flushes.get(), 3);
        assert_eq!(image.borrow().get_color_at(d.id(), 129, 9).unwrap().rgba.0[0], 1);
        map.abort();
    }

    #[test]
    fn color_at_reads_snapshot_inside_bounds() {
        let image = Image::new(4, 4, ImageType::Gray);
        let d = Image::add_drawable(&image, "bg", ImageType::Gray, (0, 0));
        image.borrow_mut().set_selection_rect(Rect::new(1, 1, 2, 2));
        let idle = IdleLoop::new();
        let mut map = ImageMap::new(d, false, &idle).unwrap();
        map.apply(add_one);
        idle.run_until_idle(10);
        assert_eq!(map.get_color_at(1, 1).unwrap().rgba.0[0], 0);
        assert_eq!(map.get_color_at(0, 0).unwrap().rgba.0[0], 0);
        assert_eq!(map.get_color_at(4, 0), None);
        map.commit();
        assert_eq!(image.borrow().get_color_at(map_id(&image), 1, 1).unwrap().rgba.0[0], 1);
    }

    fn map_id(image: &crate::image::SharedImage) -> crate::image::DrawableId {
        image.borrow().drawables()[0].id()
    }
}
