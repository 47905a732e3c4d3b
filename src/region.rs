// ============================================================================
// PIXEL REGIONS – rectangular views and the resumable chunk iterator
// ============================================================================
//
// A `PixelRegion` is pure geometry over some `TileManager`; the iterator walks
// several same-sized regions in lock-step and hands out `RegionChunk`s that
// never cross a tile seam in any of them. Because the iterator holds no
// borrows it can be parked between idle ticks and resumed later.

use crate::tiles::{TILE_SIZE, TileManager};

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from inclusive-exclusive corners `(x1, y1)` – `(x2, y2)`.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    pub fn x2(&self) -> u32 { self.x + self.width }

    pub fn y2(&self) -> u32 { self.y + self.height }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x2() && y >= self.y && y < self.y2()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }

    pub fn same_size(&self, other: &Rect) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A rectangular view `(x, y, width, height)` over a tiled buffer of depth
/// `bpp`. The buffer itself is supplied by whoever resolves a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRegion {
    pub rect: Rect,
    pub bpp: usize,
    pub writable: bool,
}

impl PixelRegion {
    /// Region over `tm`. Debug builds check that `rect` lies inside it.
    pub fn new(tm: &TileManager, rect: Rect, writable: bool) -> Self {
        debug_assert!(
            rect.is_empty() || (rect.x2() <= tm.width() && rect.y2() <= tm.height()),
            "region {:?} outside {}×{}",
            rect,
            tm.width(),
            tm.height()
        );
        Self { rect, bpp: tm.bpp(), writable }
    }
}

/// One step of a region walk: an offset relative to every registered region's
/// origin plus the shared chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionChunk {
    pub dx: u32,
    pub dy: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionChunk {
    /// Absolute rectangle of this chunk inside `region`'s buffer.
    pub fn rect_in(&self, region: &PixelRegion) -> Rect {
        Rect::new(region.rect.x + self.dx, region.rect.y + self.dy, self.width, self.height)
    }
}

/// Lock-step walk over N regions of identical size.
///
/// Traversal is row-major: the region is cut into bands whose height stops at
/// the nearest horizontal tile seam of any region, and each band is cut left
/// to right at the nearest vertical seam.
#[derive(Debug, Clone)]
pub struct PixelRegionIterator {
    origins: Vec<(u32, u32)>,
    width: u32,
    height: u32,
    dx: u32,
    dy: u32,
    band_height: u32,
    current: Option<RegionChunk>,
}

impl PixelRegionIterator {
    /// Register regions for a joint walk. Mismatched sizes yield an exhausted
    /// iterator (and trip a debug assertion).
    pub fn register(regions: &[PixelRegion]) -> Self {
        let (width, height) = regions
            .first()
            .map_or((0, 0), |r| (r.rect.width, r.rect.height));
        let matched = regions.iter().all(|r| r.rect.width == width && r.rect.height == height);
        debug_assert!(matched, "pixel regions registered with different sizes");

        let mut iter = Self {
            origins: regions.iter().map(|r| (r.rect.x, r.rect.y)).collect(),
            width,
            height,
            dx: 0,
            dy: 0,
            band_height: 0,
            current: None,
        };
        if matched && width > 0 && height > 0 {
            iter.band_height = iter.band_at(0);
            iter.current = Some(iter.chunk_at(0, 0));
        }
        iter
    }

    /// The chunk to process next, `None` once exhausted.
    pub fn current(&self) -> Option<RegionChunk> {
        self.current
    }

    pub fn is_done(&self) -> bool {
        self.current.is_none()
    }

    /// Advance past the current chunk. Returns the new current chunk.
    pub fn process(&mut self) -> Option<RegionChunk> {
        let chunk = self.current?;
        self.dx += chunk.width;
        if self.dx >= self.width {
            self.dx = 0;
            self.dy += self.band_height;
            if self.dy >= self.height {
                self.current = None;
                return None;
            }
            self.band_height = self.band_at(self.dy);
        }
        self.current = Some(self.chunk_at(self.dx, self.dy));
        self.current
    }

    /// Run every remaining chunk through `f` and leave the iterator exhausted.
    pub fn for_each_remaining(&mut self, mut f: impl FnMut(RegionChunk)) {
        while let Some(chunk) = self.current {
            f(chunk);
            self.process();
        }
    }

    fn band_at(&self, dy: u32) -> u32 {
        self.origins
            .iter()
            .map(|&(_, oy)| TILE_SIZE - (oy + dy) % TILE_SIZE)
            .min()
            .unwrap_or(TILE_SIZE)
            .min(self.height - dy)
    }

    fn chunk_at(&self, dx: u32, dy: u32) -> RegionChunk {
        let width = self
            .origins
            .iter()
            .map(|&(ox, _)| TILE_SIZE - (ox + dx) % TILE_SIZE)
            .min()
            .unwrap_or(TILE_SIZE)
            .min(self.width - dx);
        RegionChunk { dx, dy, width, height: self.band_height }
    }
}

// ============================================================================
// CHUNK VIEWS
// ============================================================================

/// Read-only view of a rectangle that lives inside one tile.
pub struct PixelChunk<'a> {
    data: &'a [u8],
    offset: usize,
    rowstride: usize,
    rect: Rect,
    bpp: usize,
}

impl<'a> PixelChunk<'a> {
    pub(crate) fn new(data: &'a [u8], offset: usize, rowstride: usize, rect: Rect, bpp: usize) -> Self {
        Self { data, offset, rowstride, rect, bpp }
    }

    pub fn width(&self) -> u32 { self.rect.width }
    pub fn height(&self) -> u32 { self.rect.height }
    pub fn bpp(&self) -> usize { self.bpp }
    /// Position of the chunk inside its buffer.
    pub fn x(&self) -> u32 { self.rect.x }
    pub fn y(&self) -> u32 { self.rect.y }
    pub fn rect(&self) -> Rect { self.rect }

    /// Row `i` of the chunk, exactly `width * bpp` bytes.
    pub fn row(&self, i: usize) -> &'a [u8] {
        debug_assert!(i < self.rect.height as usize);
        let start = self.offset + i * self.rowstride;
        &self.data[start..start + self.rect.width as usize * self.bpp]
    }
}

/// Writable view of a rectangle that lives inside one tile.
pub struct PixelChunkMut<'a> {
    data: &'a mut [u8],
    offset: usize,
    rowstride: usize,
    rect: Rect,
    bpp: usize,
}

impl<'a> PixelChunkMut<'a> {
    pub(crate) fn new(data: &'a mut [u8], offset: usize, rowstride: usize, rect: Rect, bpp: usize) -> Self {
        Self { data, offset, rowstride, rect, bpp }
    }

    pub fn width(&self) -> u32 { self.rect.width }
    pub fn height(&self) -> u32 { self.rect.height }
    pub fn bpp(&self) -> usize { self.bpp }
    pub fn x(&self) -> u32 { self.rect.x }
    pub fn y(&self) -> u32 { self.rect.y }
    pub fn rect(&self) -> Rect { self.rect }

    pub fn row(&self, i: usize) -> &[u8] {
        debug_assert!(i < self.rect.height as usize);
        let start = self.offset + i * self.rowstride;
        &self.data[start..start + self.rect.width as usize * self.bpp]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [u8] {
        debug_assert!(i < self.rect.height as usize);
        let start = self.offset + i * self.rowstride;
        let len = self.rect.width as usize * self.bpp;
        &mut self.data[start..start + len]
    }
}

/// Copy `src_rgn` of `src` into `dst_rgn` of `dst`, chunk by chunk.
/// Both regions must have the same size and depth.
pub fn copy_region(src: &TileManager, src_rgn: &PixelRegion, dst: &mut TileManager, dst_rgn: &PixelRegion) {
    debug_assert_eq!(src_rgn.bpp, dst_rgn.bpp, "copy_region between different depths");
    debug_assert!(dst_rgn.writable);
    if src_rgn.bpp != dst_rgn.bpp {
        return;
    }
    let mut iter = PixelRegionIterator::register(&[*src_rgn, *dst_rgn]);
    iter.for_each_remaining(|chunk| {
        let from = src.chunk(chunk.rect_in(src_rgn));
        let mut to = dst.chunk_mut(chunk.rect_in(dst_rgn));
        for row in 0..chunk.height as usize {
            to.row_mut(row).copy_from_slice(from.row(row));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: u32, y: u32, w: u32, h: u32) -> PixelRegion {
        PixelRegion { rect: Rect::new(x, y, w, h), bpp: 1, writable: true }
    }

    #[test]
    fn chunks_stop_at_every_regions_tile_seams() {
        let mut iter = PixelRegionIterator::register(&[region(0, 0, 100, 100), region(10, 20, 100, 100)]);
        let first = iter.current().unwrap();
        assert_eq!((first.dx, first.dy, first.width, first.height), (0, 0, 54, 44));
        let second = iter.process().unwrap();
        assert_eq!((second.dx, second.dy, second.width), (54, 0, 10));

        let mut area = (first.width * first.height + second.width * second.height) as u64;
        while let Some(c) = iter.process() {
            area += (c.width * c.height) as u64;
        }
        assert_eq!(area, 100 * 100);
        assert!(iter.is_done());
    }

    #[test]
    fn walk_is_row_major_and_resumable() {
        let mut iter = PixelRegionIterator::register(&[region(0, 0, 130, 70)]);
        let mut seen = Vec::new();
        // Pause after two chunks, resume from a clone.
        seen.push(iter.current().unwrap());
        seen.push(iter.process().unwrap());
        let mut resumed = iter.clone();
        while let Some(c) = resumed.process() {
            seen.push(c);
        }
        let origins: Vec<(u32, u32)> = seen.iter().map(|c| (c.dx, c.dy)).collect();
        assert_eq!(origins, vec![(0, 0), (64, 0), (128, 0), (0, 64), (64, 64), (128, 64)]);
    }

    #[test]
    fn empty_region_is_exhausted_immediately() {
        let iter = PixelRegionIterator::register(&[region(0, 0, 0, 5)]);
        assert!(iter.is_done());
    }

    #[test]
    fn copy_region_moves_pixels_between_offsets() {
        let data: Vec<u8> = (0..100u32 * 100).map(|i| (i % 199) as u8).collect();
        let src = TileManager::from_raw(100, 100, 1, &data);
        let mut dst = TileManager::new(40, 40, 1);
        let src_rgn = PixelRegion::new(&src, Rect::new(50, 60, 40, 40), false);
        let dst_rgn = PixelRegion::new(&dst, Rect::new(0, 0, 40, 40), true);
        copy_region(&src, &src_rgn, &mut dst, &dst_rgn);
        assert_eq!(dst.read_pixel(0, 0), src.read_pixel(50, 60));
        assert_eq!(dst.read_pixel(39, 39), src.read_pixel(89, 99));
        assert_eq!(dst.read_pixel(14, 4), src.read_pixel(64, 64));
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(&Rect::new(10, 0, 3, 3)), None);
    }
}
