use std::collections::HashSet;
use std::sync::Arc;

use crate::region::{PixelChunk, PixelChunkMut, Rect};

// ============================================================================
// TILE MANAGER – 64×64 copy-on-write tile storage of arbitrary depth
// ============================================================================

pub const TILE_SIZE: u32 = 64;

/// Largest pixel count a single tile manager will allocate.
pub const MAX_PIXELS: u64 = 256_000_000;

/// Tiled pixel store backed by a flat `Vec<Arc<Vec<u8>>>`.
/// Tile coordinates are mapped to a flat index via `ty * tiles_per_row + tx`.
///
/// Every tile starts out as a clone of one shared blank tile, so a fresh
/// manager costs a single tile of memory. Writes go through `Arc::make_mut`,
/// which copies only the touched tile. Edge tiles are allocated full size;
/// bytes outside the image bounds are never read back.
#[derive(Clone)]
pub struct TileManager {
    width: u32,
    height: u32,
    bpp: usize,
    tiles_per_row: u32,
    tiles_per_col: u32,
    tiles: Vec<Arc<Vec<u8>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bpp", &self.bpp)
            .field("tiles", &format!("<{} tiles>", self.tiles.len()))
            .finish()
    }
}

impl TileManager {
    // ---- construction -------------------------------------------------------

    /// Whether a `width`×`height` store stays within [`MAX_PIXELS`].
    /// Callers holding untrusted dimensions check this before [`Self::new`],
    /// which degrades oversize requests to 1×1.
    pub fn fits(width: u32, height: u32) -> bool {
        (width as u64) * (height as u64) <= MAX_PIXELS
    }

    /// Create a zero-filled tile manager. `bpp` must be 1..=4.
    pub fn new(width: u32, height: u32, bpp: usize) -> Self {
        debug_assert!((1..=4).contains(&bpp), "unsupported depth {}", bpp);
        let bpp = bpp.clamp(1, 4);
        let (width, height) = if !Self::fits(width, height) {
            crate::log_err!(
                "TileManager::new: dimensions {}×{} exceed 256M pixels, clamped to 1×1",
                width,
                height
            );
            (1, 1)
        } else {
            (width, height)
        };
        let tiles_per_row = width.div_ceil(TILE_SIZE);
        let tiles_per_col = height.div_ceil(TILE_SIZE);
        let total = (tiles_per_row * tiles_per_col) as usize;
        let blank = Arc::new(vec![0u8; Self::tile_bytes_for(bpp)]);
        Self {
            width,
            height,
            bpp,
            tiles_per_row,
            tiles_per_col,
            tiles: vec![blank; total],
        }
    }

    /// Import tightly packed rows (`width * height * bpp` bytes).
    pub fn from_raw(width: u32, height: u32, bpp: usize, data: &[u8]) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * bpp);
        let mut tm = Self::new(width, height, bpp);
        tm.write_rect(Rect::new(0, 0, width, height), data);
        tm
    }

    /// Flatten back to tightly packed rows.
    pub fn to_raw(&self) -> Vec<u8> {
        self.read_rect(Rect::new(0, 0, self.width, self.height))
    }

    fn tile_bytes_for(bpp: usize) -> usize {
        (TILE_SIZE * TILE_SIZE) as usize * bpp
    }

    // ---- geometry -----------------------------------------------------------

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn bpp(&self) -> usize { self.bpp }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn tile_count(&self) -> usize { self.tiles.len() }

    #[inline(always)]
    fn flat_index(&self, tx: u32, ty: u32) -> usize {
        (ty * self.tiles_per_row + tx) as usize
    }

    /// Byte offset of `(x, y)` inside its tile.
    #[inline(always)]
    fn local_offset(&self, x: u32, y: u32) -> usize {
        (((y % TILE_SIZE) * TILE_SIZE + x % TILE_SIZE) as usize) * self.bpp
    }

    // ---- tile access --------------------------------------------------------

    fn tile(&self, tx: u32, ty: u32) -> &[u8] {
        debug_assert!(tx < self.tiles_per_row && ty < self.tiles_per_col);
        &self.tiles[self.flat_index(tx, ty)]
    }

    fn tile_mut(&mut self, tx: u32, ty: u32) -> &mut [u8] {
        debug_assert!(tx < self.tiles_per_row && ty < self.tiles_per_col);
        let idx = self.flat_index(tx, ty);
        Arc::make_mut(&mut self.tiles[idx]).as_mut_slice()
    }

    /// Read-only view of `rect`, which must lie inside a single tile.
    pub fn chunk(&self, rect: Rect) -> PixelChunk<'_> {
        debug_assert!(self.fits_one_tile(rect), "chunk {:?} straddles a tile", rect);
        let offset = self.local_offset(rect.x, rect.y);
        let bpp = self.bpp;
        PixelChunk::new(
            self.tile(rect.x / TILE_SIZE, rect.y / TILE_SIZE),
            offset,
            TILE_SIZE as usize * bpp,
            rect,
            bpp,
        )
    }

    /// Writable view of `rect`, which must lie inside a single tile.
    pub fn chunk_mut(&mut self, rect: Rect) -> PixelChunkMut<'_> {
        debug_assert!(self.fits_one_tile(rect), "chunk {:?} straddles a tile", rect);
        let offset = self.local_offset(rect.x, rect.y);
        let bpp = self.bpp;
        PixelChunkMut::new(
            self.tile_mut(rect.x / TILE_SIZE, rect.y / TILE_SIZE),
            offset,
            TILE_SIZE as usize * bpp,
            rect,
            bpp,
        )
    }

    fn fits_one_tile(&self, rect: Rect) -> bool {
        if rect.is_empty() || rect.x2() > self.width || rect.y2() > self.height {
            return false;
        }
        rect.x / TILE_SIZE == (rect.x2() - 1) / TILE_SIZE
            && rect.y / TILE_SIZE == (rect.y2() - 1) / TILE_SIZE
    }

    // ---- pixel access -------------------------------------------------------

    /// Read one pixel (`bpp` bytes), `None` outside the bounds.
    #[inline]
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = self.local_offset(x, y);
        let tile = self.tile(x / TILE_SIZE, y / TILE_SIZE);
        Some(&tile[off..off + self.bpp])
    }

    /// Write one pixel. Out-of-range writes are ignored.
    #[inline]
    pub fn write_pixel(&mut self, x: u32, y: u32, pixel: &[u8]) {
        if x >= self.width || y >= self.height {
            return;
        }
        debug_assert_eq!(pixel.len(), self.bpp);
        let bpp = self.bpp;
        let off = self.local_offset(x, y);
        let tile = self.tile_mut(x / TILE_SIZE, y / TILE_SIZE);
        tile[off..off + bpp].copy_from_slice(&pixel[..bpp]);
    }

    /// Chunk-aware extraction of `rect` as tightly packed rows. Pixels outside
    /// the image read back as zero.
    pub fn read_rect(&self, rect: Rect) -> Vec<u8> {
        let row_bytes = rect.width as usize * self.bpp;
        let mut buf = vec![0u8; row_bytes * rect.height as usize];
        let clipped = rect.intersect(&self.bounds());
        let Some(clipped) = clipped else { return buf };

        for part in tile_spans(clipped) {
            let chunk = self.chunk(part);
            let dx = (part.x - rect.x) as usize * self.bpp;
            for row in 0..part.height as usize {
                let dy = (part.y - rect.y) as usize + row;
                let dst = dy * row_bytes + dx;
                let src = chunk.row(row);
                buf[dst..dst + src.len()].copy_from_slice(src);
            }
        }
        buf
    }

    /// Bulk write of tightly packed rows into `rect`, clipped to the bounds.
    pub fn write_rect(&mut self, rect: Rect, data: &[u8]) {
        let row_bytes = rect.width as usize * self.bpp;
        debug_assert_eq!(data.len(), row_bytes * rect.height as usize);
        let Some(clipped) = rect.intersect(&self.bounds()) else { return };
        let bpp = self.bpp;

        for part in tile_spans(clipped) {
            let mut chunk = self.chunk_mut(part);
            let sx = (part.x - rect.x) as usize * bpp;
            for row in 0..part.height as usize {
                let sy = (part.y - rect.y) as usize + row;
                let src = sy * row_bytes + sx;
                let dst = chunk.row_mut(row);
                let len = dst.len();
                dst.copy_from_slice(&data[src..src + len]);
            }
        }
    }

    /// Fill the whole store with `pixel`. One tile is filled and then shared.
    pub fn fill(&mut self, pixel: &[u8]) {
        debug_assert_eq!(pixel.len(), self.bpp);
        let mut template = vec![0u8; Self::tile_bytes_for(self.bpp)];
        for px in template.chunks_exact_mut(self.bpp) {
            px.copy_from_slice(&pixel[..self.bpp]);
        }
        let shared = Arc::new(template);
        for slot in self.tiles.iter_mut() {
            *slot = Arc::clone(&shared);
        }
    }

    /// Bytes of unique tile storage (shared tiles are counted once).
    pub fn memory_bytes(&self) -> usize {
        let unique: HashSet<*const Vec<u8>> = self.tiles.iter().map(Arc::as_ptr).collect();
        unique.len() * Self::tile_bytes_for(self.bpp)
    }
}

/// Split `rect` into the sub-rectangles that each fall inside one tile,
/// row-major.
pub fn tile_spans(rect: Rect) -> impl Iterator<Item = Rect> {
    let mut out = Vec::new();
    let mut y = rect.y;
    while y < rect.y2() {
        let h = (TILE_SIZE - y % TILE_SIZE).min(rect.y2() - y);
        let mut x = rect.x;
        while x < rect.x2() {
            let w = (TILE_SIZE - x % TILE_SIZE).min(rect.x2() - x);
            out.push(Rect::new(x, y, w, h));
            x += w;
        }
        y += h;
    }
    out.into_iter()
}
