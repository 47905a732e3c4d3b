// ============================================================================
// IMAGE & DRAWABLES – the pixel surfaces an image map edits
// ============================================================================
//
// An `Image` owns its drawables, an optional 1-bpp selection mask, a shadow
// (scratch) buffer and the undo stack. Everything is single threaded: images
// are shared as `Rc<RefCell<Image>>` and drawables are referenced weakly by
// `DrawableRef`, which callers re-resolve on every use.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ::image::Rgba;
use uuid::Uuid;

use crate::region::{PixelRegion, PixelRegionIterator, Rect, copy_region};
use crate::tiles::{TileManager, tile_spans};
use crate::undo::{UndoStack, UndoStep};

pub type SharedImage = Rc<RefCell<Image>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableId(Uuid);

impl DrawableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DrawableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel layout of a drawable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageType {
    Rgb,
    RgbA,
    Gray,
    GrayA,
    Indexed,
    IndexedA,
}

impl ImageType {
    /// Bytes per pixel.
    pub fn bytes(self) -> usize {
        match self {
            ImageType::Gray | ImageType::Indexed => 1,
            ImageType::GrayA | ImageType::IndexedA => 2,
            ImageType::Rgb => 3,
            ImageType::RgbA => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, ImageType::RgbA | ImageType::GrayA | ImageType::IndexedA)
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, ImageType::Indexed | ImageType::IndexedA)
    }

    /// Number of colour (non-alpha) channels.
    pub fn color_channels(self) -> usize {
        self.bytes() - usize::from(self.has_alpha())
    }
}

/// One editable pixel surface inside an image.
#[derive(Debug, Clone)]
pub struct Drawable {
    id: DrawableId,
    pub name: String,
    kind: ImageType,
    /// Position of the drawable's top-left corner in image coordinates.
    pub offset: (i32, i32),
    tiles: TileManager,
}

impl Drawable {
    pub fn id(&self) -> DrawableId { self.id }
    pub fn kind(&self) -> ImageType { self.kind }
    pub fn width(&self) -> u32 { self.tiles.width() }
    pub fn height(&self) -> u32 { self.tiles.height() }
    pub fn bpp(&self) -> usize { self.tiles.bpp() }
    pub fn has_alpha(&self) -> bool { self.kind.has_alpha() }
    pub fn tiles(&self) -> &TileManager { &self.tiles }
    pub fn tiles_mut(&mut self) -> &mut TileManager { &mut self.tiles }
    pub fn bounds(&self) -> Rect { self.tiles.bounds() }
}

/// Colour sampling result: RGBA plus the palette index for indexed drawables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampledColor {
    pub rgba: Rgba<u8>,
    pub index: Option<u8>,
}

impl SampledColor {
    /// Channels scaled to `[0, 1]`.
    pub fn normalized(&self) -> [f32; 4] {
        self.rgba.0.map(|c| c as f32 / 255.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageEvent {
    /// Pixels of `rect` (drawable coordinates) changed.
    Update { drawable: DrawableId, rect: Rect },
    /// A batch of updates is complete; repaint now.
    Flush,
    /// User-visible message.
    Message(String),
}

type EventHandler = Box<dyn FnMut(&ImageEvent)>;

pub struct Image {
    width: u32,
    height: u32,
    base: ImageType,
    drawables: Vec<Drawable>,
    selection: Option<TileManager>,
    shadow: Option<TileManager>,
    undo: UndoStack,
    colormap: Vec<[u8; 3]>,
    handlers: Vec<EventHandler>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("base", &self.base)
            .field("drawables", &self.drawables.len())
            .field("selection", &self.selection.is_some())
            .finish()
    }
}

/// Weak handle to a drawable. Resolves to nothing once the drawable is
/// removed or its image is dropped.
#[derive(Clone, Debug)]
pub struct DrawableRef {
    image: Weak<RefCell<Image>>,
    id: DrawableId,
}

impl DrawableRef {
    pub fn id(&self) -> DrawableId {
        self.id
    }

    /// The owning image, if it is alive and still holds this drawable.
    pub fn image(&self) -> Option<SharedImage> {
        let image = self.image.upgrade()?;
        let present = image.try_borrow().map_or(true, |img| img.drawable(self.id).is_some());
        present.then_some(image)
    }

    /// The owning image even if the drawable itself was removed.
    pub fn owner(&self) -> Option<SharedImage> {
        self.image.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.image().is_some()
    }
}

impl Image {
    pub fn new(width: u32, height: u32, base: ImageType) -> SharedImage {
        Rc::new(RefCell::new(Self {
            width,
            height,
            base,
            drawables: Vec::new(),
            selection: None,
            shadow: None,
            undo: UndoStack::default(),
            colormap: Vec::new(),
            handlers: Vec::new(),
        }))
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn base_type(&self) -> ImageType { self.base }

    // ---- drawables ----------------------------------------------------------

    /// Add a canvas-sized drawable.
    pub fn add_drawable(this: &SharedImage, name: &str, kind: ImageType, offset: (i32, i32)) -> DrawableRef {
        let (w, h) = {
            let img = this.borrow();
            (img.width, img.height)
        };
        Self::add_drawable_sized(this, name, kind, w, h, offset)
    }

    pub fn add_drawable_sized(
        this: &SharedImage,
        name: &str,
        kind: ImageType,
        width: u32,
        height: u32,
        offset: (i32, i32),
    ) -> DrawableRef {
        let id = DrawableId::new();
        this.borrow_mut().drawables.push(Drawable {
            id,
            name: name.to_string(),
            kind,
            offset,
            tiles: TileManager::new(width, height, kind.bytes()),
        });
        DrawableRef { image: Rc::downgrade(this), id }
    }

    pub fn remove_drawable(&mut self, id: DrawableId) -> bool {
        let before = self.drawables.len();
        self.drawables.retain(|d| d.id != id);
        before != self.drawables.len()
    }

    pub fn drawable(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.iter().find(|d| d.id == id)
    }

    pub fn drawable_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.iter_mut().find(|d| d.id == id)
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    // ---- selection ----------------------------------------------------------

    /// Select `rect` (image coordinates) at full strength.
    pub fn set_selection_rect(&mut self, rect: Rect) {
        let mut mask = TileManager::new(self.width, self.height, 1);
        if let Some(r) = rect.intersect(&mask.bounds()) {
            mask.write_rect(r, &vec![255u8; r.width as usize * r.height as usize]);
        }
        self.selection = Some(mask);
    }

    /// Install an arbitrary canvas-sized 1-bpp mask.
    pub fn set_selection(&mut self, mask: TileManager) {
        debug_assert_eq!(mask.bpp(), 1);
        debug_assert_eq!((mask.width(), mask.height()), (self.width, self.height));
        self.selection = Some(mask);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&TileManager> {
        self.selection.as_ref()
    }

    /// Bounding box of the selection on `id`, in drawable coordinates. The
    /// whole drawable when nothing is selected over it.
    pub fn mask_bounds(&self, id: DrawableId) -> Option<Rect> {
        let d = self.drawable(id)?;
        let full = d.bounds();
        let Some(mask) = self.selection.as_ref() else { return Some(full) };
        let Some(sel) = nonzero_bounds(mask) else { return Some(full) };

        let (ox, oy) = (d.offset.0 as i64, d.offset.1 as i64);
        let x1 = (sel.x as i64 - ox).max(0);
        let y1 = (sel.y as i64 - oy).max(0);
        let x2 = (sel.x2() as i64 - ox).min(full.width as i64);
        let y2 = (sel.y2() as i64 - oy).min(full.height as i64);
        if x1 >= x2 || y1 >= y2 {
            return Some(full);
        }
        Some(Rect::from_corners(x1 as u32, y1 as u32, x2 as u32, y2 as u32))
    }

    /// Selection strength at drawable pixel `(x, y)` of `d`.
    fn mask_value(&self, d: &Drawable, x: u32, y: u32) -> u8 {
        let Some(mask) = self.selection.as_ref() else { return 255 };
        let ix = x as i64 + d.offset.0 as i64;
        let iy = y as i64 + d.offset.1 as i64;
        if ix < 0 || iy < 0 {
            return 0;
        }
        mask.read_pixel(ix as u32, iy as u32).map_or(0, |p| p[0])
    }

    // ---- shadow buffer ------------------------------------------------------

    /// The shadow buffer sized for `id`, reallocated when the drawable's
    /// size or depth differs from the current one.
    pub fn shadow_for(&mut self, id: DrawableId) -> Option<&mut TileManager> {
        let d = self.drawables.iter().find(|d| d.id == id)?;
        let (w, h, bpp) = (d.width(), d.height(), d.bpp());
        let fits = self
            .shadow
            .as_ref()
            .is_some_and(|s| s.width() == w && s.height() == h && s.bpp() == bpp);
        if !fits {
            self.shadow = Some(TileManager::new(w, h, bpp));
        }
        self.shadow.as_mut()
    }

    /// The current shadow buffer, if one is allocated.
    pub fn shadow(&self) -> Option<&TileManager> {
        self.shadow.as_ref()
    }

    pub fn free_shadow(&mut self) {
        self.shadow = None;
    }

    /// Merge the shadow buffer into `id` over `rect` (drawable coordinates).
    /// Selected pixels are replaced; partially selected ones are blended by
    /// the mask value.
    pub fn apply_shadow(&mut self, id: DrawableId, rect: Rect) {
        let Some(idx) = self.drawables.iter().position(|d| d.id == id) else { return };
        let Some(shadow) = self.shadow.take() else { return };
        let d = &self.drawables[idx];
        let clip = d.bounds().intersect(&shadow.bounds()).and_then(|b| b.intersect(&rect));
        let Some(rect) = clip.filter(|_| shadow.bpp() == d.bpp()) else {
            self.shadow = Some(shadow);
            return;
        };

        let src_rgn = PixelRegion::new(&shadow, rect, false);
        if self.selection.is_none() {
            let dst_rgn = PixelRegion::new(&d.tiles, rect, true);
            copy_region(&shadow, &src_rgn, &mut self.drawables[idx].tiles, &dst_rgn);
            self.shadow = Some(shadow);
            return;
        }

        // Gather mask values first; the drawable borrow below is exclusive.
        let bpp = d.bpp();
        let mut weights = Vec::with_capacity(rect.width as usize * rect.height as usize);
        for y in rect.y..rect.y2() {
            for x in rect.x..rect.x2() {
                weights.push(self.mask_value(d, x, y) as i32);
            }
        }

        let tiles = &mut self.drawables[idx].tiles;
        let dst_rgn = PixelRegion::new(tiles, rect, true);
        let mut iter = PixelRegionIterator::register(&[src_rgn, dst_rgn]);
        iter.for_each_remaining(|chunk| {
            let from = shadow.chunk(chunk.rect_in(&src_rgn));
            let mut to = tiles.chunk_mut(chunk.rect_in(&dst_rgn));
            for row in 0..chunk.height as usize {
                let wrow = (chunk.dy as usize + row) * rect.width as usize + chunk.dx as usize;
                let src = from.row(row);
                for (i, px) in to.row_mut(row).iter_mut().enumerate() {
                    let m = weights[wrow + i / bpp];
                    let o = *px as i32;
                    *px = (o + (src[i] as i32 - o) * m / 255) as u8;
                }
            }
        });
        self.shadow = Some(shadow);
    }

    // ---- notifications ------------------------------------------------------

    /// Register an observer. Handlers run while the image is borrowed and
    /// must not call back into it.
    pub fn connect(&mut self, handler: impl FnMut(&ImageEvent) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    fn emit(&mut self, event: ImageEvent) {
        for handler in self.handlers.iter_mut() {
            handler(&event);
        }
    }

    pub fn update(&mut self, id: DrawableId, rect: Rect) {
        self.emit(ImageEvent::Update { drawable: id, rect });
    }

    pub fn flush(&mut self) {
        self.emit(ImageEvent::Flush);
    }

    /// Log and broadcast a user-visible message.
    pub fn message(&mut self, text: &str) {
        crate::log_err!("{}", text);
        self.emit(ImageEvent::Message(text.to_string()));
    }

    // ---- undo ---------------------------------------------------------------

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn undo_stack_mut(&mut self) -> &mut UndoStack {
        &mut self.undo
    }

    pub fn undo_freeze(&mut self) {
        self.undo.freeze();
    }

    pub fn undo_thaw(&mut self) {
        self.undo.thaw();
    }

    /// Record `tiles` as the "before" content of `rect` on `id`.
    pub fn push_undo(&mut self, id: DrawableId, rect: Rect, tiles: TileManager, description: &str) -> bool {
        self.undo.push(UndoStep {
            drawable: id,
            rect,
            tiles,
            description: description.to_string(),
        })
    }

    pub fn undo(&mut self) -> Option<String> {
        let mut touched = None;
        let drawables = &mut self.drawables;
        let description = self.undo.undo(|step| {
            touched = swap_step(drawables, step);
            touched.is_some()
        })?;
        if let Some((id, rect)) = touched {
            self.update(id, rect);
        }
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        let mut touched = None;
        let drawables = &mut self.drawables;
        let description = self.undo.redo(|step| {
            touched = swap_step(drawables, step);
            touched.is_some()
        })?;
        if let Some((id, rect)) = touched {
            self.update(id, rect);
        }
        Some(description)
    }

    // ---- colour -------------------------------------------------------------

    pub fn set_colormap(&mut self, colormap: Vec<[u8; 3]>) {
        self.colormap = colormap;
    }

    pub fn colormap(&self) -> &[[u8; 3]] {
        &self.colormap
    }

    /// Expand a raw pixel of layout `kind` to RGBA.
    pub fn convert_color(&self, kind: ImageType, pixel: &[u8]) -> SampledColor {
        let alpha = if kind.has_alpha() { pixel[kind.bytes() - 1] } else { 255 };
        match kind {
            ImageType::Rgb | ImageType::RgbA => SampledColor {
                rgba: Rgba([pixel[0], pixel[1], pixel[2], alpha]),
                index: None,
            },
            ImageType::Gray | ImageType::GrayA => SampledColor {
                rgba: Rgba([pixel[0], pixel[0], pixel[0], alpha]),
                index: None,
            },
            ImageType::Indexed | ImageType::IndexedA => {
                let [r, g, b] = self.colormap.get(pixel[0] as usize).copied().unwrap_or([0, 0, 0]);
                SampledColor { rgba: Rgba([r, g, b, alpha]), index: Some(pixel[0]) }
            }
        }
    }

    pub fn get_color_at(&self, id: DrawableId, x: u32, y: u32) -> Option<SampledColor> {
        let d = self.drawable(id)?;
        let px = d.tiles.read_pixel(x, y)?;
        Some(self.convert_color(d.kind, px))
    }

    /// Change a drawable's pixel layout in place. Colour is converted through
    /// RGBA; indexed targets pick the nearest colormap entry.
    pub fn convert_drawable(&mut self, id: DrawableId, kind: ImageType) -> bool {
        let Some(d) = self.drawable(id) else { return false };
        if d.kind == kind {
            return true;
        }
        let (w, h, from) = (d.width(), d.height(), d.kind);
        let src = d.tiles.to_raw();
        let mut out = Vec::with_capacity(w as usize * h as usize * kind.bytes());
        for px in src.chunks_exact(from.bytes()) {
            let c = self.convert_color(from, px).rgba.0;
            self.encode_color(kind, c, &mut out);
        }
        let colormap_empty = self.colormap.is_empty();
        if kind.is_indexed() && colormap_empty {
            crate::log_warn!("convert_drawable: indexed target without colormap, all pixels map to 0");
        }
        let Some(d) = self.drawable_mut(id) else { return false };
        d.kind = kind;
        d.tiles = TileManager::from_raw(w, h, kind.bytes(), &out);
        crate::log_info!("drawable {} converted {:?} -> {:?}", id, from, kind);
        true
    }

    fn encode_color(&self, kind: ImageType, [r, g, b, a]: [u8; 4], out: &mut Vec<u8>) {
        match kind {
            ImageType::Rgb => out.extend_from_slice(&[r, g, b]),
            ImageType::RgbA => out.extend_from_slice(&[r, g, b, a]),
            ImageType::Gray => out.push(luminance(r, g, b)),
            ImageType::GrayA => out.extend_from_slice(&[luminance(r, g, b), a]),
            ImageType::Indexed => out.push(self.nearest_index(r, g, b)),
            ImageType::IndexedA => out.extend_from_slice(&[self.nearest_index(r, g, b), a]),
        }
    }

    fn nearest_index(&self, r: u8, g: u8, b: u8) -> u8 {
        let dist = |c: &[u8; 3]| {
            let dr = c[0] as i32 - r as i32;
            let dg = c[1] as i32 - g as i32;
            let db = c[2] as i32 - b as i32;
            dr * dr + dg * dg + db * db
        };
        self.colormap
            .iter()
            .take(256)
            .enumerate()
            .min_by_key(|(_, c)| dist(c))
            .map_or(0, |(i, _)| i as u8)
    }
}

/// Rec. 601 luma in integer arithmetic.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29 + 128) >> 8) as u8
}

/// Exchange the pixels stored in `step` with the drawable's current content.
fn swap_step(drawables: &mut [Drawable], step: &mut UndoStep) -> Option<(DrawableId, Rect)> {
    let d = drawables.iter_mut().find(|d| d.id == step.drawable)?;
    if d.bpp() != step.tiles.bpp() {
        crate::log_warn!("undo step for {} skipped: depth changed", step.drawable);
        return None;
    }
    let current = d.tiles.read_rect(step.rect);
    d.tiles.write_rect(step.rect, &step.tiles.to_raw());
    step.tiles = TileManager::from_raw(step.rect.width, step.rect.height, d.bpp(), &current);
    Some((step.drawable, step.rect))
}

/// Bounding box of the non-zero pixels of a 1-bpp mask.
fn nonzero_bounds(mask: &TileManager) -> Option<Rect> {
    let (mut x1, mut y1, mut x2, mut y2) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for part in tile_spans(mask.bounds()) {
        let chunk = mask.chunk(part);
        for row in 0..part.height as usize {
            let data = chunk.row(row);
            let Some(first) = data.iter().position(|&v| v != 0) else { continue };
            let last = data.iter().rposition(|&v| v != 0).unwrap_or(first);
            let y = part.y + row as u32;
            x1 = x1.min(part.x + first as u32);
            x2 = x2.max(part.x + last as u32 + 1);
            y1 = y1.min(y);
            y2 = y2.max(y + 1);
        }
    }
    (x1 < x2 && y1 < y2).then(|| Rect::from_corners(x1, y1, x2, y2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_bounds_without_selection_is_whole_drawable() {
        let image = Image::new(30, 20, ImageType::Rgb);
        let d = Image::add_drawable(&image, "bg", ImageType::Rgb, (0, 0));
        assert_eq!(image.borrow().mask_bounds(d.id()), Some(Rect::new(0, 0, 30, 20)));
    }

    #[test]
    fn mask_bounds_respects_drawable_offset() {
        let image = Image::new(100, 100, ImageType::Gray);
        let d = Image::add_drawable_sized(&image, "layer", ImageType::Gray, 50, 50, (20, 30));
        let mut img = image.borrow_mut();
        img.set_selection_rect(Rect::new(10, 40, 30, 20));
        assert_eq!(img.mask_bounds(d.id()), Some(Rect::new(0, 10, 20, 20)));

        // Selection entirely off the drawable falls back to the full drawable.
        img.set_selection_rect(Rect::new(0, 0, 5, 5));
        assert_eq!(img.mask_bounds(d.id()), Some(Rect::new(0, 0, 50, 50)));
    }

    #[test]
    fn apply_shadow_blends_by_selection_strength() {
        let image = Image::new(2, 1, ImageType::Gray);
        let d = Image::add_drawable(&image, "bg", ImageType::Gray, (0, 0));
        let mut img = image.borrow_mut();
        let mut mask = TileManager::new(2, 1, 1);
        mask.write_pixel(0, 0, &[255]);
        mask.write_pixel(1, 0, &[51]);
        img.set_selection(mask);
        img.shadow_for(d.id()).unwrap().fill(&[200]);
        img.apply_shadow(d.id(), Rect::new(0, 0, 2, 1));
        let tiles = img.drawable(d.id()).unwrap().tiles();
        assert_eq!(tiles.read_pixel(0, 0), Some(&[200u8][..]));
        assert_eq!(tiles.read_pixel(1, 0), Some(&[40u8][..]));
    }

    #[test]
    fn removed_drawable_no_longer_resolves() {
        let image = Image::new(4, 4, ImageType::Rgb);
        let d = Image::add_drawable(&image, "bg", ImageType::Rgb, (0, 0));
        assert!(d.is_alive());
        image.borrow_mut().remove_drawable(d.id());
        assert!(d.image().is_none());
        assert!(d.owner().is_some());
        drop(image);
        assert!(d.owner().is_none());
    }

    #[test]
    fn undo_swaps_and_redo_restores() {
        let image = Image::new(4, 4, ImageType::Gray);
        let d = Image::add_drawable(&image, "bg", ImageType::Gray, (0, 0));
        let mut img = image.borrow_mut();
        let before = img.drawable(d.id()).unwrap().tiles().clone();
        img.drawable_mut(d.id()).unwrap().tiles_mut().fill(&[9]);
        assert!(img.push_undo(d.id(), Rect::new(0, 0, 4, 4), before, "Fill"));

        assert_eq!(img.undo().as_deref(), Some("Fill"));
        assert_eq!(img.get_color_at(d.id(), 3, 3).unwrap().rgba, Rgba([0, 0, 0, 255]));
        assert_eq!(img.redo().as_deref(), Some("Fill"));
        assert_eq!(img.get_color_at(d.id(), 3, 3).unwrap().rgba, Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn indexed_colour_sample_reports_index() {
        let image = Image::new(1, 1, ImageType::Indexed);
        let d = Image::add_drawable(&image, "bg", ImageType::IndexedA, (0, 0));
        let mut img = image.borrow_mut();
        img.set_colormap(vec![[0, 0, 0], [10, 20, 30]]);
        img.drawable_mut(d.id()).unwrap().tiles_mut().write_pixel(0, 0, &[1, 128]);
        let c = img.get_color_at(d.id(), 0, 0).unwrap();
        assert_eq!(c.rgba, Rgba([10, 20, 30, 128]));
        assert_eq!(c.index, Some(1));
    }

    #[test]
    fn convert_drawable_changes_depth() {
        let image = Image::new(2, 2, ImageType::Rgb);
        let d = Image::add_drawable(&image, "bg", ImageType::Rgb, (0, 0));
        let mut img = image.borrow_mut();
        img.drawable_mut(d.id()).unwrap().tiles_mut().fill(&[255, 255, 255]);
        assert!(img.convert_drawable(d.id(), ImageType::Gray));
        let dr = img.drawable(d.id()).unwrap();
        assert_eq!(dr.bpp(), 1);
        assert_eq!(dr.tiles().read_pixel(1, 1), Some(&[255u8][..]));
    }
}
