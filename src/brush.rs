// ============================================================================
// GENERATED BRUSH – parametric elliptical brush tip and its 8-bit mask
// ============================================================================
//
// Four parameters (radius, hardness, angle, aspect ratio) describe the tip.
// The mask is rebuilt whenever one of them changes, unless the brush is
// frozen; the matching thaw performs exactly one rebuild.
//
// Falloff: a 1-D table indexed by `distance * OVERSAMPLING` is filled from a
// running box filter over `gauss((d / radius) ^ (1 / (1 - hardness)))`, then
// every pixel of the upper half is looked up by its rotated, aspect-scaled
// distance and mirrored through the centre.

use rayon::prelude::*;

pub const OVERSAMPLING: usize = 5;

pub const MAX_RADIUS: f64 = 32767.0;
pub const MAX_ASPECT_RATIO: f64 = 1000.0;
pub const MIN_SPACING: f64 = 1.0;
pub const MAX_SPACING: f64 = 1000.0;
pub const DEFAULT_SPACING: f64 = 20.0;

/// Exponent used when the brush is (numerically) fully hard.
const HARD_EXPONENT: f64 = 1_000_000.0;

/// Shape parameters of a generated brush, already clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushShape {
    pub radius: f64,
    pub hardness: f64,
    pub angle: f64,
    pub aspect_ratio: f64,
}

impl Default for BrushShape {
    fn default() -> Self {
        Self { radius: 5.0, hardness: 0.5, angle: 0.0, aspect_ratio: 1.0 }
    }
}

pub fn clamp_radius(radius: f64) -> f64 {
    if radius >= 0.0 { radius.min(MAX_RADIUS) } else { 0.0 }
}

pub fn clamp_hardness(hardness: f64) -> f64 {
    if hardness >= 0.0 { hardness.min(1.0) } else { 0.0 }
}

/// Wrap into `[0, 180)`.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let a = angle.rem_euclid(180.0);
    if a >= 180.0 { 0.0 } else { a }
}

pub fn clamp_aspect_ratio(ratio: f64) -> f64 {
    if ratio >= 1.0 { ratio.min(MAX_ASPECT_RATIO) } else { 1.0 }
}

pub fn clamp_spacing(spacing: f64) -> f64 {
    if spacing >= MIN_SPACING { spacing.min(MAX_SPACING) } else { MIN_SPACING }
}

/// Packed 8-bit mask of size `(2 * half_width + 1) × (2 * half_height + 1)`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BrushMask {
    half_width: u32,
    half_height: u32,
    data: Vec<u8>,
}

impl BrushMask {
    pub fn width(&self) -> u32 { self.half_width * 2 + 1 }
    pub fn height(&self) -> u32 { self.half_height * 2 + 1 }
    pub fn half_width(&self) -> u32 { self.half_width }
    pub fn half_height(&self) -> u32 { self.half_height }
    pub fn data(&self) -> &[u8] { &self.data }

    /// Value at offset `(dx, dy)` from the centre, 0 outside the mask.
    pub fn value_at(&self, dx: i32, dy: i32) -> u8 {
        let x = dx as i64 + self.half_width as i64;
        let y = dy as i64 + self.half_height as i64;
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return 0;
        }
        self.data[y as usize * self.width() as usize + x as usize]
    }

    pub fn center(&self) -> u8 {
        self.value_at(0, 0)
    }
}

/// Output of one render: the mask plus the stroke-spacing axes.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedBrush {
    pub mask: BrushMask,
    pub x_axis: [f64; 2],
    pub y_axis: [f64; 2],
}

/// Piecewise quadratic bell on `[-1, 1]`. Not an actual Gaussian.
fn gauss(f: f64) -> f64 {
    if f < -0.5 {
        let f = -1.0 - f;
        return 2.0 * f * f;
    }
    if f < 0.5 {
        return 1.0 - 2.0 * f * f;
    }
    let f = 1.0 - f;
    2.0 * f * f
}

/// Radial intensity table indexed by `round(distance * OVERSAMPLING)`.
fn falloff_lookup(radius: f64, hardness: f64) -> Vec<u8> {
    let exponent = if 1.0 - hardness < 0.000001 { HARD_EXPONENT } else { 1.0 / (1.0 - hardness) };
    let falloff = |d: f64| {
        if d > radius {
            0.0
        } else {
            let ratio = if radius > 0.0 { d / radius } else { 0.0 };
            gauss(ratio.powf(exponent))
        }
    };

    let r1 = (radius + 1.0).ceil();
    let length = ((2.0 * r1 * r1).sqrt() + 1.0).ceil() as usize * OVERSAMPLING;
    let mut lookup = vec![0u8; length];

    let mut window = [0.0f64; OVERSAMPLING];
    let mut sum = 0.0;
    let mut d = 0.0;
    for (i, slot) in window.iter_mut().enumerate() {
        d = ((i as f64 + 0.5) / OVERSAMPLING as f64 - 0.5).abs();
        *slot = falloff(d);
        sum += *slot;
    }

    // The sliding window keeps going from where the seeding loop left `d`.
    let mut x = 0;
    while (d < radius || sum > 0.00001) && x < length {
        let slot = x % OVERSAMPLING;
        sum -= window[slot];
        window[slot] = falloff(d);
        sum += window[slot];
        lookup[x] = (sum * (255.0 / OVERSAMPLING as f64)).round_ties_even().clamp(0.0, 255.0) as u8;
        x += 1;
        d += 1.0 / OVERSAMPLING as f64;
    }
    lookup
}

/// Half extents of the axis-aligned box around the rotated ellipse.
fn half_extents(shape: &BrushShape, sin: f64, cos: f64) -> (u32, u32) {
    let r = shape.radius.ceil();
    let minor = r / shape.aspect_ratio;
    let tx = (cos * r - sin * minor).abs().max((cos * r + sin * minor).abs());
    let ty = (sin * r + cos * minor).abs().max((sin * r - cos * minor).abs());
    let w = if shape.radius > tx { tx.ceil() } else { shape.radius.ceil() };
    let h = if shape.radius > ty { ty.ceil() } else { shape.radius.ceil() };
    (w as u32, h as u32)
}

/// Render the mask and spacing axes for `shape`. Pure and deterministic.
pub fn render_mask(shape: &BrushShape) -> RenderedBrush {
    let (sin, cos) = shape.angle.to_radians().sin_cos();
    let (hw, hh) = half_extents(shape, sin, cos);

    let x_axis = [cos * shape.radius, -sin * shape.radius];
    let y_axis = [sin * shape.radius / shape.aspect_ratio, cos * shape.radius / shape.aspect_ratio];

    let lookup = falloff_lookup(shape.radius, shape.hardness);
    let width = (hw * 2 + 1) as usize;
    let reach = shape.radius + 1.0;

    let height = (hh * 2 + 1) as usize;
    let mut data = vec![0u8; width * height];
    let (above, below) = data.split_at_mut(hh as usize * width);

    // Centre row and everything under it.
    below.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let y = y as f64;
        for (out, x) in row.iter_mut().zip(-(hw as i64)..=hw as i64) {
            let x = x as f64;
            let tx = cos * x - sin * y;
            let ty = (cos * y + sin * x) * shape.aspect_ratio;
            let d = (tx * tx + ty * ty).sqrt();
            if d < reach {
                let idx = (d * OVERSAMPLING as f64).round_ties_even() as usize;
                *out = lookup.get(idx).copied().unwrap_or(0);
            }
        }
    });

    // Point reflection through the centre: row mirrored, order reversed.
    let below = &*below;
    above.par_chunks_mut(width).enumerate().for_each(|(i, row)| {
        let y = hh as usize - i;
        let src = &below[y * width..(y + 1) * width];
        for (out, &v) in row.iter_mut().zip(src.iter().rev()) {
            *out = v;
        }
    });

    RenderedBrush {
        mask: BrushMask { half_width: hw, half_height: hh, data },
        x_axis,
        y_axis,
    }
}

type DirtyHandler = Box<dyn FnMut(&GeneratedBrush)>;

/// Editable generated brush: parameters, cached mask, freeze counter and
/// change observers.
pub struct GeneratedBrush {
    name: String,
    spacing: f64,
    shape: BrushShape,
    rendered: RenderedBrush,
    freeze: u32,
    dirty: bool,
    handlers: Vec<DirtyHandler>,
}

impl std::fmt::Debug for GeneratedBrush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedBrush")
            .field("name", &self.name)
            .field("spacing", &self.spacing)
            .field("shape", &self.shape)
            .field("mask", &(self.rendered.mask.width(), self.rendered.mask.height()))
            .field("frozen", &self.freeze)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Clone for GeneratedBrush {
    /// Observers are not carried over.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            spacing: self.spacing,
            shape: self.shape,
            rendered: self.rendered.clone(),
            freeze: 0,
            dirty: self.dirty,
            handlers: Vec::new(),
        }
    }
}

impl Default for GeneratedBrush {
    fn default() -> Self {
        let s = BrushShape::default();
        Self::new(s.radius, s.hardness, s.angle, s.aspect_ratio)
    }
}

impl GeneratedBrush {
    /// New brush named "Untitled" with 20 % spacing. Parameters are clamped.
    pub fn new(radius: f64, hardness: f64, angle: f64, aspect_ratio: f64) -> Self {
        let shape = BrushShape {
            radius: clamp_radius(radius),
            hardness: clamp_hardness(hardness),
            angle: wrap_angle(angle),
            aspect_ratio: clamp_aspect_ratio(aspect_ratio),
        };
        Self {
            name: "Untitled".to_string(),
            spacing: DEFAULT_SPACING,
            shape,
            rendered: render_mask(&shape),
            freeze: 0,
            dirty: true,
            handlers: Vec::new(),
        }
    }

    // ---- metadata -----------------------------------------------------------

    pub fn name(&self) -> &str { &self.name }

    pub fn set_name(&mut self, name: &str) {
        if self.name != name {
            self.name = name.to_string();
            self.dirty = true;
        }
    }

    pub fn spacing(&self) -> f64 { self.spacing }

    pub fn set_spacing(&mut self, spacing: f64) -> f64 {
        let spacing = clamp_spacing(spacing);
        if spacing != self.spacing {
            self.spacing = spacing;
            self.dirty = true;
        }
        self.spacing
    }

    /// Unsaved changes since creation or the last `mark_clean`.
    pub fn is_dirty(&self) -> bool { self.dirty }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ---- parameters ---------------------------------------------------------

    pub fn shape(&self) -> BrushShape { self.shape }
    pub fn radius(&self) -> f64 { self.shape.radius }
    pub fn hardness(&self) -> f64 { self.shape.hardness }
    pub fn angle(&self) -> f64 { self.shape.angle }
    pub fn aspect_ratio(&self) -> f64 { self.shape.aspect_ratio }

    pub fn set_radius(&mut self, radius: f64) -> f64 {
        let radius = clamp_radius(radius);
        if radius != self.shape.radius {
            self.shape.radius = radius;
            self.changed();
        }
        radius
    }

    pub fn set_hardness(&mut self, hardness: f64) -> f64 {
        let hardness = clamp_hardness(hardness);
        if hardness != self.shape.hardness {
            self.shape.hardness = hardness;
            self.changed();
        }
        hardness
    }

    pub fn set_angle(&mut self, angle: f64) -> f64 {
        let angle = wrap_angle(angle);
        if angle != self.shape.angle {
            self.shape.angle = angle;
            self.changed();
        }
        angle
    }

    pub fn set_aspect_ratio(&mut self, ratio: f64) -> f64 {
        let ratio = clamp_aspect_ratio(ratio);
        if ratio != self.shape.aspect_ratio {
            self.shape.aspect_ratio = ratio;
            self.changed();
        }
        ratio
    }

    // ---- freeze / thaw ------------------------------------------------------

    pub fn freeze(&mut self) {
        self.freeze += 1;
    }

    /// Leave one freeze level; the last one rebuilds the mask.
    pub fn thaw(&mut self) {
        self.freeze = self.freeze.saturating_sub(1);
        if self.freeze == 0 {
            self.recompute();
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze > 0
    }

    // ---- output -------------------------------------------------------------

    /// The mask as of the last rebuild (stale while frozen).
    pub fn mask(&self) -> &BrushMask {
        &self.rendered.mask
    }

    pub fn x_axis(&self) -> [f64; 2] { self.rendered.x_axis }
    pub fn y_axis(&self) -> [f64; 2] { self.rendered.y_axis }

    /// Observer fired after every mask rebuild.
    pub fn connect_dirty(&mut self, handler: impl FnMut(&GeneratedBrush) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    fn changed(&mut self) {
        if self.freeze == 0 {
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.rendered = render_mask(&self.shape);
        self.dirty = true;

        let mut handlers = std::mem::take(&mut self.handlers);
        for handler in handlers.iter_mut() {
            handler(self);
        }
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauss_is_continuous_bell() {
        assert_eq!(gauss(0.0), 1.0);
        assert!((gauss(0.5) - 0.5).abs() < 1e-12);
        assert!((gauss(-0.5) - 0.5).abs() < 1e-12);
        assert_eq!(gauss(1.0), 0.0);
    }

    #[test]
    fn lookup_tail_is_zero() {
        let lookup = falloff_lookup(5.0, 0.0);
        assert_eq!(lookup.len(), 50);
        assert!(lookup[0] >= 250);
        assert_eq!(*lookup.last().unwrap(), 0);
        assert!(lookup.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn rows_above_centre_reflect_rows_below() {
        let shape = BrushShape { radius: 12.0, hardness: 0.4, angle: 30.0, aspect_ratio: 3.0 };
        let mask = render_mask(&shape).mask;
        let (w, h) = (mask.width() as usize, mask.height() as usize);
        assert_eq!(mask.data().len(), w * h);
        assert!(mask.half_height() > 0);

        let rows: Vec<&[u8]> = mask.data().chunks_exact(w).collect();
        for (top, bottom) in rows.iter().zip(rows.iter().rev()) {
            assert!(top.iter().eq(bottom.iter().rev()));
        }
        // Rotated ellipse: the centre row is not all there is
        assert!(rows[h / 2 - 1].iter().any(|&v| v > 0));
        assert_eq!(rows[h / 2][w / 2], mask.center());
    }

    #[test]
    fn zero_radius_is_a_single_pixel() {
        let r = render_mask(&BrushShape { radius: 0.0, hardness: 0.0, angle: 0.0, aspect_ratio: 1.0 });
        assert_eq!((r.mask.width(), r.mask.height()), (1, 1));
        assert!(r.mask.center() > 0);
    }

    #[test]
    fn hard_brush_is_flat_inside() {
        let r = render_mask(&BrushShape { radius: 10.0, hardness: 1.0, angle: 0.0, aspect_ratio: 1.0 });
        assert_eq!(r.mask.value_at(0, 0), r.mask.value_at(5, 0));
        assert_eq!(r.mask.value_at(0, 0), 255);
    }

    #[test]
    fn rotated_ellipse_swaps_extents() {
        let flat = render_mask(&BrushShape { radius: 10.0, hardness: 0.5, angle: 0.0, aspect_ratio: 2.0 });
        assert!(flat.mask.half_width() > flat.mask.half_height());
        let upright = render_mask(&BrushShape { radius: 10.0, hardness: 0.5, angle: 90.0, aspect_ratio: 2.0 });
        assert!(upright.mask.half_height() > upright.mask.half_width());
    }

    #[test]
    fn angle_wraps_into_half_turn() {
        assert_eq!(wrap_angle(-10.0), 170.0);
        assert_eq!(wrap_angle(180.0), 0.0);
        assert_eq!(wrap_angle(370.0), 10.0);
        assert_eq!(wrap_angle(f64::NAN), 0.0);
    }
}
