// ============================================================================
// ADJUSTMENT TRANSFORMS – chunk transforms for `ImageMap::apply`
// ============================================================================
//
// Every constructor returns a `'static` closure reading a snapshot chunk and
// writing the matching shadow chunk. Colour channels go through a 256-entry
// LUT where the operation allows it; alpha is copied. Depth decides the
// layout: 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGB + alpha.
// ============================================================================

use crate::image::luminance;
use crate::region::{PixelChunk, PixelChunkMut};

/// Number of colour channels for a pixel of `bpp` bytes.
#[inline]
fn color_channels(bpp: usize) -> usize {
    match bpp {
        2 => 1,
        4 => 3,
        n => n,
    }
}

/// Run `f(src_pixel, dst_pixel)` over every pixel of the chunk pair.
fn map_pixels<F>(src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>, f: F)
where
    F: Fn(&[u8], &mut [u8]),
{
    let bpp = src.bpp();
    debug_assert_eq!(bpp, dst.bpp());
    for row in 0..src.height() as usize {
        let from = src.row(row);
        let to = dst.row_mut(row);
        for (s, d) in from.chunks_exact(bpp).zip(to.chunks_exact_mut(bpp)) {
            f(s, d);
        }
    }
}

// ============================================================================
// LUT-BASED OPERATIONS
// ============================================================================

/// Apply `lut` to the colour channels, copy alpha.
pub fn lut_transform(lut: [u8; 256]) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    move |src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>| {
        let colors = color_channels(src.bpp());
        map_pixels(src, dst, |s, d| {
            for (i, (o, &v)) in d.iter_mut().zip(s).enumerate() {
                *o = if i < colors { lut[v as usize] } else { v };
            }
        });
    }
}

pub fn invert() -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    lut_transform(std::array::from_fn(|i| 255 - i as u8))
}

/// `brightness` and `contrast` in -100..100, 0 = unchanged.
pub fn brightness_contrast(brightness: f32, contrast: f32) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    lut_transform(build_brightness_contrast_lut(brightness, contrast))
}

pub fn build_brightness_contrast_lut(brightness: f32, contrast: f32) -> [u8; 256] {
    let contrast = contrast.clamp(-254.0, 254.0);
    let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
    std::array::from_fn(|i| {
        let v = factor * (i as f32 + brightness - 128.0) + 128.0;
        v.round().clamp(0.0, 255.0) as u8
    })
}

/// Levels: remap `[in_black, in_white]` with `gamma` onto `[out_black, out_white]`.
pub fn levels(
    in_black: f32,
    in_white: f32,
    gamma: f32,
    out_black: f32,
    out_white: f32,
) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    lut_transform(build_levels_lut(in_black, in_white, gamma, out_black, out_white))
}

pub fn build_levels_lut(in_black: f32, in_white: f32, gamma: f32, out_black: f32, out_white: f32) -> [u8; 256] {
    let in_range = (in_white - in_black).max(1.0);
    let out_range = out_white - out_black;
    let inv_gamma = 1.0 / gamma.max(0.01);
    std::array::from_fn(|i| {
        let normalized = ((i as f32 - in_black) / in_range).clamp(0.0, 1.0);
        let output = out_black + normalized.powf(inv_gamma) * out_range;
        output.round().clamp(0.0, 255.0) as u8
    })
}

/// Curves through `(input, output)` control points, linear between them and
/// flat outside the first and last point. Fewer than two points is identity.
pub fn curves(points: &[(u8, u8)]) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    lut_transform(build_curve_lut(points))
}

pub fn build_curve_lut(points: &[(u8, u8)]) -> [u8; 256] {
    let mut pts: Vec<(u8, u8)> = points.to_vec();
    pts.sort_by_key(|p| p.0);
    pts.dedup_by_key(|p| p.0);
    if pts.len() < 2 {
        return std::array::from_fn(|i| i as u8);
    }
    let first = pts[0];
    let last = pts[pts.len() - 1];
    std::array::from_fn(|i| {
        let x = i as u8;
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        let seg = pts.windows(2).find(|w| x >= w[0].0 && x <= w[1].0);
        match seg {
            Some(w) => {
                let (x0, y0) = (w[0].0 as f32, w[0].1 as f32);
                let (x1, y1) = (w[1].0 as f32, w[1].1 as f32);
                let t = (i as f32 - x0) / (x1 - x0);
                (y0 + (y1 - y0) * t).round().clamp(0.0, 255.0) as u8
            }
            None => x,
        }
    })
}

/// Reduce every colour channel to `levels` evenly spaced values (2..=256).
pub fn posterize(levels: u32) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    let steps = levels.clamp(2, 256) as f32 - 1.0;
    lut_transform(std::array::from_fn(|i| {
        ((i as f32 / 255.0 * steps).round() / steps * 255.0).round() as u8
    }))
}

// ============================================================================
// PER-PIXEL OPERATIONS
// ============================================================================

/// White where the pixel's intensity lies in `[low, high]`, black elsewhere.
pub fn threshold(low: u8, high: u8) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    move |src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>| {
        let colors = color_channels(src.bpp());
        map_pixels(src, dst, |s, d| {
            let v = if colors == 3 { luminance(s[0], s[1], s[2]) } else { s[0] };
            let out = if (low..=high).contains(&v) { 255 } else { 0 };
            d[..colors].fill(out);
            d[colors..].copy_from_slice(&s[colors..]);
        });
    }
}

/// Replace RGB by its luminance. Gray pixels pass through.
pub fn desaturate() -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    |src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>| {
        let colors = color_channels(src.bpp());
        map_pixels(src, dst, |s, d| {
            d.copy_from_slice(s);
            if colors == 3 {
                d[..3].fill(luminance(s[0], s[1], s[2]));
            }
        });
    }
}

/// Set every pixel to `pixel`; missing bytes become 255.
pub fn fill(pixel: Vec<u8>) -> impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>) + 'static {
    move |src: &PixelChunk<'_>, dst: &mut PixelChunkMut<'_>| {
        map_pixels(src, dst, |_, d| {
            for (i, o) in d.iter_mut().enumerate() {
                *o = pixel.get(i).copied().unwrap_or(255);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Rect;
    use crate::tiles::TileManager;

    fn run(
        f: impl Fn(&PixelChunk<'_>, &mut PixelChunkMut<'_>),
        bpp: usize,
        px: &[u8],
    ) -> Vec<u8> {
        let src = TileManager::from_raw(1, 1, bpp, px);
        let mut dst = TileManager::new(1, 1, bpp);
        let rect = Rect::new(0, 0, 1, 1);
        f(&src.chunk(rect), &mut dst.chunk_mut(rect));
        dst.to_raw()
    }

    #[test]
    fn invert_keeps_alpha() {
        assert_eq!(run(invert(), 4, &[0, 100, 255, 7]), vec![255, 155, 0, 7]);
        assert_eq!(run(invert(), 2, &[10, 20]), vec![245, 20]);
    }

    #[test]
    fn neutral_brightness_contrast_is_identity() {
        let lut = build_brightness_contrast_lut(0.0, 0.0);
        assert!(lut.iter().enumerate().all(|(i, &v)| v == i as u8));
        let brighter = build_brightness_contrast_lut(10.0, 0.0);
        assert_eq!(brighter[100], 110);
        assert_eq!(brighter[250], 255);
    }

    #[test]
    fn curve_interpolates_between_points() {
        let lut = build_curve_lut(&[(0, 0), (128, 255), (255, 255)]);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[64], 128);
        assert_eq!(lut[200], 255);
        let identity = build_curve_lut(&[(10, 20)]);
        assert_eq!(identity[77], 77);
    }

    #[test]
    fn posterize_two_levels() {
        assert_eq!(run(posterize(2), 1, &[100]), vec![0]);
        assert_eq!(run(posterize(2), 1, &[200]), vec![255]);
    }

    #[test]
    fn threshold_and_desaturate_on_rgb() {
        assert_eq!(run(threshold(100, 200), 3, &[150, 150, 150]), vec![255, 255, 255]);
        assert_eq!(run(threshold(100, 200), 3, &[250, 250, 250]), vec![0, 0, 0]);
        assert_eq!(run(desaturate(), 4, &[255, 255, 255, 9]), vec![255, 255, 255, 9]);
    }

    #[test]
    fn fill_pads_missing_bytes() {
        assert_eq!(run(fill(vec![3]), 2, &[0, 0]), vec![3, 255]);
    }
}
