//! Warp a raster onto an arbitrary destination quadrilateral.
//!
//! A true projective transform is approximated by subdividing the source into
//! step x step cells; each cell's destination corners come from two nested
//! linear interpolations along the quad's edges, and the cell is draw-copied
//! onto its integer bounding rectangle, expanded by one unit so adjacent
//! cells leave no seam. `step` trades fidelity for draw work: 1 (the
//! default) maps every source pixel through its own cell.

use image::RgbaImage;

use crate::geometry::{Corners, Point, lerp};

/// A raster composited onto a quadrilateral, in the local space of the quad's
/// bounding box. `corner_offset` is the translation subtracted from the
/// caller's corners; add it back to place the bitmap on the display surface.
#[derive(Debug)]
pub struct WarpedQuad {
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
    pub corner_offset: Point,
    /// The normalized corners the warp actually used.
    pub corners: Corners,
}

/// Map `source` onto the quadrilateral described by `corners` (UL, UR, BR,
/// BL). `step` is clamped to at least 1.
#[must_use]
pub fn warp_image_to_quad(source: &RgbaImage, corners: &Corners, step: u32) -> WarpedQuad {
    let step = step.max(1);
    let (normalized, corner_offset) = corners.normalized();
    let (width, height) = normalized.bounding_size();
    let mut image = RgbaImage::new(width, height);

    let src_w = source.width();
    let src_h = source.height();
    if src_w < 2 || src_h < 2 || width == 0 || height == 0 {
        return WarpedQuad {
            image,
            width,
            height,
            corner_offset,
            corners: normalized,
        };
    }

    // Leave room for each cell's far edge: the last cell's outer corners are
    // interpolated at fraction (coord + step) / span.
    let w = f64::from(src_w - 1);
    let h = f64::from(src_h - 1);
    let step_f = f64::from(step);

    let ul = normalized.ul();
    let ur = normalized.ur();
    let br = normalized.br();
    let bl = normalized.bl();

    let mut y = 0u32;
    while f64::from(y) < h {
        let ty0 = f64::from(y) / h;
        let ty1 = (f64::from(y) + step_f) / h;
        let left_near = lerp(ul, bl, ty0);
        let right_near = lerp(ur, br, ty0);
        let left_far = lerp(ul, bl, ty1);
        let right_far = lerp(ur, br, ty1);

        let mut x = 0u32;
        while f64::from(x) < w {
            let tx0 = f64::from(x) / w;
            let tx1 = (f64::from(x) + step_f) / w;
            let p1 = lerp(left_near, right_near, tx0);
            let p2 = lerp(left_near, right_near, tx1);
            let p3 = lerp(left_far, right_far, tx1);
            let p4 = lerp(left_far, right_far, tx0);

            blit_cell(source, &mut image, x, y, step, [p1, p2, p3, p4]);
            x += step;
        }
        y += step;
    }

    WarpedQuad {
        image,
        width,
        height,
        corner_offset,
        corners: normalized,
    }
}

/// Stretch-copy the source cell at (sx, sy) onto the integer bounding
/// rectangle of its four destination corners, expanded by one unit.
fn blit_cell(
    source: &RgbaImage,
    dest: &mut RgbaImage,
    sx: u32,
    sy: u32,
    step: u32,
    points: [Point; 4],
) {
    let min_x = points.iter().fold(f64::INFINITY, |m, p| m.min(p.x));
    let max_x = points.iter().fold(f64::NEG_INFINITY, |m, p| m.max(p.x));
    let min_y = points.iter().fold(f64::INFINITY, |m, p| m.min(p.y));
    let max_y = points.iter().fold(f64::NEG_INFINITY, |m, p| m.max(p.y));

    let rx0 = min_x.floor() as i64;
    let ry0 = min_y.floor() as i64;
    let rect_w = (max_x.ceil() as i64 - rx0) + 1;
    let rect_h = (max_y.ceil() as i64 - ry0) + 1;

    let cell_w = u64::from(step.min(source.width() - sx));
    let cell_h = u64::from(step.min(source.height() - sy));
    if cell_w == 0 || cell_h == 0 || rect_w <= 0 || rect_h <= 0 {
        return;
    }

    for oy in 0..rect_h {
        let dy = ry0 + oy;
        if dy < 0 || dy >= i64::from(dest.height()) {
            continue;
        }
        let src_y = sy + (oy as u64 * cell_h / rect_h as u64) as u32;
        for ox in 0..rect_w {
            let dx = rx0 + ox;
            if dx < 0 || dx >= i64::from(dest.width()) {
                continue;
            }
            let src_x = sx + (ox as u64 * cell_w / rect_w as u64) as u32;
            dest.put_pixel(dx as u32, dy as u32, *source.get_pixel(src_x, src_y));
        }
    }
}
