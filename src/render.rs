//! Compositing decoded channels into displayable RGBA bitmaps.
//!
//! Single-band rasters are normalized to grayscale through per-band min/range
//! stretching; three- and four-band rasters map directly to RGB(A). Pixels
//! where any band equals the nodata value stay fully transparent, as do
//! pixels whose owning units failed to decode when nodata marks them.

use image::{Rgba, RgbaImage};

use crate::assembler::WindowRaster;
use crate::extract::SampleChannel;
use crate::quad_warp::WarpedQuad;

/// Normalization inputs for compositing. Absent statistics are computed from
/// the channel data, skipping the nodata value.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Per-band minimum used for single-band stretching.
    pub mins: Option<Vec<f64>>,
    /// Per-band value range used for single-band stretching.
    pub ranges: Option<Vec<f64>>,
    /// Value marking transparent pixels.
    pub nodata: Option<f64>,
}

/// Min/max of a channel, skipping NaN and `nodata`. `None` when no valid
/// samples exist.
#[must_use]
pub fn channel_stats(channel: &SampleChannel, nodata: Option<f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for i in 0..channel.len() {
        let Some(value) = channel.value_at(i) else {
            continue;
        };
        if value.is_nan() {
            continue;
        }
        if let Some(nd) = nodata
            && value == nd
        {
            continue;
        }
        min = min.min(value);
        max = max.max(value);
    }
    if min.is_finite() { Some((min, max)) } else { None }
}

/// Composite a decoded window into an RGBA bitmap of `out_w` x `out_h`,
/// nearest-neighbor scaled. Band counts other than 1, 3, or 4 fall back to a
/// grayscale rendering of the first band.
#[must_use]
pub fn channels_to_rgba(
    raster: &WindowRaster,
    out_w: u32,
    out_h: u32,
    options: &RenderOptions,
) -> RgbaImage {
    let mut image = RgbaImage::new(out_w, out_h);
    if raster.width == 0 || raster.height == 0 || raster.channels.is_empty() {
        return image;
    }

    let bands = raster.bands();
    let x_ratio = f64::from(raster.width) / f64::from(out_w.max(1));
    let y_ratio = f64::from(raster.height) / f64::from(out_h.max(1));

    // Stretch statistics for the grayscale path.
    let (min0, range0) = match (&options.mins, &options.ranges) {
        (Some(mins), Some(ranges)) if !mins.is_empty() && !ranges.is_empty() => {
            (mins[0], ranges[0].abs().max(f64::EPSILON))
        }
        _ => {
            let (min, max) =
                channel_stats(&raster.channels[0], options.nodata).unwrap_or((0.0, 1.0));
            (min, (max - min).abs().max(f64::EPSILON))
        }
    };

    let mut values = vec![0.0f64; bands];
    for row in 0..out_h {
        let src_y = ((f64::from(row) * y_ratio).round() as u32).min(raster.height - 1);
        for col in 0..out_w {
            let src_x = ((f64::from(col) * x_ratio).round() as u32).min(raster.width - 1);

            let mut valid = true;
            for (band, slot) in values.iter_mut().enumerate() {
                match raster.sample(band, src_x, src_y) {
                    Some(v) if !v.is_nan() && Some(v) != options.nodata => *slot = v,
                    _ => {
                        valid = false;
                        break;
                    }
                }
            }
            if !valid {
                continue;
            }

            let pixel = match bands {
                3 => Rgba([clamp_u8(values[0]), clamp_u8(values[1]), clamp_u8(values[2]), 255]),
                4 => Rgba([
                    clamp_u8(values[0]),
                    clamp_u8(values[1]),
                    clamp_u8(values[2]),
                    clamp_u8(values[3]),
                ]),
                _ => {
                    let scaled = clamp_u8((values[0] - min0) / range0 * 255.0);
                    Rgba([scaled, scaled, scaled, 255])
                }
            };
            image.put_pixel(col, row, pixel);
        }
    }
    image
}

#[inline]
fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Viewport description handed to a layer on each draw.
#[derive(Debug, Clone, Copy)]
pub struct ViewInfo {
    pub width: u32,
    pub height: u32,
    pub zoom: u32,
}

/// Capability seam for the hosting display layer: a small composed trait
/// instead of a mutated rendering prototype. `set_data` hands over a freshly
/// warped raster; `on_draw` composites it onto the host's surface.
pub trait RasterLayer {
    fn mount(&mut self) {}
    fn unmount(&mut self) {}
    fn set_data(&mut self, data: WarpedQuad);
    fn on_draw(&mut self, view: &ViewInfo, surface: &mut RgbaImage);
}
