//! Tile location: which compressed units cover a pixel window.
//!
//! A unit is the smallest addressable compressed chunk: one tile (or strip)
//! for chunky layout, one (tile, band) plane for planar layout. The locator
//! resolves each unit's byte range eagerly, so table errors surface before
//! any decode work is dispatched.

use crate::directory::{PlanarConfiguration, RasterDirectory};
use crate::error::RasterError;
use crate::geometry::PixelWindow;

/// One decode unit: tile coordinates, the plane it belongs to (always 0 for
/// chunky layout), its linear index into the offset tables, and the resolved
/// compressed byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileUnit {
    pub tile_x: u32,
    pub tile_y: u32,
    /// Plane index for planar layout; 0 for chunky (all bands share the unit).
    pub sample: usize,
    /// Linear index into the offset/byte-count tables.
    pub index: usize,
    pub offset: u64,
    pub byte_count: usize,
}

/// Compute the ordered set of units covering `window`, one per compressed
/// chunk, in raster order (planes outermost for planar layout).
pub fn covering_units(
    directory: &RasterDirectory,
    window: PixelWindow,
) -> Result<Vec<TileUnit>, RasterError> {
    covering_units_with_stride(directory, window, 1)
}

/// As [`covering_units`], but visiting every `stride`-th tile per axis.
/// A stride above 1 yields a deliberately sparse low-resolution preview;
/// the skipped tiles' window regions stay at the container default.
pub fn covering_units_with_stride(
    directory: &RasterDirectory,
    window: PixelWindow,
    stride: u32,
) -> Result<Vec<TileUnit>, RasterError> {
    window.validate(directory)?;
    let stride = stride.max(1) as usize;

    let tile_w = directory.tile_width.max(1);
    let tile_h = directory.tile_height.max(1);

    // Clip tile extents to the image bounds.
    let min_x_tile = window.x0 / tile_w;
    let max_x_tile = window.x1.div_ceil(tile_w).min(directory.tiles_across());
    let min_y_tile = window.y0 / tile_h;
    let max_y_tile = window.y1.div_ceil(tile_h).min(directory.tiles_down());

    let planes = match directory.planar_configuration {
        PlanarConfiguration::Chunky => 1,
        PlanarConfiguration::Planar => directory.samples_per_pixel,
    };

    let mut units = Vec::new();
    for sample in 0..planes {
        for tile_y in (min_y_tile..max_y_tile).step_by(stride) {
            for tile_x in (min_x_tile..max_x_tile).step_by(stride) {
                let index = directory.linear_index(tile_x, tile_y, sample);
                let (offset, byte_count) = directory.byte_range(index)?;
                units.push(TileUnit {
                    tile_x,
                    tile_y,
                    sample,
                    index,
                    offset,
                    byte_count,
                });
            }
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{COMPRESSION_NONE, SampleFormat};
    use std::collections::HashSet;

    fn directory(planar: PlanarConfiguration, bands: usize) -> RasterDirectory {
        let tiles = 3 * 2;
        let units = if planar == PlanarConfiguration::Planar {
            tiles * bands
        } else {
            tiles
        };
        RasterDirectory {
            width: 20,
            height: 12,
            tile_width: 8,
            tile_height: 8,
            is_tiled: true,
            planar_configuration: planar,
            samples_per_pixel: bands,
            bits_per_sample: vec![8; bands],
            sample_format: vec![SampleFormat::UnsignedInt; bands],
            compression_id: COMPRESSION_NONE,
            little_endian: true,
            tile_offsets: (0..units as u64).map(|i| i * 64).collect(),
            tile_byte_counts: vec![64; units],
            nodata: None,
        }
    }

    #[test]
    fn full_window_covers_every_tile_exactly_once() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        let units = covering_units(&dir, PixelWindow::full(&dir)).unwrap();
        assert_eq!(units.len(), 6);
        let distinct: HashSet<usize> = units.iter().map(|u| u.index).collect();
        assert_eq!(distinct.len(), 6);

        // The union of tile footprints covers the window.
        for px in [0u32, 7, 8, 15, 16, 19] {
            for py in [0u32, 7, 8, 11] {
                assert!(
                    units.iter().any(|u| {
                        px / 8 == u.tile_x && py / 8 == u.tile_y
                    }),
                    "pixel ({px},{py}) uncovered"
                );
            }
        }
    }

    #[test]
    fn window_inside_one_tile_yields_one_unit() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        let units = covering_units(&dir, PixelWindow::new(9, 1, 15, 7)).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!((units[0].tile_x, units[0].tile_y), (1, 0));
        assert_eq!(units[0].offset, 64);
    }

    #[test]
    fn tile_aligned_window_end_does_not_pull_next_tile() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        let units = covering_units(&dir, PixelWindow::new(0, 0, 8, 8)).unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn invalid_window_is_rejected() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        assert!(matches!(
            covering_units(&dir, PixelWindow::new(6, 0, 2, 8)),
            Err(RasterError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn planar_layout_emits_one_unit_per_plane() {
        let dir = directory(PlanarConfiguration::Planar, 3);
        let units = covering_units(&dir, PixelWindow::new(0, 0, 16, 8)).unwrap();
        assert_eq!(units.len(), 6);
        assert_eq!(units[0].index, 0);
        // Second plane's first tile sits a full plane run later.
        let second_plane = units.iter().find(|u| u.sample == 1).unwrap();
        assert_eq!(second_plane.index, 6);
    }

    #[test]
    fn truncated_tables_surface_index_out_of_range() {
        let mut dir = directory(PlanarConfiguration::Planar, 3);
        dir.tile_offsets.truncate(7);
        dir.tile_byte_counts.truncate(7);
        assert!(matches!(
            covering_units(&dir, PixelWindow::full(&dir)),
            Err(RasterError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn stride_two_skips_alternate_tiles() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        let units =
            covering_units_with_stride(&dir, PixelWindow::full(&dir), 2).unwrap();
        let picked: Vec<(u32, u32)> = units.iter().map(|u| (u.tile_x, u.tile_y)).collect();
        assert_eq!(picked, vec![(0, 0), (2, 0)]);
    }

    #[test]
    fn stride_zero_is_clamped_to_one() {
        let dir = directory(PlanarConfiguration::Chunky, 1);
        let all = covering_units(&dir, PixelWindow::full(&dir)).unwrap();
        let clamped =
            covering_units_with_stride(&dir, PixelWindow::full(&dir), 0).unwrap();
        assert_eq!(all, clamped);
    }
}
