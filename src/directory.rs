//! Raster directory metadata and layout arithmetic.
//!
//! A [`RasterDirectory`] is the record an external directory parser produces
//! from a container's IFD: image and tile geometry, per-band sample
//! descriptions, the compression id, and the offset/byte-count tables that
//! locate each compressed unit inside the file. All tile/strip offset math in
//! the pipeline goes through this module.

use crate::error::RasterError;

// TIFF compression tag values understood by the builtin codec set.
pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_LZW: u16 = 5;
pub const COMPRESSION_JPEG: u16 = 7;
pub const COMPRESSION_DEFLATE: u16 = 8;
pub const COMPRESSION_DEFLATE_OLD: u16 = 32946;
pub const COMPRESSION_ZSTD: u16 = 50000;

/// Band interleaving: all bands per pixel in one plane, or one full plane per
/// band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanarConfiguration {
    Chunky,
    Planar,
}

/// Numeric interpretation of one band's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    UnsignedInt,
    SignedInt,
    Float,
}

impl SampleFormat {
    /// Map the TIFF `SampleFormat` tag value. Absent/unspecified tags default
    /// to unsigned.
    #[must_use]
    pub fn from_tag(value: u16) -> Option<Self> {
        match value {
            1 => Some(SampleFormat::UnsignedInt),
            2 => Some(SampleFormat::SignedInt),
            3 => Some(SampleFormat::Float),
            _ => None,
        }
    }
}

/// Directory metadata for one raster image, as parsed by an external
/// collaborator. Tile fields describe strips when `is_tiled` is false
/// (`tile_width == width`, `tile_height` = rows per strip).
#[derive(Debug, Clone)]
pub struct RasterDirectory {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub is_tiled: bool,
    pub planar_configuration: PlanarConfiguration,
    pub samples_per_pixel: usize,
    /// Bit depth per band. A single entry applies to every band.
    pub bits_per_sample: Vec<u16>,
    /// Sample format per band. A single entry applies to every band.
    pub sample_format: Vec<SampleFormat>,
    /// TIFF compression tag value, dispatched through the codec registry.
    pub compression_id: u16,
    /// Byte order of the encoded samples.
    pub little_endian: bool,
    /// Byte offset of each compressed unit, indexed by linear unit index.
    pub tile_offsets: Vec<u64>,
    /// Compressed byte count of each unit, same indexing as `tile_offsets`.
    pub tile_byte_counts: Vec<u64>,
    pub nodata: Option<f64>,
}

impl RasterDirectory {
    #[must_use]
    pub fn tiles_across(&self) -> u32 {
        self.width.div_ceil(self.tile_width.max(1))
    }

    #[must_use]
    pub fn tiles_down(&self) -> u32 {
        self.height.div_ceil(self.tile_height.max(1))
    }

    /// Number of compressed units in the file: one per tile for chunky
    /// layout, one per (tile, band) for planar.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        let tiles = self.tiles_across() as usize * self.tiles_down() as usize;
        match self.planar_configuration {
            PlanarConfiguration::Chunky => tiles,
            PlanarConfiguration::Planar => tiles * self.samples_per_pixel,
        }
    }

    /// Offset-table length invariant from the data model: the tables must
    /// cover every addressable unit.
    pub fn validate(&self) -> Result<(), RasterError> {
        let required = self.unit_count();
        let table_len = self.tile_offsets.len().min(self.tile_byte_counts.len());
        if table_len < required {
            return Err(RasterError::IndexOutOfRange {
                index: required - 1,
                table_len,
            });
        }
        Ok(())
    }

    /// Bit depth of one band. TIFF allows a single entry to stand for all
    /// bands.
    #[must_use]
    pub fn bits_for(&self, sample: usize) -> u16 {
        self.bits_per_sample
            .get(sample)
            .or_else(|| self.bits_per_sample.first())
            .copied()
            .unwrap_or(8)
    }

    #[must_use]
    pub fn format_for(&self, sample: usize) -> SampleFormat {
        self.sample_format
            .get(sample)
            .or_else(|| self.sample_format.first())
            .copied()
            .unwrap_or(SampleFormat::UnsignedInt)
    }

    /// Bytes per pixel within a chunky tile (all bands interleaved).
    #[must_use]
    pub fn chunky_bytes_per_pixel(&self) -> usize {
        (0..self.samples_per_pixel)
            .map(|s| self.bits_for(s) as usize)
            .sum::<usize>()
            / 8
    }

    /// Byte offset of `sample` within one chunky pixel: the cumulative bit
    /// width of the preceding samples, in bytes. Zero for planar layout.
    #[must_use]
    pub fn intra_pixel_offset(&self, sample: usize) -> usize {
        match self.planar_configuration {
            PlanarConfiguration::Planar => 0,
            PlanarConfiguration::Chunky => {
                (0..sample).map(|s| self.bits_for(s) as usize).sum::<usize>() / 8
            }
        }
    }

    /// Bytes per pixel as seen inside one decoded unit: all bands for chunky
    /// layout, a single band for planar.
    #[must_use]
    pub fn unit_bytes_per_pixel(&self, sample: usize) -> usize {
        match self.planar_configuration {
            PlanarConfiguration::Chunky => self.chunky_bytes_per_pixel(),
            PlanarConfiguration::Planar => self.bits_for(sample) as usize / 8,
        }
    }

    /// Expected decoded byte length of one unit.
    #[must_use]
    pub fn unit_decoded_len(&self, sample: usize) -> usize {
        self.tile_width as usize * self.tile_height as usize * self.unit_bytes_per_pixel(sample)
    }

    /// Linear index of a unit into the offset tables. Planar layout stores
    /// each band's planes as a contiguous run of tiles.
    #[must_use]
    pub fn linear_index(&self, tile_x: u32, tile_y: u32, sample: usize) -> usize {
        let across = self.tiles_across() as usize;
        let down = self.tiles_down() as usize;
        let tile = tile_y as usize * across + tile_x as usize;
        match self.planar_configuration {
            PlanarConfiguration::Chunky => tile,
            PlanarConfiguration::Planar => sample * across * down + tile,
        }
    }

    /// Byte range of a unit, or `IndexOutOfRange` past the table end.
    pub fn byte_range(&self, index: usize) -> Result<(u64, usize), RasterError> {
        let table_len = self.tile_offsets.len().min(self.tile_byte_counts.len());
        if index >= table_len {
            return Err(RasterError::IndexOutOfRange { index, table_len });
        }
        Ok((self.tile_offsets[index], self.tile_byte_counts[index] as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_band_directory(planar: PlanarConfiguration) -> RasterDirectory {
        RasterDirectory {
            width: 20,
            height: 12,
            tile_width: 8,
            tile_height: 8,
            is_tiled: true,
            planar_configuration: planar,
            samples_per_pixel: 2,
            bits_per_sample: vec![8, 16],
            sample_format: vec![SampleFormat::UnsignedInt, SampleFormat::UnsignedInt],
            compression_id: COMPRESSION_NONE,
            little_endian: true,
            tile_offsets: vec![0; 12],
            tile_byte_counts: vec![0; 12],
            nodata: None,
        }
    }

    #[test]
    fn tile_grid_dimensions_round_up() {
        let dir = two_band_directory(PlanarConfiguration::Chunky);
        assert_eq!(dir.tiles_across(), 3);
        assert_eq!(dir.tiles_down(), 2);
        assert_eq!(dir.unit_count(), 6);
    }

    #[test]
    fn planar_unit_count_scales_with_bands() {
        let dir = two_band_directory(PlanarConfiguration::Planar);
        assert_eq!(dir.unit_count(), 12);
        assert!(dir.validate().is_ok());
    }

    #[test]
    fn short_offset_table_fails_validation() {
        let mut dir = two_band_directory(PlanarConfiguration::Planar);
        dir.tile_offsets.truncate(6);
        assert!(matches!(
            dir.validate(),
            Err(RasterError::IndexOutOfRange { table_len: 6, .. })
        ));
    }

    #[test]
    fn chunky_linear_index_is_row_major() {
        let dir = two_band_directory(PlanarConfiguration::Chunky);
        assert_eq!(dir.linear_index(2, 1, 0), 5);
        // Sample index is ignored for chunky layout.
        assert_eq!(dir.linear_index(2, 1, 1), 5);
    }

    #[test]
    fn planar_linear_index_offsets_by_plane() {
        let dir = two_band_directory(PlanarConfiguration::Planar);
        assert_eq!(dir.linear_index(1, 0, 0), 1);
        assert_eq!(dir.linear_index(1, 0, 1), 6 + 1);
    }

    #[test]
    fn intra_pixel_offset_accumulates_preceding_bits() {
        let dir = two_band_directory(PlanarConfiguration::Chunky);
        assert_eq!(dir.chunky_bytes_per_pixel(), 3);
        assert_eq!(dir.intra_pixel_offset(0), 0);
        assert_eq!(dir.intra_pixel_offset(1), 1);

        let planar = two_band_directory(PlanarConfiguration::Planar);
        assert_eq!(planar.intra_pixel_offset(1), 0);
        assert_eq!(planar.unit_bytes_per_pixel(1), 2);
    }

    #[test]
    fn byte_range_rejects_out_of_table_index() {
        let dir = two_band_directory(PlanarConfiguration::Chunky);
        assert!(dir.byte_range(5).is_ok());
        assert!(matches!(
            dir.byte_range(12),
            Err(RasterError::IndexOutOfRange { index: 12, .. })
        ));
    }

    #[test]
    fn single_entry_bits_apply_to_all_bands() {
        let mut dir = two_band_directory(PlanarConfiguration::Chunky);
        dir.samples_per_pixel = 3;
        dir.bits_per_sample = vec![16];
        dir.sample_format = vec![SampleFormat::UnsignedInt];
        assert_eq!(dir.bits_for(2), 16);
        assert_eq!(dir.chunky_bytes_per_pixel(), 6);
    }
}
