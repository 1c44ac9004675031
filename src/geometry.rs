//! Pixel-space geometry: points, decode windows, and destination corners.

use crate::directory::RasterDirectory;
use crate::error::RasterError;

/// A point in destination pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Linear interpolation between two points at fraction `t`.
#[inline]
#[must_use]
pub fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

/// Half-open rectangular pixel region `[x0, x1) x [y0, y1)` being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelWindow {
    #[must_use]
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The full image extent of a directory.
    #[must_use]
    pub fn full(directory: &RasterDirectory) -> Self {
        Self::new(0, 0, directory.width, directory.height)
    }

    /// Check ordering and image-bounds invariants.
    pub fn validate(&self, directory: &RasterDirectory) -> Result<(), RasterError> {
        if self.x0 > self.x1
            || self.y0 > self.y1
            || self.x1 > directory.width
            || self.y1 > directory.height
        {
            return Err(RasterError::InvalidWindow {
                x0: self.x0,
                y0: self.y0,
                x1: self.x1,
                y1: self.y1,
                width: directory.width,
                height: directory.height,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Ordered destination quadrilateral `[UL, UR, BR, BL]`. The order is fixed;
/// callers must not permute it. The quad may be rotated or skewed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners(pub [Point; 4]);

impl Corners {
    #[must_use]
    pub fn new(ul: Point, ur: Point, br: Point, bl: Point) -> Self {
        Self([ul, ur, br, bl])
    }

    #[must_use]
    pub fn ul(&self) -> Point {
        self.0[0]
    }

    #[must_use]
    pub fn ur(&self) -> Point {
        self.0[1]
    }

    #[must_use]
    pub fn br(&self) -> Point {
        self.0[2]
    }

    #[must_use]
    pub fn bl(&self) -> Point {
        self.0[3]
    }

    /// Axis-aligned bounding box as `(min, max)` points.
    #[must_use]
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = self.0[0];
        let mut max = self.0[0];
        for p in &self.0[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Translate the corners into the local space of their bounding box.
    /// Returns the normalized corners and the subtracted offset, which the
    /// caller needs to place the rendered result back onto a display surface.
    #[must_use]
    pub fn normalized(&self) -> (Corners, Point) {
        let (min, _) = self.bounding_box();
        let shifted = self.0.map(|p| Point::new(p.x - min.x, p.y - min.y));
        (Corners(shifted), min)
    }

    /// Bounding-box extent, rounded up to whole pixels.
    #[must_use]
    pub fn bounding_size(&self) -> (u32, u32) {
        let (min, max) = self.bounding_box();
        (
            (max.x - min.x).ceil().max(0.0) as u32,
            (max.y - min.y).ceil().max(0.0) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{COMPRESSION_NONE, PlanarConfiguration, SampleFormat};

    fn directory(width: u32, height: u32) -> RasterDirectory {
        RasterDirectory {
            width,
            height,
            tile_width: 8,
            tile_height: 8,
            is_tiled: true,
            planar_configuration: PlanarConfiguration::Chunky,
            samples_per_pixel: 1,
            bits_per_sample: vec![8],
            sample_format: vec![SampleFormat::UnsignedInt],
            compression_id: COMPRESSION_NONE,
            little_endian: true,
            tile_offsets: vec![0; 4],
            tile_byte_counts: vec![0; 4],
            nodata: None,
        }
    }

    #[test]
    fn window_validation() {
        let dir = directory(16, 16);
        assert!(PixelWindow::new(0, 0, 16, 16).validate(&dir).is_ok());
        assert!(PixelWindow::new(5, 5, 10, 10).validate(&dir).is_ok());
        assert!(matches!(
            PixelWindow::new(10, 0, 5, 16).validate(&dir),
            Err(RasterError::InvalidWindow { .. })
        ));
        assert!(matches!(
            PixelWindow::new(0, 0, 17, 16).validate(&dir),
            Err(RasterError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn window_dimensions_are_half_open() {
        let w = PixelWindow::new(5, 5, 10, 10);
        assert_eq!(w.width(), 5);
        assert_eq!(w.height(), 5);
        assert_eq!(w.pixel_count(), 25);
    }

    #[test]
    fn corners_normalize_against_bounding_box() {
        let corners = Corners::new(
            Point::new(10.0, 20.0),
            Point::new(30.0, 22.0),
            Point::new(32.0, 40.0),
            Point::new(8.0, 38.0),
        );
        let (normalized, offset) = corners.normalized();
        assert_eq!(offset, Point::new(8.0, 20.0));
        assert_eq!(normalized.ul(), Point::new(2.0, 0.0));
        assert_eq!(normalized.bl(), Point::new(0.0, 18.0));
        let (w, h) = normalized.bounding_size();
        assert_eq!((w, h), (24, 20));
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, -4.0);
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert_eq!(lerp(a, b, 0.5), Point::new(5.0, -2.0));
    }
}
