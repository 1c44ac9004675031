//! Projection seam: geographic coordinates to global display pixels.
//!
//! The pipeline itself never projects; the hosting map supplies destination
//! corners through the [`CornerProjector`] trait. Two pure-Rust
//! implementations are bundled: inline Web-Mercator math for the common case,
//! and a proj4rs-backed projector for rasters georeferenced in any EPSG code
//! the crs-definitions database knows.

use std::f64::consts::PI;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::RasterError;
use crate::geometry::{Corners, Point};

/// Slippy-map tile edge in pixels.
const TILE_SIZE: f64 = 256.0;

/// Web-Mercator latitude limit; beyond it the projection diverges.
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Maps a geographic coordinate to global pixel space at a zoom level.
/// Implementations must be cheap: the warp path projects four corners per
/// viewport change.
pub trait CornerProjector: Send + Sync {
    fn project(&self, x: f64, y: f64, zoom: u32) -> Result<Point, RasterError>;
}

/// Longitude/latitude (EPSG:4326) to global slippy-map pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorProjector;

impl WebMercatorProjector {
    #[must_use]
    pub fn pixel_span(zoom: u32) -> f64 {
        TILE_SIZE * f64::from(2u32.pow(zoom.min(30)))
    }
}

impl CornerProjector for WebMercatorProjector {
    fn project(&self, lon: f64, lat: f64, zoom: u32) -> Result<Point, RasterError> {
        let span = Self::pixel_span(zoom);
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let lat_rad = lat.to_radians();

        let x = (lon + 180.0) / 360.0 * span;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * span;
        Ok(Point::new(x, y))
    }
}

/// Projects coordinates from an arbitrary source CRS: proj4rs transforms them
/// to lon/lat, then the Web-Mercator math above maps them to pixels.
#[derive(Debug)]
pub struct Proj4Projector {
    source_epsg: i32,
    source: Option<Proj>,
    wgs84: Proj,
}

impl Proj4Projector {
    pub fn new(source_epsg: i32) -> Result<Self, RasterError> {
        let unavailable = || RasterError::ProjectionUnavailable { epsg: source_epsg };

        let proj_str = u16::try_from(source_epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
            .ok_or_else(unavailable)?;

        // Geographic sources are already lon/lat; skip the transform.
        let source = if proj_str.contains("+proj=longlat") {
            None
        } else {
            Some(Proj::from_proj_string(proj_str).map_err(|_| unavailable())?)
        };
        let wgs84 = Proj::from_proj_string("+proj=longlat +datum=WGS84 +no_defs")
            .map_err(|_| unavailable())?;

        Ok(Self {
            source_epsg,
            source,
            wgs84,
        })
    }

    #[must_use]
    pub fn source_epsg(&self) -> i32 {
        self.source_epsg
    }
}

impl CornerProjector for Proj4Projector {
    fn project(&self, x: f64, y: f64, zoom: u32) -> Result<Point, RasterError> {
        let (lon, lat) = match &self.source {
            None => (x, y),
            Some(source) => {
                let mut point = (x, y, 0.0);
                transform(source, &self.wgs84, &mut point).map_err(|_| {
                    RasterError::ProjectionUnavailable {
                        epsg: self.source_epsg,
                    }
                })?;
                (point.0.to_degrees(), point.1.to_degrees())
            }
        };
        WebMercatorProjector.project(lon, lat, zoom)
    }
}

/// Project a georeferenced extent's corners into display pixel space, in the
/// fixed `[UL, UR, BR, BL]` order the warp renderer expects.
pub fn corners_for_bounds(
    projector: &dyn CornerProjector,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    zoom: u32,
) -> Result<Corners, RasterError> {
    Ok(Corners::new(
        projector.project(west, north, zoom)?,
        projector.project(east, north, zoom)?,
        projector.project(east, south, zoom)?,
        projector.project(west, south, zoom)?,
    ))
}
