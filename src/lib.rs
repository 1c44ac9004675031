//! # orthowarp - Windowed raster decoding and quad-warp rendering
//!
//! A library for decoding tiled or stripped, multi-band, GeoTIFF-like
//! rasters into per-band pixel arrays for arbitrary sub-windows, and for
//! warping decoded rasters onto arbitrary destination quadrilaterals, without
//! blocking the host application.
//!
//! ## Features
//!
//! - **Windowed decoding**: Only the tiles covering the requested window are
//!   located, decoded, and sampled
//! - **Pluggable codecs**: Uncompressed, LZW, JPEG, Deflate, and Zstd built
//!   in; register your own by compression id
//! - **De-duplicated decode**: Concurrent requests for the same tile collapse
//!   into one codec invocation, backed by a process-wide LRU of decoded units
//! - **Progressive assembly**: Completions arrive in any order; progress
//!   events fire per tile row with partially-filled channels
//! - **Degraded results**: One bad tile never rejects a window; its region
//!   stays at the container default and the error is reported alongside
//! - **Quad warp**: Bilinear subdivision approximates a projective transform
//!   onto rotated or skewed destination quadrilaterals
//! - **Worker boundary**: Request/response messages with generation counters
//!   so superseded results are discarded, never painted
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orthowarp::{CodecRegistry, LoadRequest, RasterWorker};
//! use std::sync::Arc;
//!
//! // Directory metadata comes from your container parser.
//! let worker = RasterWorker::spawn(
//!     "ortho.tif",
//!     Arc::new(raster_bytes),
//!     Arc::new(directory),
//!     Arc::new(CodecRegistry::with_builtin()),
//! );
//!
//! let response = worker.load(LoadRequest::default()).await?;
//! ```
//!
//! ## Architecture
//!
//! - [`directory`]: Raster directory record and tile layout arithmetic
//! - [`locator`]: Pixel window to covering decode units
//! - [`codec`]: Pluggable decompressor registry
//! - [`decoder`]: De-duplicated concurrent unit decoding
//! - [`extract`]: Typed per-band sample extraction
//! - [`assembler`]: Progressive window assembly
//! - [`render`]: Channel compositing into RGBA bitmaps
//! - [`quad_warp`]: Quadrilateral warp renderer
//! - [`projection`]: Corner projection seam and pure-Rust implementations
//! - [`worker`]: Task-boundary request/response pair

// ============================================================================
// Public modules
// ============================================================================

pub mod assembler;
pub mod codec;
pub mod decoder;
pub mod directory;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod locator;
pub mod projection;
pub mod quad_warp;
pub mod render;
pub mod tile_cache;
pub mod worker;

// ============================================================================
// Errors
// ============================================================================

pub use error::{AnyResult, RasterError};

// ============================================================================
// Directory & Geometry
// ============================================================================

pub use directory::{PlanarConfiguration, RasterDirectory, SampleFormat};
pub use geometry::{Corners, PixelWindow, Point};

// ============================================================================
// Decode Pipeline
// ============================================================================

pub use codec::{CodecRegistry, Decompressor};
pub use decoder::TileDecoder;
pub use extract::{ChannelType, SampleChannel};
pub use locator::{TileUnit, covering_units, covering_units_with_stride};

// ============================================================================
// Assembly
// ============================================================================

pub use assembler::{
    Progress,
    UnitFailure,
    WindowAssembler,
    WindowRaster,
    assemble_window,
};

// ============================================================================
// Rendering
// ============================================================================

pub use quad_warp::{WarpedQuad, warp_image_to_quad};
pub use render::{RasterLayer, RenderOptions, ViewInfo, channels_to_rgba};

// ============================================================================
// Projection
// ============================================================================

pub use projection::{
    CornerProjector,
    Proj4Projector,
    WebMercatorProjector,
    corners_for_bounds,
};

// ============================================================================
// Worker Boundary
// ============================================================================

pub use worker::{LoadOutput, LoadRequest, LoadResponse, RasterWorker};
