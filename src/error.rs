//! Error taxonomy for the decode and warp pipelines.
//!
//! Directory-level errors ([`RasterError::InvalidWindow`],
//! [`RasterError::IndexOutOfRange`], [`RasterError::UnsupportedSampleFormat`])
//! are fatal to a whole request. [`RasterError::Decode`] is local to one tile
//! unit: the assembler records it and keeps going, so a single bad tile
//! degrades the result instead of rejecting it.

use crate::directory::SampleFormat;

/// Boxed-error result used at plug-in seams (codecs), where implementations
/// bring their own error types.
pub type AnyResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Errors surfaced by window assembly, decoding, and projection.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Window bounds are malformed or fall outside the image.
    #[error("invalid window [{x0},{y0},{x1},{y1}] for {width}x{height} image")]
    InvalidWindow {
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        width: u32,
        height: u32,
    },

    /// A computed tile index points past the offset/byte-count tables.
    #[error("tile unit index {index} out of range (table length {table_len})")]
    IndexOutOfRange { index: usize, table_len: usize },

    /// The (sample format, bit depth) pairing has no channel representation.
    #[error("unsupported sample format: {format:?} with {bits} bits per sample")]
    UnsupportedSampleFormat { format: SampleFormat, bits: u16 },

    /// Codec failure on one unit. Never fatal to sibling units.
    #[error("decode failed for unit {index}: {reason}")]
    Decode { index: usize, reason: String },

    /// The projection collaborator has no transform for this CRS.
    #[error("no projection available for EPSG:{epsg}")]
    ProjectionUnavailable { epsg: i32 },

    /// A newer request was issued before this one completed; its result was
    /// discarded by the worker's generation check.
    #[error("request generation {generation} superseded")]
    Superseded { generation: u64 },

    /// The worker task has shut down.
    #[error("raster worker closed")]
    WorkerClosed,
}

impl RasterError {
    /// Unit-local failures degrade the result; everything else rejects the
    /// whole request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RasterError::Decode { .. })
    }
}
