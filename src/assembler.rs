//! Window assembly: fan decode units out, fan completions in, emit progress.
//!
//! Decode tasks run concurrently (bounded by a semaphore) and resolve in any
//! order; the assembly loop is the single writer of the channel buffers, so
//! no shared mutable pixel state exists across tasks. A unit whose decode
//! fails leaves its region at the container default, is recorded in
//! `failures`, and never stops sibling units: assembly always runs to the
//! full unit count.
//!
//! # Example
//!
//! ```rust,ignore
//! use orthowarp::{TileDecoder, WindowAssembler, PixelWindow};
//!
//! let raster = WindowAssembler::new(decoder)
//!     .window(PixelWindow::new(0, 0, 512, 512))
//!     .assemble()
//!     .await?;
//! println!("{} bands, {} failures", raster.bands(), raster.failures.len());
//! ```

use std::sync::Arc;

use ahash::AHashMap;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::decoder::TileDecoder;
use crate::directory::PlanarConfiguration;
use crate::error::RasterError;
use crate::extract::{ChannelType, SampleChannel, extract_into};
use crate::geometry::PixelWindow;
use crate::locator::{TileUnit, covering_units_with_stride};

/// Default bound on concurrently decoding units.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Progress snapshot, emitted every `tiles_across` completions and at the
/// final unit. Carries a clone of the partially-filled channels; regions whose
/// units have not completed yet are still at the container default.
#[derive(Debug, Clone)]
pub struct Progress {
    pub channels: Vec<SampleChannel>,
    pub done: usize,
    pub total: usize,
    pub generation: u64,
}

/// One unit that failed to decode. The rest of the raster is unaffected.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: TileUnit,
    pub error: RasterError,
}

/// Fully assembled window: one typed channel per band, row-major within the
/// window, plus completion accounting and any per-unit failures.
#[derive(Debug)]
pub struct WindowRaster {
    pub channels: Vec<SampleChannel>,
    pub width: u32,
    pub height: u32,
    pub window: PixelWindow,
    pub done: usize,
    pub total: usize,
    pub failures: Vec<UnitFailure>,
    pub generation: u64,
}

impl WindowRaster {
    #[must_use]
    pub fn bands(&self) -> usize {
        self.channels.len()
    }

    /// Widened sample read at window-relative coordinates.
    #[must_use]
    pub fn sample(&self, band: usize, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.channels
            .get(band)?
            .value_at(y as usize * self.width as usize + x as usize)
    }
}

/// Builder for one assembly request.
pub struct WindowAssembler {
    decoder: Arc<TileDecoder>,
    window: Option<PixelWindow>,
    stride: u32,
    max_in_flight: usize,
    generation: u64,
    progress: Option<mpsc::UnboundedSender<Progress>>,
}

impl WindowAssembler {
    #[must_use]
    pub fn new(decoder: Arc<TileDecoder>) -> Self {
        Self {
            decoder,
            window: None,
            stride: 1,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            generation: 0,
            progress: None,
        }
    }

    /// Window to decode; defaults to the full image.
    #[must_use]
    pub fn window(mut self, window: PixelWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Tile stride per axis. Above 1 decodes a sparse preview: skipped tiles'
    /// regions stay at the container default.
    #[must_use]
    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Bound on concurrently decoding units.
    #[must_use]
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Request generation, echoed on progress events and the result so a
    /// superseding caller can discard stale output.
    #[must_use]
    pub fn generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Receive progress snapshots during assembly.
    #[must_use]
    pub fn on_progress(mut self, sender: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Run the assembly to completion.
    pub async fn assemble(self) -> Result<WindowRaster, RasterError> {
        let directory = Arc::clone(self.decoder.directory());
        directory.validate()?;

        let window = self.window.unwrap_or_else(|| PixelWindow::full(&directory));
        let units = covering_units_with_stride(&directory, window, self.stride)?;

        // Channel typing is fatal up front: an unsupported band rejects the
        // request before any decode is dispatched.
        let mut channels = Vec::with_capacity(directory.samples_per_pixel);
        for band in 0..directory.samples_per_pixel {
            let ty = ChannelType::for_sample(directory.format_for(band), directory.bits_for(band))?;
            channels.push(SampleChannel::zeroed(ty, window.pixel_count()));
        }

        let total = units.len();
        let cadence = directory.tiles_across().max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight.max(1)));

        let mut tasks: JoinSet<(TileUnit, Result<Arc<Vec<u8>>, RasterError>)> = JoinSet::new();
        let mut unit_of_task: AHashMap<tokio::task::Id, TileUnit> = AHashMap::new();
        for unit in units {
            let decoder = Arc::clone(&self.decoder);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("assembly semaphore is never closed");
                let result = decoder.decode_unit(unit).await;
                (unit, result)
            });
            unit_of_task.insert(handle.id(), unit);
        }

        debug!(
            total,
            width = window.width(),
            height = window.height(),
            generation = self.generation,
            "assembly started"
        );

        // Single-writer fan-in: completions arrive in arbitrary order, only
        // this loop touches the channels and the completion counter.
        let mut done = 0usize;
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (unit, result))) => {
                    unit_of_task.remove(&id);
                    match result {
                        Ok(decoded) => match directory.planar_configuration {
                            PlanarConfiguration::Chunky => {
                                for band in 0..directory.samples_per_pixel {
                                    extract_into(
                                        &directory,
                                        &unit,
                                        &decoded,
                                        band,
                                        window,
                                        &mut channels[band],
                                    )?;
                                }
                            }
                            PlanarConfiguration::Planar => {
                                extract_into(
                                    &directory,
                                    &unit,
                                    &decoded,
                                    unit.sample,
                                    window,
                                    &mut channels[unit.sample],
                                )?;
                            }
                        },
                        Err(error) => {
                            warn!(index = unit.index, %error, "unit decode failed");
                            failures.push(UnitFailure { unit, error });
                        }
                    }
                }
                Err(join_error) => {
                    // A dead task still counts toward completion so done can
                    // reach total.
                    if let Some(unit) = unit_of_task.remove(&join_error.id()) {
                        warn!(index = unit.index, %join_error, "decode task aborted");
                        failures.push(UnitFailure {
                            unit,
                            error: RasterError::Decode {
                                index: unit.index,
                                reason: format!("decode task aborted: {join_error}"),
                            },
                        });
                    }
                }
            }

            done += 1;
            if done % cadence == 0 || done == total {
                emit_progress(&self.progress, &channels, done, total, self.generation);
            }
        }

        Ok(WindowRaster {
            channels,
            width: window.width(),
            height: window.height(),
            window,
            done,
            total,
            failures,
            generation: self.generation,
        })
    }
}

fn emit_progress(
    sender: &Option<mpsc::UnboundedSender<Progress>>,
    channels: &[SampleChannel],
    done: usize,
    total: usize,
    generation: u64,
) {
    if let Some(sender) = sender {
        let _ = sender.send(Progress {
            channels: channels.to_vec(),
            done,
            total,
            generation,
        });
    }
}

/// Assemble `window` with default options.
pub async fn assemble_window(
    decoder: Arc<TileDecoder>,
    window: PixelWindow,
) -> Result<WindowRaster, RasterError> {
    WindowAssembler::new(decoder).window(window).assemble().await
}
