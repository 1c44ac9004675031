//! Request/response boundary for running the pipeline off the caller's task.
//!
//! A [`RasterWorker`] owns the raster bytes, directory, and codec registry
//! behind a command channel. Every request gets a monotonically increasing
//! generation; in-flight work is never cancelled, but a result whose
//! generation is no longer the latest is discarded at completion and the
//! caller observes [`RasterError::Superseded`]. This keeps a fast-panning
//! host from ever painting a stale window over a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::assembler::{Progress, UnitFailure, WindowAssembler, WindowRaster};
use crate::codec::CodecRegistry;
use crate::decoder::TileDecoder;
use crate::directory::RasterDirectory;
use crate::error::RasterError;
use crate::geometry::{Corners, PixelWindow};
use crate::quad_warp::{WarpedQuad, warp_image_to_quad};
use crate::render::{RenderOptions, channels_to_rgba};

/// One load request. `window` defaults to the full image; supplying `corners`
/// selects the warp path.
#[derive(Debug, Default)]
pub struct LoadRequest {
    pub window: Option<PixelWindow>,
    pub corners: Option<Corners>,
    /// Warp subdivision step; 0 is treated as 1.
    pub step: u32,
    /// Tile stride for sparse previews; 0 is treated as 1.
    pub stride: u32,
    pub render: RenderOptions,
    pub progress: Option<mpsc::UnboundedSender<Progress>>,
}

/// What a request produced: raw per-band channels, or a warped bitmap ready
/// for compositing.
#[derive(Debug)]
pub enum LoadOutput {
    Channels(WindowRaster),
    Warped {
        quad: WarpedQuad,
        done: usize,
        total: usize,
        failures: Vec<UnitFailure>,
    },
}

#[derive(Debug)]
pub struct LoadResponse {
    pub generation: u64,
    pub output: LoadOutput,
}

struct Command {
    request: LoadRequest,
    generation: u64,
    reply: oneshot::Sender<Result<LoadResponse, RasterError>>,
}

/// Handle to a spawned raster worker. Dropping it shuts the worker down once
/// in-flight requests finish.
pub struct RasterWorker {
    commands: mpsc::UnboundedSender<Command>,
    latest: Arc<AtomicU64>,
}

impl RasterWorker {
    /// Spawn the worker task. Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(
        source_id: impl Into<Arc<str>>,
        data: Arc<Vec<u8>>,
        directory: Arc<RasterDirectory>,
        registry: Arc<CodecRegistry>,
    ) -> Self {
        let decoder = Arc::new(TileDecoder::new(source_id, data, directory, registry));
        let (commands, mut inbox) = mpsc::unbounded_channel::<Command>();
        let latest = Arc::new(AtomicU64::new(0));

        let loop_latest = Arc::clone(&latest);
        tokio::spawn(async move {
            while let Some(command) = inbox.recv().await {
                // Each request runs as its own task so a long assembly never
                // blocks newer requests from superseding it.
                let decoder = Arc::clone(&decoder);
                let latest = Arc::clone(&loop_latest);
                tokio::spawn(async move {
                    let Command {
                        request,
                        generation,
                        reply,
                    } = command;
                    let result = run_request(decoder, generation, request).await;
                    if latest.load(Ordering::SeqCst) != generation {
                        debug!(generation, "discarding superseded result");
                        return;
                    }
                    let _ = reply.send(result);
                });
            }
        });

        Self { commands, latest }
    }

    /// Submit a request and await its response. Returns
    /// [`RasterError::Superseded`] when a newer request was issued before
    /// this one completed.
    pub async fn load(&self, request: LoadRequest) -> Result<LoadResponse, RasterError> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command {
                request,
                generation,
                reply: reply_tx,
            })
            .map_err(|_| RasterError::WorkerClosed)?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(RasterError::Superseded { generation }),
        }
    }

    /// Generation of the most recently issued request.
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

async fn run_request(
    decoder: Arc<TileDecoder>,
    generation: u64,
    request: LoadRequest,
) -> Result<LoadResponse, RasterError> {
    let directory = Arc::clone(decoder.directory());

    let mut assembler = WindowAssembler::new(decoder)
        .generation(generation)
        .stride(request.stride.max(1));
    if let Some(window) = request.window {
        assembler = assembler.window(window);
    }
    if let Some(progress) = request.progress {
        assembler = assembler.on_progress(progress);
    }
    let raster = assembler.assemble().await?;

    let Some(corners) = request.corners else {
        return Ok(LoadResponse {
            generation,
            output: LoadOutput::Channels(raster),
        });
    };

    let mut render = request.render;
    if render.nodata.is_none() {
        render.nodata = directory.nodata;
    }
    let bitmap = channels_to_rgba(&raster, raster.width, raster.height, &render);
    let quad = warp_image_to_quad(&bitmap, &corners, request.step.max(1));
    Ok(LoadResponse {
        generation,
        output: LoadOutput::Warped {
            quad,
            done: raster.done,
            total: raster.total,
            failures: raster.failures,
        },
    })
}
