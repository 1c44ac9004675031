//! Per-unit tile decoding with de-duplicated concurrent requests.
//!
//! A [`TileDecoder`] owns the raw file bytes, the directory, and a codec
//! registry. Codec work runs on the blocking thread pool so callers never
//! stall an async runtime. Concurrent requests for the same linear unit index
//! collapse into one underlying decode: late requesters await the in-flight
//! result instead of re-decoding. Decoded units also land in the process-wide
//! LRU cache, so a follow-up window over the same tiles skips the codec.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::codec::CodecRegistry;
use crate::directory::RasterDirectory;
use crate::error::RasterError;
use crate::locator::TileUnit;
use crate::tile_cache;

pub struct TileDecoder {
    source_id: Arc<str>,
    data: Arc<Vec<u8>>,
    directory: Arc<RasterDirectory>,
    registry: Arc<CodecRegistry>,
    in_flight: Mutex<AHashMap<usize, Arc<OnceCell<Arc<Vec<u8>>>>>>,
}

impl TileDecoder {
    /// `source_id` keys the decoded-unit cache; it must be unique per opened
    /// raster (a path or URL works).
    #[must_use]
    pub fn new(
        source_id: impl Into<Arc<str>>,
        data: Arc<Vec<u8>>,
        directory: Arc<RasterDirectory>,
        registry: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            data,
            directory,
            registry,
            in_flight: Mutex::new(AHashMap::new()),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<RasterDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn source_id(&self) -> &Arc<str> {
        &self.source_id
    }

    /// Decode one unit to its normalized byte length. Failures are local to
    /// the unit and carry its linear index.
    pub async fn decode_unit(&self, unit: TileUnit) -> Result<Arc<Vec<u8>>, RasterError> {
        if let Some(hit) = tile_cache::get(&self.source_id, unit.index) {
            return Ok(hit);
        }

        let cell = {
            let mut map = self.in_flight.lock().unwrap();
            Arc::clone(map.entry(unit.index).or_default())
        };

        let result = cell
            .get_or_try_init(|| self.decode_now(unit))
            .await
            .map(Arc::clone);

        // Waiters hold their own handle to the cell; dropping the map entry
        // keeps decoded bytes from being pinned beyond the LRU's control.
        self.in_flight.lock().unwrap().remove(&unit.index);
        result
    }

    async fn decode_now(&self, unit: TileUnit) -> Result<Arc<Vec<u8>>, RasterError> {
        // A sibling decode may have landed in the cache between the caller's
        // cache check and this init running.
        if let Some(hit) = tile_cache::get(&self.source_id, unit.index) {
            return Ok(hit);
        }

        let expected = self.directory.unit_decoded_len(unit.sample);

        // Sparse files mark absent tiles with a zero byte count; their window
        // region stays at the container default.
        if unit.byte_count == 0 {
            let filled = Arc::new(vec![0u8; expected]);
            tile_cache::insert(&self.source_id, unit.index, Arc::clone(&filled));
            return Ok(filled);
        }

        let start = usize::try_from(unit.offset).map_err(|_| RasterError::Decode {
            index: unit.index,
            reason: format!("unit offset {} not addressable", unit.offset),
        })?;
        let end = start.checked_add(unit.byte_count).filter(|e| *e <= self.data.len());
        let Some(end) = end else {
            return Err(RasterError::Decode {
                index: unit.index,
                reason: format!(
                    "compressed range {}..{} exceeds file length {}",
                    start,
                    start.saturating_add(unit.byte_count),
                    self.data.len()
                ),
            });
        };

        debug!(
            index = unit.index,
            tile_x = unit.tile_x,
            tile_y = unit.tile_y,
            bytes = unit.byte_count,
            "decoding unit"
        );

        let data = Arc::clone(&self.data);
        let directory = Arc::clone(&self.directory);
        let registry = Arc::clone(&self.registry);
        let decoded = tokio::task::spawn_blocking(move || {
            registry.decode(&directory, &data[start..end])
        })
        .await
        .map_err(|e| RasterError::Decode {
            index: unit.index,
            reason: format!("decode task failed: {e}"),
        })?
        .map_err(|e| RasterError::Decode {
            index: unit.index,
            reason: e.to_string(),
        })?;

        // Normalize to the unit's full decoded footprint so extraction can
        // index without bounds churn; short codec output pads with defaults.
        let mut decoded = decoded;
        decoded.resize(expected, 0);

        let decoded = Arc::new(decoded);
        tile_cache::insert(&self.source_id, unit.index, Arc::clone(&decoded));
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decompressor;
    use crate::directory::{COMPRESSION_NONE, PlanarConfiguration, SampleFormat};
    use crate::error::AnyResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn directory() -> RasterDirectory {
        RasterDirectory {
            width: 4,
            height: 4,
            tile_width: 4,
            tile_height: 4,
            is_tiled: true,
            planar_configuration: PlanarConfiguration::Chunky,
            samples_per_pixel: 1,
            bits_per_sample: vec![8],
            sample_format: vec![SampleFormat::UnsignedInt],
            compression_id: COMPRESSION_NONE,
            little_endian: true,
            tile_offsets: vec![0],
            tile_byte_counts: vec![16],
            nodata: None,
        }
    }

    fn unit(byte_count: usize) -> TileUnit {
        TileUnit {
            tile_x: 0,
            tile_y: 0,
            sample: 0,
            index: 0,
            offset: 0,
            byte_count,
        }
    }

    struct CountingCodec {
        calls: Arc<AtomicUsize>,
    }

    impl Decompressor for CountingCodec {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn decode(&self, _directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Give concurrent requesters time to pile onto the in-flight cell.
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(compressed.to_vec())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_decode() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CodecRegistry::empty();
        registry.register(
            COMPRESSION_NONE,
            Arc::new(CountingCodec {
                calls: Arc::clone(&calls),
            }),
        );

        let decoder = Arc::new(TileDecoder::new(
            "decoder-test-dedup",
            Arc::new((0u8..16).collect()),
            Arc::new(directory()),
            Arc::new(registry),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let decoder = Arc::clone(&decoder);
                tokio::spawn(async move { decoder.decode_unit(unit(16)).await })
            })
            .collect();

        for task in tasks {
            let decoded = task.await.unwrap().unwrap();
            assert_eq!(decoded.len(), 16);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_unit_decodes_to_default_fill() {
        let decoder = TileDecoder::new(
            "decoder-test-empty",
            Arc::new(vec![]),
            Arc::new(directory()),
            Arc::new(CodecRegistry::with_builtin()),
        );
        let decoded = decoder.decode_unit(unit(0)).await.unwrap();
        assert_eq!(decoded.as_slice(), &[0u8; 16]);
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_a_decode_error() {
        let decoder = TileDecoder::new(
            "decoder-test-oob",
            Arc::new(vec![0u8; 8]),
            Arc::new(directory()),
            Arc::new(CodecRegistry::with_builtin()),
        );
        let err = decoder.decode_unit(unit(16)).await.unwrap_err();
        assert!(matches!(err, RasterError::Decode { index: 0, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn short_codec_output_is_padded() {
        let decoder = TileDecoder::new(
            "decoder-test-pad",
            Arc::new(vec![9u8; 4]),
            Arc::new(directory()),
            Arc::new(CodecRegistry::with_builtin()),
        );
        let decoded = decoder.decode_unit(unit(4)).await.unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(&decoded[..4], &[9, 9, 9, 9]);
        assert_eq!(&decoded[4..], &[0u8; 12]);
    }
}
