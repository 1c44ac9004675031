//! Pluggable decompression codecs, dispatched by TIFF compression id.
//!
//! The registry owns trait objects so host applications can plug in
//! additional schemes; the builtin set covers uncompressed, LZW, JPEG,
//! Deflate (both tag values), and Zstd.

use std::sync::Arc;

use ahash::AHashMap;

use crate::directory::{
    COMPRESSION_DEFLATE, COMPRESSION_DEFLATE_OLD, COMPRESSION_JPEG, COMPRESSION_LZW,
    COMPRESSION_NONE, COMPRESSION_ZSTD, RasterDirectory,
};
use crate::error::AnyResult;

/// One decompression scheme. Implementations are stateless and shared across
/// concurrent decodes, so they must be `Send + Sync`.
pub trait Decompressor: Send + Sync {
    /// Scheme name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Decode one compressed unit. The directory supplies tile geometry and
    /// sample layout for codecs that need it; output length is normalized by
    /// the caller, so codecs may return slightly short or long buffers.
    fn decode(&self, directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>>;
}

/// Codec lookup table keyed by the directory's compression id.
pub struct CodecRegistry {
    codecs: AHashMap<u16, Arc<dyn Decompressor>>,
}

impl CodecRegistry {
    /// Empty registry, for hosts that want full control over the codec set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: AHashMap::new(),
        }
    }

    /// Registry preloaded with the builtin schemes.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(COMPRESSION_NONE, Arc::new(RawCodec));
        registry.register(COMPRESSION_LZW, Arc::new(LzwCodec));
        registry.register(COMPRESSION_JPEG, Arc::new(JpegCodec));
        registry.register(COMPRESSION_DEFLATE, Arc::new(DeflateCodec));
        registry.register(COMPRESSION_DEFLATE_OLD, Arc::new(DeflateCodec));
        registry.register(COMPRESSION_ZSTD, Arc::new(ZstdCodec));
        registry
    }

    /// Register (or replace) the codec for a compression id.
    pub fn register(&mut self, id: u16, codec: Arc<dyn Decompressor>) {
        self.codecs.insert(id, codec);
    }

    #[must_use]
    pub fn get(&self, id: u16) -> Option<&Arc<dyn Decompressor>> {
        self.codecs.get(&id)
    }

    /// Decode one unit with the codec registered for the directory's
    /// compression id. Unknown ids are a decode failure.
    pub fn decode(&self, directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        let codec = self
            .get(directory.compression_id)
            .ok_or_else(|| format!("unknown compression id {}", directory.compression_id))?;
        codec.decode(directory, compressed)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Compression id 1: stored uncompressed.
struct RawCodec;

impl Decompressor for RawCodec {
    fn name(&self) -> &'static str {
        "none"
    }

    fn decode(&self, _directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// Compression id 8 (and legacy 32946): zlib-wrapped Deflate.
struct DeflateCodec;

impl Decompressor for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn decode(&self, directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        use std::io::Read;
        let expected = directory.unit_decoded_len(0);
        let mut decoder = flate2::read::ZlibDecoder::new(compressed);
        let mut decompressed = Vec::with_capacity(expected);
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }
}

/// Compression id 5: TIFF-flavored LZW (MSB bit order, early size switch).
struct LzwCodec;

impl Decompressor for LzwCodec {
    fn name(&self) -> &'static str {
        "lzw"
    }

    fn decode(&self, _directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
        let decompressed = decoder.decode(compressed)?;
        Ok(decompressed)
    }
}

/// Compression id 50000: Zstandard.
struct ZstdCodec;

impl Decompressor for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decode(&self, _directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        let decompressed = zstd::stream::decode_all(compressed)?;
        Ok(decompressed)
    }
}

/// Compression id 7: JPEG-in-TIFF, decoded through the `image` crate.
struct JpegCodec;

impl Decompressor for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn decode(&self, _directory: &RasterDirectory, compressed: &[u8]) -> AnyResult<Vec<u8>> {
        use image::ImageReader;
        use std::io::Cursor;

        let reader = ImageReader::with_format(Cursor::new(compressed), image::ImageFormat::Jpeg);
        let img = reader.decode().map_err(|e| format!("jpeg decode: {e}"))?;

        let raw = match img {
            image::DynamicImage::ImageRgb8(rgb) => rgb.into_raw(),
            image::DynamicImage::ImageRgba8(rgba) => rgba.into_raw(),
            image::DynamicImage::ImageLuma8(gray) => gray.into_raw(),
            image::DynamicImage::ImageLumaA8(gray_alpha) => gray_alpha.into_raw(),
            other => other.to_rgb8().into_raw(),
        };
        Ok(raw)
    }
}
