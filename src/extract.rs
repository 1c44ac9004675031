//! Sample extraction: decoded tile bytes into typed per-band channels.
//!
//! Each band gets the narrowest buffer able to hold its declared
//! (format, bit depth) pairing; 16-bit floats have no stable Rust scalar and
//! widen to `f32`. Extraction clips the tile footprint to the window on both
//! axes, so tiles overhanging the window never write outside it.

use crate::directory::{RasterDirectory, SampleFormat};
use crate::error::RasterError;
use crate::geometry::PixelWindow;
use crate::locator::TileUnit;

/// Element type backing one band's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl ChannelType {
    /// Narrowest container for a (format, bits) pairing, or
    /// `UnsupportedSampleFormat` when the pairing has none.
    pub fn for_sample(format: SampleFormat, bits: u16) -> Result<Self, RasterError> {
        match (format, bits) {
            (SampleFormat::UnsignedInt, 8) => Ok(ChannelType::U8),
            (SampleFormat::UnsignedInt, 16) => Ok(ChannelType::U16),
            (SampleFormat::UnsignedInt, 32) => Ok(ChannelType::U32),
            (SampleFormat::SignedInt, 8) => Ok(ChannelType::I8),
            (SampleFormat::SignedInt, 16) => Ok(ChannelType::I16),
            (SampleFormat::SignedInt, 32) => Ok(ChannelType::I32),
            // f16 widens: no stable half-precision scalar.
            (SampleFormat::Float, 16 | 32) => Ok(ChannelType::F32),
            (SampleFormat::Float, 64) => Ok(ChannelType::F64),
            _ => Err(RasterError::UnsupportedSampleFormat { format, bits }),
        }
    }
}

/// One band's pixel values for a decoded window, row-major within the window.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleChannel {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleChannel {
    /// Default-filled channel of `len` elements.
    #[must_use]
    pub fn zeroed(ty: ChannelType, len: usize) -> Self {
        match ty {
            ChannelType::U8 => SampleChannel::U8(vec![0; len]),
            ChannelType::U16 => SampleChannel::U16(vec![0; len]),
            ChannelType::U32 => SampleChannel::U32(vec![0; len]),
            ChannelType::I8 => SampleChannel::I8(vec![0; len]),
            ChannelType::I16 => SampleChannel::I16(vec![0; len]),
            ChannelType::I32 => SampleChannel::I32(vec![0; len]),
            ChannelType::F32 => SampleChannel::F32(vec![0.0; len]),
            ChannelType::F64 => SampleChannel::F64(vec![0.0; len]),
        }
    }

    #[must_use]
    pub fn channel_type(&self) -> ChannelType {
        match self {
            SampleChannel::U8(_) => ChannelType::U8,
            SampleChannel::U16(_) => ChannelType::U16,
            SampleChannel::U32(_) => ChannelType::U32,
            SampleChannel::I8(_) => ChannelType::I8,
            SampleChannel::I16(_) => ChannelType::I16,
            SampleChannel::I32(_) => ChannelType::I32,
            SampleChannel::F32(_) => ChannelType::F32,
            SampleChannel::F64(_) => ChannelType::F64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SampleChannel::U8(v) => v.len(),
            SampleChannel::U16(v) => v.len(),
            SampleChannel::U32(v) => v.len(),
            SampleChannel::I8(v) => v.len(),
            SampleChannel::I16(v) => v.len(),
            SampleChannel::I32(v) => v.len(),
            SampleChannel::F32(v) => v.len(),
            SampleChannel::F64(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widening read, for consumers that composite bands numerically.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<f64> {
        match self {
            SampleChannel::U8(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::U16(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::U32(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::I8(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::I16(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::I32(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::F32(v) => v.get(index).map(|&x| f64::from(x)),
            SampleChannel::F64(v) => v.get(index).copied(),
        }
    }
}

/// Extract band `sample` of one decoded unit into `channel`, clipped to
/// `window`. `decoded` must already be normalized to the unit's full byte
/// footprint (the decoder guarantees this).
pub fn extract_into(
    directory: &RasterDirectory,
    unit: &TileUnit,
    decoded: &[u8],
    sample: usize,
    window: PixelWindow,
    channel: &mut SampleChannel,
) -> Result<(), RasterError> {
    let expected = ChannelType::for_sample(directory.format_for(sample), directory.bits_for(sample))?;
    debug_assert_eq!(channel.channel_type(), expected);

    let tile_w = directory.tile_width as i64;
    let tile_h = directory.tile_height as i64;
    let first_col = i64::from(unit.tile_x) * tile_w;
    let first_line = i64::from(unit.tile_y) * tile_h;
    let last_col = first_col + tile_w;
    let last_line = first_line + tile_h;

    // Clip the tile footprint to the window on both axes.
    let y_start = (i64::from(window.y0) - first_line).max(0);
    let y_end = tile_h.min(tile_h - (last_line - i64::from(window.y1)));
    let x_start = (i64::from(window.x0) - first_col).max(0);
    let x_end = tile_w.min(tile_w - (last_col - i64::from(window.x1)));

    let bytes_per_pixel = directory.unit_bytes_per_pixel(sample) as i64;
    let intra = directory.intra_pixel_offset(sample) as i64;
    let bits = directory.bits_for(sample);
    let le = directory.little_endian;
    let window_w = i64::from(window.width());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let byte_offset = ((y * tile_w + x) * bytes_per_pixel + intra) as usize;
            let dest = ((y + first_line - i64::from(window.y0)) * window_w
                + (x + first_col - i64::from(window.x0))) as usize;
            write_sample(channel, dest, &decoded[byte_offset..], bits, le);
        }
    }
    Ok(())
}

#[inline]
fn write_sample(channel: &mut SampleChannel, dest: usize, bytes: &[u8], bits: u16, le: bool) {
    match channel {
        SampleChannel::U8(v) => v[dest] = bytes[0],
        SampleChannel::U16(v) => v[dest] = read_u16(bytes, le),
        SampleChannel::U32(v) => v[dest] = read_u32(bytes, le),
        SampleChannel::I8(v) => v[dest] = bytes[0] as i8,
        SampleChannel::I16(v) => v[dest] = read_u16(bytes, le) as i16,
        SampleChannel::I32(v) => v[dest] = read_u32(bytes, le) as i32,
        SampleChannel::F32(v) => {
            v[dest] = if bits == 16 {
                f16_to_f32(read_u16(bytes, le))
            } else {
                f32::from_bits(read_u32(bytes, le))
            }
        }
        SampleChannel::F64(v) => v[dest] = f64::from_bits(read_u64(bytes, le)),
    }
}

#[inline]
fn read_u16(bytes: &[u8], little_endian: bool) -> u16 {
    if little_endian {
        u16::from_le_bytes([bytes[0], bytes[1]])
    } else {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

#[inline]
fn read_u32(bytes: &[u8], little_endian: bool) -> u32 {
    if little_endian {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    } else {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

#[inline]
fn read_u64(bytes: &[u8], little_endian: bool) -> u64 {
    let raw = [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ];
    if little_endian {
        u64::from_le_bytes(raw)
    } else {
        u64::from_be_bytes(raw)
    }
}

/// Half-precision bits to f32, stable-library only.
#[inline]
fn f16_to_f32(half: u16) -> f32 {
    let exp = half >> 10 & 0b1_1111;
    let mant = half & 0b11_1111_1111;
    let val = if exp == 0 {
        f32::from(mant) * 2.0_f32.powi(-24)
    } else if exp != 31 {
        (f32::from(mant) + 1024.0) * 2.0_f32.powi(i32::from(exp) - 25)
    } else if mant == 0 {
        f32::INFINITY
    } else {
        f32::NAN
    };
    if half & 0x8000 != 0 { -val } else { val }
}
