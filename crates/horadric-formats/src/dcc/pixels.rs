//! Pixel sub-streams and the seen-code list

use super::direction::{DirectionFlags, StreamSizes};
use super::error::{DccError, DccResult, StreamKind};
use crate::bits::{BitCursor, BitError};

/// Longest the seen-code list grows
pub const MAX_SEEN_CODES: usize = 256;

/// Bits of padding allowed at the end of the displacement stream
pub const DISPLACEMENT_PADDING_BITS: usize = 7;

/// Most-recently-used list of pixel codes
///
/// Slot 0 holds the code used last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenCodes {
    codes: Vec<u8>,
}

impl SeenCodes {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// List holding codes `0..count` in order
    pub fn seeded(count: usize) -> Self {
        Self {
            codes: (0..count.min(MAX_SEEN_CODES)).map(|c| c as u8).collect(),
        }
    }

    /// Move `code` to the front, inserting it if it is new
    pub fn promote(&mut self, code: u8) {
        if let Some(slot) = self.codes.iter().position(|&c| c == code) {
            self.codes.remove(slot);
        }
        self.codes.insert(0, code);
        self.codes.truncate(MAX_SEEN_CODES);
    }

    /// Take the code in `slot` and move it to the front
    pub fn select(&mut self, slot: usize) -> DccResult<u8> {
        if slot >= self.codes.len() {
            return Err(DccError::InvalidDisplacement {
                slot,
                seen: self.codes.len(),
            });
        }
        let code = self.codes.remove(slot);
        self.codes.insert(0, code);
        Ok(code)
    }

    /// Codes, most recent first
    pub fn as_slice(&self) -> &[u8] {
        &self.codes
    }

    /// Number of codes seen
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no code has been seen
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// One sub-stream and its identity for error reporting
#[derive(Debug)]
struct Stream<'a> {
    kind: StreamKind,
    cursor: BitCursor<'a>,
}

impl<'a> Stream<'a> {
    fn new(kind: StreamKind, cursor: BitCursor<'a>) -> Self {
        Self { kind, cursor }
    }

    fn read_bits(&mut self, width: u32) -> DccResult<u32> {
        self.cursor.read_bits(width).map_err(|err| match err {
            BitError::BufferUnderrun { requested, .. } => DccError::StreamDesync {
                stream: self.kind,
                declared: self.cursor.len_bits(),
                consumed: self.cursor.bit_position() + requested,
            },
            other => DccError::Bits(other),
        })
    }

    fn read_bit(&mut self) -> DccResult<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    fn is_empty(&self) -> bool {
        self.cursor.len_bits() == 0
    }

    /// Fail unless no more than `slack` bits are left
    fn finish(&self, slack: usize) -> DccResult<()> {
        if self.cursor.remaining_bits() > slack {
            return Err(DccError::StreamDesync {
                stream: self.kind,
                declared: self.cursor.len_bits(),
                consumed: self.cursor.bit_position(),
            });
        }
        Ok(())
    }
}

/// The five pixel sub-streams of a direction and the decoding state over them
#[derive(Debug)]
pub struct PixelStreams<'a> {
    flags: DirectionFlags,
    equal_cell: Stream<'a>,
    pixel_mask: Stream<'a>,
    encoding_type: Stream<'a>,
    raw_pixel: Stream<'a>,
    displacement: Stream<'a>,
    seen: SeenCodes,
    palette: Vec<u8>,
}

impl<'a> PixelStreams<'a> {
    /// Split the sized streams off `cursor`; the displacement stream is
    /// whatever remains after them
    pub fn split(
        cursor: &mut BitCursor<'a>,
        flags: DirectionFlags,
        sizes: &StreamSizes,
        palette: Vec<u8>,
    ) -> DccResult<Self> {
        let equal_cell = Stream::new(StreamKind::EqualCell, cursor.split(sizes.equal_cell)?);
        let pixel_mask = Stream::new(StreamKind::PixelMask, cursor.split(sizes.pixel_mask)?);
        let encoding_type = Stream::new(
            StreamKind::EncodingType,
            cursor.split(sizes.encoding_type)?,
        );
        let raw_pixel = Stream::new(StreamKind::RawPixel, cursor.split(sizes.raw_pixel)?);
        let displacement = Stream::new(
            StreamKind::Displacement,
            cursor.split(cursor.remaining_bits())?,
        );

        let seen = if flags.contains(DirectionFlags::RAW_PIXELS) {
            SeenCodes::new()
        } else {
            SeenCodes::seeded(palette.len())
        };

        Ok(Self {
            flags,
            equal_cell,
            pixel_mask,
            encoding_type,
            raw_pixel,
            displacement,
            seen,
            palette,
        })
    }

    /// Equal-cell flag of a revisited cell; always false when the direction
    /// has no equal-cell stream
    pub fn cell_is_equal(&mut self) -> DccResult<bool> {
        if !self.flags.contains(DirectionFlags::EQUAL_CELLS) {
            return Ok(false);
        }
        self.equal_cell.read_bit()
    }

    /// Whether revisited cells carry a pixel mask
    pub fn has_pixel_mask(&self) -> bool {
        !self.pixel_mask.is_empty()
    }

    /// Mask bit of one pixel of a revisited cell, true meaning decode fresh
    pub fn pixel_is_fresh(&mut self) -> DccResult<bool> {
        self.pixel_mask.read_bit()
    }

    /// Decode one fresh pixel into a palette index
    pub fn next_pixel(&mut self) -> DccResult<u8> {
        let raw = self.flags.contains(DirectionFlags::RAW_PIXELS) && self.encoding_type.read_bit()?;

        let code = if raw {
            let code = self.raw_pixel.read_bits(8)? as u8;
            self.seen.promote(code);
            code
        } else {
            let slot = self.read_displacement()?;
            self.seen.select(slot)?
        };

        self.palette
            .get(usize::from(code))
            .copied()
            .ok_or(DccError::InvalidCode {
                code,
                palette_len: self.palette.len(),
            })
    }

    /// Sum of 4-bit groups, continuing while a group is 15
    fn read_displacement(&mut self) -> DccResult<usize> {
        let mut total = 0usize;
        loop {
            let group = self.displacement.read_bits(4)?;
            total += group as usize;
            if group != 15 {
                return Ok(total);
            }
        }
    }

    /// Check every stream was consumed as declared
    pub fn finish(&self) -> DccResult<()> {
        self.equal_cell.finish(0)?;
        self.pixel_mask.finish(0)?;
        self.encoding_type.finish(0)?;
        self.raw_pixel.finish(0)?;
        self.displacement.finish(DISPLACEMENT_PADDING_BITS)
    }

    /// Seen-code list in its current order
    pub fn seen(&self) -> &SeenCodes {
        &self.seen
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use horadric_test_utils::BitWriter;

    #[test]
    fn test_promote_moves_to_front() {
        let mut seen = SeenCodes::new();
        seen.promote(5);
        seen.promote(9);
        assert_eq!(seen.as_slice(), &[9, 5]);
        seen.promote(5);
        assert_eq!(seen.as_slice(), &[5, 9]);
    }

    #[test]
    fn test_select_moves_to_front() {
        let mut seen = SeenCodes::seeded(4);
        assert_eq!(seen.select(2).unwrap(), 2);
        assert_eq!(seen.as_slice(), &[2, 0, 1, 3]);
        assert_eq!(seen.select(0).unwrap(), 2);
        assert_eq!(seen.as_slice(), &[2, 0, 1, 3]);

        let err = seen.select(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StreamDesync);
    }

    #[test]
    fn test_list_caps_at_256() {
        let mut seen = SeenCodes::seeded(300);
        assert_eq!(seen.len(), 256);
        seen.promote(42);
        assert_eq!(seen.len(), 256);
        assert_eq!(seen.as_slice()[0], 42);
    }

    fn streams<'a>(
        buffer: &'a [u8],
        flags: DirectionFlags,
        sizes: &StreamSizes,
        palette: &[u8],
    ) -> PixelStreams<'a> {
        PixelStreams::split(&mut BitCursor::new(buffer), flags, sizes, palette.to_vec()).unwrap()
    }

    #[test]
    fn test_raw_then_seen() {
        let mut encoding = BitWriter::new();
        encoding.bit(true).bit(true).bit(false);
        let mut raw = BitWriter::new();
        raw.bits(5, 8).bits(9, 8);
        let mut displacement = BitWriter::new();
        displacement.nibbles(1);

        let sizes = StreamSizes {
            encoding_type: encoding.len_bits(),
            raw_pixel: raw.len_bits(),
            ..StreamSizes::default()
        };
        let mut buffer = BitWriter::new();
        buffer.append(&encoding).append(&raw).append(&displacement);
        let buffer = buffer.into_bytes();

        let palette: Vec<u8> = (0..=255).collect();
        let mut pixels = streams(&buffer, DirectionFlags::RAW_PIXELS, &sizes, &palette);
        assert_eq!(pixels.next_pixel().unwrap(), 5);
        assert_eq!(pixels.next_pixel().unwrap(), 9);
        assert_eq!(pixels.next_pixel().unwrap(), 5);
        assert_eq!(pixels.seen().as_slice(), &[5, 9]);
        pixels.finish().unwrap();
    }

    #[test]
    fn test_seeded_displacement_chain() {
        let mut displacement = BitWriter::new();
        displacement.nibbles(16).nibbles(0);
        let buffer = displacement.into_bytes();

        let palette: Vec<u8> = (100..=120).collect();
        let mut pixels = streams(&buffer, DirectionFlags::empty(), &StreamSizes::default(), &palette);
        assert_eq!(pixels.next_pixel().unwrap(), 116);
        assert_eq!(pixels.next_pixel().unwrap(), 116);
        pixels.finish().unwrap();
    }

    #[test]
    fn test_raw_code_outside_palette() {
        let mut bits = BitWriter::new();
        bits.bit(true).bits(3, 8);
        let sizes = StreamSizes {
            encoding_type: 1,
            raw_pixel: 8,
            ..StreamSizes::default()
        };
        let buffer = bits.into_bytes();
        let palette = [10u8, 20];
        let mut pixels = streams(&buffer, DirectionFlags::RAW_PIXELS, &sizes, &palette);
        let err = pixels.next_pixel().unwrap_err();
        assert!(matches!(err, DccError::InvalidCode { code: 3, palette_len: 2 }));
    }

    #[test]
    fn test_overrun_names_stream() {
        let sizes = StreamSizes {
            encoding_type: 1,
            raw_pixel: 4,
            ..StreamSizes::default()
        };
        let buffer = [0x01u8];
        let palette: Vec<u8> = (0..=255).collect();
        let mut pixels = streams(&buffer, DirectionFlags::RAW_PIXELS, &sizes, &palette);
        let err = pixels.next_pixel().unwrap_err();
        assert!(matches!(
            err,
            DccError::StreamDesync {
                stream: StreamKind::RawPixel,
                declared: 4,
                consumed: 8,
            }
        ));
    }

    #[test]
    fn test_unconsumed_stream_fails_finish() {
        let sizes = StreamSizes {
            pixel_mask: 3,
            ..StreamSizes::default()
        };
        let buffer = [0u8];
        let palette = [0u8];
        let pixels = streams(&buffer, DirectionFlags::empty(), &sizes, &palette);
        assert!(matches!(
            pixels.finish(),
            Err(DccError::StreamDesync {
                stream: StreamKind::PixelMask,
                declared: 3,
                consumed: 0,
            })
        ));
    }

    #[test]
    fn test_displacement_padding() {
        let palette = [0u8];
        let mut bits = BitWriter::new();
        bits.nibbles(0);
        let buffer = bits.into_bytes();
        let mut pixels = streams(&buffer, DirectionFlags::empty(), &StreamSizes::default(), &palette);
        assert_eq!(pixels.next_pixel().unwrap(), 0);
        pixels.finish().unwrap();

        let buffer = [0u8];
        let pixels = streams(&buffer, DirectionFlags::empty(), &StreamSizes::default(), &palette);
        assert!(matches!(
            pixels.finish(),
            Err(DccError::StreamDesync {
                stream: StreamKind::Displacement,
                ..
            })
        ));
    }
}
