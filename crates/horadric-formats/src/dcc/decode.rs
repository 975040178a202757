//! Direction decoding

use tracing::{debug, trace};

use super::cells::CellGrid;
use super::direction::{Bounds, DirectionHeader, FrameHeader, StreamSizes, read_palette};
use super::error::{DccError, DccResult};
use super::pixels::PixelStreams;
use crate::bits::BitCursor;

/// Largest direction canvas accepted, in pixels
pub const MAX_CANVAS_PIXELS: usize = 1 << 24;

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Header as stored
    pub header: FrameHeader,
    /// Box in direction coordinates
    pub bounds: Bounds,
    /// Palette indices, `width * height`, rows in ascending y
    pub pixels: Vec<u8>,
}

/// A decoded direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDirection {
    /// Direction header
    pub header: DirectionHeader,
    /// Union of every frame box
    pub bounds: Bounds,
    /// Palette indices the direction uses, ascending
    pub palette: Vec<u8>,
    /// Frames in order
    pub frames: Vec<DecodedFrame>,
}

/// Decode one direction of `frame_count` frames from its bytes
pub fn decode(data: &[u8], frame_count: u32) -> DccResult<DecodedDirection> {
    decode_cursor(&mut BitCursor::new(data), frame_count)
}

/// Decode the direction held by `cursor`
///
/// The cursor is rewound first and consumed to its end.
pub fn decode_cursor(cursor: &mut BitCursor<'_>, frame_count: u32) -> DccResult<DecodedDirection> {
    cursor.rewind();
    let header = DirectionHeader::read(cursor)?;

    let mut frames = Vec::new();
    for _ in 0..frame_count {
        frames.push(FrameHeader::read(cursor, &header.widths)?);
    }

    if frames.iter().any(|frame| frame.optional_bytes > 0) {
        cursor.align_to_byte()?;
        for frame in &mut frames {
            frame.read_optional(cursor)?;
        }
    }

    let sizes = StreamSizes::read(cursor, header.flags)?;
    let palette = read_palette(cursor)?;
    trace!(
        "Direction streams {:?}, {} palette entries",
        sizes,
        palette.len()
    );

    let frame_bounds = frames
        .iter()
        .map(FrameHeader::bounds)
        .collect::<DccResult<Vec<_>>>()?;
    let bounds = frame_bounds
        .iter()
        .fold(Bounds::default(), |acc, b| acc.union(b));

    let mut streams = PixelStreams::split(cursor, header.flags, &sizes, palette.clone())?;
    let mut canvas = Canvas::new(bounds)?;
    let grid = CellGrid::new(&bounds);
    let mut covered = vec![false; grid.len()];

    let mut decoded = Vec::with_capacity(frames.len());
    for (frame, frame_box) in frames.into_iter().zip(frame_bounds) {
        for cell in grid.frame_cells(&frame_box) {
            let history = covered[cell.grid_index];
            covered[cell.grid_index] = true;

            if history && streams.cell_is_equal()? {
                continue;
            }

            let mut fresh = vec![true; cell.pixel_count()];
            if history && streams.has_pixel_mask() {
                for flag in &mut fresh {
                    *flag = streams.pixel_is_fresh()?;
                }
            }

            let mut flags = fresh.into_iter();
            for y in cell.y..cell.y + cell.height as i32 {
                for x in cell.x..cell.x + cell.width as i32 {
                    if flags.next().unwrap_or(false) {
                        let index = streams.next_pixel()?;
                        canvas.set(x, y, index);
                    }
                }
            }
        }

        decoded.push(DecodedFrame {
            pixels: canvas.crop(&frame_box),
            bounds: frame_box,
            header: frame,
        });
    }

    streams.finish()?;
    debug!(
        "Decoded direction: {} frames, {}x{} box",
        decoded.len(),
        bounds.width(),
        bounds.height()
    );

    Ok(DecodedDirection {
        header,
        bounds,
        palette,
        frames: decoded,
    })
}

/// Pixels of the whole direction box, carried from frame to frame
struct Canvas {
    bounds: Bounds,
    stride: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(bounds: Bounds) -> DccResult<Self> {
        let stride = bounds.width() as usize;
        let area = stride
            .checked_mul(bounds.height() as usize)
            .filter(|&area| area <= MAX_CANVAS_PIXELS)
            .ok_or_else(|| {
                DccError::InvalidGeometry(format!(
                    "{}x{} direction exceeds {} pixels",
                    bounds.width(),
                    bounds.height(),
                    MAX_CANVAS_PIXELS
                ))
            })?;
        Ok(Self {
            bounds,
            stride,
            pixels: vec![0; area],
        })
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        (y - self.bounds.min_y) as usize * self.stride + (x - self.bounds.min_x) as usize
    }

    fn set(&mut self, x: i32, y: i32, value: u8) {
        let offset = self.offset(x, y);
        self.pixels[offset] = value;
    }

    fn crop(&self, area: &Bounds) -> Vec<u8> {
        let width = area.width() as usize;
        let mut out = Vec::with_capacity(width * area.height() as usize);
        if width == 0 {
            return out;
        }
        for y in area.min_y..area.max_y {
            let start = self.offset(area.min_x, y);
            out.extend_from_slice(&self.pixels[start..start + width]);
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::dcc::error::StreamKind;
    use horadric_test_utils::{DirectionSpec, FrameSpec};
    use pretty_assertions::assert_eq;

    fn all_codes() -> Vec<u8> {
        (0..=255).collect()
    }

    /// One 2x2 frame, every pixel a raw code
    fn single_raw_frame(codes: [u8; 4]) -> DirectionSpec {
        let mut spec = DirectionSpec {
            compression_flags: 0x01,
            frames: vec![FrameSpec::new(2, 2, 0, 1)],
            palette: all_codes(),
            ..DirectionSpec::default()
        };
        for code in codes {
            spec.encoding_type.bit(true);
            spec.raw_pixel.bits(u32::from(code), 8);
        }
        spec
    }

    #[test]
    fn test_single_frame_raw_pixels() {
        let bytes = single_raw_frame([1, 2, 3, 4]).encode();
        let direction = decode(&bytes, 1).unwrap();

        assert_eq!(
            direction.bounds,
            Bounds {
                min_x: 0,
                min_y: 0,
                max_x: 2,
                max_y: 2,
            }
        );
        assert_eq!(direction.frames.len(), 1);
        assert_eq!(direction.frames[0].pixels, vec![1, 2, 3, 4]);
        assert_eq!(direction.palette.len(), 256);
    }

    #[test]
    fn test_palette_mapping() {
        let mut spec = DirectionSpec {
            frames: vec![FrameSpec::new(3, 1, 0, 0)],
            palette: vec![10, 20, 30],
            ..DirectionSpec::default()
        };
        spec.displacement.nibbles(2).nibbles(0).nibbles(2);
        let direction = decode(&spec.encode(), 1).unwrap();

        // seeded [0,1,2]: slot 2 -> 2, slot 0 -> 2, slot 2 -> 1
        assert_eq!(direction.frames[0].pixels, vec![30, 30, 20]);
    }

    #[test]
    fn test_second_frame_keeps_masked_pixels() {
        let mut spec = DirectionSpec {
            compression_flags: 0x01,
            frames: vec![FrameSpec::new(2, 1, 0, 0), FrameSpec::new(2, 1, 0, 0)],
            palette: all_codes(),
            ..DirectionSpec::default()
        };
        spec.encoding_type.bit(true).bit(true).bit(false);
        spec.raw_pixel.bits(7, 8).bits(8, 8);
        spec.pixel_mask.bit(false).bit(true);
        spec.displacement.nibbles(1);

        let direction = decode(&spec.encode(), 2).unwrap();
        assert_eq!(direction.frames[0].pixels, vec![7, 8]);
        assert_eq!(direction.frames[1].pixels, vec![7, 7]);
    }

    #[test]
    fn test_frames_share_direction_canvas() {
        let mut spec = DirectionSpec {
            compression_flags: 0x01,
            frames: vec![FrameSpec::new(1, 1, 0, 0), FrameSpec::new(1, 1, 5, 0)],
            palette: all_codes(),
            ..DirectionSpec::default()
        };
        spec.encoding_type.bit(true).bit(true);
        spec.raw_pixel.bits(1, 8).bits(2, 8);

        let direction = decode(&spec.encode(), 2).unwrap();
        assert_eq!((direction.bounds.width(), direction.bounds.height()), (6, 1));
        assert_eq!(direction.frames[0].pixels, vec![1]);
        assert_eq!(direction.frames[1].pixels, vec![2]);
        assert_eq!(direction.frames[1].bounds.min_x, 5);
    }

    #[test]
    fn test_optional_bytes() {
        let mut first = FrameSpec::new(1, 1, 0, 0);
        first.optional_bytes = vec![0xAA, 0xBB];
        let mut spec = DirectionSpec {
            compression_flags: 0x01,
            frames: vec![first, FrameSpec::new(1, 1, 0, 0)],
            palette: all_codes(),
            ..DirectionSpec::default()
        };
        spec.encoding_type.bit(true);
        spec.raw_pixel.bits(9, 8);
        spec.pixel_mask.bit(false);

        let direction = decode(&spec.encode(), 2).unwrap();
        assert_eq!(direction.frames[0].header.optional_data, vec![0xAA, 0xBB]);
        assert!(direction.frames[1].header.optional_data.is_empty());
        assert_eq!(direction.frames[1].pixels, vec![9]);
    }

    #[test]
    fn test_leftover_raw_bits_desync() {
        let mut spec = single_raw_frame([1, 2, 3, 4]);
        spec.raw_pixel.bits(0, 3);
        let err = decode(&spec.encode(), 1).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StreamDesync);
        assert!(matches!(
            err,
            DccError::StreamDesync {
                stream: StreamKind::RawPixel,
                declared: 35,
                consumed: 32,
            }
        ));
    }

    #[test]
    fn test_truncated_header() {
        let err = decode(&[0u8; 4], 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BufferUnderrun);
    }

    #[test]
    fn test_oversized_canvas() {
        let spec = DirectionSpec {
            frames: vec![FrameSpec::new(1 << 13, 1 << 12, 0, 0)],
            palette: vec![0],
            ..DirectionSpec::default()
        };
        let err = decode(&spec.encode(), 1).unwrap_err();
        assert!(matches!(err, DccError::InvalidGeometry(_)));
    }

    #[test]
    fn test_frames_at_opposite_coordinate_limits() {
        let spec = DirectionSpec {
            frames: vec![
                FrameSpec::new(1, 1, i32::MIN, 0),
                FrameSpec::new(1, 1, i32::MAX - 1, 0),
            ],
            palette: vec![0],
            ..DirectionSpec::default()
        };
        let err = decode(&spec.encode(), 2).unwrap_err();
        assert!(matches!(err, DccError::InvalidGeometry(_)));
    }

    #[test]
    fn test_bounds_span_whole_coordinate_range() {
        let bounds = Bounds {
            min_x: i32::MIN,
            min_y: 0,
            max_x: i32::MAX,
            max_y: 1,
        };
        assert_eq!(bounds.width(), u32::MAX);
        assert_eq!(bounds.height(), 1);
    }

    #[test]
    fn test_rewinds_before_decoding() {
        let bytes = single_raw_frame([4, 3, 2, 1]).encode();
        let mut cursor = BitCursor::new(&bytes);
        cursor.skip(17).unwrap();
        let direction = decode_cursor(&mut cursor, 1).unwrap();
        assert_eq!(direction.frames[0].pixels, vec![4, 3, 2, 1]);
    }
}
