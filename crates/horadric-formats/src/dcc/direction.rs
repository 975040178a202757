//! Direction and frame headers

use bitflags::bitflags;

use super::error::{DccError, DccResult};
use crate::bits::{BitCursor, BitError};

/// Bit widths selectable by a 4-bit width code
pub const WIDTH_TABLE: [u32; 16] = [0, 1, 2, 4, 6, 8, 10, 12, 14, 16, 20, 24, 26, 28, 30, 32];

/// Number of entries in the palette presence table
pub const PALETTE_TABLE_BITS: usize = 256;

/// Width of each declared stream size
pub const STREAM_SIZE_BITS: u32 = 20;

bitflags! {
    /// Compression features enabled for a direction
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirectionFlags: u8 {
        /// Fresh pixels carry an encoding-type bit and may be raw codes
        const RAW_PIXELS = 0x01;
        /// Revisited cells carry an equal-cell flag
        const EQUAL_CELLS = 0x02;
    }
}

/// Widths of the seven frame header fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldWidths {
    /// Leading field with no known meaning
    pub variable0: u32,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Signed x offset
    pub x_offset: u32,
    /// Signed y offset
    pub y_offset: u32,
    /// Optional byte count
    pub optional_bytes: u32,
    /// Coded byte count
    pub coded_bytes: u32,
}

/// Fixed header at the start of every direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionHeader {
    /// Encoded size as declared by the encoder
    pub outsize_coded: u32,
    /// Enabled compression features
    pub flags: DirectionFlags,
    /// Frame header field widths
    pub widths: FieldWidths,
}

impl DirectionHeader {
    /// Read the header from the start of a direction
    pub fn read(cursor: &mut BitCursor<'_>) -> DccResult<Self> {
        let outsize_coded = cursor.read_u32()?;
        let flags = DirectionFlags::from_bits_retain(cursor.read_bits(2)? as u8);

        let mut codes = [0u32; 7];
        for code in &mut codes {
            *code = WIDTH_TABLE[cursor.read_bits(4)? as usize];
        }
        let [variable0, width, height, x_offset, y_offset, optional_bytes, coded_bytes] = codes;

        Ok(Self {
            outsize_coded,
            flags,
            widths: FieldWidths {
                variable0,
                width,
                height,
                x_offset,
                y_offset,
                optional_bytes,
                coded_bytes,
            },
        })
    }
}

/// Axis-aligned box, `min` inclusive and `max` exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    /// Leftmost column
    pub min_x: i32,
    /// Top row
    pub min_y: i32,
    /// One past the rightmost column
    pub max_x: i32,
    /// One past the bottom row
    pub max_y: i32,
}

impl Bounds {
    /// Width in pixels
    pub fn width(&self) -> u32 {
        extent(self.min_x, self.max_x)
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        extent(self.min_y, self.max_y)
    }

    /// Whether the box holds no pixels
    pub fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Smallest box holding both; empty boxes are ignored
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Distance between two `i32` edges; any span of the range fits in `u32`
fn extent(min: i32, max: i32) -> u32 {
    (i64::from(max) - i64::from(min)).max(0) as u32
}

/// Geometry and sizes of one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeader {
    /// Leading field with no known meaning
    pub variable0: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Left edge
    pub x_offset: i32,
    /// Bottom row, or top row when `bottom_up`
    pub y_offset: i32,
    /// Number of optional bytes
    pub optional_bytes: u32,
    /// Declared coded size
    pub coded_bytes: u32,
    /// Rows are stored bottom-up
    pub bottom_up: bool,
    /// Optional bytes, read after all frame headers
    pub optional_data: Vec<u8>,
}

impl FrameHeader {
    /// Read one frame header at the declared field widths
    pub fn read(cursor: &mut BitCursor<'_>, widths: &FieldWidths) -> DccResult<Self> {
        Ok(Self {
            variable0: cursor.read_bits(widths.variable0)?,
            width: cursor.read_bits(widths.width)?,
            height: cursor.read_bits(widths.height)?,
            x_offset: cursor.read_signed(widths.x_offset)?,
            y_offset: cursor.read_signed(widths.y_offset)?,
            optional_bytes: cursor.read_bits(widths.optional_bytes)?,
            coded_bytes: cursor.read_bits(widths.coded_bytes)?,
            bottom_up: cursor.read_bit()?,
            optional_data: Vec::new(),
        })
    }

    /// Box covered by the frame
    ///
    /// Top-down frames end on the `y_offset` row; bottom-up frames start on
    /// it.
    pub fn bounds(&self) -> DccResult<Bounds> {
        let x0 = i64::from(self.x_offset);
        let x1 = x0 + i64::from(self.width);
        let (y0, y1) = if self.bottom_up {
            let y0 = i64::from(self.y_offset);
            (y0, y0 + i64::from(self.height))
        } else {
            let y1 = i64::from(self.y_offset) + 1;
            (y1 - i64::from(self.height), y1)
        };

        let fit = |v: i64| {
            i32::try_from(v).map_err(|_| {
                DccError::InvalidGeometry(format!(
                    "{}x{} frame at ({}, {}) leaves the coordinate range",
                    self.width, self.height, self.x_offset, self.y_offset
                ))
            })
        };
        Ok(Bounds {
            min_x: fit(x0)?,
            min_y: fit(y0)?,
            max_x: fit(x1)?,
            max_y: fit(y1)?,
        })
    }

    /// Read `optional_bytes` bytes into `optional_data`
    pub(crate) fn read_optional(&mut self, cursor: &mut BitCursor<'_>) -> DccResult<()> {
        let requested = self.optional_bytes as usize * 8;
        let remaining = cursor.remaining_bits();
        if requested > remaining {
            return Err(BitError::BufferUnderrun {
                requested,
                remaining,
            }
            .into());
        }
        self.optional_data = vec![0; self.optional_bytes as usize];
        cursor.read_bytes(&mut self.optional_data)?;
        Ok(())
    }
}

/// Declared sizes of the four sized sub-streams, in bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSizes {
    /// Equal-cell stream
    pub equal_cell: usize,
    /// Pixel-mask stream
    pub pixel_mask: usize,
    /// Encoding-type stream
    pub encoding_type: usize,
    /// Raw-pixel stream
    pub raw_pixel: usize,
}

impl StreamSizes {
    /// Read the sizes present for `flags`; absent streams are empty
    pub fn read(cursor: &mut BitCursor<'_>, flags: DirectionFlags) -> DccResult<Self> {
        let mut sizes = Self::default();
        if flags.contains(DirectionFlags::EQUAL_CELLS) {
            sizes.equal_cell = cursor.read_bits(STREAM_SIZE_BITS)? as usize;
        }
        sizes.pixel_mask = cursor.read_bits(STREAM_SIZE_BITS)? as usize;
        if flags.contains(DirectionFlags::RAW_PIXELS) {
            sizes.encoding_type = cursor.read_bits(STREAM_SIZE_BITS)? as usize;
            sizes.raw_pixel = cursor.read_bits(STREAM_SIZE_BITS)? as usize;
        }
        Ok(sizes)
    }
}

/// Read the 256-bit palette presence table
///
/// Code `n` maps to the `n`-th palette index whose bit is set.
pub fn read_palette(cursor: &mut BitCursor<'_>) -> DccResult<Vec<u8>> {
    let mut palette = Vec::new();
    for index in 0..PALETTE_TABLE_BITS {
        if cursor.read_bit()? {
            palette.push(index as u8);
        }
    }
    Ok(palette)
}
