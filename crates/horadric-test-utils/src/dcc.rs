//! DCC direction and file encoder
//!
//! Frame headers and the stream size table are laid out automatically; the
//! five pixel streams are supplied bit for bit by the test.

use crate::bits::BitWriter;

/// Field widths selectable by a 4-bit width code
pub const WIDTH_TABLE: [u32; 16] = [0, 1, 2, 4, 6, 8, 10, 12, 14, 16, 20, 24, 26, 28, 30, 32];

/// One frame header
#[derive(Debug, Clone, Default)]
pub struct FrameSpec {
    /// Unused leading field
    pub variable0: u32,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Left edge
    pub x_offset: i32,
    /// Bottom row, or top row when `bottom_up`
    pub y_offset: i32,
    /// Optional trailing bytes
    pub optional_bytes: Vec<u8>,
    /// Declared coded byte count
    pub coded_bytes: u32,
    /// Rows run bottom-up
    pub bottom_up: bool,
}

impl FrameSpec {
    /// Frame with the given geometry and no extras
    pub fn new(width: u32, height: u32, x_offset: i32, y_offset: i32) -> Self {
        Self {
            width,
            height,
            x_offset,
            y_offset,
            ..Self::default()
        }
    }
}

/// One direction: frames, palette codes and the raw pixel streams
#[derive(Debug, Clone, Default)]
pub struct DirectionSpec {
    /// Declared encoded size
    pub outsize_coded: u32,
    /// Compression flag bits (0x01 raw pixels, 0x02 equal cells)
    pub compression_flags: u8,
    /// Frame headers in order
    pub frames: Vec<FrameSpec>,
    /// Palette indices present in the direction; codes index the sorted set
    pub palette: Vec<u8>,
    /// Equal-cell flags
    pub equal_cell: BitWriter,
    /// Pixel mask bits
    pub pixel_mask: BitWriter,
    /// Encoding type bits
    pub encoding_type: BitWriter,
    /// Raw 8-bit codes
    pub raw_pixel: BitWriter,
    /// Displacement nibble chains
    pub displacement: BitWriter,
}

fn unsigned_code(values: impl Iterator<Item = u32>) -> u32 {
    let max = values.max().unwrap_or(0);
    WIDTH_TABLE
        .iter()
        .position(|&w| w == 32 || u64::from(max) < (1u64 << w))
        .expect("width table ends at 32") as u32
}

fn signed_code(values: impl Iterator<Item = i32>) -> u32 {
    let (min, max) = values.fold((0i64, 0i64), |(lo, hi), v| {
        (lo.min(i64::from(v)), hi.max(i64::from(v)))
    });
    WIDTH_TABLE
        .iter()
        .position(|&w| {
            if w == 0 {
                min == 0 && max == 0
            } else {
                let half = 1i64 << (w - 1);
                min >= -half && max < half
            }
        })
        .expect("width table ends at 32") as u32
}

impl DirectionSpec {
    /// Encode the direction
    pub fn encode(&self) -> Vec<u8> {
        let codes = [
            unsigned_code(self.frames.iter().map(|f| f.variable0)),
            unsigned_code(self.frames.iter().map(|f| f.width)),
            unsigned_code(self.frames.iter().map(|f| f.height)),
            signed_code(self.frames.iter().map(|f| f.x_offset)),
            signed_code(self.frames.iter().map(|f| f.y_offset)),
            unsigned_code(self.frames.iter().map(|f| f.optional_bytes.len() as u32)),
            unsigned_code(self.frames.iter().map(|f| f.coded_bytes)),
        ];
        let widths = codes.map(|c| WIDTH_TABLE[c as usize]);

        let mut out = BitWriter::new();
        out.bits(self.outsize_coded, 32);
        out.bits(u32::from(self.compression_flags), 2);
        for code in codes {
            out.bits(code, 4);
        }

        for frame in &self.frames {
            out.bits(frame.variable0, widths[0]);
            out.bits(frame.width, widths[1]);
            out.bits(frame.height, widths[2]);
            out.signed(frame.x_offset, widths[3]);
            out.signed(frame.y_offset, widths[4]);
            out.bits(frame.optional_bytes.len() as u32, widths[5]);
            out.bits(frame.coded_bytes, widths[6]);
            out.bit(frame.bottom_up);
        }

        if self.frames.iter().any(|f| !f.optional_bytes.is_empty()) {
            out.align();
            for frame in &self.frames {
                out.bytes(&frame.optional_bytes);
            }
        }

        if self.compression_flags & 0x02 != 0 {
            out.bits(self.equal_cell.len_bits() as u32, 20);
        }
        out.bits(self.pixel_mask.len_bits() as u32, 20);
        if self.compression_flags & 0x01 != 0 {
            out.bits(self.encoding_type.len_bits() as u32, 20);
            out.bits(self.raw_pixel.len_bits() as u32, 20);
        }

        for index in 0..=255u8 {
            out.bit(self.palette.contains(&index));
        }

        out.append(&self.equal_cell)
            .append(&self.pixel_mask)
            .append(&self.encoding_type)
            .append(&self.raw_pixel)
            .append(&self.displacement)
            .align();
        out.into_bytes()
    }
}

/// Wrap encoded directions in a DCC file header
pub fn encode_dcc_file(directions: &[Vec<u8>], frames_per_direction: u32) -> Vec<u8> {
    let header_len = 15 + 4 * directions.len();
    let mut out = vec![0x74, 6, directions.len() as u8];
    out.extend(frames_per_direction.to_le_bytes());
    out.extend(1u32.to_le_bytes());
    out.extend(0u32.to_le_bytes());

    let mut offset = header_len;
    for direction in directions {
        out.extend((offset as u32).to_le_bytes());
        offset += direction.len();
    }
    for direction in directions {
        out.extend(direction);
    }
    out
}
