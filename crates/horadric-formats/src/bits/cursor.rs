//! Bit cursor implementation

use super::error::{BitError, BitResult};
use bytes::Bytes;

/// Storage behind a [`BitCursor`]
#[derive(Debug)]
pub enum Backing<'a> {
    /// The cursor owns the buffer
    Owned(Bytes),
    /// The buffer belongs to the cursor this one was split from
    Shared(Bytes),
    /// The buffer is borrowed from the caller
    Borrowed(&'a [u8]),
}

impl Backing<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) | Self::Shared(bytes) => bytes,
            Self::Borrowed(slice) => slice,
        }
    }
}

/// Reads bit fields LSB-first from a window of a byte buffer
///
/// The window starts at `origin` (an absolute bit index into the backing
/// buffer) and is `len_bits` long. Reads never cross the end of the window.
#[derive(Debug)]
pub struct BitCursor<'a> {
    backing: Backing<'a>,
    origin: usize,
    len_bits: usize,
    position: usize,
}

impl<'a> BitCursor<'a> {
    /// Cursor over the whole of a borrowed slice
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            backing: Backing::Borrowed(data),
            origin: 0,
            len_bits: data.len() * 8,
            position: 0,
        }
    }

    /// Cursor over the first `size_bytes` bytes of a borrowed slice
    ///
    /// Fails with [`BitError::InvalidBuffer`] when `size_bytes` is non-zero
    /// and the buffer is empty, or when the buffer is shorter than
    /// `size_bytes`.
    pub fn load(data: &'a [u8], size_bytes: usize) -> BitResult<Self> {
        if data.is_empty() && size_bytes > 0 {
            return Err(BitError::InvalidBuffer(format!(
                "empty buffer for {size_bytes} bytes"
            )));
        }
        if data.len() < size_bytes {
            return Err(BitError::InvalidBuffer(format!(
                "buffer holds {} bytes, {} requested",
                data.len(),
                size_bytes
            )));
        }

        Ok(Self {
            backing: Backing::Borrowed(data),
            origin: 0,
            len_bits: size_bytes * 8,
            position: 0,
        })
    }

    /// Number of bits in the cursor's window
    pub fn len_bits(&self) -> usize {
        self.len_bits
    }

    /// Current position as (byte, bit-within-byte), relative to the window
    pub fn position(&self) -> (usize, u8) {
        (self.position / 8, (self.position % 8) as u8)
    }

    /// Current position in bits, relative to the window
    pub fn bit_position(&self) -> usize {
        self.position
    }

    /// Bits left to read
    pub fn remaining_bits(&self) -> usize {
        self.len_bits - self.position
    }

    /// Whether the backing storage is owned, shared or borrowed
    pub fn backing(&self) -> &Backing<'a> {
        &self.backing
    }

    /// Move to an absolute position inside the window
    ///
    /// Positioning exactly at the end is allowed.
    pub fn set_position(&mut self, byte: usize, bit: u8) -> BitResult<()> {
        let out_of_range = || BitError::OutOfRange {
            byte,
            bit,
            total_bits: self.len_bits,
        };

        if bit >= 8 {
            return Err(out_of_range());
        }
        let target = byte
            .checked_mul(8)
            .and_then(|b| b.checked_add(usize::from(bit)))
            .ok_or_else(out_of_range)?;
        if target > self.len_bits {
            return Err(out_of_range());
        }

        self.position = target;
        Ok(())
    }

    /// Return to the start of the window
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Skip `count` bits
    pub fn skip(&mut self, count: usize) -> BitResult<()> {
        self.ensure(count)?;
        self.position += count;
        Ok(())
    }

    /// Skip to the next byte boundary of the backing buffer
    ///
    /// Does nothing when already aligned.
    pub fn align_to_byte(&mut self) -> BitResult<()> {
        let absolute = self.origin + self.position;
        let padding = (8 - absolute % 8) % 8;
        self.skip(padding)
    }

    /// Read an unsigned field of `width` bits (0 to 32)
    ///
    /// A zero-width read returns 0 without moving. On error the position is
    /// unchanged.
    pub fn read_bits(&mut self, width: u32) -> BitResult<u32> {
        if width > 32 {
            return Err(BitError::InvalidWidth(width));
        }
        let width = width as usize;
        self.ensure(width)?;

        let data = self.backing.as_slice();
        let mut value: u64 = 0;
        let mut filled = 0;
        let mut absolute = self.origin + self.position;

        while filled < width {
            let byte = data[absolute / 8];
            let offset = absolute % 8;
            let take = (8 - offset).min(width - filled);
            let mask = (1u16 << take) - 1;
            let bits = (u16::from(byte) >> offset) & mask;
            value |= u64::from(bits) << filled;
            filled += take;
            absolute += take;
        }

        self.position += width;
        Ok(value as u32)
    }

    /// Read a two's-complement field of `width` bits
    pub fn read_signed(&mut self, width: u32) -> BitResult<i32> {
        let raw = self.read_bits(width)?;
        Ok(to_signed(raw, width))
    }

    /// Read a single bit as a flag
    pub fn read_bit(&mut self) -> BitResult<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Read 8 bits
    pub fn read_u8(&mut self) -> BitResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read 16 bits
    pub fn read_u16(&mut self) -> BitResult<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    /// Read 32 bits
    pub fn read_u32(&mut self) -> BitResult<u32> {
        self.read_bits(32)
    }

    /// Fill `out` with the next `out.len()` bytes' worth of bits
    ///
    /// Bits need not be byte-aligned. On error the position is unchanged.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> BitResult<()> {
        self.ensure(out.len() * 8)?;
        for byte in out.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(())
    }

    /// Bytes spanned by the window
    ///
    /// When the window does not start or end on a byte boundary the first
    /// and last bytes include bits outside it.
    pub fn held_data(&self) -> &[u8] {
        let start = self.origin / 8;
        let end = (self.origin + self.len_bits).div_ceil(8);
        &self.backing.as_slice()[start..end]
    }

    fn ensure(&self, requested: usize) -> BitResult<()> {
        let remaining = self.remaining_bits();
        if requested > remaining {
            return Err(BitError::BufferUnderrun {
                requested,
                remaining,
            });
        }
        Ok(())
    }
}

impl BitCursor<'static> {
    /// Cursor that owns its buffer
    pub fn from_bytes(data: Bytes) -> Self {
        let len_bits = data.len() * 8;
        Self {
            backing: Backing::Owned(data),
            origin: 0,
            len_bits,
            position: 0,
        }
    }

    /// Cursor that takes ownership of a vector
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_bytes(Bytes::from(data))
    }
}

impl<'a> BitCursor<'a> {
    /// Split off a cursor over the next `bits` bits
    ///
    /// The new cursor starts at this cursor's position; this cursor advances
    /// past the split bits. A split of an owned or shared cursor shares the
    /// same buffer, a split of a borrowed cursor borrows the same slice.
    pub fn split(&mut self, bits: usize) -> BitResult<BitCursor<'a>> {
        let remaining = self.remaining_bits();
        if bits > remaining {
            return Err(BitError::InsufficientBits {
                requested: bits,
                remaining,
            });
        }

        let backing = match &self.backing {
            Backing::Owned(bytes) | Backing::Shared(bytes) => Backing::Shared(bytes.clone()),
            Backing::Borrowed(slice) => Backing::Borrowed(slice),
        };
        let child = BitCursor {
            backing,
            origin: self.origin + self.position,
            len_bits: bits,
            position: 0,
        };

        self.position += bits;
        Ok(child)
    }

    /// Release the cursor, returning its buffer if it was the owner
    pub fn into_owned_buffer(self) -> Option<Bytes> {
        match self.backing {
            Backing::Owned(bytes) => Some(bytes),
            Backing::Shared(_) | Backing::Borrowed(_) => None,
        }
    }
}

/// Sign-extend the low `width` bits of `raw`
pub fn to_signed(raw: u32, width: u32) -> i32 {
    match width {
        0 => 0,
        32.. => raw as i32,
        _ => {
            let sign = 1u32 << (width - 1);
            if raw & sign == 0 {
                (raw & (sign << 1).wrapping_sub(1)) as i32
            } else {
                (raw | (u32::MAX << width)) as i32
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lsb_first_order() {
        let data = [0b1100_1010, 0b0000_0001];
        let mut cursor = BitCursor::new(&data);

        assert!(!cursor.read_bit().unwrap());
        assert!(cursor.read_bit().unwrap());
        assert_eq!(cursor.read_bits(6).unwrap(), 0b11_0010);
        assert_eq!(cursor.read_bits(1).unwrap(), 1);
        assert_eq!(cursor.remaining_bits(), 7);
    }

    #[test]
    fn test_read_across_bytes() {
        let data = 0xDEAD_BEEFu32.to_le_bytes();
        let mut cursor = BitCursor::new(&data);

        assert_eq!(cursor.read_bits(4).unwrap(), 0xF);
        assert_eq!(cursor.read_bits(24).unwrap(), 0xEAD_BEE);
        assert_eq!(cursor.read_bits(4).unwrap(), 0xD);
    }

    #[test]
    fn test_full_width_read() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xFF];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(cursor.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn test_zero_width_read() {
        let mut cursor = BitCursor::new(&[]);
        assert_eq!(cursor.read_bits(0).unwrap(), 0);
        assert_eq!(cursor.bit_position(), 0);
    }

    #[test]
    fn test_invalid_width() {
        let data = [0u8; 8];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_bits(33), Err(BitError::InvalidWidth(33)));
    }

    #[test]
    fn test_underrun_leaves_position() {
        let data = [0xFFu8];
        let mut cursor = BitCursor::new(&data);
        cursor.read_bits(5).unwrap();

        let err = cursor.read_bits(4).unwrap_err();
        assert_eq!(
            err,
            BitError::BufferUnderrun {
                requested: 4,
                remaining: 3
            }
        );
        assert_eq!(cursor.bit_position(), 5);
        assert_eq!(cursor.read_bits(3).unwrap(), 0b111);
    }

    #[test]
    fn test_read_bytes_unaligned() {
        let data = [0x0F, 0xF0, 0x00];
        let mut cursor = BitCursor::new(&data);
        cursor.read_bits(4).unwrap();

        let mut out = [0u8; 2];
        cursor.read_bytes(&mut out).unwrap();
        assert_eq!(out, [0x00, 0x0F]);

        let mut too_many = [0u8; 1];
        assert!(cursor.read_bytes(&mut too_many).is_err());
        assert_eq!(cursor.remaining_bits(), 4);
    }

    #[test]
    fn test_signed_conversion() {
        assert_eq!(to_signed(0b111, 3), -1);
        assert_eq!(to_signed(0b100, 3), -4);
        assert_eq!(to_signed(0b011, 3), 3);
        assert_eq!(to_signed(0xFFFF_FFFF, 32), -1);
        assert_eq!(to_signed(5, 0), 0);
        assert_eq!(to_signed(0x80, 8), -128);
    }

    #[test]
    fn test_read_signed() {
        let data = [0b0001_1110];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_signed(4).unwrap(), -2);
        assert_eq!(cursor.read_signed(4).unwrap(), 1);
    }

    #[test]
    fn test_set_position_and_rewind() {
        let data = [0x00, 0b0000_0100];
        let mut cursor = BitCursor::new(&data);

        cursor.set_position(1, 2).unwrap();
        assert_eq!(cursor.position(), (1, 2));
        assert!(cursor.read_bit().unwrap());

        cursor.set_position(2, 0).unwrap();
        assert_eq!(cursor.remaining_bits(), 0);

        assert!(matches!(
            cursor.set_position(2, 1),
            Err(BitError::OutOfRange { .. })
        ));
        assert!(matches!(
            cursor.set_position(0, 8),
            Err(BitError::OutOfRange { .. })
        ));

        cursor.rewind();
        assert_eq!(cursor.bit_position(), 0);
    }

    #[test]
    fn test_load_validation() {
        assert!(matches!(
            BitCursor::load(&[], 4),
            Err(BitError::InvalidBuffer(_))
        ));
        assert!(matches!(
            BitCursor::load(&[1, 2], 4),
            Err(BitError::InvalidBuffer(_))
        ));

        let data = [1u8, 2, 3, 4];
        let cursor = BitCursor::load(&data, 2).unwrap();
        assert_eq!(cursor.len_bits(), 16);
        assert_eq!(cursor.held_data(), &[1, 2]);

        let empty = BitCursor::load(&[], 0).unwrap();
        assert_eq!(empty.len_bits(), 0);
    }

    #[test]
    fn test_split_shares_and_advances() {
        let mut parent = BitCursor::from_vec(vec![0xAB, 0xCD, 0xEF]);
        parent.read_bits(4).unwrap();

        let mut child = parent.split(12).unwrap();
        assert!(matches!(child.backing(), Backing::Shared(_)));
        assert_eq!(child.len_bits(), 12);
        assert_eq!(parent.bit_position(), 16);

        assert_eq!(child.read_bits(12).unwrap(), 0xCDA);
        assert!(child.read_bit().is_err());

        child.rewind();
        assert_eq!(child.read_bits(4).unwrap(), 0xA);

        assert_eq!(parent.read_u8().unwrap(), 0xEF);
    }

    #[test]
    fn test_split_outlives_parent() {
        let child = {
            let mut parent = BitCursor::from_vec(vec![0x12, 0x34]);
            parent.split(16).unwrap()
        };
        assert_eq!(child.held_data(), &[0x12, 0x34]);
    }

    #[test]
    fn test_split_insufficient_bits() {
        let data = [0u8; 2];
        let mut cursor = BitCursor::new(&data);
        cursor.read_bits(10).unwrap();
        assert_eq!(
            cursor.split(7).unwrap_err(),
            BitError::InsufficientBits {
                requested: 7,
                remaining: 6
            }
        );
        assert_eq!(cursor.bit_position(), 10);
    }

    #[test]
    fn test_split_of_borrowed_is_borrowed() {
        let data = [0u8; 4];
        let mut cursor = BitCursor::new(&data);
        let child = cursor.split(8).unwrap();
        assert!(matches!(child.backing(), Backing::Borrowed(_)));
    }

    #[test]
    fn test_align_uses_buffer_boundary() {
        let data = [0u8; 4];
        let mut cursor = BitCursor::new(&data);
        cursor.read_bits(3).unwrap();
        let mut child = cursor.split(20).unwrap();

        child.read_bits(2).unwrap();
        child.align_to_byte().unwrap();
        assert_eq!(child.bit_position(), 5);

        child.align_to_byte().unwrap();
        assert_eq!(child.bit_position(), 5);
    }

    #[test]
    fn test_held_data_partial_bytes() {
        let data = [1u8, 2, 3, 4];
        let mut cursor = BitCursor::new(&data);
        cursor.read_bits(4).unwrap();
        let child = cursor.split(8).unwrap();
        assert_eq!(child.held_data(), &[1, 2]);
    }

    #[test]
    fn test_owned_buffer_release() {
        let cursor = BitCursor::from_vec(vec![9, 8, 7]);
        assert_eq!(cursor.into_owned_buffer().unwrap().as_ref(), &[9, 8, 7]);

        let data = [1u8];
        assert!(BitCursor::new(&data).into_owned_buffer().is_none());
    }

    proptest! {
        #[test]
        fn reads_sum_to_length(data in prop::collection::vec(any::<u8>(), 0..64), split in 0usize..512) {
            let total = data.len() * 8;
            let first = split.min(total);
            let mut cursor = BitCursor::new(&data);

            let mut left = first;
            while left > 0 {
                let width = left.min(32);
                cursor.read_bits(width as u32).unwrap();
                left -= width;
            }
            prop_assert_eq!(cursor.remaining_bits(), total - first);

            let mut left = total - first;
            while left > 0 {
                let width = left.min(32);
                cursor.read_bits(width as u32).unwrap();
                left -= width;
            }
            prop_assert!(cursor.read_bit().is_err());
        }

        #[test]
        fn bitwise_matches_bytewise(data in prop::collection::vec(any::<u8>(), 1..32)) {
            let mut cursor = BitCursor::new(&data);
            for &expected in &data {
                let mut byte = 0u8;
                for i in 0..8 {
                    if cursor.read_bit().unwrap() {
                        byte |= 1 << i;
                    }
                }
                prop_assert_eq!(byte, expected);
            }
        }
    }
}
