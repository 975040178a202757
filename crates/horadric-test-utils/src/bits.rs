//! LSB-first bit writer, the inverse of the bit cursor

/// Accumulates bit fields least-significant bit first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitWriter {
    bytes: Vec<u8>,
    len_bits: usize,
}

impl BitWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value`
    pub fn bits(&mut self, value: u32, width: u32) -> &mut Self {
        assert!(width <= 32, "width {width} exceeds 32 bits");
        for i in 0..width {
            self.bit((value >> i) & 1 == 1);
        }
        self
    }

    /// Append a two's-complement field
    pub fn signed(&mut self, value: i32, width: u32) -> &mut Self {
        self.bits(value as u32, width)
    }

    /// Append one bit
    pub fn bit(&mut self, set: bool) -> &mut Self {
        if self.len_bits % 8 == 0 {
            self.bytes.push(0);
        }
        if set {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.len_bits % 8);
        }
        self.len_bits += 1;
        self
    }

    /// Append whole bytes, eight bits each
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        for &byte in data {
            self.bits(u32::from(byte), 8);
        }
        self
    }

    /// Pad with zero bits to the next byte boundary
    pub fn align(&mut self) -> &mut Self {
        while self.len_bits % 8 != 0 {
            self.bit(false);
        }
        self
    }

    /// Append every bit of `other`
    pub fn append(&mut self, other: &Self) -> &mut Self {
        for i in 0..other.len_bits {
            self.bit((other.bytes[i / 8] >> (i % 8)) & 1 == 1);
        }
        self
    }

    /// Append the nibble-chain encoding of `value`
    ///
    /// Groups of 15 are written while the remainder is at least 15, then the
    /// remainder itself.
    pub fn nibbles(&mut self, mut value: u32) -> &mut Self {
        while value >= 15 {
            self.bits(15, 4);
            value -= 15;
        }
        self.bits(value, 4)
    }

    /// Number of bits written
    pub fn len_bits(&self) -> usize {
        self.len_bits
    }

    /// Nothing written yet
    pub fn is_empty(&self) -> bool {
        self.len_bits == 0
    }

    /// Written bits, the last byte zero-padded
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the writer
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
