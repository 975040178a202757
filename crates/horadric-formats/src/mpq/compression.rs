//! Sector decompression
//!
//! A compressed sector starts with a method mask byte naming every method
//! that was applied. Decompression undoes them one at a time in a configured
//! [`DecompressionOrder`]. Method bodies are [`SectorCodec`] implementations
//! held in a [`CodecRegistry`]; only zlib ships with this crate, the host
//! registers the rest.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use thiserror::Error;
use tracing::trace;

use crate::error::ErrorKind;

/// A compression method selectable by the sector mask byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Huffman coding, used for WAVE data
    Huffman,
    /// zlib deflate
    Zlib,
    /// PKWARE Data Compression Library implode
    Pkware,
    /// bzip2
    Bzip2,
    /// IMA ADPCM, one channel
    AdpcmMono,
    /// IMA ADPCM, two channels
    AdpcmStereo,
}

impl CompressionMethod {
    /// Every method, in mask bit order
    pub const ALL: [Self; 6] = [
        Self::Huffman,
        Self::Zlib,
        Self::Pkware,
        Self::Bzip2,
        Self::AdpcmMono,
        Self::AdpcmStereo,
    ];

    /// Bit of this method in the mask byte
    pub fn mask_bit(self) -> u8 {
        match self {
            Self::Huffman => 0x01,
            Self::Zlib => 0x02,
            Self::Pkware => 0x08,
            Self::Bzip2 => 0x10,
            Self::AdpcmMono => 0x40,
            Self::AdpcmStereo => 0x80,
        }
    }

    /// All mask bits this crate knows about
    pub fn known_mask() -> u8 {
        Self::ALL.iter().fold(0, |mask, m| mask | m.mask_bit())
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Huffman => "huffman",
            Self::Zlib => "zlib",
            Self::Pkware => "pkware",
            Self::Bzip2 => "bzip2",
            Self::AdpcmMono => "adpcm-mono",
            Self::AdpcmStereo => "adpcm-stereo",
        };
        f.write_str(name)
    }
}

/// Sector codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec is registered for a method the sector uses
    #[error("no codec registered for {0}")]
    Unsupported(CompressionMethod),

    /// The mask byte has bits no method is assigned to
    #[error("unknown compression mask bits 0x{0:02X}")]
    UnknownMethods(u8),

    /// A compressed sector without even the mask byte
    #[error("compressed sector is empty")]
    EmptySector,

    /// The expanded sector has the wrong length
    #[error("sector expanded to {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Expected length
        expected: usize,
        /// Produced length
        actual: usize,
    },

    /// A codec rejected its input
    #[error("{method} decompression failed: {reason}")]
    Failed {
        /// Method that failed
        method: CompressionMethod,
        /// Codec-provided reason
        reason: String,
    },
}

impl CodecError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DecompressionFailed
    }
}

/// One decompression method
///
/// `max_len` is the length of the final sector; a codec must not produce
/// more than that.
pub trait SectorCodec: Send + Sync {
    /// Method this codec implements
    fn method(&self) -> CompressionMethod;

    /// Expand `input`
    fn decompress(&self, input: &[u8], max_len: usize) -> Result<Vec<u8>, CodecError>;
}

/// zlib codec backed by flate2
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl SectorCodec for ZlibCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zlib
    }

    fn decompress(&self, input: &[u8], max_len: usize) -> Result<Vec<u8>, CodecError> {
        // max_len is untrusted, the reader grows the buffer
        let mut output = Vec::with_capacity(max_len.min(input.len().saturating_mul(4)));
        ZlibDecoder::new(input)
            .take((max_len as u64).saturating_add(1))
            .read_to_end(&mut output)
            .map_err(|e| CodecError::Failed {
                method: CompressionMethod::Zlib,
                reason: e.to_string(),
            })?;

        if output.len() > max_len {
            return Err(CodecError::SizeMismatch {
                expected: max_len,
                actual: output.len(),
            });
        }
        Ok(output)
    }
}

/// Order in which the methods of a multi-method sector are undone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressionOrder(Vec<CompressionMethod>);

impl DecompressionOrder {
    /// Custom order; methods not listed are treated as unknown
    pub fn new(methods: Vec<CompressionMethod>) -> Self {
        Self(methods)
    }

    /// Methods, first applied first
    pub fn methods(&self) -> &[CompressionMethod] {
        &self.0
    }
}

impl Default for DecompressionOrder {
    /// The reverse of the order the archiver compresses in
    fn default() -> Self {
        Self(vec![
            CompressionMethod::Bzip2,
            CompressionMethod::Pkware,
            CompressionMethod::Zlib,
            CompressionMethod::Huffman,
            CompressionMethod::AdpcmStereo,
            CompressionMethod::AdpcmMono,
        ])
    }
}

/// Registered codecs and the order they are applied in
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<CompressionMethod, Arc<dyn SectorCodec>>,
    order: DecompressionOrder,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.codecs.keys().map(ToString::to_string).collect();
        methods.sort();
        f.debug_struct("CodecRegistry")
            .field("codecs", &methods)
            .field("order", &self.order)
            .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::empty().with_codec(Arc::new(ZlibCodec))
    }
}

impl CodecRegistry {
    /// Registry with no codecs at all
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
            order: DecompressionOrder::default(),
        }
    }

    /// Add a codec, returning the one it replaces
    pub fn register(&mut self, codec: Arc<dyn SectorCodec>) -> Option<Arc<dyn SectorCodec>> {
        self.codecs.insert(codec.method(), codec)
    }

    /// Add a codec
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn SectorCodec>) -> Self {
        self.register(codec);
        self
    }

    /// Replace the decompression order
    #[must_use]
    pub fn with_order(mut self, order: DecompressionOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether a codec is registered for `method`
    pub fn supports(&self, method: CompressionMethod) -> bool {
        self.codecs.contains_key(&method)
    }

    /// The active decompression order
    pub fn order(&self) -> &DecompressionOrder {
        &self.order
    }

    /// Expand a sector stored with the COMPRESS flag
    ///
    /// The first byte is the method mask; the rest is the payload.
    pub fn decompress_masked(
        &self,
        sector: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let (&mask, payload) = sector.split_first().ok_or(CodecError::EmptySector)?;

        let ordered = self
            .order
            .methods()
            .iter()
            .fold(0u8, |bits, m| bits | m.mask_bit());
        let unknown = mask & !ordered;
        if unknown != 0 {
            return Err(CodecError::UnknownMethods(unknown));
        }

        let mut data = payload.to_vec();
        for &method in self.order.methods() {
            if mask & method.mask_bit() == 0 {
                continue;
            }
            let codec = self
                .codecs
                .get(&method)
                .ok_or(CodecError::Unsupported(method))?;
            trace!("Applying {} to {} bytes", method, data.len());
            data = codec.decompress(&data, expected_len)?;
        }

        check_len(data, expected_len)
    }

    /// Expand a sector stored with the IMPLODE flag (PKWARE, no mask byte)
    pub fn decompress_imploded(
        &self,
        sector: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .codecs
            .get(&CompressionMethod::Pkware)
            .ok_or(CodecError::Unsupported(CompressionMethod::Pkware))?;
        check_len(codec.decompress(sector, expected_len)?, expected_len)
    }
}

fn check_len(data: Vec<u8>, expected: usize) -> Result<Vec<u8>, CodecError> {
    if data.len() == expected {
        Ok(data)
    } else {
        Err(CodecError::SizeMismatch {
            expected,
            actual: data.len(),
        })
    }
}
