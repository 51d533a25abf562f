//! Pose Frame Protocol
//!
//! Wire format for position updates sent to the peer.

use crate::domain::models::PoseSample;
use crate::error::EncodingError;

pub use crate::domain::models::{ByteOrder, DEFAULT_SERVICE_UUID};

/// Bytes per frame: three f32 components
pub const FRAME_LEN: usize = 12;

impl ByteOrder {
    fn put(self, value: f32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    fn get(self, bytes: [u8; 4]) -> f32 {
        match self {
            Self::Little => f32::from_le_bytes(bytes),
            Self::Big => f32::from_be_bytes(bytes),
        }
    }
}

/// One encoded position update.
///
/// # Frame Structure (12 bytes)
///
/// ```text
/// [0-3]   : X (f32)
/// [4-7]   : Y (f32)
/// [8-11]  : Z (f32)
/// ```
///
/// No header, length prefix or checksum. Orientation is not carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Wrap bytes received from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| EncodingError::Length {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    /// Read the three components back using `order`.
    pub fn position(&self, order: ByteOrder) -> [f32; 3] {
        let b = &self.0;
        [
            order.get([b[0], b[1], b[2], b[3]]),
            order.get([b[4], b[5], b[6], b[7]]),
            order.get([b[8], b[9], b[10], b[11]]),
        ]
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Turns pose samples into frames using a fixed byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEncoder {
    order: ByteOrder,
}

impl FrameEncoder {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Narrow each position component to f32 and lay them out at 0/4/8.
    ///
    /// NaN and infinities keep their f32 bit pattern.
    pub fn encode(&self, sample: &PoseSample) -> Frame {
        let mut bytes = [0u8; FRAME_LEN];
        for (chunk, component) in bytes.chunks_exact_mut(4).zip(sample.position) {
            chunk.copy_from_slice(&self.order.put(component as f32));
        }
        Frame(bytes)
    }
}

/// Little-endian encoding of `sample`.
pub fn encode(sample: &PoseSample) -> Frame {
    FrameEncoder::default().encode(sample)
}
