//! Binary prompt framing
//!
//! Linux-PAM binary messages (`PAM_BINARY_PROMPT`) use the libpamc layout:
//!
//! ```text
//! +----------------+---------+----------------+
//! | length: u32 BE | control | data           |
//! +----------------+---------+----------------+
//! ```
//!
//! where `length` counts the whole frame, header included.
//!
//! Native binary buffers carry no length of their own, so the header is the
//! only bound on a read. Both peers of a binary conversation must use this
//! framing; a peer that sends anything else makes the read undefined.

use crate::error::{ReturnCode, TransactionError};
use crate::ffi::sys::PAM_BP_MAX_LENGTH;
use thiserror::Error;

/// Length of the frame header (length + control byte)
pub const HEADER_LEN: usize = 5;

/// Malformed or oversized binary frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("binary prompt is null")]
    Null,
    #[error("binary prompt length {0} is shorter than its header")]
    TooShort(usize),
    #[error("binary prompt length {0} exceeds {max}", max = PAM_BP_MAX_LENGTH)]
    TooLong(usize),
    #[error("binary prompt truncated: header says {declared} bytes, got {actual}")]
    Truncated { declared: usize, actual: usize },
}

impl From<FramingError> for TransactionError {
    fn from(e: FramingError) -> Self {
        TransactionError::wrap(ReturnCode::ConvErr, e)
    }
}

/// One decoded binary message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryPrompt {
    control: u8,
    data: Vec<u8>,
}

impl BinaryPrompt {
    pub fn new(control: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            control,
            data: data.into(),
        }
    }

    /// Protocol-defined control byte
    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Total frame length, header included
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    /// Frame for the wire
    pub fn encode(&self) -> Result<Vec<u8>, FramingError> {
        let len = self.frame_len();
        if len > PAM_BP_MAX_LENGTH {
            return Err(FramingError::TooLong(len));
        }
        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(&(len as u32).to_be_bytes());
        frame.push(self.control);
        frame.extend_from_slice(&self.data);
        Ok(frame)
    }

    /// Parse one frame; bytes past the declared length are ignored
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        let declared = declared_len(bytes)?;
        if bytes.len() < declared {
            return Err(FramingError::Truncated {
                declared,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            control: bytes[4],
            data: bytes[HEADER_LEN..declared].to_vec(),
        })
    }

    /// Parse a frame owned by native code, trusting its length header
    ///
    /// The header is read and validated first; the payload is read only
    /// when its declared length is within bounds.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a libpamc frame: at least
    /// [`HEADER_LEN`] readable bytes, and at least as many as the header
    /// declares. Nothing here can check that a buffer from a peer that does
    /// not frame its messages is that long.
    pub(crate) unsafe fn from_native(ptr: *const u8) -> Result<Self, FramingError> {
        if ptr.is_null() {
            return Err(FramingError::Null);
        }
        let header = std::slice::from_raw_parts(ptr, HEADER_LEN);
        let declared = declared_len(header)?;
        Self::decode(std::slice::from_raw_parts(ptr, declared))
    }
}

fn declared_len(bytes: &[u8]) -> Result<usize, FramingError> {
    if bytes.len() < HEADER_LEN {
        return Err(FramingError::Truncated {
            declared: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if declared < HEADER_LEN {
        return Err(FramingError::TooShort(declared));
    }
    if declared > PAM_BP_MAX_LENGTH {
        return Err(FramingError::TooLong(declared));
    }
    Ok(declared)
}
