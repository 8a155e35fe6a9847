//! Error taxonomy for asset decoding.
//!
//! A flat enum with a hand-written `Display`, no `thiserror`. Parsers
//! never panic on malformed input — every reject path returns
//! [`DecodeError`].

use std::fmt;

/// Why a [`DecodeError::InvalidFormat`] was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeReason {
    /// Read past the end of the supplied byte slice.
    UnexpectedEndOfStream,
    /// A bytecode opcode byte decoded to `op > 14`.
    BadOpcode(u8),
    /// A vertex-record's leading tag byte did not resolve to point, ellipse,
    /// or polygon in a way the caller expected.
    BadVertexRecord,
    /// The supplied buffer is smaller than the format's fixed header.
    FileTooSmall { expected_at_least: usize, actual: usize },
    /// `INS` byte 0 was neither 0 (melodic) nor 1 (percussion).
    BadInstrumentMode(u8),
    /// A `POL` palette table resolved to zero palettes.
    ZeroPalettes,
    /// `drawShapeScaleRotate` set both secondary rotation flags — rejected
    /// rather than silently mis-rendered.
    UnsupportedDualRotation,
    /// A `.MID` chunk header was not `MThd`/`MTrk`, or a track's event
    /// stream did not resolve to a recognised status byte.
    BadMidiChunk,
}

impl fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
            Self::BadOpcode(op) => write!(f, "bad opcode {op} (> 14)"),
            Self::BadVertexRecord => write!(f, "unresolvable vertex record"),
            Self::FileTooSmall {
                expected_at_least,
                actual,
            } => write!(
                f,
                "file too small: expected at least {expected_at_least} bytes, got {actual}"
            ),
            Self::BadInstrumentMode(mode) => {
                write!(f, "bad instrument mode {mode} (expected 0 or 1)")
            }
            Self::ZeroPalettes => write!(f, "palette table resolved to zero palettes"),
            Self::UnsupportedDualRotation => {
                write!(f, "drawShapeScaleRotate with both secondary angles is unsupported")
            }
            Self::BadMidiChunk => write!(f, "malformed MIDI chunk header or event stream"),
        }
    }
}

/// Errors that can occur while decoding a CMD, POL, PRF, or INS asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte stream does not conform to the expected layout.
    InvalidFormat(DecodeReason),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(reason) => write!(f, "invalid format: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    pub fn invalid(reason: DecodeReason) -> Self {
        Self::InvalidFormat(reason)
    }
}

/// Programmer-error invariant violations.
///
/// Debug builds panic via [`CoreInvariantViolated::assert`]; release builds
/// should clamp at the call site instead of constructing this at all — the
/// type exists so callers have a concrete value to log before clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInvariantViolated(pub String);

impl fmt::Display for CoreInvariantViolated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core invariant violated: {}", self.0)
    }
}

impl std::error::Error for CoreInvariantViolated {}

impl CoreInvariantViolated {
    /// Panics in debug builds; in release builds, logs and returns so the
    /// caller can clamp instead of aborting playback.
    pub fn report(msg: impl Into<String>) -> Self {
        let err = Self(msg.into());
        debug_assert!(false, "{err}");
        err
    }
}
