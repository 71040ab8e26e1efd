//! Error types for voxmouse
//!
//! Uses thiserror for ergonomic error definitions. Most failures in this
//! daemon are deliberately non-fatal: a bad audio frame is dropped, a dead
//! client is removed, an unreadable cache file is a cache miss. Only failing
//! to bind the listening socket aborts startup.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the voxmouse daemon
#[derive(Error, Debug)]
pub enum VoxmouseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to device sessions and output reports
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no live session for device handle {0}")]
    UnknownHandle(u64),

    #[error("failed to send output report to device {handle}: {reason}")]
    ReportFailed { handle: u64, reason: String },
}

/// Errors from the mSBC frame decoder. A codec error drops the offending
/// frame; decoder state is kept so the next frame decodes independently.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame too short: {0} bytes, need 57")]
    TooShort(usize),

    #[error("bad syncword {0:#04x}, expected 0xad")]
    BadSync(u8),

    #[error("header CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch { expected: u8, actual: u8 },

    #[error("frame payload exhausted mid-decode")]
    Truncated,
}

/// Errors related to the TCP broadcast server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("event serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from the cached-identifier file. Callers log these and carry on
/// as if the cache were empty.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias using VoxmouseError
pub type Result<T> = std::result::Result<T, VoxmouseError>;
