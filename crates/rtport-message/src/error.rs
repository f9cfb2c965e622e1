//! Validation errors for MIDI message construction.

use thiserror::Error;

/// Which data byte of a short message failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataField {
    Data1,
    Data2,
}

impl std::fmt::Display for DataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataField::Data1 => f.write_str("data1"),
            DataField::Data2 => f.write_str("data2"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid status byte: {0:#04X}")]
    InvalidStatus(u8),

    #[error("status byte {status:#04X} requires {required} data bytes")]
    MissingData { status: u8, required: usize },

    #[error("{field} out of range: {value}")]
    DataOutOfRange { field: DataField, value: u8 },

    #[error("command out of range: {0:#04X}")]
    CommandOutOfRange(u8),

    #[error("channel out of range: {0}")]
    ChannelOutOfRange(u8),

    #[error("index {index} out of bounds for message of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("buffer of length {buffer} cannot hold message of length {len}")]
    BufferTooSmall { buffer: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ValidationError>;
