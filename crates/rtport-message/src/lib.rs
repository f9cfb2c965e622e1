//! Raw MIDI message type for rtport.
//!
//! [`MidiMessage`] is a reusable byte buffer with MIDI accessors and a
//! validator for short messages built from status and data bytes. The
//! [`status`] module holds the status-byte constants and the table of how
//! many data bytes each status carries.
//!
//! # Example
//!
//! ```
//! use rtport_message::{status, MidiMessage};
//!
//! let mut msg = MidiMessage::new();
//! msg.set_channel_message(status::NOTE_ON, 0, 69, 100)?;
//! assert_eq!(msg.as_bytes(), &[0x90, 69, 100]);
//! # Ok::<(), rtport_message::ValidationError>(())
//! ```

pub mod error;
pub use error::{DataField, Result, ValidationError};

mod message;
pub use message::{MidiMessage, DEFAULT_CAPACITY};

pub mod status;

#[cfg(feature = "serde")]
mod serde_support;
