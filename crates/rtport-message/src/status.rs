//! Status-byte constants and the status → data-length table.
//!
//! Channel voice commands are upper-nibble values; OR in the channel to get
//! the status byte. System messages are complete status bytes.

use crate::error::{Result, ValidationError};

// System common

/// MIDI Time Code Quarter Frame (0xF1).
pub const MIDI_TIME_CODE: u8 = 0xF1;
/// Song Position Pointer (0xF2).
pub const SONG_POSITION_POINTER: u8 = 0xF2;
/// Song Select (0xF3).
pub const SONG_SELECT: u8 = 0xF3;
/// Tune Request (0xF6).
pub const TUNE_REQUEST: u8 = 0xF6;
/// End of System Exclusive (0xF7).
pub const END_OF_EXCLUSIVE: u8 = 0xF7;

// System real-time

/// Timing Clock (0xF8).
pub const TIMING_CLOCK: u8 = 0xF8;
/// Start (0xFA).
pub const START: u8 = 0xFA;
/// Continue (0xFB).
pub const CONTINUE: u8 = 0xFB;
/// Stop (0xFC).
pub const STOP: u8 = 0xFC;
/// Active Sensing (0xFE).
pub const ACTIVE_SENSING: u8 = 0xFE;
/// System Reset (0xFF).
pub const SYSTEM_RESET: u8 = 0xFF;

/// Start of System Exclusive (0xF0). Not a short message, never valid in the table.
pub const SYSTEM_EXCLUSIVE: u8 = 0xF0;

// Undefined real-time codes that still carry no data.
const UNDEFINED_F9: u8 = 0xF9;
const UNDEFINED_FD: u8 = 0xFD;

// Channel voice (upper nibble)

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
/// Polyphonic Key Pressure (aftertouch).
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
/// Channel Pressure (aftertouch).
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

/// Number of data bytes a short message with this status byte carries.
///
/// Fails with [`ValidationError::InvalidStatus`] for data bytes (`< 0x80`),
/// SysEx start and the undefined system common codes.
pub fn data_length(status: u8) -> Result<usize> {
    match status {
        TUNE_REQUEST | END_OF_EXCLUSIVE | TIMING_CLOCK | UNDEFINED_F9 | START | CONTINUE
        | STOP | UNDEFINED_FD | ACTIVE_SENSING | SYSTEM_RESET => return Ok(0),
        MIDI_TIME_CODE | SONG_SELECT => return Ok(1),
        SONG_POSITION_POINTER => return Ok(2),
        _ => {}
    }

    match status & 0xF0 {
        NOTE_OFF | NOTE_ON | POLY_PRESSURE | CONTROL_CHANGE | PITCH_BEND => Ok(2),
        PROGRAM_CHANGE | CHANNEL_PRESSURE => Ok(1),
        _ => Err(ValidationError::InvalidStatus(status)),
    }
}

/// True for channel voice statuses (`0x80..=0xEF`).
#[inline]
pub fn is_channel_voice(status: u8) -> bool {
    (0x80..0xF0).contains(&status)
}
