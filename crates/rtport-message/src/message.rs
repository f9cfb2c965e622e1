//! Growable raw MIDI message buffer.

use crate::error::{DataField, Result, ValidationError};
use crate::status;

/// Capacity of a fresh message: the size of the vast majority of MIDI messages.
pub const DEFAULT_CAPACITY: usize = 3;

/// Raw MIDI bytes with MIDI-aware accessors.
///
/// The logical length (`len`) never exceeds the capacity, and the capacity
/// only grows: shrinking the logical length keeps the allocation so the
/// buffer can be refilled without reallocating. Equality and hashing look at
/// the logical bytes only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    data: Vec<u8>,
}

impl MidiMessage {
    /// Empty message with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Message of `size` zero bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.data.iter()
    }

    /// Sets the logical length. New bytes are zero; shrinking keeps the capacity.
    pub fn set_size(&mut self, size: usize) {
        if size > self.data.len() {
            self.data.resize(size, 0);
        } else {
            self.data.truncate(size);
        }
    }

    /// Replaces the contents with `bytes`.
    ///
    /// Allocates only when `bytes` is longer than the current capacity, and
    /// then grows to exactly `bytes.len()`.
    #[inline]
    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data.clear();
        if bytes.len() > self.data.capacity() {
            self.data.reserve_exact(bytes.len());
        }
        self.data.extend_from_slice(bytes);
    }

    /// Copies the logical bytes into `buffer`, returning how many were written.
    pub fn copy_into(&self, buffer: &mut [u8]) -> Result<usize> {
        let len = self.data.len();
        if buffer.len() < len {
            return Err(ValidationError::BufferTooSmall {
                buffer: buffer.len(),
                len,
            });
        }
        buffer[..len].copy_from_slice(&self.data);
        Ok(len)
    }

    pub fn get(&self, index: usize) -> Result<u8> {
        self.data
            .get(index)
            .copied()
            .ok_or(ValidationError::IndexOutOfBounds {
                index,
                len: self.data.len(),
            })
    }

    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// First byte as sent on the wire, unmasked.
    #[inline]
    pub fn status_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// First byte masked with `0xF0`.
    #[inline]
    pub fn status(&self) -> Option<u8> {
        self.status_byte().map(|b| b & 0xF0)
    }

    /// Same as [`status`](Self::status): the channel voice command nibble.
    #[inline]
    pub fn command(&self) -> Option<u8> {
        self.status()
    }

    /// First byte masked with `0x0F`.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        self.status_byte().map(|b| b & 0x0F)
    }

    #[inline]
    pub fn data1(&self) -> Option<u8> {
        self.data.get(1).copied()
    }

    #[inline]
    pub fn data2(&self) -> Option<u8> {
        self.data.get(2).copied()
    }

    /// Sets a message that carries no data bytes (Start, Stop, Tune Request...).
    pub fn set_status_message(&mut self, status: u8) -> Result<()> {
        let required = status::data_length(status)?;
        if required != 0 {
            return Err(ValidationError::MissingData { status, required });
        }
        self.write_short(status, 0, 0, 0);
        Ok(())
    }

    /// Sets a message of one or two data bytes.
    ///
    /// Only the data bytes the status requires are validated and stored, so
    /// `set_message(SONG_SELECT, 5, 0)` yields the two-byte message `[0xF3, 5]`.
    pub fn set_message(&mut self, status: u8, data1: u8, data2: u8) -> Result<()> {
        let required = status::data_length(status)?;
        if required > 0 && data1 > 0x7F {
            return Err(ValidationError::DataOutOfRange {
                field: DataField::Data1,
                value: data1,
            });
        }
        if required > 1 && data2 > 0x7F {
            return Err(ValidationError::DataOutOfRange {
                field: DataField::Data2,
                value: data2,
            });
        }
        self.write_short(status, data1, data2, required);
        Ok(())
    }

    /// Sets a channel voice message from its command nibble and channel.
    pub fn set_channel_message(
        &mut self,
        command: u8,
        channel: u8,
        data1: u8,
        data2: u8,
    ) -> Result<()> {
        if !status::is_channel_voice(command) {
            return Err(ValidationError::CommandOutOfRange(command));
        }
        if channel > 0x0F {
            return Err(ValidationError::ChannelOutOfRange(channel));
        }
        self.set_message((command & 0xF0) | channel, data1, data2)
    }

    fn write_short(&mut self, status: u8, data1: u8, data2: u8, data_len: usize) {
        self.data.clear();
        self.data.push(status);
        if data_len > 0 {
            self.data.push(data1);
        }
        if data_len > 1 {
            self.data.push(data2);
        }
    }

    /// Parses the bytes as a live (non-file) MIDI event.
    pub fn live_event(&self) -> Option<midly::live::LiveEvent<'_>> {
        midly::live::LiveEvent::parse(&self.data).ok()
    }
}

impl Default for MidiMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for MidiMessage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<&[u8]> for MidiMessage {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for MidiMessage {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl<'a> IntoIterator for &'a MidiMessage {
    type Item = &'a u8;
    type IntoIter = std::slice::Iter<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl std::fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MidiMessage: [")?;
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{byte}")?;
        }
        f.write_str("]")
    }
}

impl std::fmt::Debug for MidiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiMessage")
            .field("data", &format_args!("{:02X?}", self.data))
            .field("capacity", &self.data.capacity())
            .finish()
    }
}
