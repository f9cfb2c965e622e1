//! Serde support for `MidiMessage`.
//!
//! A message serializes as its logical bytes; capacity is not preserved.

use crate::message::MidiMessage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

impl Serialize for MidiMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.as_bytes())
    }
}

impl<'de> Deserialize<'de> for MidiMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        Ok(MidiMessage::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bincode_keeps_logical_bytes() {
        let mut msg = MidiMessage::with_capacity(32);
        msg.set_message(0xB3, 7, 127).unwrap();

        let encoded = bincode::serialize(&msg).unwrap();
        let decoded: MidiMessage = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.channel(), Some(3));
    }
}
