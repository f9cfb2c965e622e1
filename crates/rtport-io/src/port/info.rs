use serde::{Deserialize, Serialize};

/// Which way messages flow through a port, seen from the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Messages are read from it (a MIDI input).
    Readable,
    /// Messages are written to it (a MIDI output).
    Writable,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Readable => f.write_str("readable"),
            Direction::Writable => f.write_str("writable"),
        }
    }
}

/// Description of a port found by enumeration.
///
/// Immutable: when a port's index shifts, a new `PortInfo` replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortInfo {
    name: String,
    number: usize,
    direction: Direction,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, number: usize, direction: Direction) -> Self {
        Self {
            name: name.into(),
            number,
            direction,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the port in the backend's enumeration at discovery time.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn with_number(&self, number: usize) -> Self {
        Self {
            name: self.name.clone(),
            number,
            direction: self.direction,
        }
    }
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({} #{})", self.name, self.direction, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_uses_all_fields() {
        let a = PortInfo::new("Synth", 0, Direction::Writable);
        assert_eq!(a, PortInfo::new("Synth", 0, Direction::Writable));
        assert_ne!(a, PortInfo::new("Synth", 1, Direction::Writable));
        assert_ne!(a, PortInfo::new("Synth", 0, Direction::Readable));
        assert_ne!(a, PortInfo::new("Keys", 0, Direction::Writable));
    }

    #[test]
    fn test_with_number_keeps_identity() {
        let a = PortInfo::new("Keys", 3, Direction::Readable);
        let b = a.with_number(1);
        assert_eq!(b.name(), "Keys");
        assert_eq!(b.number(), 1);
        assert_eq!(b.direction(), Direction::Readable);
        assert_eq!(a.number(), 3);
    }

    #[test]
    fn test_display() {
        let info = PortInfo::new("Keys", 3, Direction::Readable);
        assert_eq!(info.to_string(), "'Keys' (readable #3)");
    }

    #[test]
    fn test_serde_round_trip() {
        let info = PortInfo::new("Keys", 3, Direction::Readable);
        let bytes = bincode::serialize(&info).unwrap();
        let back: PortInfo = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, info);
    }
}
