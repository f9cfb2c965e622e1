//! Backend API selector.

use serde::{Deserialize, Serialize};

/// The platform MIDI API a native handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MidiApi {
    /// Let the backend pick.
    #[default]
    Unspecified,
    MacOsxCore,
    LinuxAlsa,
    UnixJack,
    WindowsMm,
    /// In-process stand-in with no OS devices.
    Dummy,
}

impl MidiApi {
    pub const ALL: [MidiApi; 6] = [
        MidiApi::Unspecified,
        MidiApi::MacOsxCore,
        MidiApi::LinuxAlsa,
        MidiApi::UnixJack,
        MidiApi::WindowsMm,
        MidiApi::Dummy,
    ];

    /// Short identifier, stable across releases.
    pub fn name(self) -> &'static str {
        match self {
            MidiApi::Unspecified => "unspecified",
            MidiApi::MacOsxCore => "core",
            MidiApi::LinuxAlsa => "alsa",
            MidiApi::UnixJack => "jack",
            MidiApi::WindowsMm => "winmm",
            MidiApi::Dummy => "dummy",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MidiApi::Unspecified => "Unknown",
            MidiApi::MacOsxCore => "CoreMidi",
            MidiApi::LinuxAlsa => "ALSA",
            MidiApi::UnixJack => "Jack",
            MidiApi::WindowsMm => "Windows MultiMedia",
            MidiApi::Dummy => "Dummy",
        }
    }

    pub fn number(self) -> u32 {
        match self {
            MidiApi::Unspecified => 0,
            MidiApi::MacOsxCore => 1,
            MidiApi::LinuxAlsa => 2,
            MidiApi::UnixJack => 3,
            MidiApi::WindowsMm => 4,
            MidiApi::Dummy => 5,
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|api| api.number() == number)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|api| api.name() == name)
    }
}

impl std::fmt::Display for MidiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_round_trip() {
        for api in MidiApi::ALL {
            assert_eq!(MidiApi::from_number(api.number()), Some(api));
            assert_eq!(MidiApi::from_name(api.name()), Some(api));
        }
        assert_eq!(MidiApi::from_number(42), None);
        assert_eq!(MidiApi::from_name("coreaudio"), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(MidiApi::LinuxAlsa.name(), "alsa");
        assert_eq!(MidiApi::WindowsMm.to_string(), "Windows MultiMedia");
        assert_eq!(MidiApi::default(), MidiApi::Unspecified);
    }
}
