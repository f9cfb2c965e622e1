use serde::{Deserialize, Serialize};

use crate::native::DEFAULT_QUEUE_SIZE;

/// Settings every port created from a [`MidiSystem`](super::MidiSystem) inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// When false, `open_virtual` fails even where the platform supports it.
    pub allow_virtual_ports: bool,
    /// When false, the JACK API is hidden and cannot be requested.
    pub allow_jack: bool,
    /// Input queue limit for polling.
    pub queue_size: usize,
    /// Client name for ports that do not set their own.
    pub client_name: Option<String>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            allow_virtual_ports: true,
            allow_jack: true,
            queue_size: DEFAULT_QUEUE_SIZE,
            client_name: None,
        }
    }
}
