//! MIDI ports: lifecycle over a native handle, the inbound callback bridge
//! and the outbound staging buffer.

mod bridge;
mod info;
mod lifecycle;
mod readable;
mod writable;

pub use bridge::MidiMessageCallback;
pub use info::{Direction, PortInfo};
pub use lifecycle::PortState;
pub use readable::{ReadablePort, ReadablePortBuilder};
pub use writable::{WritablePort, WritablePortBuilder};

pub(crate) use lifecycle::list_ports;

use crate::api::MidiApi;
use crate::native::DEFAULT_QUEUE_SIZE;
use crate::system::MidiConfig;

/// Construction parameters, reused for every native handle a port creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CreateParams {
    pub(crate) api: Option<MidiApi>,
    pub(crate) client_name: Option<String>,
    pub(crate) queue_size: Option<usize>,
}

impl CreateParams {
    /// Nothing chosen: the backend's default factory applies.
    pub(crate) fn is_default(&self) -> bool {
        self.api.is_none() && self.client_name.is_none() && self.queue_size.is_none()
    }

    /// Fills unset fields from the system configuration.
    pub(crate) fn resolve(mut self, config: &MidiConfig, direction: Direction) -> Self {
        if self.client_name.is_none() {
            self.client_name.clone_from(&config.client_name);
        }
        match direction {
            Direction::Readable => {
                if self.queue_size.is_none() && config.queue_size != DEFAULT_QUEUE_SIZE {
                    self.queue_size = Some(config.queue_size);
                }
            }
            Direction::Writable => self.queue_size = None,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_stay_default() {
        let params = CreateParams::default().resolve(&MidiConfig::default(), Direction::Readable);
        assert!(params.is_default());
    }

    #[test]
    fn test_resolve_takes_config_values() {
        let config = MidiConfig {
            client_name: Some("Sequencer".to_string()),
            queue_size: 512,
            ..MidiConfig::default()
        };
        let params = CreateParams::default().resolve(&config, Direction::Readable);
        assert_eq!(params.client_name.as_deref(), Some("Sequencer"));
        assert_eq!(params.queue_size, Some(512));

        let params = CreateParams::default().resolve(&config, Direction::Writable);
        assert_eq!(params.queue_size, None);
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let config = MidiConfig {
            client_name: Some("Sequencer".to_string()),
            ..MidiConfig::default()
        };
        let params = CreateParams {
            client_name: Some("Mine".to_string()),
            queue_size: Some(8),
            ..CreateParams::default()
        }
        .resolve(&config, Direction::Readable);
        assert_eq!(params.client_name.as_deref(), Some("Mine"));
        assert_eq!(params.queue_size, Some(8));
    }
}
