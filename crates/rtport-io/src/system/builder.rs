//! MidiSystem builder for choosing a backend and configuration.

use std::sync::Arc;

use crate::error::Result;
use crate::native::{LoopbackBackend, MidiBackend};

use super::{MidiConfig, MidiSystem, MidiSystemInner};

#[derive(Default)]
pub struct MidiSystemBuilder {
    pub(super) backend: Option<Arc<dyn MidiBackend>>,
    pub(super) config: MidiConfig,
}

impl MidiSystemBuilder {
    pub fn backend(mut self, backend: impl MidiBackend) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Uses a fresh in-process [`LoopbackBackend`].
    pub fn loopback(self) -> Self {
        self.backend(LoopbackBackend::new())
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: MidiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn disallow_virtual_ports(mut self, disallow: bool) -> Self {
        self.config.allow_virtual_ports = !disallow;
        self
    }

    pub fn disallow_jack(mut self, disallow: bool) -> Self {
        self.config.allow_jack = !disallow;
        self
    }

    pub fn queue_size(mut self, size: usize) -> Self {
        self.config.queue_size = size;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<MidiSystem> {
        let backend = self.backend.unwrap_or_else(default_backend);
        tracing::debug!(
            backend = backend.name(),
            virtual_ports = self.config.allow_virtual_ports,
            jack = self.config.allow_jack,
            "MIDI system built"
        );
        Ok(MidiSystem {
            inner: Arc::new(MidiSystemInner {
                backend,
                config: self.config,
            }),
        })
    }
}

#[cfg(feature = "midi-io")]
fn default_backend() -> Arc<dyn MidiBackend> {
    Arc::new(crate::native::MidirBackend::new())
}

#[cfg(not(feature = "midi-io"))]
fn default_backend() -> Arc<dyn MidiBackend> {
    Arc::new(LoopbackBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MidiApi;

    #[test]
    fn test_default_build() {
        let midi = MidiSystemBuilder::default().build().unwrap();
        assert_eq!(midi.config(), &MidiConfig::default());
        #[cfg(feature = "midi-io")]
        assert_eq!(midi.backend_name(), "midir");
        #[cfg(not(feature = "midi-io"))]
        assert_eq!(midi.backend_name(), "loopback");
    }

    #[test]
    fn test_build_with_options() {
        let midi = MidiSystemBuilder::default()
            .loopback()
            .disallow_virtual_ports(true)
            .queue_size(16)
            .client_name("Sequencer")
            .build()
            .unwrap();

        assert_eq!(midi.backend_name(), "loopback");
        assert!(!midi.supports_virtual_ports());
        assert_eq!(midi.config().queue_size, 16);
        assert_eq!(midi.config().client_name.as_deref(), Some("Sequencer"));
        assert_eq!(midi.compiled_apis(), vec![MidiApi::Dummy]);
    }

    #[test]
    fn test_config_then_override() {
        let config = MidiConfig {
            allow_jack: false,
            ..MidiConfig::default()
        };
        let midi = MidiSystemBuilder::default()
            .loopback()
            .config(config)
            .disallow_jack(false)
            .build()
            .unwrap();
        assert!(midi.config().allow_jack);
    }
}
