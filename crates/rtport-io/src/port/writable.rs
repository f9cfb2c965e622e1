//! MIDI output port.

use rtport_message::{MidiMessage, DEFAULT_CAPACITY};
use tracing::warn;

use super::lifecycle::{PortCore, PortState};
use super::{CreateParams, PortInfo};
use crate::api::MidiApi;
use crate::error::Result;
use crate::native::OutputDevice;
use crate::system::MidiSystem;

/// A port MIDI messages are written to.
///
/// Outgoing bytes are staged in a buffer owned by the port, reused across
/// sends and grown only when a message is larger than any sent before.
pub struct WritablePort {
    core: PortCore<dyn OutputDevice>,
    staging: Vec<u8>,
    sent: bool,
}

impl WritablePort {
    pub fn builder(system: &MidiSystem) -> WritablePortBuilder<'_> {
        WritablePortBuilder {
            system,
            info: None,
            params: CreateParams::default(),
        }
    }

    pub fn new(system: &MidiSystem) -> Result<Self> {
        Self::builder(system).build()
    }

    pub fn info(&self) -> Option<&PortInfo> {
        self.core.info()
    }

    pub fn state(&self) -> PortState {
        self.core.state()
    }

    pub fn is_open(&self) -> bool {
        self.core.state() == PortState::Open
    }

    pub fn is_virtual(&self) -> bool {
        self.core.is_virtual()
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.state() == PortState::Destroyed
    }

    pub fn client_name(&self) -> Option<&str> {
        self.core.client_name()
    }

    pub fn generation(&self) -> u64 {
        self.core.generation()
    }

    pub fn api(&self) -> Option<MidiApi> {
        self.core.api()
    }

    pub fn open(&mut self, port_name: &str) -> Result<()> {
        self.core.open(port_name)
    }

    pub fn open_virtual(&mut self, port_name: &str) -> Result<()> {
        self.core.open_virtual(port_name)
    }

    pub fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.core.destroy()
    }

    /// Stages `bytes` and sends them as one message, returning the byte
    /// count the native layer reports.
    pub fn send_message(&mut self, bytes: &[u8]) -> Result<usize> {
        let handle = self.core.open_handle()?;

        self.staging.clear();
        if bytes.len() > self.staging.capacity() {
            self.staging.reserve_exact(bytes.len());
        }
        self.staging.extend_from_slice(bytes);

        let staged = &self.staging;
        let result = handle.call("send_message", |d| d.send_message(staged));
        self.sent = result.is_ok();
        result
    }

    pub fn send(&mut self, message: &MidiMessage) -> Result<usize> {
        self.send_message(message.as_bytes())
    }

    /// Bytes of the last send, if it succeeded.
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.then_some(self.staging.as_slice())
    }

    pub fn staging_capacity(&self) -> usize {
        self.staging.capacity()
    }
}

impl std::fmt::Debug for WritablePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritablePort")
            .field("info", &self.info())
            .field("state", &self.state())
            .field("virtual", &self.is_virtual())
            .field("generation", &self.generation())
            .finish()
    }
}

impl Drop for WritablePort {
    fn drop(&mut self) {
        if self.is_destroyed() {
            return;
        }
        if let Err(e) = self.destroy() {
            warn!(error = %e, "failed to tear down writable port on drop");
        }
    }
}

pub struct WritablePortBuilder<'a> {
    system: &'a MidiSystem,
    info: Option<PortInfo>,
    params: CreateParams,
}

impl<'a> WritablePortBuilder<'a> {
    pub fn info(mut self, info: PortInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.params.client_name = Some(name.into());
        self
    }

    pub fn api(mut self, api: MidiApi) -> Self {
        self.params.api = Some(api);
        self
    }

    pub fn build(self) -> Result<WritablePort> {
        Ok(WritablePort {
            core: PortCore::new(self.system, self.info, self.params)?,
            staging: Vec::with_capacity(DEFAULT_CAPACITY),
            sent: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortStateError;

    fn system() -> MidiSystem {
        MidiSystem::builder().loopback().build().unwrap()
    }

    #[test]
    fn test_send_requires_open() {
        let mut port = WritablePort::new(&system()).unwrap();
        let err = port.send_message(&[0x90, 60, 100]).unwrap_err();
        assert_eq!(err.port_state(), Some(&PortStateError::NotOpen));
        assert!(port.last_sent().is_none());
    }

    #[test]
    fn test_staging_grows_only_for_larger_messages() {
        let mut port = WritablePort::new(&system()).unwrap();
        port.open_virtual("out").unwrap();

        assert_eq!(port.send_message(&[0x90, 60, 100]).unwrap(), 3);
        assert_eq!(port.last_sent(), Some(&[0x90, 60, 100][..]));
        let small = port.staging_capacity();
        assert!(small >= 3);

        let mut sysex = vec![0xF0];
        sysex.extend(std::iter::repeat(0x01).take(62));
        sysex.push(0xF7);
        assert_eq!(port.send_message(&sysex).unwrap(), 64);
        let grown = port.staging_capacity();
        assert!(grown >= 64);

        port.send(&MidiMessage::from_bytes(&[0xFC])).unwrap();
        assert_eq!(port.staging_capacity(), grown);
        assert_eq!(port.last_sent(), Some(&[0xFC][..]));
    }

    #[test]
    fn test_failed_send_is_native_error() {
        let mut port = WritablePort::new(&system()).unwrap();
        port.open_virtual("out").unwrap();
        let err = port.send_message(&[]).unwrap_err();
        assert!(err.is_native());
        assert!(port.last_sent().is_none());
        assert!(port.is_open());
    }
}
