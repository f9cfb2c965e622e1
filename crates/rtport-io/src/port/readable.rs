//! MIDI input port.

use std::sync::Arc;

use rtport_message::MidiMessage;
use tracing::{debug, warn};

use super::bridge::{trampoline, Bridge, MidiMessageCallback};
use super::lifecycle::{PortCore, PortState};
use super::{CreateParams, PortInfo};
use crate::api::MidiApi;
use crate::error::{PortStateError, Result};
use crate::native::{CallbackSlot, IgnoreFilter, InputDevice};
use crate::system::MidiSystem;

/// A port MIDI messages are read from.
///
/// Messages arrive either through a registered callback, invoked on the
/// driver's thread, or by polling with [`poll_message`](Self::poll_message).
/// The two are mutually exclusive.
pub struct ReadablePort {
    core: PortCore<dyn InputDevice>,
    bridge: Arc<Bridge>,
    poll_buffer: Vec<u8>,
}

impl ReadablePort {
    pub fn builder(system: &MidiSystem) -> ReadablePortBuilder<'_> {
        ReadablePortBuilder {
            system,
            info: None,
            params: CreateParams::default(),
        }
    }

    /// A port without `PortInfo`, only able to open virtually.
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

    /// Number of native handles this port has created.
    pub fn generation(&self) -> u64 {
        self.core.generation()
    }

    /// `None` once destroyed.
    pub fn api(&self) -> Option<MidiApi> {
        self.core.api()
    }

    /// Opens the system port from this port's `PortInfo`; `port_name` names
    /// our end of the connection.
    pub fn open(&mut self, port_name: &str) -> Result<()> {
        self.core.open(port_name)
    }

    pub fn open_virtual(&mut self, port_name: &str) -> Result<()> {
        self.core.open_virtual(port_name)
    }

    /// Removes the callback, closes the port and starts a fresh native handle.
    pub fn close(&mut self) -> Result<()> {
        self.core.open_handle()?;
        self.deregister()?;
        self.core.close()
    }

    /// Tears the port down for good. A second call fails with
    /// [`PortStateError::Destroyed`].
    pub fn destroy(&mut self) -> Result<()> {
        if self.is_destroyed() {
            return Err(PortStateError::Destroyed.into());
        }
        let deregistered = self.deregister();
        let destroyed = self.core.destroy();
        self.bridge.clear();
        deregistered.and(destroyed)
    }

    /// Registers the one callback this port may have.
    ///
    /// Fails with [`PortStateError::CallbackRegistered`] while another is
    /// registered; call [`remove_callback`](Self::remove_callback) first.
    pub fn set_callback(&mut self, callback: impl MidiMessageCallback) -> Result<()> {
        let handle = self.core.handle()?;
        if self.bridge.is_registered() {
            return Err(PortStateError::CallbackRegistered.into());
        }

        self.bridge.install(Box::new(callback));
        // SAFETY: the bridge lives as long as this port, which frees its
        // native handle before dropping the bridge.
        let slot = unsafe { CallbackSlot::new(trampoline, self.bridge.user_data()) };
        if let Err(e) = handle.call("set_callback", |d| unsafe { d.set_callback(slot) }) {
            self.bridge.clear();
            return Err(e);
        }
        debug!(generation = self.core.generation(), "callback registered");
        Ok(())
    }

    /// No new callback invocation starts after this returns; one already
    /// running on the driver thread may still finish. No-op without a callback.
    pub fn remove_callback(&mut self) -> Result<()> {
        self.core.handle()?;
        self.deregister()
    }

    pub fn has_callback(&self) -> bool {
        self.bridge.is_registered()
    }

    /// Drops sysex, timing (clock and MTC) and active sensing messages
    /// before delivery. Applies to messages arriving from now on.
    pub fn ignore_types(&mut self, sysex: bool, timing: bool, active_sensing: bool) -> Result<()> {
        let filter = IgnoreFilter::new(sysex, timing, active_sensing);
        self.core
            .handle()?
            .call("ignore_types", |d| d.ignore_types(filter))
    }

    /// Moves the oldest queued message into `message` and returns its delta
    /// time. Returns `None`, leaving `message` untouched, when nothing is queued.
    pub fn poll_message(&mut self, message: &mut MidiMessage) -> Result<Option<f64>> {
        let handle = self.core.handle()?;
        if self.bridge.is_registered() {
            return Err(PortStateError::PollingWithCallback.into());
        }
        let buffer = &mut self.poll_buffer;
        let delta = handle.call("get_message", |d| d.get_message(buffer))?;
        if delta.is_some() {
            message.set_data(&self.poll_buffer);
        }
        Ok(delta)
    }

    /// Capacity of the callback scratch message. Only grows.
    pub fn message_capacity(&self) -> usize {
        self.bridge.capacity()
    }

    /// Copy of the last message delivered to the current callback.
    pub fn last_message(&self) -> Option<MidiMessage> {
        self.bridge.last_message()
    }

    /// Reads the last delivered message in place. Deliveries wait while `f` runs.
    pub fn with_last_message<R>(&self, f: impl FnOnce(&MidiMessage) -> R) -> Option<R> {
        self.bridge.with_last_message(f)
    }

    /// Native cancellation first, then the bridge state.
    fn deregister(&mut self) -> Result<()> {
        if !self.bridge.is_registered() {
            return Ok(());
        }
        self.core
            .handle()?
            .call("cancel_callback", |d| d.cancel_callback())?;
        self.bridge.clear();
        debug!(generation = self.core.generation(), "callback removed");
        Ok(())
    }
}

impl std::fmt::Debug for ReadablePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadablePort")
            .field("info", &self.info())
            .field("state", &self.state())
            .field("virtual", &self.is_virtual())
            .field("generation", &self.generation())
            .field("callback", &self.has_callback())
            .finish()
    }
}

impl Drop for ReadablePort {
    fn drop(&mut self) {
        if self.is_destroyed() {
            return;
        }
        if let Err(e) = self.destroy() {
            warn!(error = %e, "failed to tear down readable port on drop");
        }
    }
}

pub struct ReadablePortBuilder<'a> {
    system: &'a MidiSystem,
    info: Option<PortInfo>,
    params: CreateParams,
}

impl<'a> ReadablePortBuilder<'a> {
    /// The system port [`ReadablePort::open`] connects to.
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

    /// Capacity of the native queue used for polling.
    pub fn queue_size(mut self, size: usize) -> Self {
        self.params.queue_size = Some(size);
        self
    }

    pub fn build(self) -> Result<ReadablePort> {
        Ok(ReadablePort {
            core: PortCore::new(self.system, self.info, self.params)?,
            bridge: Bridge::new(),
            poll_buffer: Vec::with_capacity(rtport_message::DEFAULT_CAPACITY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::port::Direction;

    fn system() -> MidiSystem {
        MidiSystem::builder().loopback().build().unwrap()
    }

    #[test]
    fn test_new_port_is_created() {
        let port = ReadablePort::new(&system()).unwrap();
        assert_eq!(port.state(), PortState::Created);
        assert_eq!(port.generation(), 1);
        assert_eq!(port.api(), Some(MidiApi::Dummy));
        assert!(port.info().is_none());
        assert!(!port.has_callback());
        assert!(port.last_message().is_none());
    }

    #[test]
    fn test_open_without_info() {
        let mut port = ReadablePort::new(&system()).unwrap();
        let err = port.open("in").unwrap_err();
        assert_eq!(err.port_state(), Some(&PortStateError::MissingPortInfo));
        assert_eq!(port.state(), PortState::Created);
    }

    #[test]
    fn test_direction_mismatch() {
        let info = PortInfo::new("Out", 0, Direction::Writable);
        let err = ReadablePort::builder(&system()).info(info).build().unwrap_err();
        assert!(matches!(
            err,
            Error::PortState(PortStateError::DirectionMismatch { .. })
        ));
    }

    #[test]
    fn test_poll_with_callback_rejected() {
        let mut port = ReadablePort::new(&system()).unwrap();
        let mut msg = MidiMessage::new();
        assert_eq!(port.poll_message(&mut msg).unwrap(), None);

        port.set_callback(|_: &MidiMessage, _: f64| {}).unwrap();
        let err = port.poll_message(&mut msg).unwrap_err();
        assert_eq!(err.port_state(), Some(&PortStateError::PollingWithCallback));
    }

    #[test]
    fn test_remove_callback_without_one_is_noop() {
        let mut port = ReadablePort::new(&system()).unwrap();
        port.remove_callback().unwrap();
        assert!(!port.has_callback());
    }

    #[test]
    fn test_close_requires_open() {
        let mut port = ReadablePort::new(&system()).unwrap();
        port.set_callback(|_: &MidiMessage, _: f64| {}).unwrap();
        let err = port.close().unwrap_err();
        assert_eq!(err.port_state(), Some(&PortStateError::NotOpen));
        // Nothing was torn down.
        assert!(port.has_callback());
    }

    #[test]
    fn test_destroy_clears_callback() {
        let mut port = ReadablePort::new(&system()).unwrap();
        port.set_callback(|_: &MidiMessage, _: f64| {}).unwrap();
        port.destroy().unwrap();
        assert!(!port.has_callback());
        assert_eq!(port.api(), None);
        let err = port.destroy().unwrap_err();
        assert_eq!(err.port_state(), Some(&PortStateError::Destroyed));
    }
}
