//! Entry point: backend selection, configuration and port enumeration.
//!
//! ```ignore
//! use rtport_io::{MidiSystem, ReadablePort};
//!
//! let midi = MidiSystem::builder().client_name("Sequencer").build()?;
//! for info in midi.readable_ports()? {
//!     println!("{info}");
//! }
//! let mut input = ReadablePort::builder(&midi).info(midi.readable_ports()?[0].clone()).build()?;
//! input.open("Sequencer In")?;
//! ```

mod builder;
mod config;

pub use builder::MidiSystemBuilder;
pub use config::MidiConfig;

use std::sync::Arc;

use crate::api::MidiApi;
use crate::error::{PortStateError, Result};
use crate::native::{InputDevice, MidiBackend, NativeHandle, OutputDevice};
use crate::port::{list_ports, CreateParams, PortInfo};

/// A backend plus the configuration ports inherit.
///
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct MidiSystem {
    inner: Arc<MidiSystemInner>,
}

pub(crate) struct MidiSystemInner {
    backend: Arc<dyn MidiBackend>,
    config: MidiConfig,
}

impl MidiSystem {
    pub fn builder() -> MidiSystemBuilder {
        MidiSystemBuilder::default()
    }

    pub fn config(&self) -> &MidiConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    /// True when the backend can create virtual ports and the configuration allows it.
    pub fn supports_virtual_ports(&self) -> bool {
        self.inner.config.allow_virtual_ports && self.inner.backend.supports_virtual_ports()
    }

    /// APIs the backend was built with, minus the disallowed ones.
    pub fn compiled_apis(&self) -> Vec<MidiApi> {
        self.inner
            .backend
            .compiled_apis()
            .into_iter()
            .filter(|api| self.is_allowed(*api))
            .collect()
    }

    /// Ports that can be read from, as seen right now.
    pub fn readable_ports(&self) -> Result<Vec<PortInfo>> {
        let mut handle =
            NativeHandle::<dyn InputDevice>::create(self.backend(), &CreateParams::default())?;
        let ports = list_ports(&mut handle);
        handle.free();
        ports
    }

    /// Ports that can be written to, as seen right now.
    pub fn writable_ports(&self) -> Result<Vec<PortInfo>> {
        let mut handle =
            NativeHandle::<dyn OutputDevice>::create(self.backend(), &CreateParams::default())?;
        let ports = list_ports(&mut handle);
        handle.free();
        ports
    }

    pub(crate) fn backend(&self) -> &dyn MidiBackend {
        self.inner.backend.as_ref()
    }

    pub(crate) fn check_api(&self, api: MidiApi) -> Result<()> {
        if self.is_allowed(api) {
            Ok(())
        } else {
            Err(PortStateError::ApiDisallowed(api).into())
        }
    }

    fn is_allowed(&self, api: MidiApi) -> bool {
        api != MidiApi::UnixJack || self.inner.config.allow_jack
    }
}

impl std::fmt::Debug for MidiSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiSystem")
            .field("backend", &self.backend_name())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{
        CallbackSlot, IgnoreFilter, NativeDevice, NativeResult, DEFAULT_QUEUE_SIZE,
    };
    use crate::port::{Direction, ReadablePort, WritablePort};

    /// Backend advertising JACK next to ALSA, without any ports.
    struct JackCapable;

    struct Idle(MidiApi);

    impl NativeDevice for Idle {
        fn current_api(&self) -> MidiApi {
            self.0
        }
        fn port_count(&mut self) -> NativeResult<usize> {
            Ok(0)
        }
        fn port_name(&mut self, index: usize) -> NativeResult<String> {
            Err(format!("no port {index}"))
        }
        fn open_port(&mut self, _: usize, _: &str) -> NativeResult<()> {
            Err("no ports".to_string())
        }
        fn open_virtual_port(&mut self, _: &str) -> NativeResult<()> {
            Ok(())
        }
        fn close_port(&mut self) -> NativeResult<()> {
            Ok(())
        }
    }

    impl InputDevice for Idle {
        unsafe fn set_callback(&mut self, _: CallbackSlot) -> NativeResult<()> {
            Ok(())
        }
        fn cancel_callback(&mut self) -> NativeResult<()> {
            Ok(())
        }
        fn ignore_types(&mut self, _: IgnoreFilter) -> NativeResult<()> {
            Ok(())
        }
        fn get_message(&mut self, _: &mut Vec<u8>) -> NativeResult<Option<f64>> {
            Ok(None)
        }
    }

    impl OutputDevice for Idle {
        fn send_message(&mut self, bytes: &[u8]) -> NativeResult<usize> {
            Ok(bytes.len())
        }
    }

    impl MidiBackend for JackCapable {
        fn name(&self) -> &'static str {
            "jack-capable"
        }
        fn compiled_apis(&self) -> Vec<MidiApi> {
            vec![MidiApi::LinuxAlsa, MidiApi::UnixJack]
        }
        fn supports_virtual_ports(&self) -> bool {
            true
        }
        fn create_input_default(&self) -> NativeResult<Box<dyn InputDevice>> {
            self.create_input(MidiApi::LinuxAlsa, "default", DEFAULT_QUEUE_SIZE)
        }
        fn create_input(
            &self,
            api: MidiApi,
            _: &str,
            _: usize,
        ) -> NativeResult<Box<dyn InputDevice>> {
            Ok(Box::new(Idle(api)))
        }
        fn create_output_default(&self) -> NativeResult<Box<dyn OutputDevice>> {
            self.create_output(MidiApi::LinuxAlsa, "default")
        }
        fn create_output(&self, api: MidiApi, _: &str) -> NativeResult<Box<dyn OutputDevice>> {
            Ok(Box::new(Idle(api)))
        }
    }

    #[test]
    fn test_jack_filtering() {
        let midi = MidiSystem::builder().backend(JackCapable).build().unwrap();
        assert_eq!(
            midi.compiled_apis(),
            vec![MidiApi::LinuxAlsa, MidiApi::UnixJack]
        );
        let port = ReadablePort::builder(&midi)
            .api(MidiApi::UnixJack)
            .build()
            .unwrap();
        assert_eq!(port.api(), Some(MidiApi::UnixJack));

        let midi = MidiSystem::builder()
            .backend(JackCapable)
            .disallow_jack(true)
            .build()
            .unwrap();
        assert_eq!(midi.compiled_apis(), vec![MidiApi::LinuxAlsa]);
        let err = WritablePort::builder(&midi)
            .api(MidiApi::UnixJack)
            .build()
            .unwrap_err();
        assert_eq!(
            err.port_state(),
            Some(&PortStateError::ApiDisallowed(MidiApi::UnixJack))
        );
    }

    #[test]
    fn test_enumeration() {
        let midi = MidiSystem::builder().loopback().build().unwrap();
        assert!(midi.readable_ports().unwrap().is_empty());

        let mut out = WritablePort::new(&midi).unwrap();
        out.open_virtual("Clock Source").unwrap();
        let mut input = ReadablePort::new(&midi).unwrap();
        input.open_virtual("Synth In").unwrap();

        assert_eq!(
            midi.readable_ports().unwrap(),
            vec![PortInfo::new("Clock Source", 0, Direction::Readable)]
        );
        assert_eq!(
            midi.writable_ports().unwrap(),
            vec![PortInfo::new("Synth In", 0, Direction::Writable)]
        );
    }

    #[test]
    fn test_virtual_ports_disallowed_by_config() {
        let midi = MidiSystem::builder()
            .loopback()
            .disallow_virtual_ports(true)
            .build()
            .unwrap();
        let mut port = ReadablePort::new(&midi).unwrap();
        let err = port.open_virtual("in").unwrap_err();
        assert_eq!(
            err.port_state(),
            Some(&PortStateError::VirtualPortsUnsupported {
                backend: "loopback"
            })
        );
        assert!(!port.is_open());
    }
}
