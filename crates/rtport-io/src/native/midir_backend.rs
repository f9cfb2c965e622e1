//! OS MIDI devices through midir.
//!
//! midir is always asked for every message class; the ignore filter and
//! the callback/poll split run in our own closure so they can change while
//! a connection is open.

#[cfg(unix)]
use midir::os::unix::{VirtualInput, VirtualOutput};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::delivery::{Dispatch, Dispatcher};
use super::{
    CallbackSlot, IgnoreFilter, InputDevice, MidiBackend, NativeDevice, NativeResult,
    OutputDevice, PollQueue, DEFAULT_INPUT_CLIENT, DEFAULT_OUTPUT_CLIENT, DEFAULT_QUEUE_SIZE,
};
use crate::api::MidiApi;

/// The API midir is built against on this platform.
fn platform_api() -> MidiApi {
    if cfg!(target_os = "macos") {
        MidiApi::MacOsxCore
    } else if cfg!(target_os = "windows") {
        MidiApi::WindowsMm
    } else if cfg!(target_os = "linux") {
        MidiApi::LinuxAlsa
    } else {
        MidiApi::Unspecified
    }
}

fn check_api(api: MidiApi) -> NativeResult<()> {
    if api == MidiApi::Unspecified || api == platform_api() {
        Ok(())
    } else {
        Err(format!("{api} is not compiled into the midir backend"))
    }
}

fn invalid_index(index: usize, count: usize) -> String {
    format!("invalid port index {index}, {count} ports available")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MidirBackend;

impl MidirBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MidiBackend for MidirBackend {
    fn name(&self) -> &'static str {
        "midir"
    }

    fn compiled_apis(&self) -> Vec<MidiApi> {
        vec![platform_api()]
    }

    fn supports_virtual_ports(&self) -> bool {
        cfg!(unix)
    }

    fn create_input_default(&self) -> NativeResult<Box<dyn InputDevice>> {
        self.create_input(MidiApi::Unspecified, DEFAULT_INPUT_CLIENT, DEFAULT_QUEUE_SIZE)
    }

    fn create_input(
        &self,
        api: MidiApi,
        client_name: &str,
        queue_size: usize,
    ) -> NativeResult<Box<dyn InputDevice>> {
        check_api(api)?;
        let input = new_input(client_name)?;
        Ok(Box::new(MidirInput {
            client_name: client_name.to_string(),
            state: InputState::Idle(input),
            queue: PollQueue::new(queue_size),
        }))
    }

    fn create_output_default(&self) -> NativeResult<Box<dyn OutputDevice>> {
        self.create_output(MidiApi::Unspecified, DEFAULT_OUTPUT_CLIENT)
    }

    fn create_output(
        &self,
        api: MidiApi,
        client_name: &str,
    ) -> NativeResult<Box<dyn OutputDevice>> {
        check_api(api)?;
        let output = MidiOutput::new(client_name).map_err(|e| e.to_string())?;
        Ok(Box::new(MidirOutput {
            client_name: client_name.to_string(),
            state: OutputState::Idle(output),
        }))
    }
}

fn new_input(client_name: &str) -> NativeResult<MidiInput> {
    let mut input = MidiInput::new(client_name).map_err(|e| e.to_string())?;
    input.ignore(Ignore::None);
    Ok(input)
}

/// Connection data owned by midir's callback thread.
struct InputContext {
    dispatcher: Dispatcher,
    last_stamp: Option<u64>,
}

impl InputContext {
    fn deliver(&mut self, stamp: u64, bytes: &[u8]) {
        // midir stamps are microseconds from an arbitrary origin.
        let delta = self
            .last_stamp
            .map_or(0.0, |last| stamp.saturating_sub(last) as f64 / 1_000_000.0);
        match self.dispatcher.dispatch(delta, bytes) {
            Dispatch::Delivered | Dispatch::Queued => self.last_stamp = Some(stamp),
            Dispatch::Filtered | Dispatch::Dropped => {}
        }
    }
}

enum InputState {
    Idle(MidiInput),
    Connected(MidiInputConnection<InputContext>),
    /// Transient while a connection attempt owns the `MidiInput`.
    Vacant,
}

struct MidirInput {
    client_name: String,
    state: InputState,
    queue: PollQueue,
}

impl MidirInput {
    fn take_idle(&mut self) -> NativeResult<MidiInput> {
        match std::mem::replace(&mut self.state, InputState::Vacant) {
            InputState::Idle(input) => Ok(input),
            InputState::Vacant => new_input(&self.client_name),
            connected @ InputState::Connected(_) => {
                self.state = connected;
                Err("input is already open".to_string())
            }
        }
    }

    fn with_input<R>(&self, f: impl FnOnce(&MidiInput) -> NativeResult<R>) -> NativeResult<R> {
        match &self.state {
            InputState::Idle(input) => f(input),
            // A connected MidiInput is owned by the connection; enumerate
            // through a fresh client instead.
            _ => f(&new_input(&self.client_name)?),
        }
    }

    fn connect(
        &mut self,
        input: MidiInput,
        connect: impl FnOnce(
            MidiInput,
            InputContext,
        ) -> Result<MidiInputConnection<InputContext>, midir::ConnectError<MidiInput>>,
    ) -> NativeResult<()> {
        let Some(dispatcher) = self.queue.take_dispatcher() else {
            self.state = InputState::Idle(input);
            return Err("input queue is in use".to_string());
        };
        let context = InputContext {
            dispatcher,
            last_stamp: None,
        };
        match connect(input, context) {
            Ok(connection) => {
                self.state = InputState::Connected(connection);
                Ok(())
            }
            Err(e) => {
                let diagnostic = e.to_string();
                self.state = InputState::Idle(e.into_inner());
                self.queue.rebuild();
                Err(diagnostic)
            }
        }
    }
}

impl NativeDevice for MidirInput {
    fn current_api(&self) -> MidiApi {
        platform_api()
    }

    fn port_count(&mut self) -> NativeResult<usize> {
        self.with_input(|input| Ok(input.port_count()))
    }

    fn port_name(&mut self, index: usize) -> NativeResult<String> {
        self.with_input(|input| {
            let ports = input.ports();
            let port = ports
                .get(index)
                .ok_or_else(|| invalid_index(index, ports.len()))?;
            input.port_name(port).map_err(|e| e.to_string())
        })
    }

    fn open_port(&mut self, index: usize, name: &str) -> NativeResult<()> {
        let input = self.take_idle()?;
        let ports = input.ports();
        let Some(port) = ports.get(index).cloned() else {
            self.state = InputState::Idle(input);
            return Err(invalid_index(index, ports.len()));
        };
        self.connect(input, |input, context| {
            input.connect(
                &port,
                name,
                |stamp, bytes, context: &mut InputContext| context.deliver(stamp, bytes),
                context,
            )
        })
    }

    #[cfg(unix)]
    fn open_virtual_port(&mut self, name: &str) -> NativeResult<()> {
        let input = self.take_idle()?;
        self.connect(input, |input, context| {
            input.create_virtual(
                name,
                |stamp, bytes, context: &mut InputContext| context.deliver(stamp, bytes),
                context,
            )
        })
    }

    #[cfg(not(unix))]
    fn open_virtual_port(&mut self, _name: &str) -> NativeResult<()> {
        Err("virtual ports are not supported on this platform".to_string())
    }

    fn close_port(&mut self) -> NativeResult<()> {
        match std::mem::replace(&mut self.state, InputState::Vacant) {
            InputState::Connected(connection) => {
                let (input, context) = connection.close();
                self.queue.restore(context.dispatcher);
                self.state = InputState::Idle(input);
                debug!(client = %self.client_name, "midir input closed");
            }
            other => self.state = other,
        }
        Ok(())
    }
}

impl InputDevice for MidirInput {
    unsafe fn set_callback(&mut self, slot: CallbackSlot) -> NativeResult<()> {
        self.queue.shared().set_slot(Some(slot));
        Ok(())
    }

    fn cancel_callback(&mut self) -> NativeResult<()> {
        self.queue.shared().set_slot(None);
        Ok(())
    }

    fn ignore_types(&mut self, filter: IgnoreFilter) -> NativeResult<()> {
        self.queue.shared().set_filter(filter);
        Ok(())
    }

    fn get_message(&mut self, buffer: &mut Vec<u8>) -> NativeResult<Option<f64>> {
        Ok(self.queue.pop_into(buffer))
    }
}

enum OutputState {
    Idle(MidiOutput),
    Connected(MidiOutputConnection),
    Vacant,
}

struct MidirOutput {
    client_name: String,
    state: OutputState,
}

impl MidirOutput {
    fn take_idle(&mut self) -> NativeResult<MidiOutput> {
        match std::mem::replace(&mut self.state, OutputState::Vacant) {
            OutputState::Idle(output) => Ok(output),
            OutputState::Vacant => MidiOutput::new(&self.client_name).map_err(|e| e.to_string()),
            connected @ OutputState::Connected(_) => {
                self.state = connected;
                Err("output is already open".to_string())
            }
        }
    }

    fn with_output<R>(&self, f: impl FnOnce(&MidiOutput) -> NativeResult<R>) -> NativeResult<R> {
        match &self.state {
            OutputState::Idle(output) => f(output),
            _ => f(&MidiOutput::new(&self.client_name).map_err(|e| e.to_string())?),
        }
    }

    fn finish_connect(
        &mut self,
        result: Result<MidiOutputConnection, midir::ConnectError<MidiOutput>>,
    ) -> NativeResult<()> {
        match result {
            Ok(connection) => {
                self.state = OutputState::Connected(connection);
                Ok(())
            }
            Err(e) => {
                let diagnostic = e.to_string();
                self.state = OutputState::Idle(e.into_inner());
                Err(diagnostic)
            }
        }
    }
}

impl NativeDevice for MidirOutput {
    fn current_api(&self) -> MidiApi {
        platform_api()
    }

    fn port_count(&mut self) -> NativeResult<usize> {
        self.with_output(|output| Ok(output.port_count()))
    }

    fn port_name(&mut self, index: usize) -> NativeResult<String> {
        self.with_output(|output| {
            let ports = output.ports();
            let port = ports
                .get(index)
                .ok_or_else(|| invalid_index(index, ports.len()))?;
            output.port_name(port).map_err(|e| e.to_string())
        })
    }

    fn open_port(&mut self, index: usize, name: &str) -> NativeResult<()> {
        let output = self.take_idle()?;
        let ports = output.ports();
        let Some(port) = ports.get(index) else {
            let count = ports.len();
            self.state = OutputState::Idle(output);
            return Err(invalid_index(index, count));
        };
        let result = output.connect(port, name);
        self.finish_connect(result)
    }

    #[cfg(unix)]
    fn open_virtual_port(&mut self, name: &str) -> NativeResult<()> {
        let output = self.take_idle()?;
        let result = output.create_virtual(name);
        self.finish_connect(result)
    }

    #[cfg(not(unix))]
    fn open_virtual_port(&mut self, _name: &str) -> NativeResult<()> {
        Err("virtual ports are not supported on this platform".to_string())
    }

    fn close_port(&mut self) -> NativeResult<()> {
        match std::mem::replace(&mut self.state, OutputState::Vacant) {
            OutputState::Connected(connection) => {
                self.state = OutputState::Idle(connection.close());
                debug!(client = %self.client_name, "midir output closed");
            }
            other => self.state = other,
        }
        Ok(())
    }
}

impl OutputDevice for MidirOutput {
    fn send_message(&mut self, bytes: &[u8]) -> NativeResult<usize> {
        match &mut self.state {
            OutputState::Connected(connection) => {
                connection.send(bytes).map_err(|e| e.to_string())?;
                Ok(bytes.len())
            }
            _ => Err("output is not open".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_selection() {
        assert!(check_api(MidiApi::Unspecified).is_ok());
        assert!(check_api(platform_api()).is_ok());
        assert!(check_api(MidiApi::Dummy).is_err());
        assert_eq!(MidirBackend::new().compiled_apis(), vec![platform_api()]);
    }
}
