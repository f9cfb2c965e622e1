//! In-process MIDI bus.
//!
//! Virtual writable ports appear as readable sources and virtual readable
//! ports appear as writable destinations, the way OS MIDI services expose
//! them. Every open input gets its own driver thread, so callbacks run off
//! the application thread exactly as they do with hardware drivers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::delivery::{Dispatch, Dispatcher};
use super::{
    CallbackSlot, IgnoreFilter, InputDevice, MidiBackend, NativeDevice, NativeResult,
    OutputDevice, PollQueue, DEFAULT_INPUT_CLIENT, DEFAULT_OUTPUT_CLIENT, DEFAULT_QUEUE_SIZE,
};
use crate::api::MidiApi;

type Packet = (Instant, SmallVec<[u8; 8]>);

struct Source {
    id: u64,
    name: String,
    subscribers: Vec<(u64, Sender<Packet>)>,
}

struct Destination {
    id: u64,
    name: String,
    sink: Sender<Packet>,
}

#[derive(Default)]
struct Endpoints {
    sources: Vec<Source>,
    destinations: Vec<Destination>,
}

impl Endpoints {
    /// Drops every bus entry owned by device `id`, including its senders.
    fn detach(&mut self, id: u64) {
        self.sources.retain(|s| s.id != id);
        self.destinations.retain(|d| d.id != id);
        for source in &mut self.sources {
            source.subscribers.retain(|(subscriber, _)| *subscriber != id);
        }
    }
}

#[derive(Default)]
struct Bus {
    endpoints: Mutex<Endpoints>,
    next_id: AtomicU64,
}

impl Bus {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn invalid_index(index: usize, count: usize) -> String {
    format!("invalid port index {index}, {count} ports available")
}

/// Backend over an in-process bus shared by every device it creates.
///
/// Clones share the bus.
#[derive(Clone)]
pub struct LoopbackBackend {
    bus: Arc<Bus>,
    virtual_ports: bool,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(Bus::default()),
            virtual_ports: true,
        }
    }

    /// A bus that behaves like a platform without virtual ports.
    pub fn without_virtual_ports() -> Self {
        Self {
            virtual_ports: false,
            ..Self::new()
        }
    }

    fn check_api(api: MidiApi) -> NativeResult<()> {
        match api {
            MidiApi::Unspecified | MidiApi::Dummy => Ok(()),
            other => Err(format!("{other} is not available in the loopback backend")),
        }
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiBackend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn compiled_apis(&self) -> Vec<MidiApi> {
        vec![MidiApi::Dummy]
    }

    fn supports_virtual_ports(&self) -> bool {
        self.virtual_ports
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
        Self::check_api(api)?;
        Ok(Box::new(LoopbackInput {
            bus: Arc::clone(&self.bus),
            id: self.bus.next_id(),
            client_name: client_name.to_string(),
            virtual_ports: self.virtual_ports,
            queue: PollQueue::new(queue_size),
            driver: None,
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
        Self::check_api(api)?;
        Ok(Box::new(LoopbackOutput {
            bus: Arc::clone(&self.bus),
            id: self.bus.next_id(),
            client_name: client_name.to_string(),
            virtual_ports: self.virtual_ports,
            target: Target::Closed,
        }))
    }
}

struct LoopbackInput {
    bus: Arc<Bus>,
    id: u64,
    client_name: String,
    virtual_ports: bool,
    queue: PollQueue,
    driver: Option<JoinHandle<Dispatcher>>,
}

impl LoopbackInput {
    /// Starts the driver thread and lets `attach` register its sender on
    /// the bus. `attach` runs under the bus lock.
    fn start(
        &mut self,
        name: &str,
        attach: impl FnOnce(&mut Endpoints, Sender<Packet>) -> NativeResult<()>,
    ) -> NativeResult<()> {
        if self.driver.is_some() {
            return Err("input is already open".to_string());
        }

        let mut endpoints = self.bus.endpoints.lock();
        let (sender, receiver) = unbounded();
        attach(&mut endpoints, sender)?;
        let Some(dispatcher) = self.queue.take_dispatcher() else {
            endpoints.detach(self.id);
            return Err("input queue is in use".to_string());
        };

        let port = format!("{}:{}", self.client_name, name);
        let spawned = thread::Builder::new()
            .name(format!("rtport-loopback-{}", self.id))
            .spawn(move || drive(receiver, dispatcher, port));
        match spawned {
            Ok(thread) => {
                self.driver = Some(thread);
                Ok(())
            }
            Err(e) => {
                endpoints.detach(self.id);
                drop(endpoints);
                self.queue.rebuild();
                Err(format!("failed to start driver thread: {e}"))
            }
        }
    }
}

/// Driver thread body. Ends once every sender on the bus is gone.
fn drive(receiver: Receiver<Packet>, mut dispatcher: Dispatcher, port: String) -> Dispatcher {
    let mut previous: Option<Instant> = None;
    for (stamp, bytes) in receiver.iter() {
        let delta = previous.map_or(0.0, |p| stamp.saturating_duration_since(p).as_secs_f64());
        match dispatcher.dispatch(delta, &bytes) {
            Dispatch::Filtered => {}
            Dispatch::Dropped => warn!(port = %port, "input queue full, message dropped"),
            Dispatch::Delivered | Dispatch::Queued => previous = Some(stamp),
        }
    }
    dispatcher
}

impl NativeDevice for LoopbackInput {
    fn current_api(&self) -> MidiApi {
        MidiApi::Dummy
    }

    fn port_count(&mut self) -> NativeResult<usize> {
        Ok(self.bus.endpoints.lock().sources.len())
    }

    fn port_name(&mut self, index: usize) -> NativeResult<String> {
        let endpoints = self.bus.endpoints.lock();
        endpoints
            .sources
            .get(index)
            .map(|s| s.name.clone())
            .ok_or_else(|| invalid_index(index, endpoints.sources.len()))
    }

    fn open_port(&mut self, index: usize, name: &str) -> NativeResult<()> {
        let id = self.id;
        self.start(name, |endpoints, sender| {
            let count = endpoints.sources.len();
            let source = endpoints
                .sources
                .get_mut(index)
                .ok_or_else(|| invalid_index(index, count))?;
            source.subscribers.push((id, sender));
            Ok(())
        })
    }

    fn open_virtual_port(&mut self, name: &str) -> NativeResult<()> {
        if !self.virtual_ports {
            return Err("virtual ports are not supported".to_string());
        }
        let id = self.id;
        let port_name = name.to_string();
        self.start(name, move |endpoints, sink| {
            endpoints.destinations.push(Destination {
                id,
                name: port_name,
                sink,
            });
            Ok(())
        })
    }

    fn close_port(&mut self) -> NativeResult<()> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        // Lock released before joining: a callback may be sending on the bus.
        self.bus.endpoints.lock().detach(self.id);
        match driver.join() {
            Ok(dispatcher) => self.queue.restore(dispatcher),
            Err(_) => {
                warn!(client = %self.client_name, "loopback driver thread panicked");
                self.queue.rebuild();
            }
        }
        debug!(client = %self.client_name, "loopback input closed");
        Ok(())
    }
}

impl InputDevice for LoopbackInput {
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

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        let _ = self.close_port();
    }
}

enum Target {
    Closed,
    /// Connected to the destination registered by device `id`.
    Destination(u64),
    /// Publishing as a virtual source.
    Source,
}

struct LoopbackOutput {
    bus: Arc<Bus>,
    id: u64,
    client_name: String,
    virtual_ports: bool,
    target: Target,
}

impl NativeDevice for LoopbackOutput {
    fn current_api(&self) -> MidiApi {
        MidiApi::Dummy
    }

    fn port_count(&mut self) -> NativeResult<usize> {
        Ok(self.bus.endpoints.lock().destinations.len())
    }

    fn port_name(&mut self, index: usize) -> NativeResult<String> {
        let endpoints = self.bus.endpoints.lock();
        endpoints
            .destinations
            .get(index)
            .map(|d| d.name.clone())
            .ok_or_else(|| invalid_index(index, endpoints.destinations.len()))
    }

    fn open_port(&mut self, index: usize, _name: &str) -> NativeResult<()> {
        if !matches!(self.target, Target::Closed) {
            return Err("output is already open".to_string());
        }
        let endpoints = self.bus.endpoints.lock();
        let destination = endpoints
            .destinations
            .get(index)
            .ok_or_else(|| invalid_index(index, endpoints.destinations.len()))?;
        self.target = Target::Destination(destination.id);
        Ok(())
    }

    fn open_virtual_port(&mut self, name: &str) -> NativeResult<()> {
        if !self.virtual_ports {
            return Err("virtual ports are not supported".to_string());
        }
        if !matches!(self.target, Target::Closed) {
            return Err("output is already open".to_string());
        }
        self.bus.endpoints.lock().sources.push(Source {
            id: self.id,
            name: name.to_string(),
            subscribers: Vec::new(),
        });
        self.target = Target::Source;
        Ok(())
    }

    fn close_port(&mut self) -> NativeResult<()> {
        if let Target::Source = self.target {
            self.bus.endpoints.lock().detach(self.id);
        }
        if !matches!(self.target, Target::Closed) {
            debug!(client = %self.client_name, "loopback output closed");
        }
        self.target = Target::Closed;
        Ok(())
    }
}

impl OutputDevice for LoopbackOutput {
    fn send_message(&mut self, bytes: &[u8]) -> NativeResult<usize> {
        if bytes.is_empty() {
            return Err("message is empty".to_string());
        }
        let packet: Packet = (Instant::now(), SmallVec::from_slice(bytes));
        let endpoints = self.bus.endpoints.lock();
        match self.target {
            Target::Closed => return Err("output is not open".to_string()),
            Target::Destination(id) => {
                let destination = endpoints
                    .destinations
                    .iter()
                    .find(|d| d.id == id)
                    .ok_or_else(|| "destination port has gone away".to_string())?;
                destination
                    .sink
                    .send(packet)
                    .map_err(|_| "destination port is no longer receiving".to_string())?;
            }
            Target::Source => {
                if let Some(source) = endpoints.sources.iter().find(|s| s.id == self.id) {
                    for (_, subscriber) in &source.subscribers {
                        // A subscriber mid-close just misses the message.
                        let _ = subscriber.send(packet.clone());
                    }
                }
            }
        }
        Ok(bytes.len())
    }
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        let _ = self.close_port();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_ports_show_up_on_the_other_side() {
        let backend = LoopbackBackend::new();
        let mut out = backend.create_output_default().unwrap();
        let mut input = backend.create_input_default().unwrap();
        assert_eq!(input.port_count(), Ok(0));

        out.open_virtual_port("Virtual Out").unwrap();
        assert_eq!(input.port_count(), Ok(1));
        assert_eq!(input.port_name(0), Ok("Virtual Out".to_string()));

        out.close_port().unwrap();
        assert_eq!(input.port_count(), Ok(0));
    }

    #[test]
    fn test_poll_through_bus() {
        let backend = LoopbackBackend::new();
        let mut input = backend.create_input_default().unwrap();
        input.open_virtual_port("In").unwrap();

        let mut out = backend.create_output_default().unwrap();
        assert_eq!(out.port_name(0), Ok("In".to_string()));
        out.open_port(0, "out").unwrap();
        assert_eq!(out.send_message(&[0x90, 60, 100]), Ok(3));

        let mut buffer = Vec::new();
        let deadline = Instant::now() + std::time::Duration::from_millis(500);
        let mut delta = None;
        while delta.is_none() && Instant::now() < deadline {
            delta = input.get_message(&mut buffer).unwrap();
            thread::yield_now();
        }
        assert_eq!(delta, Some(0.0));
        assert_eq!(buffer, vec![0x90, 60, 100]);
    }

    #[test]
    fn test_send_errors() {
        let backend = LoopbackBackend::new();
        let mut out = backend.create_output_default().unwrap();
        assert!(out.send_message(&[0xFA]).is_err());
        assert!(out.open_port(0, "out").unwrap_err().contains("invalid port index 0"));

        let mut input = backend.create_input_default().unwrap();
        input.open_virtual_port("In").unwrap();
        out.open_port(0, "out").unwrap();
        assert_eq!(out.send_message(&[]), Err("message is empty".to_string()));

        input.close_port().unwrap();
        assert_eq!(
            out.send_message(&[0xFA]),
            Err("destination port has gone away".to_string())
        );
    }

    #[test]
    fn test_unsupported_api_and_virtual_ports() {
        let backend = LoopbackBackend::without_virtual_ports();
        assert!(!backend.supports_virtual_ports());
        assert!(backend
            .create_input(MidiApi::UnixJack, "client", 10)
            .is_err());
        let mut out = backend.create_output(MidiApi::Dummy, "client").unwrap();
        assert!(out.open_virtual_port("nope").is_err());
    }
}
