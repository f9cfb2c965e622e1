//! Native device contract.
//!
//! A backend hands out boxed devices; everything the port layer does to a
//! device goes through [`NativeHandle`], which records the ok flag and the
//! diagnostic of every call. Freeing a device is dropping its box.

mod delivery;
mod handle;
mod loopback;
#[cfg(feature = "midi-io")]
mod midir_backend;

pub use delivery::IgnoreFilter;
pub(crate) use delivery::PollQueue;
pub(crate) use handle::NativeHandle;
pub use loopback::LoopbackBackend;
#[cfg(feature = "midi-io")]
pub use midir_backend::MidirBackend;

use std::ffi::c_void;

use crate::api::MidiApi;
use crate::port::{CreateParams, Direction};

/// Client name used by the default input factory.
pub const DEFAULT_INPUT_CLIENT: &str = "rtport input client";
/// Client name used by the default output factory.
pub const DEFAULT_OUTPUT_CLIENT: &str = "rtport output client";
/// Input queue limit used by the default input factory.
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Outcome of a native call. The error is the backend's diagnostic text.
pub type NativeResult<T> = std::result::Result<T, String>;

/// Inbound message callback in the shape drivers call it:
/// `(delta seconds, message bytes, length, user data)`.
pub type RawCallback =
    unsafe extern "C" fn(timestamp: f64, message: *const u8, len: usize, user_data: *mut c_void);

/// A registered [`RawCallback`] together with its user data pointer.
#[derive(Clone, Copy)]
pub struct CallbackSlot {
    callback: RawCallback,
    user_data: *mut c_void,
}

// SAFETY: the slot is only a pair of addresses. Whoever registers it
// guarantees `user_data` stays valid for every thread the device invokes
// the callback from, until the device has confirmed cancellation and any
// in-flight invocation has returned.
unsafe impl Send for CallbackSlot {}
unsafe impl Sync for CallbackSlot {}

impl CallbackSlot {
    /// # Safety
    /// `user_data` must remain valid for as long as the device may invoke
    /// `callback` with it.
    pub unsafe fn new(callback: RawCallback, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data,
        }
    }

    /// # Safety
    /// The registering side's validity guarantee must still hold.
    #[inline]
    pub unsafe fn invoke(&self, timestamp: f64, bytes: &[u8]) {
        (self.callback)(timestamp, bytes.as_ptr(), bytes.len(), self.user_data);
    }
}

/// Operations shared by input and output devices.
pub trait NativeDevice: Send + 'static {
    fn current_api(&self) -> MidiApi;

    fn port_count(&mut self) -> NativeResult<usize>;

    fn port_name(&mut self, index: usize) -> NativeResult<String>;

    /// Connects to the system port at `index`; `name` is our end's name.
    fn open_port(&mut self, index: usize, name: &str) -> NativeResult<()>;

    fn open_virtual_port(&mut self, name: &str) -> NativeResult<()>;

    /// Closing a device that is not open is a no-op.
    fn close_port(&mut self) -> NativeResult<()>;
}

pub trait InputDevice: NativeDevice {
    /// Installs the single callback slot, replacing any previous one.
    ///
    /// Invocations must be serialized: the slot is called from one thread
    /// at a time, in arrival order. A call that overlaps another is dropped.
    ///
    /// # Safety
    /// See [`CallbackSlot::new`]: the slot's user data must outlive the
    /// registration and any in-flight invocation.
    unsafe fn set_callback(&mut self, slot: CallbackSlot) -> NativeResult<()>;

    /// No new invocation starts after this returns.
    fn cancel_callback(&mut self) -> NativeResult<()>;

    fn ignore_types(&mut self, filter: IgnoreFilter) -> NativeResult<()>;

    /// Pops the oldest queued message into `buffer` and returns its delta
    /// time, or `None` when the queue is empty (`buffer` left untouched).
    fn get_message(&mut self, buffer: &mut Vec<u8>) -> NativeResult<Option<f64>>;
}

pub trait OutputDevice: NativeDevice {
    /// Sends one complete message, returning the number of bytes sent.
    fn send_message(&mut self, bytes: &[u8]) -> NativeResult<usize>;
}

/// Factory for native devices.
pub trait MidiBackend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn compiled_apis(&self) -> Vec<MidiApi>;

    /// Static capability of the platform, not of a particular port.
    fn supports_virtual_ports(&self) -> bool;

    fn create_input_default(&self) -> NativeResult<Box<dyn InputDevice>>;

    fn create_input(
        &self,
        api: MidiApi,
        client_name: &str,
        queue_size: usize,
    ) -> NativeResult<Box<dyn InputDevice>>;

    fn create_output_default(&self) -> NativeResult<Box<dyn OutputDevice>>;

    fn create_output(&self, api: MidiApi, client_name: &str)
        -> NativeResult<Box<dyn OutputDevice>>;
}

/// Ties a device trait object to its port direction and factory.
pub(crate) trait PortDevice: NativeDevice {
    const DIRECTION: Direction;
    const FACTORY: &'static str;

    fn create(backend: &dyn MidiBackend, params: &CreateParams) -> NativeResult<Box<Self>>;
}

impl PortDevice for dyn InputDevice {
    const DIRECTION: Direction = Direction::Readable;
    const FACTORY: &'static str = "create_input";

    fn create(backend: &dyn MidiBackend, params: &CreateParams) -> NativeResult<Box<Self>> {
        if params.is_default() {
            return backend.create_input_default();
        }
        backend.create_input(
            params.api.unwrap_or_default(),
            params.client_name.as_deref().unwrap_or(DEFAULT_INPUT_CLIENT),
            params.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
        )
    }
}

impl PortDevice for dyn OutputDevice {
    const DIRECTION: Direction = Direction::Writable;
    const FACTORY: &'static str = "create_output";

    fn create(backend: &dyn MidiBackend, params: &CreateParams) -> NativeResult<Box<Self>> {
        if params.is_default() {
            return backend.create_output_default();
        }
        backend.create_output(
            params.api.unwrap_or_default(),
            params.client_name.as_deref().unwrap_or(DEFAULT_OUTPUT_CLIENT),
        )
    }
}
