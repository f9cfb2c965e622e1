//! Relay from the driver's delivery thread into application callbacks.
//!
//! The driver calls [`trampoline`] with the raw bytes. The trampoline copies
//! them into a scratch message owned by the delivery side (growing it only
//! for messages larger than anything seen before), publishes a copy for
//! [`ReadablePort::last_message`](super::ReadablePort::last_message) under a
//! short lock, then runs the user callback synchronously on the driver thread.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rtport_message::{MidiMessage, DEFAULT_CAPACITY};
use tracing::{error, trace};

/// Receives inbound messages on the driver thread.
///
/// Runs at driver priority: do not block, lock or allocate. The message is
/// only valid for the duration of the call; copy it out to keep it. The
/// second argument is the time in seconds since the previous message.
pub trait MidiMessageCallback: Send + Sync + 'static {
    fn on_message(&self, message: &MidiMessage, delta_time: f64);
}

impl<F> MidiMessageCallback for F
where
    F: Fn(&MidiMessage, f64) + Send + Sync + 'static,
{
    fn on_message(&self, message: &MidiMessage, delta_time: f64) {
        self(message, delta_time)
    }
}

struct Registration {
    callback: Box<dyn MidiMessageCallback>,
}

/// Shared between a readable port and its driver.
///
/// The port owns the only strong reference that matters: the driver sees a
/// raw pointer to it as callback user data, and the port outlives its
/// native handle.
pub(crate) struct Bridge {
    registration: ArcSwapOption<Registration>,
    scratch: UnsafeCell<MidiMessage>,
    delivering: AtomicBool,
    capacity: AtomicUsize,
    last: Mutex<MidiMessage>,
    has_message: AtomicBool,
}

// SAFETY: `scratch` is only accessed by the thread that set `delivering`
// from false to true, until it stores false again. Everything else is Sync.
unsafe impl Sync for Bridge {}

impl Bridge {
    pub(crate) fn new() -> Arc<Self> {
        let scratch = MidiMessage::with_capacity(DEFAULT_CAPACITY);
        let capacity = scratch.capacity();
        Arc::new(Self {
            registration: ArcSwapOption::empty(),
            scratch: UnsafeCell::new(scratch),
            delivering: AtomicBool::new(false),
            capacity: AtomicUsize::new(capacity),
            last: Mutex::new(MidiMessage::with_capacity(DEFAULT_CAPACITY)),
            has_message: AtomicBool::new(false),
        })
    }

    /// Pointer handed to the native layer as callback user data.
    pub(crate) fn user_data(self: &Arc<Self>) -> *mut c_void {
        Arc::as_ptr(self) as *mut c_void
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registration.load().is_some()
    }

    pub(crate) fn install(&self, callback: Box<dyn MidiMessageCallback>) {
        self.has_message.store(false, Ordering::Release);
        self.registration
            .store(Some(Arc::new(Registration { callback })));
    }

    /// Drops the registration. An in-flight delivery keeps its own
    /// reference until it returns.
    pub(crate) fn clear(&self) {
        self.registration.store(None);
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    pub(crate) fn last_message(&self) -> Option<MidiMessage> {
        self.with_last_message(MidiMessage::clone)
    }

    pub(crate) fn with_last_message<R>(&self, f: impl FnOnce(&MidiMessage) -> R) -> Option<R> {
        let last = self.last.lock();
        if self.has_message.load(Ordering::Acquire) {
            Some(f(&last))
        } else {
            None
        }
    }

    fn deliver(&self, timestamp: f64, bytes: &[u8]) {
        let registration = self.registration.load();
        let Some(registration) = registration.as_ref() else {
            return;
        };
        if self.delivering.swap(true, Ordering::Acquire) {
            trace!(len = bytes.len(), "overlapping delivery, message dropped");
            return;
        }

        // SAFETY: exclusive until `delivering` is released below.
        let scratch = unsafe { &mut *self.scratch.get() };
        scratch.set_data(bytes);
        self.capacity.store(scratch.capacity(), Ordering::Release);
        {
            let mut last = self.last.lock();
            last.set_data(bytes);
            self.has_message.store(true, Ordering::Release);
        }

        let callback = &registration.callback;
        let message: &MidiMessage = scratch;
        if catch_unwind(AssertUnwindSafe(|| callback.on_message(message, timestamp))).is_err() {
            error!("MIDI callback panicked, message dropped");
        }

        self.delivering.store(false, Ordering::Release);
    }
}

/// Native callback entry point. `user_data` must come from
/// [`Bridge::user_data`].
pub(crate) unsafe extern "C" fn trampoline(
    timestamp: f64,
    message: *const u8,
    len: usize,
    user_data: *mut c_void,
) {
    if message.is_null() || len == 0 || user_data.is_null() {
        return;
    }
    // SAFETY: the owning port keeps the bridge alive until its native handle
    // has been freed, and freeing a device waits for in-flight deliveries.
    let bridge = &*(user_data as *const Bridge);
    let bytes = std::slice::from_raw_parts(message, len);
    bridge.deliver(timestamp, bytes);
}
