//! Inbound delivery shared by the backends: ignore filter, callback slot
//! and the bounded poll queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use smallvec::SmallVec;

use super::CallbackSlot;
use rtport_message::status;

/// Which message classes an input drops before delivery. Nothing is
/// ignored by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IgnoreFilter {
    pub sysex: bool,
    /// Timing Clock and MIDI Time Code quarter frames.
    pub timing: bool,
    pub active_sensing: bool,
}

impl IgnoreFilter {
    pub fn new(sysex: bool, timing: bool, active_sensing: bool) -> Self {
        Self {
            sysex,
            timing,
            active_sensing,
        }
    }

    pub fn all() -> Self {
        Self::new(true, true, true)
    }

    pub fn ignores(&self, bytes: &[u8]) -> bool {
        match bytes.first().copied() {
            Some(status::SYSTEM_EXCLUSIVE) => self.sysex,
            Some(status::TIMING_CLOCK) | Some(status::MIDI_TIME_CODE) => self.timing,
            Some(status::ACTIVE_SENSING) => self.active_sensing,
            _ => false,
        }
    }
}

/// Filter flags readable from the delivery thread without locking.
#[derive(Debug, Default)]
struct AtomicIgnoreFilter {
    sysex: AtomicBool,
    timing: AtomicBool,
    active_sensing: AtomicBool,
}

impl AtomicIgnoreFilter {
    fn store(&self, filter: IgnoreFilter) {
        self.sysex.store(filter.sysex, Ordering::Release);
        self.timing.store(filter.timing, Ordering::Release);
        self.active_sensing
            .store(filter.active_sensing, Ordering::Release);
    }

    fn load(&self) -> IgnoreFilter {
        IgnoreFilter {
            sysex: self.sysex.load(Ordering::Acquire),
            timing: self.timing.load(Ordering::Acquire),
            active_sensing: self.active_sensing.load(Ordering::Acquire),
        }
    }
}

pub(crate) type QueuedMessage = (f64, SmallVec<[u8; 8]>);

/// State an input device shares with its delivery thread.
#[derive(Default)]
pub(crate) struct InputShared {
    filter: AtomicIgnoreFilter,
    slot: ArcSwapOption<CallbackSlot>,
}

impl InputShared {
    pub(crate) fn set_filter(&self, filter: IgnoreFilter) {
        self.filter.store(filter);
    }

    pub(crate) fn set_slot(&self, slot: Option<CallbackSlot>) {
        self.slot.store(slot.map(Arc::new));
    }

    #[cfg(test)]
    pub(crate) fn has_slot(&self) -> bool {
        self.slot.load().is_some()
    }
}

/// Outcome of handing one inbound message to [`Dispatcher::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Filtered,
    Delivered,
    Queued,
    /// The poll queue was full.
    Dropped,
}

/// Delivery-thread side: runs the filter, then calls the registered slot
/// or queues the message for polling.
pub(crate) struct Dispatcher {
    shared: Arc<InputShared>,
    producer: HeapProd<QueuedMessage>,
}

impl Dispatcher {
    pub(crate) fn dispatch(&mut self, delta: f64, bytes: &[u8]) -> Dispatch {
        if bytes.is_empty() || self.shared.filter.load().ignores(bytes) {
            return Dispatch::Filtered;
        }

        let slot = self.shared.slot.load();
        if let Some(slot) = slot.as_ref() {
            // SAFETY: the registering port keeps the user data alive until
            // cancellation is confirmed, and the guard keeps this slot alive
            // for the duration of the call.
            unsafe { slot.invoke(delta, bytes) };
            return Dispatch::Delivered;
        }

        match self.producer.try_push((delta, SmallVec::from_slice(bytes))) {
            Ok(()) => Dispatch::Queued,
            Err(_) => Dispatch::Dropped,
        }
    }

    pub(crate) fn into_producer(self) -> HeapProd<QueuedMessage> {
        self.producer
    }
}

/// Application side of the poll queue.
///
/// The producer half travels into the delivery path while the device is
/// open and comes back on close.
pub(crate) struct PollQueue {
    shared: Arc<InputShared>,
    queue_size: usize,
    consumer: HeapCons<QueuedMessage>,
    producer: Option<HeapProd<QueuedMessage>>,
}

impl PollQueue {
    pub(crate) fn new(queue_size: usize) -> Self {
        let queue_size = queue_size.max(1);
        let (producer, consumer) = HeapRb::<QueuedMessage>::new(queue_size).split();
        Self {
            shared: Arc::new(InputShared::default()),
            queue_size,
            consumer,
            producer: Some(producer),
        }
    }

    /// Replaces a producer that was lost with its delivery path.
    pub(crate) fn rebuild(&mut self) {
        let (producer, consumer) = HeapRb::<QueuedMessage>::new(self.queue_size).split();
        self.consumer = consumer;
        self.producer = Some(producer);
    }

    pub(crate) fn shared(&self) -> &Arc<InputShared> {
        &self.shared
    }

    /// Hands the producer to a delivery path. `None` while one is active.
    pub(crate) fn take_dispatcher(&mut self) -> Option<Dispatcher> {
        self.producer.take().map(|producer| Dispatcher {
            shared: Arc::clone(&self.shared),
            producer,
        })
    }

    /// Takes the producer back and discards whatever was left unread.
    pub(crate) fn restore(&mut self, dispatcher: Dispatcher) {
        self.producer = Some(dispatcher.into_producer());
        while self.consumer.try_pop().is_some() {}
    }

    pub(crate) fn pop_into(&mut self, buffer: &mut Vec<u8>) -> Option<f64> {
        let (delta, bytes) = self.consumer.try_pop()?;
        buffer.clear();
        buffer.extend_from_slice(&bytes);
        Some(delta)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        ringbuf::traits::Observer::occupied_len(&self.consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_filter_classes() {
        let none = IgnoreFilter::default();
        let all = IgnoreFilter::all();
        for bytes in [&[0xF0, 1, 0xF7][..], &[0xF8], &[0xF1, 0x10], &[0xFE]] {
            assert!(!none.ignores(bytes));
            assert!(all.ignores(bytes));
        }
        assert!(!all.ignores(&[0x90, 60, 100]));
        assert!(!all.ignores(&[0xFA]));

        let timing_only = IgnoreFilter::new(false, true, false);
        assert!(timing_only.ignores(&[0xF8]));
        assert!(!timing_only.ignores(&[0xFE]));
    }

    #[test]
    fn test_queue_until_full() {
        let mut queue = PollQueue::new(2);
        let mut dispatcher = queue.take_dispatcher().unwrap();
        assert!(queue.take_dispatcher().is_none());

        assert_eq!(dispatcher.dispatch(0.0, &[0x90, 1, 2]), Dispatch::Queued);
        assert_eq!(dispatcher.dispatch(0.5, &[0x80, 1, 0]), Dispatch::Queued);
        assert_eq!(dispatcher.dispatch(0.5, &[0xFA]), Dispatch::Dropped);
        assert_eq!(queue.len(), 2);

        let mut buffer = Vec::new();
        assert_eq!(queue.pop_into(&mut buffer), Some(0.0));
        assert_eq!(buffer, vec![0x90, 1, 2]);
        assert_eq!(queue.pop_into(&mut buffer), Some(0.5));
        assert_eq!(queue.pop_into(&mut buffer), None);
        assert_eq!(buffer, vec![0x80, 1, 0]);
    }

    #[test]
    fn test_restore_discards_leftovers() {
        let mut queue = PollQueue::new(4);
        let mut dispatcher = queue.take_dispatcher().unwrap();
        dispatcher.dispatch(0.0, &[0xFC]);
        queue.restore(dispatcher);
        assert_eq!(queue.len(), 0);
        assert!(queue.take_dispatcher().is_some());
    }

    unsafe extern "C" fn count(_: f64, _: *const u8, len: usize, user_data: *mut c_void) {
        let total = &*(user_data as *const AtomicUsize);
        total.fetch_add(len, Ordering::SeqCst);
    }

    #[test]
    fn test_slot_bypasses_queue_and_filter_applies() {
        let total = AtomicUsize::new(0);
        let mut queue = PollQueue::new(4);
        let mut dispatcher = queue.take_dispatcher().unwrap();
        let slot = unsafe { CallbackSlot::new(count, &total as *const _ as *mut c_void) };
        queue.shared().set_slot(Some(slot));
        assert!(queue.shared().has_slot());

        assert_eq!(dispatcher.dispatch(0.0, &[0x90, 1, 2]), Dispatch::Delivered);
        queue.shared().set_filter(IgnoreFilter::all());
        assert_eq!(dispatcher.dispatch(0.0, &[0xF8]), Dispatch::Filtered);
        assert_eq!(total.load(Ordering::SeqCst), 3);
        assert_eq!(queue.len(), 0);

        queue.shared().set_slot(None);
        assert_eq!(dispatcher.dispatch(0.0, &[0x90, 1, 2]), Dispatch::Queued);
    }
}
