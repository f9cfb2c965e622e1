//! MIDI ports over native MIDI backends.
//!
//! A [`MidiSystem`] picks a backend and holds configuration; ports are built
//! from it. [`ReadablePort`] delivers inbound messages to a callback on the
//! driver's thread, or queues them for polling. [`WritablePort`] sends
//! messages through a reusable staging buffer.
//!
//! Each port owns exactly one native handle at a time. Closing a port frees
//! that handle and creates a new one, so the same port can be opened again;
//! destroying it is terminal.
//!
//! Feature gates: `midi-io` (OS devices through midir, default). The
//! in-process [`LoopbackBackend`] is always available.
//!
//! ```
//! use rtport_io::{MidiSystem, ReadablePort, WritablePort};
//! use rtport_message::MidiMessage;
//!
//! let midi = MidiSystem::builder().loopback().build()?;
//!
//! let mut input = ReadablePort::new(&midi)?;
//! input.open_virtual("Synth In")?;
//!
//! let info = midi.writable_ports()?.remove(0);
//! let mut output = WritablePort::builder(&midi).info(info).build()?;
//! output.open("Sequencer Out")?;
//! output.send(&MidiMessage::from_bytes(&[0x90, 60, 100]))?;
//! # Ok::<(), rtport_io::Error>(())
//! ```

pub mod error;
pub use error::{Error, PortStateError, Result};

mod api;
pub use api::MidiApi;

pub mod native;
pub use native::{IgnoreFilter, LoopbackBackend, MidiBackend};

#[cfg(feature = "midi-io")]
pub use native::MidirBackend;

mod port;
pub use port::{
    Direction, MidiMessageCallback, PortInfo, PortState, ReadablePort, ReadablePortBuilder,
    WritablePort, WritablePortBuilder,
};

mod system;
pub use system::{MidiConfig, MidiSystem, MidiSystemBuilder};

pub use rtport_message::MidiMessage;
