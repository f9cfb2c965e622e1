//! # rtport - Real-time MIDI ports
//!
//! Physical and virtual MIDI inputs and outputs over native MIDI backends.
//!
//! ## Architecture
//!
//! rtport is an umbrella crate that coordinates:
//! - **rtport-message** - `MidiMessage` and the status-byte table
//! - **rtport-io** - Port lifecycle, callback bridge, backends (midir, loopback)
//!
//! ## Quick Start
//!
//! ```ignore
//! use rtport::prelude::*;
//!
//! let midi = MidiSystem::builder().client_name("Sequencer").build()?;
//!
//! // Callback runs on the driver thread
//! let mut input = ReadablePort::builder(&midi)
//!     .info(midi.readable_ports()?.remove(0))
//!     .build()?;
//! input.open("Sequencer In")?;
//! input.set_callback(|msg: &MidiMessage, dt: f64| {
//!     println!("{msg} after {dt:.3}s");
//! })?;
//!
//! // Validated construction, synchronous send
//! let mut out = WritablePort::new(&midi)?;
//! out.open_virtual("Sequencer Out")?;
//! let mut msg = MidiMessage::new();
//! msg.set_channel_message(status::NOTE_ON, 0, 60, 100)?;
//! out.send(&msg)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `midi-io` + `serde`
//! - `midi-io` - OS MIDI devices through midir
//! - `serde` - Serialize/Deserialize for `MidiMessage`

/// Re-export of rtport-message for direct access
pub use rtport_message as message;

/// Re-export of rtport-io for direct access
pub use rtport_io as io;

pub use rtport_message::{status, DataField, MidiMessage, ValidationError};

pub use rtport_io::{
    Direction, IgnoreFilter, LoopbackBackend, MidiApi, MidiBackend, MidiConfig,
    MidiMessageCallback, MidiSystem, MidiSystemBuilder, PortInfo, PortState, PortStateError,
    ReadablePort, ReadablePortBuilder, WritablePort, WritablePortBuilder,
};

#[cfg(feature = "midi-io")]
pub use rtport_io::MidirBackend;

mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    // Entry point and ports
    pub use crate::{MidiSystem, PortInfo, ReadablePort, WritablePort};

    // Messages
    pub use crate::{status, MidiMessage};

    #[cfg(feature = "midi-io")]
    pub use crate::MidirBackend;
}
