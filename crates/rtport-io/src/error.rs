//! Error types for MIDI port operations.

use crate::port::{Direction, PortInfo};
use thiserror::Error;

/// Why an operation is not valid in the port's current lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortStateError {
    #[error("port already destroyed")]
    Destroyed,

    #[error("port is already open")]
    AlreadyOpen,

    #[error("port is not open")]
    NotOpen,

    #[error("a callback is already registered, remove it first")]
    CallbackRegistered,

    #[error("cannot poll for messages while a callback is registered")]
    PollingWithCallback,

    #[error("virtual ports are not supported by the {backend} backend with this configuration")]
    VirtualPortsUnsupported { backend: &'static str },

    #[error("port was created without port info, nothing to open")]
    MissingPortInfo,

    #[error("could not find port {0}")]
    PortNotFound(PortInfo),

    #[error("port info {info} cannot be used for a {expected} port")]
    DirectionMismatch { info: PortInfo, expected: Direction },

    #[error("MIDI API {0} is disallowed by configuration")]
    ApiDisallowed(crate::api::MidiApi),
}

#[derive(Error, Debug)]
pub enum Error {
    /// The native layer reported not-ok; carries its diagnostic verbatim.
    #[error("native MIDI error in {operation}: {diagnostic}")]
    Native {
        operation: &'static str,
        diagnostic: String,
    },

    #[error(transparent)]
    PortState(#[from] PortStateError),
}

impl Error {
    pub(crate) fn native(operation: &'static str, diagnostic: impl Into<String>) -> Self {
        Error::Native {
            operation,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Error::Native { .. })
    }

    pub fn port_state(&self) -> Option<&PortStateError> {
        match self {
            Error::PortState(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
