//! Centralized error type for the rtport umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Port(#[from] rtport_io::Error),

    #[error("MIDI message: {0}")]
    Message(#[from] rtport_message::ValidationError),
}

impl Error {
    pub fn validation(&self) -> Option<&rtport_message::ValidationError> {
        match self {
            Error::Message(e) => Some(e),
            Error::Port(_) => None,
        }
    }

    pub fn port_state(&self) -> Option<&rtport_io::PortStateError> {
        match self {
            Error::Port(e) => e.port_state(),
            Error::Message(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
