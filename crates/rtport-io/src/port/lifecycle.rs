//! Port lifecycle: `Created -> Open -> Created (new generation) -> Destroyed`.
//!
//! Closing a port frees its native handle and creates the next one from the
//! same parameters; native layers have no way to reopen a closed handle.
//! The destroyed state holds no handle at all.

use tracing::{debug, warn};

use super::{CreateParams, PortInfo};
use crate::api::MidiApi;
use crate::error::{PortStateError, Result};
use crate::native::{NativeHandle, PortDevice};
use crate::system::MidiSystem;

/// Where a port is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    /// Live native handle, not connected.
    Created,
    Open,
    /// Terminal. Every operation but the state queries fails.
    Destroyed,
}

enum Lifecycle<D: ?Sized> {
    Created(NativeHandle<D>),
    Open {
        handle: NativeHandle<D>,
        virtual_port: bool,
    },
    Destroyed,
}

impl<D: ?Sized> Lifecycle<D> {
    fn state(&self) -> PortState {
        match self {
            Lifecycle::Created(_) => PortState::Created,
            Lifecycle::Open { .. } => PortState::Open,
            Lifecycle::Destroyed => PortState::Destroyed,
        }
    }

    fn live(&mut self) -> Result<&mut NativeHandle<D>> {
        match self {
            Lifecycle::Created(handle) | Lifecycle::Open { handle, .. } => Ok(handle),
            Lifecycle::Destroyed => Err(PortStateError::Destroyed.into()),
        }
    }

    fn created(&mut self) -> Result<&mut NativeHandle<D>> {
        match self {
            Lifecycle::Created(handle) => Ok(handle),
            Lifecycle::Open { .. } => Err(PortStateError::AlreadyOpen.into()),
            Lifecycle::Destroyed => Err(PortStateError::Destroyed.into()),
        }
    }

    fn open(&mut self) -> Result<&mut NativeHandle<D>> {
        match self {
            Lifecycle::Open { handle, .. } => Ok(handle),
            Lifecycle::Created(_) => Err(PortStateError::NotOpen.into()),
            Lifecycle::Destroyed => Err(PortStateError::Destroyed.into()),
        }
    }

    fn mark_open(&mut self, virtual_port: bool) {
        *self = match std::mem::replace(self, Lifecycle::Destroyed) {
            Lifecycle::Created(handle) => Lifecycle::Open {
                handle,
                virtual_port,
            },
            other => other,
        };
    }
}

/// Lifecycle shared by both port directions.
pub(crate) struct PortCore<D: PortDevice + ?Sized> {
    system: MidiSystem,
    info: Option<PortInfo>,
    params: CreateParams,
    lifecycle: Lifecycle<D>,
    generation: u64,
}

impl<D: PortDevice + ?Sized> PortCore<D> {
    pub(crate) fn new(
        system: &MidiSystem,
        info: Option<PortInfo>,
        params: CreateParams,
    ) -> Result<Self> {
        if let Some(info) = &info {
            if info.direction() != D::DIRECTION {
                return Err(PortStateError::DirectionMismatch {
                    info: info.clone(),
                    expected: D::DIRECTION,
                }
                .into());
            }
        }
        if let Some(api) = params.api {
            system.check_api(api)?;
        }

        let params = params.resolve(system.config(), D::DIRECTION);
        let handle = NativeHandle::<D>::create(system.backend(), &params)?;
        debug!(
            direction = %D::DIRECTION,
            api = %handle.api(),
            client = ?params.client_name,
            "port created"
        );
        Ok(Self {
            system: system.clone(),
            info,
            params,
            lifecycle: Lifecycle::Created(handle),
            generation: 1,
        })
    }

    pub(crate) fn state(&self) -> PortState {
        self.lifecycle.state()
    }

    pub(crate) fn is_virtual(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Open {
                virtual_port: true,
                ..
            }
        )
    }

    pub(crate) fn info(&self) -> Option<&PortInfo> {
        self.info.as_ref()
    }

    pub(crate) fn client_name(&self) -> Option<&str> {
        self.params.client_name.as_deref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn api(&self) -> Option<MidiApi> {
        match &self.lifecycle {
            Lifecycle::Created(handle) | Lifecycle::Open { handle, .. } => Some(handle.api()),
            Lifecycle::Destroyed => None,
        }
    }

    /// Handle of a created or open port.
    pub(crate) fn handle(&mut self) -> Result<&mut NativeHandle<D>> {
        self.lifecycle.live()
    }

    /// Handle of an open port.
    pub(crate) fn open_handle(&mut self) -> Result<&mut NativeHandle<D>> {
        self.lifecycle.open()
    }

    /// Connects to the system port described by the stored info.
    ///
    /// The info's index is looked up again by name first, since indices
    /// shift as other ports come and go.
    pub(crate) fn open(&mut self, port_name: &str) -> Result<()> {
        let handle = self.lifecycle.created()?;
        let info = self.info.as_ref().ok_or(PortStateError::MissingPortInfo)?;
        let info = locate(handle, info)?;

        handle.call("open_port", |d| d.open_port(info.number(), port_name))?;
        debug!(port = %info, local = port_name, generation = self.generation, "port opened");
        self.info = Some(info);
        self.lifecycle.mark_open(false);
        Ok(())
    }

    pub(crate) fn open_virtual(&mut self, port_name: &str) -> Result<()> {
        let handle = self.lifecycle.created()?;
        if !self.system.supports_virtual_ports() {
            return Err(PortStateError::VirtualPortsUnsupported {
                backend: self.system.backend_name(),
            }
            .into());
        }

        handle.call("open_virtual_port", |d| d.open_virtual_port(port_name))?;
        debug!(name = port_name, generation = self.generation, "virtual port opened");
        self.lifecycle.mark_open(true);
        Ok(())
    }

    /// Closes the native port, frees this generation's handle and creates
    /// the next one.
    ///
    /// If the replacement cannot be created the port ends up destroyed and
    /// the factory error is returned.
    pub(crate) fn close(&mut self) -> Result<()> {
        self.lifecycle
            .open()?
            .call("close_port", |d| d.close_port())?;

        if let Lifecycle::Open { handle, .. } =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Destroyed)
        {
            handle.free();
        }

        match NativeHandle::<D>::create(self.system.backend(), &self.params) {
            Ok(handle) => {
                self.lifecycle = Lifecycle::Created(handle);
                self.generation += 1;
                debug!(generation = self.generation, "port closed, native handle recreated");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not recreate native handle after close, port destroyed");
                Err(e)
            }
        }
    }

    /// Frees the handle, closing the native port first if it is open.
    ///
    /// The handle is freed and the port destroyed even when closing fails;
    /// the close error is still returned.
    pub(crate) fn destroy(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Destroyed) {
            Lifecycle::Destroyed => Err(PortStateError::Destroyed.into()),
            Lifecycle::Created(handle) => {
                handle.free();
                debug!(generation = self.generation, "port destroyed");
                Ok(())
            }
            Lifecycle::Open { mut handle, .. } => {
                let closed = handle.call("close_port", |d| d.close_port());
                handle.free();
                debug!(generation = self.generation, "open port destroyed");
                closed
            }
        }
    }
}

/// Finds `info` by name among the ports the handle currently sees.
fn locate<D: PortDevice + ?Sized>(handle: &mut NativeHandle<D>, info: &PortInfo) -> Result<PortInfo> {
    let count = handle.call("get_port_count", |d| d.port_count())?;
    for index in 0..count {
        let name = handle.call("get_port_name", |d| d.port_name(index))?;
        if name == info.name() {
            return Ok(info.with_number(index));
        }
    }
    Err(PortStateError::PortNotFound(info.clone()).into())
}

/// Enumerates the ports visible through `handle`.
pub(crate) fn list_ports<D: PortDevice + ?Sized>(
    handle: &mut NativeHandle<D>,
) -> Result<Vec<PortInfo>> {
    let count = handle.call("get_port_count", |d| d.port_count())?;
    (0..count)
        .map(|index| {
            handle
                .call("get_port_name", |d| d.port_name(index))
                .map(|name| PortInfo::new(name, index, D::DIRECTION))
        })
        .collect()
}
