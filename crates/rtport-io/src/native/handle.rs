//! Owned native device plus the status of the last call made on it.

use tracing::trace;

use super::{MidiBackend, NativeResult, PortDevice};
use crate::api::MidiApi;
use crate::error::{Error, Result};
use crate::port::CreateParams;

/// Exclusive owner of one live native device.
///
/// There is no freed state: [`free`](Self::free) consumes the handle, so a
/// freed device cannot be reached again.
pub(crate) struct NativeHandle<D: ?Sized> {
    device: Box<D>,
    ok: bool,
    diagnostic: String,
}

impl<D: PortDevice + ?Sized> NativeHandle<D> {
    pub(crate) fn create(backend: &dyn MidiBackend, params: &CreateParams) -> Result<Self> {
        let device = D::create(backend, params).map_err(|diagnostic| {
            trace!(factory = D::FACTORY, %diagnostic, "native factory failed");
            Error::native(D::FACTORY, diagnostic)
        })?;
        trace!(factory = D::FACTORY, api = %device.current_api(), "native device created");
        Ok(Self {
            device,
            ok: true,
            diagnostic: String::new(),
        })
    }

    /// Runs one native operation and records its status.
    ///
    /// A not-ok status becomes [`Error::Native`] carrying the diagnostic.
    pub(crate) fn call<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut D) -> NativeResult<T>,
    ) -> Result<T> {
        match f(&mut self.device) {
            Ok(value) => {
                self.ok = true;
                self.diagnostic.clear();
                trace!(operation, "native call ok");
                Ok(value)
            }
            Err(diagnostic) => {
                self.ok = false;
                self.diagnostic.clone_from(&diagnostic);
                trace!(operation, %diagnostic, "native call failed");
                Err(Error::native(operation, diagnostic))
            }
        }
    }

    pub(crate) fn api(&self) -> MidiApi {
        self.device.current_api()
    }

    /// Status of the most recent call.
    #[cfg(test)]
    pub(crate) fn is_ok(&self) -> bool {
        self.ok
    }

    #[cfg(test)]
    pub(crate) fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    pub(crate) fn free(self) {
        if self.ok {
            trace!(api = %self.api(), "native device freed");
        } else {
            trace!(api = %self.api(), diagnostic = %self.diagnostic, "native device freed after a failed call");
        }
        drop(self.device);
    }
}
