//! Link-layer boundary
//!
//! The discovery engine never talks to the radio itself. It asks a [`GattLink`]
//! to issue discovery requests; responses come back later as
//! [`LinkEvent`](crate::gatt::LinkEvent)s through the dispatcher.

use crate::gatt::HandleRange;
use bt_hci::param::ConnHandle;

/// Reasons the link layer refuses an outgoing discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// A request is already outstanding on this connection
    Busy,
    /// Transmit buffers or command slots are exhausted
    NoResources,
    /// The connection is not (or no longer) established
    NotConnected,
    /// Stack-specific error code
    Other(u32),
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => write!(f, "link busy"),
            Self::NoResources => write!(f, "link out of resources"),
            Self::NotConnected => write!(f, "link not connected"),
            Self::Other(code) => write!(f, "link error 0x{code:08X}"),
        }
    }
}

/// Issues GATT discovery requests on behalf of the engine
///
/// Both methods are fire-and-forget: `Ok(())` means the request was accepted,
/// and the response is delivered later as a link event for the same connection.
/// At most one request is outstanding per connection at any time.
pub trait GattLink {
    /// Request the primary services declared in `range`
    ///
    /// # Errors
    /// Returns an error if the request cannot be queued
    fn discover_primary_services(
        &self,
        conn_handle: ConnHandle,
        range: HandleRange,
    ) -> Result<(), LinkError>;

    /// Request the characteristics declared in `range`
    ///
    /// # Errors
    /// Returns an error if the request cannot be queued
    fn discover_characteristics(
        &self,
        conn_handle: ConnHandle,
        range: HandleRange,
    ) -> Result<(), LinkError>;
}

impl<L: GattLink + ?Sized> GattLink for &L {
    fn discover_primary_services(
        &self,
        conn_handle: ConnHandle,
        range: HandleRange,
    ) -> Result<(), LinkError> {
        (**self).discover_primary_services(conn_handle, range)
    }

    fn discover_characteristics(
        &self,
        conn_handle: ConnHandle,
        range: HandleRange,
    ) -> Result<(), LinkError> {
        (**self).discover_characteristics(conn_handle, range)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording link used by the unit tests

    use super::{GattLink, LinkError};
    use crate::gatt::HandleRange;
    use bt_hci::param::ConnHandle;
    use core::cell::{Cell, RefCell};
    use heapless::Vec;

    /// Kind of request the engine issued
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RequestKind {
        Services,
        Characteristics,
    }

    /// One issued request
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IssuedRequest {
        pub kind: RequestKind,
        pub conn_handle: u16,
        pub range: HandleRange,
    }

    /// Link that records every request and can be told to reject them
    #[derive(Default)]
    pub struct RecordingLink {
        pub requests: RefCell<Vec<IssuedRequest, 32>>,
        pub reject_with: Cell<Option<LinkError>>,
    }

    impl RecordingLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rejecting(error: LinkError) -> Self {
            let link = Self::default();
            link.reject_with.set(Some(error));
            link
        }

        pub fn last(&self) -> Option<IssuedRequest> {
            self.requests.borrow().last().copied()
        }

        pub fn count(&self) -> usize {
            self.requests.borrow().len()
        }

        fn record(
            &self,
            kind: RequestKind,
            conn_handle: ConnHandle,
            range: HandleRange,
        ) -> Result<(), LinkError> {
            if let Some(error) = self.reject_with.get() {
                return Err(error);
            }
            self.requests
                .borrow_mut()
                .push(IssuedRequest {
                    kind,
                    conn_handle: conn_handle.raw(),
                    range,
                })
                .map_err(|_| LinkError::NoResources)
        }
    }

    impl GattLink for RecordingLink {
        fn discover_primary_services(
            &self,
            conn_handle: ConnHandle,
            range: HandleRange,
        ) -> Result<(), LinkError> {
            self.record(RequestKind::Services, conn_handle, range)
        }

        fn discover_characteristics(
            &self,
            conn_handle: ConnHandle,
            range: HandleRange,
        ) -> Result<(), LinkError> {
            self.record(RequestKind::Characteristics, conn_handle, range)
        }
    }
}
