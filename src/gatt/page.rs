//! Discovery response pages and inbound link events
//!
//! A page is one bounded batch of results delivered by a single response from the
//! link layer. Its capacity equals the engine's cache capacity, so a page always
//! fits the cache it is copied into.

use super::{DiscoveredCharacteristic, DiscoveredService};
use crate::constants::{MAX_CHARACTERISTICS_PER_PAGE, MAX_SERVICES_PER_PAGE};
use bt_hci::param::ConnHandle;
use heapless::Vec;

/// One service-discovery response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePage {
    /// Services in ascending handle order
    pub services: Vec<DiscoveredService, MAX_SERVICES_PER_PAGE>,
    /// The link layer reports that no services remain beyond this page
    pub end_of_data: bool,
}

impl ServicePage {
    /// Build a page from the services of one response.
    ///
    /// Entries beyond [`MAX_SERVICES_PER_PAGE`] are dropped and `end_of_data` is
    /// cleared, so the dropped entries are requested again by the next round.
    #[must_use]
    pub fn new(services: &[DiscoveredService], end_of_data: bool) -> Self {
        let (services, truncated) = bounded(services);
        Self {
            services,
            end_of_data: end_of_data && !truncated,
        }
    }

    /// Empty page signalling that no (further) services exist
    #[must_use]
    pub fn end() -> Self {
        Self {
            services: Vec::new(),
            end_of_data: true,
        }
    }
}

/// One characteristic-discovery response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacteristicPage {
    /// Characteristics in ascending declaration-handle order
    pub characteristics: Vec<DiscoveredCharacteristic, MAX_CHARACTERISTICS_PER_PAGE>,
    /// The link layer reports that no characteristics remain in the requested range
    pub end_of_data: bool,
}

impl CharacteristicPage {
    /// Build a page from the characteristics of one response.
    ///
    /// Entries beyond [`MAX_CHARACTERISTICS_PER_PAGE`] are dropped and
    /// `end_of_data` is cleared.
    #[must_use]
    pub fn new(characteristics: &[DiscoveredCharacteristic], end_of_data: bool) -> Self {
        let (characteristics, truncated) = bounded(characteristics);
        Self {
            characteristics,
            end_of_data: end_of_data && !truncated,
        }
    }

    /// Empty page signalling that no (further) characteristics exist in range
    #[must_use]
    pub fn end() -> Self {
        Self {
            characteristics: Vec::new(),
            end_of_data: true,
        }
    }
}

fn bounded<T: Copy, const N: usize>(entries: &[T]) -> (Vec<T, N>, bool) {
    let mut out = Vec::new();
    for entry in entries {
        if out.push(*entry).is_err() {
            return (out, true);
        }
    }
    (out, false)
}

/// Event delivered by the link layer for one connection
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Response to a primary service discovery request
    ServiceDiscoveryResponse {
        /// Connection the response belongs to
        conn_handle: ConnHandle,
        /// Discovered services
        page: ServicePage,
    },
    /// Response to a characteristic discovery request
    CharacteristicDiscoveryResponse {
        /// Connection the response belongs to
        conn_handle: ConnHandle,
        /// Discovered characteristics
        page: CharacteristicPage,
    },
    /// The outstanding request was not answered in time
    Timeout {
        /// Connection the request was issued on
        conn_handle: ConnHandle,
    },
    /// The connection went away
    Disconnected {
        /// Connection that was closed
        conn_handle: ConnHandle,
    },
}

impl LinkEvent {
    /// Connection the event is tagged with
    #[must_use]
    pub fn conn_handle(&self) -> ConnHandle {
        match self {
            Self::ServiceDiscoveryResponse { conn_handle, .. }
            | Self::CharacteristicDiscoveryResponse { conn_handle, .. }
            | Self::Timeout { conn_handle }
            | Self::Disconnected { conn_handle } => *conn_handle,
        }
    }
}
