#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

pub mod constants;
pub mod discovery;
pub mod dispatcher;
pub mod gatt;
pub mod link;
pub mod processor;

pub use discovery::{
    DiscoveryEngine, DiscoveryHandler, DiscoveryOptions, DiscoverySession, Phase,
    TerminationReason,
};
pub use dispatcher::Dispatcher;
pub use gatt::{
    CharacteristicPage, CharacteristicProperties, DiscoveredCharacteristic, DiscoveredService,
    Handle, HandleRange, LinkEvent, ServicePage, ShortUuid, UuidFilter,
};
pub use link::{GattLink, LinkError};

/// Errors returned synchronously by discovery operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryError {
    /// The operation does not fit the current phase (e.g. launch while a walk is active)
    InvalidState,
    /// Start handle is greater than end handle
    InvalidRange,
    /// The link layer refused to issue the request
    RequestRejected(LinkError),
    /// Every dispatcher slot holds an active walk
    TooManyConnections,
}

impl core::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidState => write!(f, "Discovery operation invalid in current state"),
            Self::InvalidRange => write!(f, "Start handle exceeds end handle"),
            Self::RequestRejected(e) => write!(f, "Discovery request rejected: {e}"),
            Self::TooManyConnections => write!(f, "No free discovery slot"),
        }
    }
}

impl From<LinkError> for DiscoveryError {
    fn from(error: LinkError) -> Self {
        Self::RequestRejected(error)
    }
}
