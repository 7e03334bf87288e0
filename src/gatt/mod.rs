//! GATT discovery data types
//!
//! Plain value types shared by the discovery engine and the link layer: attribute
//! handles and ranges, short UUIDs and filters, the discovered-entity records and
//! the response pages that carry them.

pub mod entity;
pub mod page;

pub use entity::{CharacteristicProperties, DiscoveredCharacteristic, DiscoveredService};
pub use page::{CharacteristicPage, LinkEvent, ServicePage};

use crate::constants::{BLE_UUID_UNKNOWN, MAX_HANDLE, SERVICE_DISCOVERY_START_HANDLE};

/// Attribute handle on the peer's GATT table
pub type Handle = u16;

/// 16-bit Bluetooth SIG UUID
pub type ShortUuid = u16;

/// Inclusive range of attribute handles `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    /// First handle in the range
    pub start: Handle,
    /// Last handle in the range
    pub end: Handle,
}

impl HandleRange {
    /// Create a range, returning `None` when `start > end`
    #[must_use]
    pub const fn new(start: Handle, end: Handle) -> Option<Self> {
        if start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// The whole handle space a service walk covers
    #[must_use]
    pub const fn full() -> Self {
        Self {
            start: SERVICE_DISCOVERY_START_HANDLE,
            end: MAX_HANDLE,
        }
    }

    /// Range from `start` to the largest handle
    #[must_use]
    pub const fn from_start(start: Handle) -> Self {
        Self {
            start,
            end: MAX_HANDLE,
        }
    }

    /// Check whether `handle` lies inside the range
    #[must_use]
    pub const fn contains(&self, handle: Handle) -> bool {
        handle >= self.start && handle <= self.end
    }
}

/// UUID constraint applied to discovered entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UuidFilter {
    /// Report every entity
    #[default]
    Any,
    /// Report only entities with exactly this UUID
    Uuid(ShortUuid),
}

impl UuidFilter {
    /// Check whether `uuid` passes the filter
    #[must_use]
    pub const fn matches(&self, uuid: ShortUuid) -> bool {
        match self {
            Self::Any => true,
            Self::Uuid(expected) => *expected == uuid,
        }
    }
}

impl From<ShortUuid> for UuidFilter {
    /// `BLE_UUID_UNKNOWN` is the wildcard
    fn from(uuid: ShortUuid) -> Self {
        if uuid == BLE_UUID_UNKNOWN {
            Self::Any
        } else {
            Self::Uuid(uuid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_range_rejects_inverted_bounds() {
        assert!(HandleRange::new(0x0010, 0x000F).is_none());
        assert_eq!(
            HandleRange::new(0x0010, 0x0010),
            Some(HandleRange {
                start: 0x0010,
                end: 0x0010
            })
        );
    }

    #[test]
    fn test_handle_range_full_and_contains() {
        let full = HandleRange::full();
        assert_eq!(full.start, 0x0001);
        assert_eq!(full.end, 0xFFFF);
        assert!(!full.contains(0x0000));
        assert!(full.contains(0x0001));
        assert!(full.contains(0xFFFF));

        let tail = HandleRange::from_start(0x0020);
        assert!(!tail.contains(0x001F));
        assert!(tail.contains(0x0020));
    }

    #[test]
    fn test_uuid_filter_matching() {
        assert!(UuidFilter::Any.matches(0x180F));
        assert!(UuidFilter::Uuid(0x180F).matches(0x180F));
        assert!(!UuidFilter::Uuid(0x180F).matches(0x180A));
    }

    #[test]
    fn test_uuid_filter_from_wildcard() {
        assert_eq!(UuidFilter::from(BLE_UUID_UNKNOWN), UuidFilter::Any);
        assert_eq!(UuidFilter::from(0x2A19), UuidFilter::Uuid(0x2A19));
        assert_eq!(UuidFilter::default(), UuidFilter::Any);
    }
}
