//! Discovered-entity records
//!
//! One record per service or characteristic reported by the peer. Records are
//! plain `Copy` values; the engine overwrites its page caches wholesale with every
//! new response.

use super::{Handle, HandleRange, ShortUuid};

/// A primary service and the handle range it occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredService {
    /// Service UUID
    pub uuid: ShortUuid,
    /// First handle of the service (the service declaration)
    pub start_handle: Handle,
    /// Last handle belonging to the service
    pub end_handle: Handle,
}

impl DiscoveredService {
    /// Create a new service record
    #[must_use]
    pub const fn new(uuid: ShortUuid, start_handle: Handle, end_handle: Handle) -> Self {
        Self {
            uuid,
            start_handle,
            end_handle,
        }
    }

    /// Handle range of the service, `None` if the peer reported inverted bounds
    #[must_use]
    pub const fn handle_range(&self) -> Option<HandleRange> {
        HandleRange::new(self.start_handle, self.end_handle)
    }
}

/// Characteristic properties octet
///
/// Each bit is independent. The raw value is the properties field of the
/// characteristic declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicProperties {
    raw: u8,
}

impl CharacteristicProperties {
    /// Broadcasting of the value permitted
    pub const BROADCAST: u8 = 0x01;
    /// Reading the value permitted
    pub const READ: u8 = 0x02;
    /// Writing the value with Write Command permitted
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    /// Writing the value with Write Request permitted
    pub const WRITE: u8 = 0x08;
    /// Notifications of the value permitted
    pub const NOTIFY: u8 = 0x10;
    /// Indications of the value permitted
    pub const INDICATE: u8 = 0x20;
    /// Writing the value with Signed Write Command permitted
    pub const AUTHENTICATED_SIGNED_WRITE: u8 = 0x40;

    const KNOWN: u8 = 0x7F;

    /// Create properties from the raw octet. Bits outside the known set are dropped.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            raw: raw & Self::KNOWN,
        }
    }

    /// Get the raw properties octet
    #[must_use]
    pub const fn raw(&self) -> u8 {
        self.raw
    }

    const fn has(&self, mask: u8) -> bool {
        self.raw & mask != 0
    }

    /// Broadcast bit
    #[must_use]
    pub const fn broadcast(&self) -> bool {
        self.has(Self::BROADCAST)
    }

    /// Read bit
    #[must_use]
    pub const fn read(&self) -> bool {
        self.has(Self::READ)
    }

    /// Write-without-response bit
    #[must_use]
    pub const fn write_without_response(&self) -> bool {
        self.has(Self::WRITE_WITHOUT_RESPONSE)
    }

    /// Write bit
    #[must_use]
    pub const fn write(&self) -> bool {
        self.has(Self::WRITE)
    }

    /// Notify bit
    #[must_use]
    pub const fn notify(&self) -> bool {
        self.has(Self::NOTIFY)
    }

    /// Indicate bit
    #[must_use]
    pub const fn indicate(&self) -> bool {
        self.has(Self::INDICATE)
    }

    /// Authenticated-signed-write bit
    #[must_use]
    pub const fn authenticated_signed_write(&self) -> bool {
        self.has(Self::AUTHENTICATED_SIGNED_WRITE)
    }
}

impl From<u8> for CharacteristicProperties {
    fn from(raw: u8) -> Self {
        Self::from_raw(raw)
    }
}

impl From<CharacteristicProperties> for u8 {
    fn from(properties: CharacteristicProperties) -> Self {
        properties.raw
    }
}

/// A characteristic declared inside the service currently being expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredCharacteristic {
    /// Characteristic UUID
    pub uuid: ShortUuid,
    /// Permitted operations on the value
    pub properties: CharacteristicProperties,
    /// Handle of the characteristic declaration
    pub declaration_handle: Handle,
    /// Handle of the characteristic value
    pub value_handle: Handle,
}

impl DiscoveredCharacteristic {
    /// Create a new characteristic record
    #[must_use]
    pub const fn new(
        uuid: ShortUuid,
        properties: CharacteristicProperties,
        declaration_handle: Handle,
        value_handle: Handle,
    ) -> Self {
        Self {
            uuid,
            properties,
            declaration_handle,
            value_handle,
        }
    }

    /// Highest handle this record occupies
    #[must_use]
    pub const fn last_handle(&self) -> Handle {
        if self.value_handle > self.declaration_handle {
            self.value_handle
        } else {
            self.declaration_handle
        }
    }
}
