//! `GattWalk` Constants
//!
//! This module contains the fixed limits and protocol values used throughout the
//! `GattWalk` library. The page capacities are part of the public contract: a peer
//! exposing more entities than one page holds is always walked in several rounds.

use crate::gatt::{Handle, ShortUuid};

/// Maximum number of services retained from a single service-discovery response
pub const MAX_SERVICES_PER_PAGE: usize = 4;

/// Maximum number of characteristics retained from a single characteristic-discovery response
pub const MAX_CHARACTERISTICS_PER_PAGE: usize = 4;

/// First attribute handle requested when a walk starts
pub const SERVICE_DISCOVERY_START_HANDLE: Handle = 0x0001;

/// Largest representable attribute handle
pub const MAX_HANDLE: Handle = 0xFFFF;

/// Wildcard short UUID (`BLE_UUID_UNKNOWN`), matches every entity when used as a filter
pub const BLE_UUID_UNKNOWN: ShortUuid = 0x0000;

/// Maximum number of connections a dispatcher tracks at once (must be a power of two)
pub const MAX_CONNECTIONS: usize = 4;

/// Depth of the inbound link event queue used by the processor task
pub const EVENT_QUEUE_DEPTH: usize = 8;
