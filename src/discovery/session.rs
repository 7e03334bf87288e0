//! Discovery session state
//!
//! The mutable record of one in-progress walk. Only the engine mutates it; callers
//! observe it through the read-only accessors.

use crate::constants::{MAX_CHARACTERISTICS_PER_PAGE, MAX_SERVICES_PER_PAGE};
use crate::gatt::{DiscoveredCharacteristic, DiscoveredService, Handle, HandleRange, UuidFilter};
use crate::link::LinkError;
use bt_hci::param::ConnHandle;
use heapless::Vec;

/// Which discovery pass is driving requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No walk in progress
    #[default]
    Idle,
    /// Walking the primary services table
    ServiceDiscoveryActive,
    /// Walking the characteristics of one service
    CharacteristicDiscoveryActive,
}

/// Why a walk ended without a caller `terminate()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TerminationReason {
    /// The whole handle space was walked
    Completed,
    /// The link layer gave up waiting for a response
    Timeout,
    /// The connection was closed
    Disconnected,
    /// A follow-up request was refused by the link layer
    RequestRejected(LinkError),
}

/// Sink for discovered entities
///
/// Methods run synchronously, inline with page ingestion. A handler only sees the
/// records it is given and has no path back into the engine, so it cannot launch
/// or terminate the walk that is calling it.
pub trait DiscoveryHandler {
    /// A service passing the service filter was discovered
    fn on_service_discovered(&mut self, service: &DiscoveredService);

    /// A characteristic passing the characteristic filter was discovered
    fn on_characteristic_discovered(&mut self, characteristic: &DiscoveredCharacteristic) {
        let _ = characteristic;
    }

    /// The walk ended on its own (not through `terminate()`)
    fn on_discovery_terminated(&mut self, conn_handle: ConnHandle, reason: TerminationReason) {
        let _ = (conn_handle, reason);
    }
}

/// Filters applied by one walk
///
/// # Examples
///
/// ```rust
/// use gattwalk::DiscoveryOptions;
///
/// // Services only, every UUID
/// let services = DiscoveryOptions::services_only();
///
/// // Battery service and its battery level characteristic
/// let battery = DiscoveryOptions::default()
///     .with_service_uuid(0x180F)
///     .with_characteristic_uuid(0x2A19);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryOptions {
    /// Services reported (and expanded) by the walk
    pub service_filter: UuidFilter,
    /// Characteristics reported by the walk; `None` skips characteristic discovery
    pub characteristic_filter: Option<UuidFilter>,
}

impl DiscoveryOptions {
    /// Discover every service and every characteristic
    #[must_use]
    pub const fn all() -> Self {
        Self {
            service_filter: UuidFilter::Any,
            characteristic_filter: Some(UuidFilter::Any),
        }
    }

    /// Discover every service, no characteristics
    #[must_use]
    pub const fn services_only() -> Self {
        Self {
            service_filter: UuidFilter::Any,
            characteristic_filter: None,
        }
    }

    /// Restrict the walk to services with this UUID (`0x0000` means any)
    #[must_use]
    pub fn with_service_uuid(mut self, uuid: u16) -> Self {
        self.service_filter = UuidFilter::from(uuid);
        self
    }

    /// Discover characteristics, restricted to this UUID (`0x0000` means any)
    #[must_use]
    pub fn with_characteristic_uuid(mut self, uuid: u16) -> Self {
        self.characteristic_filter = Some(UuidFilter::from(uuid));
        self
    }

    /// Discover characteristics of every UUID
    #[must_use]
    pub fn with_characteristics(mut self) -> Self {
        self.characteristic_filter = Some(UuidFilter::Any);
        self
    }

    /// Whether the walk expands matched services into their characteristics
    #[must_use]
    pub const fn discovers_characteristics(&self) -> bool {
        self.characteristic_filter.is_some()
    }
}

/// State of one discovery walk
#[derive(Debug)]
pub struct DiscoverySession<H> {
    pub(crate) conn_handle: Option<ConnHandle>,
    pub(crate) phase: Phase,
    /// Cached service currently expanded (or next to be)
    pub(crate) service_index: usize,
    /// Cached characteristics already reported
    pub(crate) characteristic_index: usize,
    pub(crate) services: Vec<DiscoveredService, MAX_SERVICES_PER_PAGE>,
    pub(crate) characteristics: Vec<DiscoveredCharacteristic, MAX_CHARACTERISTICS_PER_PAGE>,
    pub(crate) options: DiscoveryOptions,
    pub(crate) handler: Option<H>,
    /// Start of the next unfetched service page, `None` once the table is exhausted
    pub(crate) next_service_start: Option<Handle>,
    /// Range of the outstanding service request
    pub(crate) service_range: HandleRange,
    /// Range of the outstanding characteristic request
    pub(crate) characteristic_range: HandleRange,
    /// First pass: service pages are reported, not yet expanded
    pub(crate) reporting_services: bool,
    /// First service page, kept so expansion can start without fetching it again
    pub(crate) first_services: Vec<DiscoveredService, MAX_SERVICES_PER_PAGE>,
    /// Start of the page following the first one
    pub(crate) first_next_start: Option<Handle>,
    /// Caller range waiting for the next service boundary
    pub(crate) queued_range: Option<HandleRange>,
    /// The characteristic pass in progress expands a caller range
    pub(crate) caller_range: bool,
}

impl<H> DiscoverySession<H> {
    /// Create an idle session
    #[must_use]
    pub fn new() -> Self {
        Self {
            conn_handle: None,
            phase: Phase::Idle,
            service_index: 0,
            characteristic_index: 0,
            services: Vec::new(),
            characteristics: Vec::new(),
            options: DiscoveryOptions::default(),
            handler: None,
            next_service_start: None,
            service_range: HandleRange::full(),
            characteristic_range: HandleRange::full(),
            reporting_services: false,
            first_services: Vec::new(),
            first_next_start: None,
            queued_range: None,
            caller_range: false,
        }
    }

    /// Bind the session to a connection and enter the service phase
    pub(crate) fn start(&mut self, conn_handle: ConnHandle, handler: H, options: DiscoveryOptions) {
        self.reset_services();
        self.reset_characteristics();
        self.conn_handle = Some(conn_handle);
        self.options = options;
        self.handler = Some(handler);
        self.service_range = HandleRange::full();
        self.next_service_start = Some(self.service_range.start);
        self.reporting_services = true;
        self.first_services.clear();
        self.first_next_start = None;
        self.queued_range = None;
        self.caller_range = false;
        self.phase = Phase::ServiceDiscoveryActive;
    }

    /// Return to idle and drop the page caches; the handler is kept for inspection
    pub(crate) fn teardown(&mut self) {
        self.reset_services();
        self.reset_characteristics();
        self.conn_handle = None;
        self.next_service_start = None;
        self.reporting_services = false;
        self.first_services.clear();
        self.first_next_start = None;
        self.queued_range = None;
        self.caller_range = false;
        self.phase = Phase::Idle;
    }

    /// Remember the cached page as the first page of the services table
    pub(crate) fn retain_first_page(&mut self) {
        self.first_services.clone_from(&self.services);
        self.first_next_start = self.next_service_start;
    }

    /// Put the first page back into the service cache for the expansion pass
    pub(crate) fn restore_first_page(&mut self) {
        self.services.clone_from(&self.first_services);
        self.service_index = 0;
        self.next_service_start = self.first_next_start;
        self.service_range = HandleRange::full();
    }

    pub(crate) fn reset_services(&mut self) {
        self.services.clear();
        self.service_index = 0;
    }

    pub(crate) fn reset_characteristics(&mut self) {
        self.characteristics.clear();
        self.characteristic_index = 0;
    }

    /// Check if a walk is in progress
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Connection the active walk is bound to
    #[must_use]
    pub fn conn_handle(&self) -> Option<ConnHandle> {
        self.conn_handle
    }

    /// Filters of the current (or last) walk
    #[must_use]
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Services of the current page
    #[must_use]
    pub fn services(&self) -> &[DiscoveredService] {
        &self.services
    }

    /// Characteristics of the current page
    #[must_use]
    pub fn characteristics(&self) -> &[DiscoveredCharacteristic] {
        &self.characteristics
    }

    /// Number of valid entries in the service cache
    #[must_use]
    pub fn num_services(&self) -> usize {
        self.services.len()
    }

    /// Number of valid entries in the characteristic cache
    #[must_use]
    pub fn num_characteristics(&self) -> usize {
        self.characteristics.len()
    }

    /// Service cursor
    #[must_use]
    pub fn service_index(&self) -> usize {
        self.service_index
    }

    /// Characteristic cursor
    #[must_use]
    pub fn characteristic_index(&self) -> usize {
        self.characteristic_index
    }

    /// Whether service pages beyond the cached one remain to be fetched
    #[must_use]
    pub fn more_services_pending(&self) -> bool {
        self.next_service_start.is_some()
    }

    /// Whether the walk is still reporting service pages (before any expansion)
    #[must_use]
    pub fn is_reporting_services(&self) -> bool {
        self.reporting_services
    }

    /// Caller range waiting to be expanded
    #[must_use]
    pub fn queued_range(&self) -> Option<HandleRange> {
        self.queued_range
    }

    /// Handler of the current (or last) walk
    #[must_use]
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Mutable access to the handler of the current (or last) walk
    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.handler.as_mut()
    }

    /// Take the handler out of the session
    pub fn take_handler(&mut self) -> Option<H> {
        self.handler.take()
    }
}

impl<H> Default for DiscoverySession<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl DiscoveryHandler for Nothing {
        fn on_service_discovered(&mut self, _service: &DiscoveredService) {}
    }

    #[test]
    fn test_new_session_is_idle() {
        let session: DiscoverySession<Nothing> = DiscoverySession::new();
        assert!(!session.is_active());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.num_services(), 0);
        assert_eq!(session.num_characteristics(), 0);
        assert!(session.conn_handle().is_none());
        assert!(!session.more_services_pending());
    }

    #[test]
    fn test_start_and_teardown() {
        let mut session = DiscoverySession::new();
        session.start(ConnHandle::new(7), Nothing, DiscoveryOptions::all());
        assert_eq!(session.phase(), Phase::ServiceDiscoveryActive);
        assert_eq!(session.conn_handle().map(|c| c.raw()), Some(7));
        assert!(session.more_services_pending());

        session
            .services
            .push(DiscoveredService::new(0x1800, 1, 5))
            .unwrap();
        session.service_index = 1;

        session.teardown();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.num_services(), 0);
        assert_eq!(session.service_index(), 0);
        assert!(!session.is_reporting_services());
        assert!(session.handler().is_some());
    }

    #[test]
    fn test_first_page_restored_for_expansion() {
        let mut session = DiscoverySession::new();
        session.start(ConnHandle::new(7), Nothing, DiscoveryOptions::all());
        session
            .services
            .push(DiscoveredService::new(0x1800, 1, 5))
            .unwrap();
        session.next_service_start = Some(6);
        session.retain_first_page();

        session.reset_services();
        session
            .services
            .push(DiscoveredService::new(0x180F, 6, 9))
            .unwrap();
        session.service_index = 1;
        session.next_service_start = None;

        session.restore_first_page();
        assert_eq!(session.services(), &[DiscoveredService::new(0x1800, 1, 5)]);
        assert_eq!(session.service_index(), 0);
        assert!(session.more_services_pending());
    }

    #[test]
    fn test_options_builders() {
        let options = DiscoveryOptions::services_only();
        assert!(!options.discovers_characteristics());

        let options = DiscoveryOptions::default()
            .with_service_uuid(0x180F)
            .with_characteristic_uuid(0x2A19);
        assert_eq!(options.service_filter, UuidFilter::Uuid(0x180F));
        assert_eq!(options.characteristic_filter, Some(UuidFilter::Uuid(0x2A19)));

        let options = DiscoveryOptions::default()
            .with_service_uuid(0x0000)
            .with_characteristics();
        assert_eq!(options, DiscoveryOptions::all());
    }
}
