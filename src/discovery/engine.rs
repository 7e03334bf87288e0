//! Discovery engine
//!
//! Drives the two passes of a walk. The first pass pages through the primary
//! services table and reports every service. When the table is exhausted and
//! characteristics are wanted, the second pass expands each matched service into
//! its characteristics. Every transition happens either inside a caller
//! operation (`launch`, `begin_characteristic_discovery`, `terminate`) or inside
//! the ingestion of one response page.
//!
//! ## Paging
//!
//! The service cache holds one page. The first page is kept aside during the
//! reporting pass, so expansion starts on it directly; later pages are fetched
//! again (without reporting) once the expansion has used up the cache. The walk
//! only completes when the services table itself is exhausted.
//!
//! ## Robustness
//!
//! Pages are trusted but not blindly: entries out of the requested range or out of
//! ascending order end the current pass at the last well-formed entry. Every
//! follow-up request starts strictly after the previous one, so a walk always
//! terminates.

use super::session::{
    DiscoveryHandler, DiscoveryOptions, DiscoverySession, Phase, TerminationReason,
};
use crate::DiscoveryError;
use crate::constants::{MAX_HANDLE, SERVICE_DISCOVERY_START_HANDLE};
use crate::gatt::{
    CharacteristicPage, DiscoveredCharacteristic, DiscoveredService, HandleRange, LinkEvent,
    ServicePage,
};
use crate::link::GattLink;
use bt_hci::param::ConnHandle;

/// GATT discovery state machine for one connection at a time
#[derive(Debug)]
pub struct DiscoveryEngine<H> {
    session: DiscoverySession<H>,
}

impl<H: DiscoveryHandler> DiscoveryEngine<H> {
    /// Create an idle engine
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: DiscoverySession::new(),
        }
    }

    /// Read-only view of the session
    #[must_use]
    pub fn session(&self) -> &DiscoverySession<H> {
        &self.session
    }

    /// Handler of the current (or last) walk
    #[must_use]
    pub fn handler(&self) -> Option<&H> {
        self.session.handler()
    }

    /// Take the handler out of the engine
    pub fn take_handler(&mut self) -> Option<H> {
        self.session.take_handler()
    }

    /// Check if a walk is in progress
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Start walking the GATT table of `conn_handle`
    ///
    /// Issues a service discovery request over the whole handle space. `handler`
    /// receives every entity passing the filters in `options`.
    ///
    /// # Errors
    /// * [`DiscoveryError::InvalidState`] if a walk is already active; the running
    ///   walk is left untouched.
    /// * [`DiscoveryError::RequestRejected`] if the link refuses the first request;
    ///   the session returns to idle.
    pub fn launch<L: GattLink>(
        &mut self,
        link: &L,
        conn_handle: ConnHandle,
        handler: H,
        options: DiscoveryOptions,
    ) -> Result<(), DiscoveryError> {
        if self.session.is_active() {
            warn!(
                "[DISCOVERY] Launch on connection {} refused, walk already active",
                conn_handle.raw()
            );
            return Err(DiscoveryError::InvalidState);
        }

        self.session.start(conn_handle, handler, options);
        info!(
            "[DISCOVERY] Walk started on connection {}",
            conn_handle.raw()
        );

        let range = self.session.service_range;
        if let Err(e) = link.discover_primary_services(conn_handle, range) {
            warn!("[DISCOVERY] Service discovery request rejected: {}", e);
            self.session.teardown();
            return Err(DiscoveryError::RequestRejected(e));
        }
        debug!(
            "[DISCOVERY] Service request [{:#x}, {:#x}]",
            range.start, range.end
        );
        Ok(())
    }

    /// Walk the characteristics declared in `[start_handle, end_handle]`
    ///
    /// An active walk always has one request in flight, so the range is queued
    /// and expanded when the walk reaches its next service boundary: after the
    /// service page in flight has been ingested, or after the service being
    /// expanded is finished. The walk then carries on where it was. Characteristics
    /// of the range are reported through the characteristic filter, or
    /// unfiltered for a services-only walk.
    ///
    /// # Errors
    /// * [`DiscoveryError::InvalidState`] if no walk is active on `conn_handle`, or
    ///   a range is already queued
    /// * [`DiscoveryError::InvalidRange`] if `start_handle > end_handle`
    pub fn begin_characteristic_discovery(
        &mut self,
        conn_handle: ConnHandle,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), DiscoveryError> {
        if !self.is_bound_to(conn_handle) || self.session.queued_range.is_some() {
            return Err(DiscoveryError::InvalidState);
        }
        let range =
            HandleRange::new(start_handle, end_handle).ok_or(DiscoveryError::InvalidRange)?;

        self.session.queued_range = Some(range);
        debug!(
            "[DISCOVERY] Characteristic range [{:#x}, {:#x}] queued",
            range.start, range.end
        );
        Ok(())
    }

    /// Abort the walk
    ///
    /// No further requests are issued and no handler method is called. Does
    /// nothing when the engine is idle.
    pub fn terminate(&mut self) {
        if !self.session.is_active() {
            return;
        }
        info!("[DISCOVERY] Walk terminated by caller");
        self.session.teardown();
    }

    /// Feed one link event into the engine
    ///
    /// Events for another connection, or arriving while idle, are ignored.
    pub fn on_link_event<L: GattLink>(&mut self, link: &L, event: &LinkEvent) {
        if !self.is_bound_to(event.conn_handle()) {
            debug!(
                "[DISCOVERY] Ignoring event for connection {}",
                event.conn_handle().raw()
            );
            return;
        }

        match event {
            LinkEvent::ServiceDiscoveryResponse { page, .. } => {
                self.ingest_service_page(link, page);
            }
            LinkEvent::CharacteristicDiscoveryResponse { page, .. } => {
                self.ingest_characteristic_page(link, page);
            }
            LinkEvent::Timeout { .. } => {
                warn!("[DISCOVERY] Discovery request timed out");
                self.finish(TerminationReason::Timeout);
            }
            LinkEvent::Disconnected { .. } => {
                self.finish(TerminationReason::Disconnected);
            }
        }
    }

    /// Process one service-discovery response
    ///
    /// Ignored unless the service phase is active. Services are reported only
    /// during the first pass.
    pub fn ingest_service_page<L: GattLink>(&mut self, link: &L, page: &ServicePage) {
        if self.session.phase != Phase::ServiceDiscoveryActive {
            debug!("[DISCOVERY] Unexpected service page ignored");
            return;
        }
        debug!(
            "[DISCOVERY] Service page: {} entries, end of data {}",
            page.services.len(),
            page.end_of_data
        );

        let well_formed = self.cache_services(&page.services);
        let last_end = self.session.services.last().map(|s| s.end_handle);
        self.session.next_service_start = match last_end {
            Some(end) if well_formed && !page.end_of_data && end < MAX_HANDLE => Some(end + 1),
            _ => None,
        };

        if self.session.reporting_services {
            self.report_services();
            if self.session.service_range.start == SERVICE_DISCOVERY_START_HANDLE {
                self.session.retain_first_page();
            }
        }
        self.advance(link);
    }

    /// Process one characteristic-discovery response
    ///
    /// Ignored unless the characteristic phase is active.
    pub fn ingest_characteristic_page<L: GattLink>(
        &mut self,
        link: &L,
        page: &CharacteristicPage,
    ) {
        if self.session.phase != Phase::CharacteristicDiscoveryActive {
            debug!("[DISCOVERY] Unexpected characteristic page ignored");
            return;
        }
        debug!(
            "[DISCOVERY] Characteristic page: {} entries, end of data {}",
            page.characteristics.len(),
            page.end_of_data
        );

        let well_formed = self.cache_characteristics(&page.characteristics);
        self.report_characteristics();

        let range = self.session.characteristic_range;
        let next_start = match self.session.characteristics.last() {
            Some(last)
                if well_formed && !page.end_of_data && last.last_handle() < range.end =>
            {
                Some(last.declaration_handle + 1)
            }
            _ => None,
        };

        match next_start {
            Some(start) => self.start_characteristics(
                link,
                HandleRange {
                    start,
                    end: range.end,
                },
            ),
            None => {
                // Range exhausted; a caller range leaves the service cursor alone
                if self.session.caller_range {
                    self.session.caller_range = false;
                } else {
                    self.session.service_index += 1;
                }
                self.session.phase = Phase::ServiceDiscoveryActive;
                self.advance(link);
            }
        }
    }

    fn is_bound_to(&self, conn_handle: ConnHandle) -> bool {
        self.session.is_active()
            && self
                .session
                .conn_handle
                .is_some_and(|bound| bound.raw() == conn_handle.raw())
    }

    /// Copy the well-formed prefix of `services`; `false` if anything was dropped
    fn cache_services(&mut self, services: &[DiscoveredService]) -> bool {
        self.session.reset_services();
        let mut floor = self.session.service_range.start;
        for service in services {
            let ordered =
                service.start_handle >= floor && service.start_handle <= service.end_handle;
            if !ordered || self.session.services.push(*service).is_err() {
                warn!(
                    "[DISCOVERY] Malformed service page, stopping at handle {:#x}",
                    service.start_handle
                );
                return false;
            }
            if service.end_handle == MAX_HANDLE {
                break;
            }
            floor = service.end_handle + 1;
        }
        true
    }

    /// Copy the well-formed prefix of `characteristics`; `false` if anything was dropped
    fn cache_characteristics(&mut self, characteristics: &[DiscoveredCharacteristic]) -> bool {
        self.session.reset_characteristics();
        let range = self.session.characteristic_range;
        let mut floor = range.start;
        for characteristic in characteristics {
            let decl = characteristic.declaration_handle;
            let ordered = decl >= floor && range.contains(decl);
            if !ordered || self.session.characteristics.push(*characteristic).is_err() {
                warn!(
                    "[DISCOVERY] Malformed characteristic page, stopping at handle {:#x}",
                    decl
                );
                return false;
            }
            if decl == MAX_HANDLE {
                break;
            }
            floor = decl + 1;
        }
        true
    }

    fn report_services(&mut self) {
        let session = &mut self.session;
        let filter = session.options.service_filter;
        if let Some(handler) = session.handler.as_mut() {
            for service in &session.services {
                if filter.matches(service.uuid) {
                    handler.on_service_discovered(service);
                }
            }
        }
    }

    fn report_characteristics(&mut self) {
        let session = &mut self.session;
        let filter = session.options.characteristic_filter.unwrap_or_default();
        if let Some(handler) = session.handler.as_mut() {
            while let Some(characteristic) =
                session.characteristics.get(session.characteristic_index)
            {
                if filter.matches(characteristic.uuid) {
                    handler.on_characteristic_discovered(characteristic);
                }
                session.characteristic_index += 1;
            }
        }
    }

    /// Take the next step at a service boundary
    ///
    /// A queued caller range goes first. Otherwise the reporting pass fetches the
    /// next service page (or ends), and the expansion pass moves to the next
    /// matched service.
    fn advance<L: GattLink>(&mut self, link: &L) {
        if let Some(range) = self.session.queued_range.take() {
            self.session.caller_range = true;
            self.start_characteristics(link, range);
        } else if !self.session.reporting_services {
            self.expand_next_service(link);
        } else if self.session.next_service_start.is_some() {
            self.request_next_service_page(link);
        } else {
            self.end_service_report(link);
        }
    }

    /// The services table has been reported; expand it if characteristics are wanted
    fn end_service_report<L: GattLink>(&mut self, link: &L) {
        self.session.reporting_services = false;
        if !self.session.options.discovers_characteristics()
            || self.session.first_services.is_empty()
        {
            self.finish(TerminationReason::Completed);
            return;
        }
        debug!("[DISCOVERY] Services reported, expanding characteristics");
        self.session.restore_first_page();
        self.expand_next_service(link);
    }

    /// Start characteristic discovery on the next matched cached service, or move
    /// on to the next service page when none is left
    fn expand_next_service<L: GattLink>(&mut self, link: &L) {
        let filter = self.session.options.service_filter;
        while let Some(service) = self
            .session
            .services
            .get(self.session.service_index)
            .copied()
        {
            if !filter.matches(service.uuid) {
                self.session.service_index += 1;
                continue;
            }
            if let Some(range) = service.handle_range() {
                self.start_characteristics(link, range);
                return;
            }
            self.session.service_index += 1;
        }
        self.request_next_service_page(link);
    }

    fn request_next_service_page<L: GattLink>(&mut self, link: &L) {
        let Some(start) = self.session.next_service_start else {
            self.finish(TerminationReason::Completed);
            return;
        };
        let Some(conn_handle) = self.session.conn_handle else {
            return;
        };

        let range = HandleRange::from_start(start);
        match link.discover_primary_services(conn_handle, range) {
            Ok(()) => {
                self.session.phase = Phase::ServiceDiscoveryActive;
                self.session.service_range = range;
                debug!(
                    "[DISCOVERY] Service request [{:#x}, {:#x}]",
                    range.start, range.end
                );
            }
            Err(e) => {
                warn!("[DISCOVERY] Service discovery request rejected: {}", e);
                self.finish(TerminationReason::RequestRejected(e));
            }
        }
    }

    /// Request characteristics in `range`; a refused request ends the walk
    fn start_characteristics<L: GattLink>(&mut self, link: &L, range: HandleRange) {
        if let Err(DiscoveryError::RequestRejected(e)) = self.request_characteristics(link, range)
        {
            self.finish(TerminationReason::RequestRejected(e));
        }
    }

    /// Issue the request, then commit the new range; the session is unchanged on error
    fn request_characteristics<L: GattLink>(
        &mut self,
        link: &L,
        range: HandleRange,
    ) -> Result<(), DiscoveryError> {
        let conn_handle = self.session.conn_handle.ok_or(DiscoveryError::InvalidState)?;

        link.discover_characteristics(conn_handle, range)
            .map_err(|e| {
                warn!(
                    "[DISCOVERY] Characteristic discovery request rejected: {}",
                    e
                );
                DiscoveryError::RequestRejected(e)
            })?;
        self.session.reset_characteristics();
        self.session.characteristic_range = range;
        self.session.phase = Phase::CharacteristicDiscoveryActive;
        debug!(
            "[DISCOVERY] Characteristic request [{:#x}, {:#x}]",
            range.start, range.end
        );
        Ok(())
    }

    /// End the walk without caller action and tell the handler why
    fn finish(&mut self, reason: TerminationReason) {
        let Some(conn_handle) = self.session.conn_handle else {
            return;
        };
        match reason {
            TerminationReason::Completed => info!(
                "[DISCOVERY] Walk completed on connection {}",
                conn_handle.raw()
            ),
            _ => warn!(
                "[DISCOVERY] Walk on connection {} ended: {}",
                conn_handle.raw(),
                reason
            ),
        }
        self.session.teardown();
        if let Some(handler) = self.session.handler.as_mut() {
            handler.on_discovery_terminated(conn_handle, reason);
        }
    }
}

impl<H: DiscoveryHandler> Default for DiscoveryEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}
