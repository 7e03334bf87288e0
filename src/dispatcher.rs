//! Connection dispatcher
//!
//! Maps connection handles to discovery engines so that several connections can
//! be walked independently. The table is owned by the caller; there is no global
//! instance.

use crate::DiscoveryError;
use crate::discovery::{DiscoveryEngine, DiscoveryHandler, DiscoveryOptions};
use crate::gatt::LinkEvent;
use crate::link::GattLink;
use bt_hci::param::ConnHandle;
use heapless::FnvIndexMap;

/// Routes link events to the engine of their connection
///
/// `N` is the number of connections tracked at once and must be a power of two.
pub struct Dispatcher<H, const N: usize> {
    engines: FnvIndexMap<u16, DiscoveryEngine<H>, N>,
}

impl<H: DiscoveryHandler, const N: usize> Dispatcher<H, N> {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: FnvIndexMap::new(),
        }
    }

    /// Number of connections with an engine
    #[must_use]
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Check if no connection has an engine
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Engine of a connection
    #[must_use]
    pub fn engine(&self, conn_handle: ConnHandle) -> Option<&DiscoveryEngine<H>> {
        self.engines.get(&conn_handle.raw())
    }

    /// Check if a walk is in progress on a connection
    #[must_use]
    pub fn is_active(&self, conn_handle: ConnHandle) -> bool {
        self.engine(conn_handle)
            .is_some_and(DiscoveryEngine::is_active)
    }

    /// Start a walk on `conn_handle`
    ///
    /// When the table is full an idle engine is evicted to make room. Its handler
    /// is dropped with it, so collect results with [`Dispatcher::release`] before
    /// launching on another connection if they are still needed.
    ///
    /// # Errors
    /// * [`DiscoveryError::TooManyConnections`] if every slot holds an active walk
    /// * any error of [`DiscoveryEngine::launch`]
    pub fn launch<L: GattLink>(
        &mut self,
        link: &L,
        conn_handle: ConnHandle,
        handler: H,
        options: DiscoveryOptions,
    ) -> Result<(), DiscoveryError> {
        let key = conn_handle.raw();
        if !self.engines.contains_key(&key) {
            if self.engines.len() == N {
                self.evict_idle()?;
            }
            if self.engines.insert(key, DiscoveryEngine::new()).is_err() {
                return Err(DiscoveryError::TooManyConnections);
            }
            debug!("[DISPATCH] Engine added for connection {}", key);
        }

        let engine = self
            .engines
            .get_mut(&key)
            .ok_or(DiscoveryError::InvalidState)?;
        engine.launch(link, conn_handle, handler, options)
    }

    /// Queue a handle range on the walk of `conn_handle`
    ///
    /// # Errors
    /// * [`DiscoveryError::InvalidState`] if the connection has no active walk
    /// * any error of [`DiscoveryEngine::begin_characteristic_discovery`]
    pub fn begin_characteristic_discovery(
        &mut self,
        conn_handle: ConnHandle,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), DiscoveryError> {
        self.engines
            .get_mut(&conn_handle.raw())
            .ok_or(DiscoveryError::InvalidState)?
            .begin_characteristic_discovery(conn_handle, start_handle, end_handle)
    }

    /// Abort the walk of `conn_handle`, if any
    pub fn terminate(&mut self, conn_handle: ConnHandle) {
        if let Some(engine) = self.engines.get_mut(&conn_handle.raw()) {
            engine.terminate();
        }
    }

    /// Remove the engine of a connection and hand it back
    pub fn release(&mut self, conn_handle: ConnHandle) -> Option<DiscoveryEngine<H>> {
        let engine = self.engines.remove(&conn_handle.raw());
        if engine.is_some() {
            debug!(
                "[DISPATCH] Engine released for connection {}",
                conn_handle.raw()
            );
        }
        engine
    }

    /// Route one link event
    ///
    /// Events for unknown connections are dropped. A disconnection also releases
    /// the connection's engine; its handler is returned so the caller can
    /// collect what it gathered.
    pub fn dispatch<L: GattLink>(&mut self, link: &L, event: &LinkEvent) -> Option<H> {
        let conn_handle = event.conn_handle();
        let Some(engine) = self.engines.get_mut(&conn_handle.raw()) else {
            debug!(
                "[DISPATCH] No engine for connection {}, event dropped",
                conn_handle.raw()
            );
            return None;
        };
        engine.on_link_event(link, event);

        if let LinkEvent::Disconnected { .. } = event {
            return self
                .release(conn_handle)
                .and_then(|mut engine| engine.take_handler());
        }
        None
    }

    /// Drop the first idle engine, handler included
    fn evict_idle(&mut self) -> Result<(), DiscoveryError> {
        let idle = self
            .engines
            .iter()
            .find(|(_, engine)| !engine.is_active())
            .map(|(key, _)| *key);
        match idle {
            Some(key) => {
                self.engines.remove(&key);
                debug!("[DISPATCH] Idle engine of connection {} evicted", key);
                Ok(())
            }
            None => {
                warn!("[DISPATCH] Connection table full");
                Err(DiscoveryError::TooManyConnections)
            }
        }
    }
}

impl<H: DiscoveryHandler, const N: usize> Default for Dispatcher<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
