//! Processor task - link event processing
//!
//! The link layer pushes [`LinkEvent`]s into a bounded `embassy-sync` channel.
//! The processor drains that channel into a [`Dispatcher`] held behind a mutex,
//! so engines are never entered concurrently even when API calls and event
//! processing run in separate tasks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embassy_sync::{channel::Channel, mutex::Mutex, signal::Signal};
//! use gattwalk::constants::{EVENT_QUEUE_DEPTH, MAX_CONNECTIONS};
//! use gattwalk::{Dispatcher, LinkEvent, processor};
//!
//! static EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_DEPTH> = Channel::new();
//! static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();
//!
//! async fn discovery_task(link: &MyLink) {
//!     let dispatcher: Mutex<CriticalSectionRawMutex, Dispatcher<MyHandler, MAX_CONNECTIONS>> =
//!         Mutex::new(Dispatcher::new());
//!     // Launch walks through `dispatcher.lock().await.launch(..)` from other tasks
//!     processor::run(&dispatcher, link, &EVENTS.receiver(), &STOP).await;
//! }
//! ```

use crate::discovery::DiscoveryHandler;
use crate::dispatcher::Dispatcher;
use crate::gatt::LinkEvent;
use crate::link::GattLink;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

/// Wait for one link event and dispatch it
///
/// Returns the handler of an engine released by a disconnection.
pub async fn process_next_event<M, H, L, const N: usize, const Q: usize>(
    dispatcher: &Mutex<M, Dispatcher<H, N>>,
    link: &L,
    events: &Receiver<'_, M, LinkEvent, Q>,
) -> Option<H>
where
    M: RawMutex,
    H: DiscoveryHandler,
    L: GattLink,
{
    let event = events.receive().await;
    handle_event(dispatcher, link, &event).await
}

/// Process link events until `stop` is signalled
///
/// Events already queued when the stop request arrives are still dispatched.
pub async fn run<M, H, L, const N: usize, const Q: usize>(
    dispatcher: &Mutex<M, Dispatcher<H, N>>,
    link: &L,
    events: &Receiver<'_, M, LinkEvent, Q>,
    stop: &Signal<M, ()>,
) where
    M: RawMutex,
    H: DiscoveryHandler,
    L: GattLink,
{
    info!("[PROCESSOR] Link event processor started");
    loop {
        match select(events.receive(), stop.wait()).await {
            Either::First(event) => {
                handle_event(dispatcher, link, &event).await;
            }
            Either::Second(()) => {
                while let Ok(event) = events.try_receive() {
                    handle_event(dispatcher, link, &event).await;
                }
                info!("[PROCESSOR] Link event processor stopped");
                return;
            }
        }
    }
}

async fn handle_event<M, H, L, const N: usize>(
    dispatcher: &Mutex<M, Dispatcher<H, N>>,
    link: &L,
    event: &LinkEvent,
) -> Option<H>
where
    M: RawMutex,
    H: DiscoveryHandler,
    L: GattLink,
{
    debug!(
        "[PROCESSOR] Link event for connection {}",
        event.conn_handle().raw()
    );
    let mut dispatcher = dispatcher.lock().await;
    let released = dispatcher.dispatch(link, event);
    if released.is_some() {
        debug!("[PROCESSOR] Engine released after disconnection");
    }
    released
}
