//! GATT discovery
//!
//! A walk enumerates the primary services of a peer and, optionally, the
//! characteristics inside each matched service. The [`DiscoveryEngine`] owns the
//! state machine, the [`DiscoverySession`] holds its state and a
//! [`DiscoveryHandler`] receives the results.
//!
//! Every service is reported before the first characteristic request goes out;
//! characteristics are then discovered service by service.
//!
//! ```text
//!            launch                  matched service
//!   Idle ───────────► Services ─────────────────────► Characteristics
//!    ▲                 │    ▲                                 │
//!    │  table exhausted│    └──── range exhausted ────────────┘
//!    └─────────────────┘
//! ```

pub mod engine;
pub mod session;

pub use engine::DiscoveryEngine;
pub use session::{
    DiscoveryHandler, DiscoveryOptions, DiscoverySession, Phase, TerminationReason,
};
