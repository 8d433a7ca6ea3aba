// # routerdns-core
//
// Core library for the router DNS updater.
//
// The target routers expose no API for their LAN DNS settings, so the
// updater drives the web management UI through a remote browser session
// and re-applies the configured servers on a fixed interval.
//
// ## Architecture Overview
//
// - **RouterConfig**: immutable settings loaded once at startup
// - **validator**: gate that rejects malformed DNS address literals
// - **RemoteUiSession / SessionFactory**: capability traits over a browser
//   automation engine (implemented by `routerdns-webdriver`)
// - **RouterUpdateWorkflow**: the five-stage update sequence for one cycle
// - **CycleScheduler**: runs the workflow forever, owns session lifetime,
//   failure classification and the liveness signal
// - **LivenessMarker**: externally observable proof of the last success
//
// ## Design Principles
//
// 1. **Cycle-scoped failure**: a broken stage fails one cycle, never the process
// 2. **Scoped sessions**: every acquired session is closed exactly once
// 3. **Strictly sequential**: cycles never overlap
// 4. **Library-First**: the daemon only wires these pieces together

pub mod config;
pub mod error;
pub mod firmware;
pub mod liveness;
pub mod scheduler;
pub mod session;
pub mod validator;
pub mod workflow;

// Re-export core types for convenience
pub use config::{DnsServers, RouterConfig, SchedulerConfig};
pub use error::{Error, Result};
pub use firmware::FirmwareSelectors;
pub use liveness::{FileLivenessMarker, LivenessMarker, MemoryLivenessMarker};
pub use scheduler::{CycleScheduler, SchedulerEvent};
pub use session::{ElementHandle, RemoteUiSession, Selector, SessionFactory};
pub use workflow::{CycleResult, FailureKind, RouterUpdateWorkflow, Stage};
