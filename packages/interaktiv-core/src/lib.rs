//! Interaktiv Core - backend library for interactive live presentations.
//!
//! Audience members register a nickname, vote on Likert scales and submit
//! free-text answers over HTTP; every change is pushed to all open browsers
//! as Server-Sent Events.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`broadcast`]: Announcer fan-out, local and RPC broadcast services
//! - [`events`]: Event type and the producer-facing notifier
//! - [`services`]: Presentation state (nicknames, votes, answers)
//! - [`api`]: HTTP routes, SSE stream adapter and static files
//! - [`context`]: Network configuration (port, advertised IP)
//! - [`state`]: Configuration types
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`BroadcastService`](broadcast::BroadcastService): Publishing and subscribing,
//!   in-process or across an RPC boundary
//! - [`IpDetector`](context::IpDetector): Local IP detection

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod broadcast;
pub mod context;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod services;
pub mod state;

// Re-export commonly used types at the crate root
pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError};
pub use error::{ErrorCode, InteraktivError, InteraktivResult};
pub use events::{Event, Notifier};
pub use state::{BroadcastConfig, BroadcastMode, Config, SseConfig};

// Re-export broadcast types
pub use broadcast::{
    generate_token, Announcer, BroadcastEndpoint, BroadcastError, BroadcastResult,
    BroadcastServer, BroadcastService, BroadcastWorker, LocalBroadcastService,
    RemoteBroadcastService, Subscription,
};

// Re-export service types
pub use services::PresentationStore;

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with_network, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, AppStateBuilder, ServerError};
