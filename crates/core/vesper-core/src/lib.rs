//! Core types and ambient stack for the Affect Core: the error taxonomy, a
//! clock abstraction, the closed dimension/event-kind sets, the
//! `Generator`/`Transport` external contracts, service lifecycle, shutdown
//! coordination, config loading, and logging setup.
//!
//! This crate owns no emotional dynamics itself — that lives in
//! `vesper-affect` — only the vocabulary every other crate in the workspace
//! shares.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod shutdown;
pub mod traits;
pub mod types;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AffectConfig, DecayParams, GenerationParamsRow, InteractionParams, ModulationParams,
    SchedulerParams, TriggerParams,
};
pub use error::{Result, VesperError};
pub use service::{Service, ServiceHealth};
pub use shutdown::{ShutdownCoordinator, ShutdownReceiver, ShutdownSignal};
pub use traits::{Generator, Transport};
pub use types::{DeliverPayload, DeliveryOutcome, Dimension, EventKind, GenerateRequest, ToneFlags};
