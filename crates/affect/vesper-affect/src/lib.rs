//! Pure emotional dynamics for the Affect Core: the emotion state vector,
//! the Decay Engine, the Interaction Handler, and the Modulator.
//!
//! Everything in this crate is deterministic given its inputs — no clocks
//! are read internally, no I/O happens here. The Scheduler crate is the
//! only thing that owns a live [`EmotionState`] and calls into these pure
//! functions on a timer or in response to events.

#![warn(missing_docs)]

pub mod decay;
pub mod interaction;
pub mod modulator;
pub mod state;

pub use decay::{advance, DecayConfig, DecayOutcome};
pub use interaction::{
    DeltaTable, InteractionConfig, InteractionEvent, InteractionHandler, InteractionRecord,
};
pub use modulator::{modulate, validate, GenerationParams, ModulationConfig, ModulationOutcome};
pub use state::{DeltaOutcome, EmotionState};
