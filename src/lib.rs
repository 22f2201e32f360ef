//! Orchestration layer for Medicare fee-for-service claims processing: a canonical claim model,
//! a dependency-aware pipeline engine over 14 module clients, fiscal-year version dispatch for
//! the DRG grouper, a time-indexed provider reference store, and the adapter layer that isolates
//! each vendor logic engine from the rest of the process. The library is the interface; there is
//! no CLI surface.

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod modules;
pub mod orchestrator;
pub mod refdata;
pub mod version;

pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
