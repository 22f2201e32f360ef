use thiserror::Error;

/// Typed error surface for the orchestration layer. Internal plumbing (file I/O, CSV parsing,
/// network transport inside the acquisition subsystem) keeps using `anyhow` at the call site and
/// is only converted to one of these variants at a module boundary that a caller needs to branch
/// on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed for claim {claim_id}: {reason}")]
    Validation { claim_id: String, reason: String },

    #[error("no effective {table} row for key {key} as of {as_of}")]
    ReferenceNotFound {
        table: &'static str,
        key: String,
        as_of: String,
    },

    #[error("engine {engine} is busy (reconfiguration in progress)")]
    EngineBusy { engine: String },

    #[error("engine {engine} fault during {operation}: {message}")]
    EngineFault {
        engine: String,
        operation: String,
        message: String,
    },

    #[error("failed to acquire artifact {artifact}: {reason}")]
    Acquisition { artifact: String, reason: String },

    #[error("no {module} engine loaded for version implied by date {as_of}")]
    VersionUnavailable { module: String, as_of: String },
}

pub type Result<T> = std::result::Result<T, Error>;
