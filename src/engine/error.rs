use thiserror::Error;

/// Failures of the engine itself, as opposed to failures of the script it runs.
/// Script failures are ordinary results: see the error kinds of [`super::Value`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has been disposed")]
    Disposed,

    /// A host callback tried to call back into the engine that is running it.
    #[error("engine called from its own thread; host callbacks may not reenter the engine")]
    Reentrant,

    #[error("object handle belongs to engine {found}, not engine {expected}")]
    ForeignHandle { expected: u64, found: u64 },

    #[error("engine failed to start: {0}")]
    Startup(String),

    #[error("engine thread terminated unexpectedly")]
    WorkerLost,
}
