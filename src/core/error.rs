//! Error types for the delivery pipeline
//!
//! Errors are cloneable on purpose: a single failure may have to be reported
//! to every continuation of a batch, or duplicated across the legs of a
//! split group.

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Write to a target failed
    #[error("Write to target '{target}' failed: {message}")]
    WriteFailed { target: String, message: String },

    /// Flush of a target failed
    #[error("Flush of target '{target}' failed: {message}")]
    FlushFailed { target: String, message: String },

    /// Target used before initialize() or after a failed initialize()
    #[error("Target '{target}' is not initialized")]
    NotInitialized { target: String },

    /// Target used after close()
    #[error("Target '{target}' is closed")]
    Closed { target: String },

    /// A wrapped target did not signal completion within the bounded wait
    #[error("Target '{target}' did not complete within {waited_ms}ms")]
    CompletionTimeout { target: String, waited_ms: u64 },

    /// Retry budget exhausted; carries the last attempt's error
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last_error: Box<PipelineError>,
    },

    /// Every sink in a fallback group failed; carries the last sink's error
    #[error("All {sink_count} fallback targets failed: {last_error}")]
    AllTargetsFailed {
        sink_count: usize,
        #[source]
        last_error: Box<PipelineError>,
    },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a write failure with target context
    pub fn write_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::WriteFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a flush failure with target context
    pub fn flush_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::FlushFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a not-initialized error
    pub fn not_initialized(target: impl Into<String>) -> Self {
        PipelineError::NotInitialized {
            target: target.into(),
        }
    }

    /// Create a closed-target error
    pub fn closed(target: impl Into<String>) -> Self {
        PipelineError::Closed {
            target: target.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a retries-exhausted error wrapping the last attempt's failure
    pub fn retries_exhausted(attempts: usize, last_error: PipelineError) -> Self {
        PipelineError::RetriesExhausted {
            attempts,
            last_error: Box::new(last_error),
        }
    }

    /// Create an all-targets-failed error for a fallback group
    pub fn all_targets_failed(sink_count: usize, last_error: PipelineError) -> Self {
        PipelineError::AllTargetsFailed {
            sink_count,
            last_error: Box::new(last_error),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PipelineError::Other(msg.into())
    }
}
