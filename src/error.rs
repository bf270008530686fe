//! Configuration errors: the only error class the engine surfaces synchronously.
//!
//! Every other failure mode described in the engine (transient load failures,
//! template panics, listener panics, validation errors, submission errors) is
//! absorbed into recorded state and an emitted event rather than propagated as
//! a `Result`. Only programmer mistakes discoverable at construction time are
//! modeled as a typed error here.

use thiserror::Error;

/// Failure to construct a list, a collection, or a pool because of a
/// programmer error in the supplied configuration.
///
/// These are never produced by runtime conditions (network failures, bad
/// server responses, races) — those are transient and handled through
/// [`crate::collection::FailedRanges`] and the [`crate::event_bus::Event`]
/// stream instead.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    /// The configured pagination strategy requires an adapter method the
    /// injected [`crate::collection::DataAdapter`] does not implement.
    #[error("data adapter does not implement `{method}`, required by the `{strategy}` pagination strategy")]
    MissingAdapterMethod {
        /// The pagination strategy that required the method.
        strategy: &'static str,
        /// The adapter method name that was missing.
        method: &'static str,
    },

    /// A pool, range, or buffer size was configured as zero or negative.
    #[error("{field} must be a positive value, got {value}")]
    NonPositiveSize {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The invalid value that was supplied.
        value: i64,
    },

    /// The host element the list should mount into could not be found.
    #[error("container element `{selector}` was not found in the document")]
    ContainerNotFound {
        /// The selector or id that failed to resolve.
        selector: String,
    },

    /// An orientation string outside `{vertical, horizontal}` was supplied.
    #[error("invalid orientation `{0}`, expected \"vertical\" or \"horizontal\"")]
    InvalidOrientation(String),

    /// The pool's minimum capacity exceeds its maximum capacity.
    #[error("pool minPoolSize ({min}) must not exceed maxPoolSize ({max})")]
    InvalidPoolBounds {
        /// Configured minimum pool size.
        min: usize,
        /// Configured maximum pool size.
        max: usize,
    },
}

/// Result alias for fallible construction paths.
pub type ConfigResult<T> = Result<T, ConfigError>;
